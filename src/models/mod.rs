pub mod category;
pub mod dash;
pub mod upstream;

pub use category::{CategoryKey, CategoryTotals};
pub use dash::{AggregateCell, CellTree, DashData, Franchise};
