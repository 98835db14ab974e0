pub mod aggregator;
pub mod bubble;
pub mod category;
pub mod parsers;
pub mod summary;
pub mod synthetic;
pub mod totals;
