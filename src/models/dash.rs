use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::category::{CategoryKey, CategoryTotals};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Franchise {
    pub id: String,
    pub nome: String,
}

/// Aggregated figures for one (year, month, franchise) bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateCell {
    pub receita: f64,
    pub objetos: f64,
    pub despesa_total: f64,
    pub despesas: CategoryTotals,
}

/// year -> month -> franchise name -> cell
pub type CellTree = BTreeMap<i32, BTreeMap<u32, BTreeMap<String, AggregateCell>>>;

/// Payload of `GET /api/dash-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashData {
    pub agfs: Vec<Franchise>,
    pub categorias_despesa: Vec<CategoryKey>,
    pub dados: CellTree,
}

impl DashData {
    pub fn empty() -> Self {
        Self::with_franchises(Vec::new())
    }

    pub fn with_franchises(agfs: Vec<Franchise>) -> Self {
        Self {
            agfs,
            categorias_despesa: CategoryKey::ALL.to_vec(),
            dados: BTreeMap::new(),
        }
    }

    pub fn cell_mut(&mut self, year: i32, month: u32, franchise: &str) -> &mut AggregateCell {
        self.dados
            .entry(year)
            .or_default()
            .entry(month)
            .or_default()
            .entry(franchise.to_string())
            .or_default()
    }

    pub fn cell(&self, year: i32, month: u32, franchise: &str) -> Option<&AggregateCell> {
        self.dados.get(&year)?.get(&month)?.get(franchise)
    }

    /// Every populated cell as `(year, month, franchise, cell)`, in key order.
    pub fn cells(&self) -> impl Iterator<Item = (i32, u32, &str, &AggregateCell)> {
        self.dados.iter().flat_map(|(year, months)| {
            months.iter().flat_map(move |(month, franchises)| {
                franchises
                    .iter()
                    .map(move |(name, cell)| (*year, *month, name.as_str(), cell))
            })
        })
    }
}
