//! Dashboard view of the aggregate: filter the cell tree by franchise, month
//! and year, total per franchise, and run the "what-if" simulation that
//! zeroes out excluded expense categories.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{AggregateCell, CategoryKey, CategoryTotals, DashData};

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

pub fn month_label(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_LABELS.get(i as usize))
        .copied()
        .unwrap_or("?")
}

/// Dashboard filters. An empty list selects everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub franchises: Vec<String>,
    pub months: Vec<u32>,
    pub years: Vec<i32>,
    pub excluded: Vec<CategoryKey>,
}

impl Selection {
    fn includes(&self, year: i32, month: u32, franchise: &str) -> bool {
        (self.years.is_empty() || self.years.contains(&year))
            && (self.months.is_empty() || self.months.contains(&month))
            && (self.franchises.is_empty() || self.franchises.iter().any(|f| f == franchise))
    }

    pub fn is_excluded(&self, key: CategoryKey) -> bool {
        self.excluded.contains(&key)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FranchiseSummary {
    pub nome: String,
    pub receita: f64,
    pub despesa_total: f64,
    pub resultado: f64,
    pub margem: f64,
    pub objetos: f64,
    pub despesas: CategoryTotals,
    pub margem_simulada: f64,
    pub ganho_margem: f64,
}

impl FranchiseSummary {
    fn new(nome: &str) -> Self {
        Self {
            nome: nome.to_string(),
            ..Self::default()
        }
    }

    fn absorb(&mut self, cell: &AggregateCell) {
        self.receita += cell.receita;
        self.despesa_total += cell.despesa_total;
        self.objetos += cell.objetos;
        self.despesas.add_all(&cell.despesas);
    }

    fn finish(&mut self, excluded: &[CategoryKey]) {
        self.resultado = self.receita - self.despesa_total;
        self.margem = margin(self.receita, self.resultado);

        let excluded_amount: f64 = excluded.iter().map(|key| self.despesas.get(*key)).sum();
        let simulated_result = self.receita - (self.despesa_total - excluded_amount);
        self.margem_simulada = margin(self.receita, simulated_result);
        self.ganho_margem = (self.margem_simulada - self.margem).max(0.0);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub receita: f64,
    pub despesa: f64,
    pub resultado: f64,
    pub objetos: f64,
    pub margem: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionPoint {
    pub year: i32,
    pub month: u32,
    pub resultado: f64,
}

impl EvolutionPoint {
    pub fn label(&self) -> String {
        format!("{}/{}", month_label(self.month), self.year)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSummary {
    pub franchises: Vec<FranchiseSummary>,
    pub totals: Totals,
    pub evolution: Vec<EvolutionPoint>,
    pub years: Vec<i32>,
    pub franchise_names: Vec<String>,
}

/// Sum the selected cells per franchise. Franchises listed in `data.agfs`
/// always get a row (zeros when nothing matches); names only present in the
/// cells follow in alphabetical order.
pub fn summarize(data: &DashData, selection: &Selection) -> DashboardSummary {
    let mut names: Vec<String> = Vec::new();
    for agf in &data.agfs {
        if !names.contains(&agf.nome) {
            names.push(agf.nome.clone());
        }
    }
    let extra: BTreeSet<&str> = data
        .cells()
        .map(|(_, _, name, _)| name)
        .filter(|name| !names.iter().any(|n| n.as_str() == *name))
        .collect();
    names.extend(extra.into_iter().map(str::to_string));

    let mut rows: Vec<FranchiseSummary> = names
        .iter()
        .filter(|name| selection.franchises.is_empty() || selection.franchises.contains(*name))
        .map(|name| FranchiseSummary::new(name))
        .collect();

    let mut evolution: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (year, month, name, cell) in data.cells() {
        if !selection.includes(year, month, name) {
            continue;
        }
        if let Some(row) = rows.iter_mut().find(|r| r.nome == name) {
            row.absorb(cell);
        }
        *evolution.entry((year, month)).or_default() += cell.receita - cell.despesa_total;
    }

    for row in &mut rows {
        row.finish(&selection.excluded);
    }

    let mut totals = Totals::default();
    for row in &rows {
        totals.receita += row.receita;
        totals.despesa += row.despesa_total;
        totals.resultado += row.resultado;
        totals.objetos += row.objetos;
    }
    totals.margem = margin(totals.receita, totals.resultado);

    DashboardSummary {
        franchises: rows,
        totals,
        evolution: evolution
            .into_iter()
            .map(|((year, month), resultado)| EvolutionPoint {
                year,
                month,
                resultado,
            })
            .collect(),
        years: data.dados.keys().copied().collect(),
        franchise_names: names,
    }
}

fn margin(receita: f64, resultado: f64) -> f64 {
    if receita > 0.0 {
        resultado / receita * 100.0
    } else {
        0.0
    }
}
