//! Joins the platform's franchise, ledger, expense and object-count
//! collections into the `year -> month -> franchise` cell tree served by
//! `/api/dash-data`.
//!
//! Fetching ([`load_snapshot`]) and aggregation ([`aggregate`]) are split so
//! the aggregation is a pure function of the fetched rows.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::upstream::{
    fields, first_in, first_str_in, Constraint, FieldChain, Record, Reference, KEY_EMPRESA, KEY_FRANCHISE,
    KEY_LEDGER, KEY_OBJECT_TYPE, OBJ_CATEGORY, OBJ_EXPENSE, OBJ_FRANCHISE, OBJ_LEDGER,
    OBJ_OBJECT_COUNT,
};
use crate::models::{CategoryKey, DashData, Franchise};
use crate::services::bubble::BubbleClient;
use crate::services::category::{CategoryInput, CategoryNormalizer};
use crate::services::parsers::{
    fold_text, parse_composite_month_year, parse_currency_br, parse_month, parse_year,
};

/// Bucket for rows whose franchise cannot be resolved.
pub const UNASSIGNED_FRANCHISE: &str = "Sem AGF";

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub count_type_filter: Option<String>,
    pub ledger_expense_fallback: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            count_type_filter: Some("Total".into()),
            ledger_expense_fallback: true,
        }
    }
}

impl From<&Config> for AggregatorOptions {
    fn from(config: &Config) -> Self {
        Self {
            count_type_filter: config.count_type_filter.clone(),
            ledger_expense_fallback: config.ledger_expense_fallback,
        }
    }
}

/// Raw upstream rows for one tenant, as fetched for a single request.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub franchises: Vec<Record>,
    pub ledgers: Vec<Record>,
    /// Category id -> label.
    pub categories: HashMap<String, String>,
    pub expenses: Vec<Record>,
    pub object_counts: Vec<Record>,
}

/// Fetch and aggregate everything for `empresa_id`.
pub async fn fetch_dash_data(
    client: &BubbleClient,
    normalizer: &CategoryNormalizer,
    empresa_id: &str,
    options: &AggregatorOptions,
) -> AppResult<DashData> {
    let snapshot = load_snapshot(client, normalizer, empresa_id, options).await?;
    Ok(aggregate(&snapshot, normalizer, options))
}

pub async fn load_snapshot(
    client: &BubbleClient,
    normalizer: &CategoryNormalizer,
    empresa_id: &str,
    options: &AggregatorOptions,
) -> AppResult<Snapshot> {
    let tenant = [Constraint::equals(KEY_EMPRESA, empresa_id)];

    let franchises = client.fetch_all(OBJ_FRANCHISE, &tenant).await?;
    if franchises.is_empty() {
        debug!(empresa_id, "No franchises for tenant");
        return Ok(Snapshot::default());
    }

    let ledgers = client.fetch_all(OBJ_LEDGER, &tenant).await?;

    let franchise_ids: Vec<String> = franchises
        .iter()
        .filter_map(|f| f.id().map(str::to_string))
        .collect();
    let ledger_ids: Vec<String> = ledgers
        .iter()
        .filter_map(|l| l.id().map(str::to_string))
        .collect();

    let expense_filter = [Constraint::is_in(KEY_FRANCHISE, franchise_ids)];
    let mut count_filter = vec![Constraint::is_in(KEY_LEDGER, ledger_ids)];
    if let Some(object_type) = &options.count_type_filter {
        count_filter.push(Constraint::equals(KEY_OBJECT_TYPE, object_type.as_str()));
    }

    let (category_rows, expenses, object_counts) = tokio::try_join!(
        client.fetch_all(OBJ_CATEGORY, &[]),
        client.fetch_all(OBJ_EXPENSE, &expense_filter),
        client.fetch_all(OBJ_OBJECT_COUNT, &count_filter),
    )?;

    let mut categories: HashMap<String, String> = category_rows
        .iter()
        .filter_map(|row| {
            let id = row.id()?;
            let label = row.first_str(fields::CATEGORY_LABEL).unwrap_or_default();
            Some((id.to_string(), label.to_string()))
        })
        .collect();

    let missing: BTreeSet<&str> = expenses
        .iter()
        .filter_map(|row| match row.reference(fields::CATEGORY_REF) {
            Some(Reference::Id(id))
                if !categories.contains_key(id)
                    && normalizer.ids().lookup(None, id).is_none() =>
            {
                Some(id)
            }
            _ => None,
        })
        .collect();

    for id in missing {
        let label = client
            .try_fetch_by_id(OBJ_CATEGORY, id)
            .await
            .and_then(|row| row.first_str(fields::CATEGORY_LABEL).map(str::to_string))
            .unwrap_or_default();
        categories.insert(id.to_string(), label);
    }

    debug!(
        empresa_id,
        franchises = franchises.len(),
        ledgers = ledgers.len(),
        categories = categories.len(),
        expenses = expenses.len(),
        object_counts = object_counts.len(),
        "Loaded upstream snapshot"
    );

    Ok(Snapshot {
        franchises,
        ledgers,
        categories,
        expenses,
        object_counts,
    })
}

#[derive(Debug, Clone, PartialEq)]
struct FranchiseRef {
    id: Option<String>,
    name: String,
}

/// Where a row lands: period plus (maybe) franchise.
#[derive(Debug, Clone, PartialEq)]
struct Placement {
    year: i32,
    month: u32,
    franchise: Option<FranchiseRef>,
}

type CellKey = (i32, u32, String);

struct Resolver<'a> {
    franchise_names: HashMap<&'a str, &'a str>,
    /// (id, name) in fetch order, for matching free-text references.
    franchise_order: Vec<(&'a str, &'a str)>,
    ledgers: HashMap<&'a str, Placement>,
}

impl<'a> Resolver<'a> {
    fn new(snapshot: &'a Snapshot) -> Self {
        let franchise_order: Vec<(&'a str, &'a str)> = snapshot
            .franchises
            .iter()
            .filter_map(|f| Some((f.id()?, franchise_name(f)?)))
            .collect();

        let mut resolver = Self {
            franchise_names: franchise_order.iter().copied().collect(),
            franchise_order,
            ledgers: HashMap::new(),
        };

        let ledgers: HashMap<&'a str, Placement> = snapshot
            .ledgers
            .iter()
            .filter_map(|ledger| {
                let id = ledger.id()?;
                let placement = resolver.place_map(ledger.map())?;
                Some((id, placement))
            })
            .collect();
        resolver.ledgers = ledgers;
        resolver
    }

    fn franchise(&self, reference: Reference<'_>) -> Option<FranchiseRef> {
        match reference {
            Reference::Id(id) => self.franchise_names.get(id).map(|name| FranchiseRef {
                id: Some(id.to_string()),
                name: name.to_string(),
            }),
            Reference::Embedded(map) => {
                let id = first_str_in(map, fields::ID);
                let name = id
                    .and_then(|id| self.franchise_names.get(id).copied())
                    .or_else(|| first_str_in(map, fields::FRANCHISE_NAME))?;
                Some(FranchiseRef {
                    id: id.map(str::to_string),
                    name: name.to_string(),
                })
            }
            Reference::RawLabel(label) => {
                let folded = fold_text(label);
                let matched = self
                    .franchise_order
                    .iter()
                    .find(|(_, name)| fold_text(name) == folded);
                Some(match matched {
                    Some((id, name)) => FranchiseRef {
                        id: Some(id.to_string()),
                        name: name.to_string(),
                    },
                    None => FranchiseRef {
                        id: None,
                        name: label.to_string(),
                    },
                })
            }
        }
    }

    /// Period and franchise read straight off a record (or embedded object).
    fn place_map(&self, map: &Map<String, Value>) -> Option<Placement> {
        let (year, month) = period_of(map)?;
        let franchise = first_in(map, fields::FRANCHISE_REF)
            .and_then(Reference::from_value)
            .and_then(|r| self.franchise(r));
        Some(Placement {
            year,
            month,
            franchise,
        })
    }

    fn place_via_ledger(&self, reference: Reference<'_>) -> Option<Placement> {
        match reference {
            Reference::Id(id) => self.ledgers.get(id).cloned(),
            Reference::RawLabel(label) => {
                parse_composite_month_year(label).map(|(year, month)| Placement {
                    year,
                    month,
                    franchise: None,
                })
            }
            Reference::Embedded(map) => first_str_in(map, fields::ID)
                .and_then(|id| self.ledgers.get(id).cloned())
                .or_else(|| self.place_map(map)),
        }
    }

    /// Placement for an expense or object-count row. A franchise reference
    /// on the row itself overrides the one derived from its ledger.
    fn place_row(&self, row: &Record) -> Option<Placement> {
        let mut placement = row
            .reference(fields::LEDGER_REF)
            .and_then(|r| self.place_via_ledger(r))
            .or_else(|| {
                period_of(row.map()).map(|(year, month)| Placement {
                    year,
                    month,
                    franchise: None,
                })
            })?;

        if let Some(franchise) = row
            .reference(fields::FRANCHISE_REF)
            .and_then(|r| self.franchise(r))
        {
            placement.franchise = Some(franchise);
        }
        Some(placement)
    }
}

fn franchise_name(record: &Record) -> Option<&str> {
    record.first_str(fields::FRANCHISE_NAME).or_else(|| record.id())
}

/// Direct year/month fields first, then a composite `MM/YYYY` field.
fn period_of(map: &Map<String, Value>) -> Option<(i32, u32)> {
    let year = first_in(map, fields::YEAR).map(parse_year).unwrap_or(0);
    let month = first_in(map, fields::MONTH).map(parse_month).unwrap_or(0);
    if year >= 1900 && (1..=12).contains(&month) {
        return Some((year, month));
    }

    first_in(map, fields::COMPOSITE_DATE)
        .and_then(Value::as_str)
        .and_then(parse_composite_month_year)
}

fn cell_key(placement: &Placement) -> CellKey {
    let name = placement
        .franchise
        .as_ref()
        .map(|f| f.name.clone())
        .unwrap_or_else(|| UNASSIGNED_FRANCHISE.to_string());
    (placement.year, placement.month, name)
}

fn amount_of(row: &Record, chain: FieldChain) -> f64 {
    row.first(chain).map(parse_currency_br).unwrap_or(0.0)
}

/// Build the cell tree from a fetched snapshot. Pure and deterministic:
/// the same snapshot always yields the same (byte-identical when serialized)
/// result.
pub fn aggregate(
    snapshot: &Snapshot,
    normalizer: &CategoryNormalizer,
    options: &AggregatorOptions,
) -> DashData {
    let agfs: Vec<Franchise> = snapshot
        .franchises
        .iter()
        .filter_map(|f| {
            Some(Franchise {
                id: f.id()?.to_string(),
                nome: franchise_name(f)?.to_string(),
            })
        })
        .collect();

    let mut data = DashData::with_franchises(agfs);
    if snapshot.franchises.is_empty() {
        return data;
    }

    let resolver = Resolver::new(snapshot);
    let mut dropped = 0usize;

    for ledger in &snapshot.ledgers {
        let Some(placement) = resolver.place_map(ledger.map()) else {
            dropped += 1;
            continue;
        };
        let (year, month, name) = cell_key(&placement);
        let cell = data.cell_mut(year, month, &name);
        cell.receita += amount_of(ledger, fields::REVENUE);
        cell.despesa_total += amount_of(ledger, fields::LEDGER_EXPENSE);
    }

    let mut detailed: HashSet<CellKey> = HashSet::new();
    for expense in &snapshot.expenses {
        let Some(placement) = resolver.place_row(expense) else {
            dropped += 1;
            continue;
        };

        let (category_id, label) = match expense.reference(fields::CATEGORY_REF) {
            Some(Reference::Id(id)) => (
                Some(id),
                snapshot.categories.get(id).map(String::as_str),
            ),
            Some(Reference::Embedded(map)) => (
                first_str_in(map, fields::ID),
                first_str_in(map, fields::CATEGORY_LABEL),
            ),
            Some(Reference::RawLabel(label)) => (None, Some(label)),
            None => (None, None),
        };

        let key = normalizer.normalize(&CategoryInput {
            franchise_id: placement.franchise.as_ref().and_then(|f| f.id.as_deref()),
            category_id,
            label,
            description: expense.first_str(fields::DESCRIPTION),
        });

        let cell_key = cell_key(&placement);
        let (year, month, name) = &cell_key;
        data.cell_mut(*year, *month, name)
            .despesas
            .add(key, amount_of(expense, fields::AMOUNT));
        detailed.insert(cell_key);
    }

    let wanted_type = options.count_type_filter.as_deref().map(fold_text);
    for row in &snapshot.object_counts {
        if let (Some(wanted), Some(actual)) = (&wanted_type, row.first_str(fields::OBJECT_TYPE)) {
            if fold_text(actual) != *wanted {
                continue;
            }
        }
        let Some(placement) = resolver.place_row(row) else {
            dropped += 1;
            continue;
        };
        let (year, month, name) = cell_key(&placement);
        data.cell_mut(year, month, &name).objetos += amount_of(row, fields::OBJECT_COUNT);
    }

    for (year, months) in data.dados.iter_mut() {
        for (month, franchises) in months.iter_mut() {
            for (name, cell) in franchises.iter_mut() {
                let has_detail = detailed.contains(&(*year, *month, name.clone()));
                if options.ledger_expense_fallback && !has_detail && cell.despesa_total > 0.0 {
                    cell.despesas.add(CategoryKey::Extras, cell.despesa_total);
                }

                cell.despesas.sanitize();
                cell.receita = finite_or_zero(cell.receita);
                cell.objetos = finite_or_zero(cell.objetos);
                cell.despesa_total = finite_or_zero(cell.despesa_total);

                let detail_sum = finite_or_zero(cell.despesas.sum());
                if detail_sum > 0.0 {
                    cell.despesa_total = detail_sum;
                }
            }
        }
    }

    debug!(
        cells = data.cells().count(),
        dropped, "Aggregated dashboard cells"
    );
    data
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
