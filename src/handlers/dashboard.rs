use askama::Template;
use axum::extract::{RawQuery, State};
use axum::response::Html;
use chrono::Datelike;
use tracing::debug;

use crate::error::{AppResult, RenderHtml};
use crate::models::{CategoryKey, CategoryTotals, DashData};
use crate::services::aggregator::fetch_dash_data;
use crate::services::parsers::{format_brl, format_number_br, format_percent};
use crate::services::summary::{month_label, summarize, DashboardSummary, Selection};
use crate::services::synthetic::sample_dash_data;
use crate::state::AppState;
use crate::VERSION;

/// Parsed `GET /` query. Filters may repeat (`?agf=a&agf=b`).
#[derive(Debug, Default, PartialEq)]
pub struct DashboardQuery {
    pub empresa_id: Option<String>,
    pub selection: Selection,
}

impl DashboardQuery {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let Some(raw) = raw else {
            return query;
        };

        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode(value);
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "empresa_id" => query.empresa_id = Some(value.to_string()),
                "agf" => query.selection.franchises.push(value.to_string()),
                "mes" => {
                    if let Ok(m @ 1..=12) = value.parse::<u32>() {
                        query.selection.months.push(m);
                    }
                }
                "ano" => {
                    if let Ok(y) = value.parse::<i32>() {
                        query.selection.years.push(y);
                    }
                }
                "excluir" => {
                    if let Ok(key) = value.parse::<CategoryKey>() {
                        if !query.selection.excluded.contains(&key) {
                            query.selection.excluded.push(key);
                        }
                    }
                }
                _ => {}
            }
        }
        query
    }
}

fn decode(value: &str) -> String {
    let value = value.replace('+', " ");
    urlencoding::decode(&value)
        .map(|v| v.into_owned())
        .unwrap_or(value)
}

pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub struct FranchiseRow {
    pub nome: String,
    pub receita: String,
    pub despesa: String,
    pub resultado: String,
    pub negative: bool,
    pub objetos: String,
    pub margem: String,
    pub margem_simulada: String,
    pub ganho: String,
}

pub struct CategoryRow {
    pub key: &'static str,
    pub label: &'static str,
    pub amount: String,
    pub share: String,
    pub width: u32,
    pub excluded: bool,
}

pub struct EvolutionRow {
    pub label: String,
    pub resultado: String,
    pub width: u32,
    pub negative: bool,
}

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
pub struct DashboardTemplate {
    pub title: String,
    pub version: &'static str,
    pub empresa_id: String,
    pub is_sample: bool,
    pub franchise_options: Vec<FilterOption>,
    pub month_options: Vec<FilterOption>,
    pub year_options: Vec<FilterOption>,
    pub total_receita: String,
    pub total_despesa: String,
    pub total_resultado: String,
    pub total_negative: bool,
    pub total_objetos: String,
    pub total_margem: String,
    pub total_margem_simulada: String,
    pub franchises: Vec<FranchiseRow>,
    pub categories: Vec<CategoryRow>,
    pub evolution: Vec<EvolutionRow>,
}

pub async fn index(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Html<String>> {
    let query = DashboardQuery::parse(raw.as_deref());
    debug!(?query, "Loading dashboard");

    let data = match &query.empresa_id {
        Some(empresa_id) => {
            let client = state.bubble()?;
            fetch_dash_data(
                &client,
                &state.normalizer,
                empresa_id,
                &state.aggregator_options(),
            )
            .await?
        }
        None => sample_dash_data(chrono::Local::now().year()),
    };

    build_template(&query, &data).render_html()
}

fn build_template(query: &DashboardQuery, data: &DashData) -> DashboardTemplate {
    let selection = &query.selection;
    let summary = summarize(data, selection);

    let mut by_category = CategoryTotals::default();
    for row in &summary.franchises {
        by_category.add_all(&row.despesas);
    }
    let category_total = by_category.sum();
    let category_max = by_category.iter().map(|(_, v)| v).fold(0.0, f64::max);

    let categories = by_category
        .iter()
        .map(|(key, amount)| CategoryRow {
            key: key.as_str(),
            label: key.label(),
            amount: format_brl(amount),
            share: format_percent(ratio(amount, category_total) * 100.0),
            width: bar_width(amount, category_max),
            excluded: selection.is_excluded(key),
        })
        .collect();

    let evolution_max = summary
        .evolution
        .iter()
        .map(|p| p.resultado.abs())
        .fold(0.0, f64::max);
    let evolution = summary
        .evolution
        .iter()
        .map(|point| EvolutionRow {
            label: point.label(),
            resultado: format_brl(point.resultado),
            width: bar_width(point.resultado.abs(), evolution_max),
            negative: point.resultado < 0.0,
        })
        .collect();

    let excluded_total: f64 = selection
        .excluded
        .iter()
        .map(|key| by_category.get(*key))
        .sum();
    let simulated_margin =
        ratio(summary.totals.resultado + excluded_total, summary.totals.receita) * 100.0;

    let franchises = summary
        .franchises
        .iter()
        .map(|row| FranchiseRow {
            nome: row.nome.clone(),
            receita: format_brl(row.receita),
            despesa: format_brl(row.despesa_total),
            resultado: format_brl(row.resultado),
            negative: row.resultado < 0.0,
            objetos: format_number_br(row.objetos, 0),
            margem: format_percent(row.margem),
            margem_simulada: format_percent(row.margem_simulada),
            ganho: format_percent(row.ganho_margem),
        })
        .collect();

    DashboardTemplate {
        title: "Dashboard AGF".into(),
        version: VERSION,
        empresa_id: query.empresa_id.clone().unwrap_or_default(),
        is_sample: query.empresa_id.is_none(),
        franchise_options: franchise_options(&summary, selection),
        month_options: (1..=12)
            .map(|m| FilterOption {
                value: m.to_string(),
                label: month_label(m).to_string(),
                selected: selection.months.contains(&m),
            })
            .collect(),
        year_options: summary
            .years
            .iter()
            .map(|y| FilterOption {
                value: y.to_string(),
                label: y.to_string(),
                selected: selection.years.contains(y),
            })
            .collect(),
        total_receita: format_brl(summary.totals.receita),
        total_despesa: format_brl(summary.totals.despesa),
        total_resultado: format_brl(summary.totals.resultado),
        total_negative: summary.totals.resultado < 0.0,
        total_objetos: format_number_br(summary.totals.objetos, 0),
        total_margem: format_percent(summary.totals.margem),
        total_margem_simulada: format_percent(simulated_margin),
        franchises,
        categories,
        evolution,
    }
}

fn franchise_options(summary: &DashboardSummary, selection: &Selection) -> Vec<FilterOption> {
    summary
        .franchise_names
        .iter()
        .map(|name| FilterOption {
            value: name.clone(),
            label: name.clone(),
            selected: selection.franchises.contains(name),
        })
        .collect()
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole
    } else {
        0.0
    }
}

/// Bar length in percent of the largest value.
fn bar_width(value: f64, max: f64) -> u32 {
    (ratio(value, max) * 100.0).round().clamp(0.0, 100.0) as u32
}
