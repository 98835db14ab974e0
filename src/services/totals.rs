use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{CategoryKey, CategoryTotals};
use crate::services::category::{CategoryInput, CategoryNormalizer};
use crate::services::parsers::parse_currency_br;

/// Bucket for posted sub-records without an AGF.
pub const NO_FRANCHISE_ID: &str = "sem_agf";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostedSubConta {
    #[serde(rename = "AGF")]
    pub agf: Option<String>,
    #[serde(rename = "Categoria")]
    pub categoria: Option<String>,
    #[serde(rename = "Valor", default)]
    pub valor: Value,
    #[serde(rename = "Descrição", alias = "Descricao")]
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostedCategoria {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "Categoria", default)]
    pub categoria: String,
    #[serde(rename = "AGF")]
    pub agf: Option<String>,
}

/// Body of `POST /api/dash-data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TotalsRequest {
    #[serde(default)]
    pub subcontas: Vec<PostedSubConta>,
    #[serde(default)]
    pub categorias: Vec<PostedCategoria>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FranchiseTotals {
    pub agf_id: String,
    pub nome: String,
    pub despesas_detalhadas: CategoryTotals,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsResponse {
    pub source_categorias: Vec<CategoryKey>,
    pub totais_por_agf: Vec<FranchiseTotals>,
}

/// Sum posted expense lines per AGF and canonical category.
pub fn totals_by_franchise(request: &TotalsRequest, normalizer: &CategoryNormalizer) -> TotalsResponse {
    let labels: HashMap<&str, &str> = request
        .categorias
        .iter()
        .map(|c| (c.id.as_str(), c.categoria.as_str()))
        .collect();

    let mut by_franchise: BTreeMap<&str, CategoryTotals> = BTreeMap::new();
    for line in &request.subcontas {
        let agf = line
            .agf
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(NO_FRANCHISE_ID);
        let category_id = line.categoria.as_deref().filter(|c| !c.is_empty());

        let key = normalizer.normalize(&CategoryInput {
            franchise_id: Some(agf),
            category_id,
            label: category_id.and_then(|id| labels.get(id).copied()),
            description: line.descricao.as_deref(),
        });

        by_franchise
            .entry(agf)
            .or_default()
            .add(key, parse_currency_br(&line.valor));
    }

    let mut rows: Vec<FranchiseTotals> = by_franchise
        .into_iter()
        .map(|(agf, mut despesas)| {
            despesas.sanitize();
            FranchiseTotals {
                agf_id: agf.to_string(),
                nome: agf.to_string(),
                total: despesas.sum(),
                despesas_detalhadas: despesas,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.nome.cmp(&b.nome));

    TotalsResponse {
        source_categorias: CategoryKey::ALL.to_vec(),
        totais_por_agf: rows,
    }
}
