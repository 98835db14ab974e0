//! Shapes of the upstream data API and helpers for reading its loosely typed
//! records.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const OBJ_FRANCHISE: &str = "AGF";
pub const OBJ_LEDGER: &str = "LancamentoMensal";
pub const OBJ_EXPENSE: &str = "SubConta";
pub const OBJ_CATEGORY: &str = "Categoria";
pub const OBJ_OBJECT_COUNT: &str = "Balancete";

pub const KEY_EMPRESA: &str = "Empresa Mãe";
pub const KEY_FRANCHISE: &str = "AGF";
pub const KEY_LEDGER: &str = "Lançamento Mensal";
pub const KEY_OBJECT_TYPE: &str = "Tipo Objeto";

/// `{ response: { results, count?, cursor?, remaining? } }`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub response: Page<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    pub count: Option<u64>,
    pub cursor: Option<u64>,
    pub remaining: Option<u64>,
}

/// Single-object lookups answer `{ response: { ...fields } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct SingleEnvelope {
    pub response: Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Equals,
    In,
}

/// One clause of the `constraints` query parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint {
    pub key: String,
    pub constraint_type: ConstraintType,
    pub value: Value,
}

impl Constraint {
    pub fn equals(key: &str, value: impl Into<Value>) -> Self {
        Self {
            key: key.to_string(),
            constraint_type: ConstraintType::Equals,
            value: value.into(),
        }
    }

    pub fn is_in<I, S>(key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.to_string(),
            constraint_type: ConstraintType::In,
            value: Value::Array(values.into_iter().map(|v| Value::String(v.into())).collect()),
        }
    }

    /// An `in` clause over an empty list can never match anything.
    pub fn is_empty_in(&self) -> bool {
        self.constraint_type == ConstraintType::In
            && self.value.as_array().is_some_and(|values| values.is_empty())
    }
}

static PLATFORM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10,}x\d+$").expect("valid platform id regex"));

/// True for strings shaped like platform record ids (`1751034502993x1402...`).
pub fn looks_like_id(s: &str) -> bool {
    PLATFORM_ID.is_match(s.trim())
}

/// A reference field as it arrives upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<'a> {
    Id(&'a str),
    Embedded(&'a Map<String, Value>),
    RawLabel(&'a str),
}

impl<'a> Reference<'a> {
    pub fn from_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) if looks_like_id(s) => Some(Self::Id(s.trim())),
            Value::String(s) => Some(Self::RawLabel(s.trim())),
            Value::Object(map) => Some(Self::Embedded(map)),
            Value::Array(items) => items.first().and_then(Self::from_value),
            _ => None,
        }
    }
}

/// Ordered list of candidate field names; the first non-empty one wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldChain(pub &'static [&'static str]);

pub mod fields {
    use super::FieldChain;

    pub const ID: FieldChain = FieldChain(&["_id", "id"]);
    pub const FRANCHISE_NAME: FieldChain =
        FieldChain(&["Nome", "nome", "Nome AGF", "nome_agf", "Name", "name", "display"]);
    pub const FRANCHISE_REF: FieldChain = FieldChain(&["AGF", "agf", "Agf"]);
    pub const LEDGER_REF: FieldChain = FieldChain(&[
        "Lançamento Mensal",
        "Lancamento Mensal",
        "LancamentoMensal",
        "lancamento_mensal",
        "lancamento",
    ]);
    pub const YEAR: FieldChain = FieldChain(&["Ano", "ano", "year"]);
    pub const MONTH: FieldChain = FieldChain(&["Mês", "Mes", "mes", "mês", "month"]);
    pub const COMPOSITE_DATE: FieldChain = FieldChain(&[
        "Mês/Ano",
        "Mes/Ano",
        "mes_ano",
        "Referência",
        "Referencia",
        "referencia",
        "Competência",
        "competencia",
    ]);
    pub const REVENUE: FieldChain =
        FieldChain(&["Total Receita", "total_receita", "Receita", "receita"]);
    pub const LEDGER_EXPENSE: FieldChain =
        FieldChain(&["Total Despesa", "total_despesa", "Despesa", "despesa"]);
    pub const CATEGORY_REF: FieldChain = FieldChain(&["Categoria", "categoria"]);
    pub const CATEGORY_LABEL: FieldChain =
        FieldChain(&["Categoria", "categoria", "Nome", "nome", "display", "name"]);
    pub const AMOUNT: FieldChain = FieldChain(&["Valor", "valor", "Total", "total"]);
    pub const DESCRIPTION: FieldChain =
        FieldChain(&["Descrição", "Descricao", "descrição", "descricao", "Fornecedor"]);
    pub const OBJECT_COUNT: FieldChain = FieldChain(&[
        "Quantidade",
        "quantidade",
        "Objetos",
        "objetos",
        "Qtd",
        "qtd",
    ]);
    pub const OBJECT_TYPE: FieldChain =
        FieldChain(&["Tipo Objeto", "tipo_objeto", "Tipo", "tipo"]);
}

/// A loosely typed upstream row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// First field in `chain` holding a non-null, non-empty value.
    pub fn first(&self, chain: FieldChain) -> Option<&Value> {
        first_in(&self.0, chain)
    }

    pub fn first_str(&self, chain: FieldChain) -> Option<&str> {
        first_str_in(&self.0, chain)
    }

    pub fn id(&self) -> Option<&str> {
        self.first_str(fields::ID)
    }

    pub fn reference(&self, chain: FieldChain) -> Option<Reference<'_>> {
        self.first(chain).and_then(Reference::from_value)
    }
}

pub fn first_in<'a>(map: &'a Map<String, Value>, chain: FieldChain) -> Option<&'a Value> {
    chain
        .0
        .iter()
        .filter_map(|name| map.get(*name))
        .find(|value| is_present(value))
}

pub fn first_str_in<'a>(map: &'a Map<String, Value>, chain: FieldChain) -> Option<&'a str> {
    chain
        .0
        .iter()
        .filter_map(|name| map.get(*name))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}
