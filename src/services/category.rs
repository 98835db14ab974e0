//! Maps whatever the platform tells us about an expense line (category id,
//! category label, free-text description) onto one of the nine canonical
//! [`CategoryKey`]s.
//!
//! Precedence is fixed: id table, exact synonym of the label, keyword rules
//! over the label, extended keyword rules over the description (then the
//! label), and finally [`CategoryKey::Extras`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppResult;
use crate::models::CategoryKey;
use crate::services::parsers::fold_text;

/// Platform category ids with a known canonical key.
const BUILTIN_IDS: [(&str, CategoryKey); 9] = [
    ("1754514204139x526063856276349100", CategoryKey::FolhaPagamento),
    ("1751034502993x140272905276620800", CategoryKey::Veiculos),
    ("1751034541896x868439199319326700", CategoryKey::Telefone),
    ("1751034431059x728921665608876000", CategoryKey::Pitney),
    ("1751034441316x205655876634673150", CategoryKey::Impostos),
    ("1751034473039x889328518957629400", CategoryKey::Honorarios),
    ("1751034485642x432154856311750660", CategoryKey::Extras),
    ("1751034521134x718767032318296000", CategoryKey::Aluguel),
    ("1751034565744x102496125839998980", CategoryKey::Comissoes),
];

const SYNONYMS: [(&str, CategoryKey); 24] = [
    ("aluguel", CategoryKey::Aluguel),
    ("alugueis", CategoryKey::Aluguel),
    ("comissoes", CategoryKey::Comissoes),
    ("comissao", CategoryKey::Comissoes),
    ("extras", CategoryKey::Extras),
    ("extra", CategoryKey::Extras),
    ("honorarios", CategoryKey::Honorarios),
    ("honorario", CategoryKey::Honorarios),
    ("imposto", CategoryKey::Impostos),
    ("impostos", CategoryKey::Impostos),
    ("pitney", CategoryKey::Pitney),
    ("pitney bowes", CategoryKey::Pitney),
    ("telefone", CategoryKey::Telefone),
    ("telefonia", CategoryKey::Telefone),
    ("veiculos", CategoryKey::Veiculos),
    ("veiculo", CategoryKey::Veiculos),
    ("folha pgto", CategoryKey::FolhaPagamento),
    ("folha pgto.", CategoryKey::FolhaPagamento),
    ("folha pagamento", CategoryKey::FolhaPagamento),
    ("folha de pagamento", CategoryKey::FolhaPagamento),
    ("folha_pagamento", CategoryKey::FolhaPagamento),
    ("folha", CategoryKey::FolhaPagamento),
    ("salarios", CategoryKey::FolhaPagamento),
    ("tributos", CategoryKey::Impostos),
];

/// Keyword rules for category labels, tried in order. `comis` must run
/// before the tax tokens; payroll runs late since `pgto`/`pagamento` prefix
/// all kinds of lines.
const LABEL_RULES: [(CategoryKey, &str); 9] = [
    (CategoryKey::Comissoes, r"comis"),
    (CategoryKey::Aluguel, r"alug|locacao"),
    (CategoryKey::Honorarios, r"honor"),
    (
        CategoryKey::Impostos,
        r"impost|tribut|\b(pis|cofins|irrf|iss|issqn|inss|darf|das)\b",
    ),
    (CategoryKey::Veiculos, r"veic|combust|pedag"),
    (CategoryKey::Telefone, r"telef"),
    (CategoryKey::Pitney, r"pitney"),
    (CategoryKey::FolhaPagamento, r"folha|pgto|pagament|salari"),
    (CategoryKey::Extras, r"extra"),
];

/// Extended rules for free text, including vendor names. Taxes run before
/// vehicles so `imposto` never falls into `posto`; payroll runs last before
/// the catch-all.
const DESCRIPTION_RULES: [(CategoryKey, &str); 9] = [
    (CategoryKey::Pitney, r"pitney|bowes"),
    (CategoryKey::Comissoes, r"comis"),
    (
        CategoryKey::Aluguel,
        r"alug|locacao|imobiliaria|condominio",
    ),
    (
        CategoryKey::Honorarios,
        r"honor|contab|contador|advoc|advogad|consultoria",
    ),
    (
        CategoryKey::Impostos,
        r"impost|tribut|simples nacional|\b(pis|cofins|irrf|iss|issqn|inss|icms|iptu|darf|das|gps)\b",
    ),
    (
        CategoryKey::Telefone,
        r"telef|celular|internet|\b(vivo|claro|tim|oi|net|embratel)\b",
    ),
    (
        CategoryKey::Veiculos,
        r"veic|combust|pedag|gasolin|etanol|diesel|\bposto\b|shell|ipiranga|petrobras|estacionamento|estapar|sem parar|conectcar|uber|oficina|pneu|ipva|licenciamento",
    ),
    (
        CategoryKey::FolhaPagamento,
        r"folha|pgto|pagament|salari|ferias|rescis|fgts|vale transporte|vale refeicao|\b13o\b",
    ),
    (CategoryKey::Extras, r"extra|diversos|outros"),
];

/// Which step of the precedence chain produced a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Id,
    Synonym,
    LabelKeyword,
    DescriptionKeyword,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub key: CategoryKey,
    pub source: MatchSource,
}

/// What is known about one expense line's category.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryInput<'a> {
    pub franchise_id: Option<&'a str>,
    pub category_id: Option<&'a str>,
    pub label: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Category-id lookup, global plus per-franchise. The platform reuses and
/// redefines ids across franchise configurations, so a franchise-scoped entry
/// wins over a global one.
#[derive(Debug, Clone, Default)]
pub struct CategoryIdTable {
    global: HashMap<String, CategoryKey>,
    by_franchise: HashMap<String, HashMap<String, CategoryKey>>,
}

#[derive(Debug, Default, Deserialize)]
struct CategoryMapFile {
    #[serde(default)]
    global: HashMap<String, CategoryKey>,
    #[serde(default)]
    agf: HashMap<String, HashMap<String, CategoryKey>>,
}

impl CategoryIdTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (id, key) in BUILTIN_IDS {
            table.insert_global(id, key);
        }
        table
    }

    /// Built-in table with the entries of a JSON map file merged on top.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        let file: CategoryMapFile = serde_json::from_str(&content)?;

        let mut table = Self::builtin();
        for (id, key) in file.global {
            table.insert_global(&id, key);
        }
        for (franchise_id, ids) in file.agf {
            for (id, key) in ids {
                table.insert_scoped(&franchise_id, &id, key);
            }
        }

        debug!(
            path = %path.display(),
            global = table.global.len(),
            franchises = table.by_franchise.len(),
            "Loaded category id table"
        );
        Ok(table)
    }

    pub fn insert_global(&mut self, category_id: &str, key: CategoryKey) {
        self.global.insert(category_id.to_string(), key);
    }

    pub fn insert_scoped(&mut self, franchise_id: &str, category_id: &str, key: CategoryKey) {
        self.by_franchise
            .entry(franchise_id.to_string())
            .or_default()
            .insert(category_id.to_string(), key);
    }

    pub fn lookup(&self, franchise_id: Option<&str>, category_id: &str) -> Option<CategoryKey> {
        franchise_id
            .and_then(|f| self.by_franchise.get(f))
            .and_then(|ids| ids.get(category_id))
            .or_else(|| self.global.get(category_id))
            .copied()
    }
}

struct KeywordRule {
    key: CategoryKey,
    pattern: Regex,
}

fn compile_rules(rules: &[(CategoryKey, &str)]) -> Vec<KeywordRule> {
    rules
        .iter()
        .map(|(key, pattern)| KeywordRule {
            key: *key,
            pattern: Regex::new(pattern).expect("valid category keyword pattern"),
        })
        .collect()
}

fn first_rule_match(rules: &[KeywordRule], text: &str) -> Option<CategoryKey> {
    if text.is_empty() {
        return None;
    }
    rules
        .iter()
        .find(|rule| rule.pattern.is_match(text))
        .map(|rule| rule.key)
}

pub struct CategoryNormalizer {
    ids: CategoryIdTable,
    synonyms: HashMap<&'static str, CategoryKey>,
    label_rules: Vec<KeywordRule>,
    description_rules: Vec<KeywordRule>,
}

impl CategoryNormalizer {
    pub fn new(ids: CategoryIdTable) -> Self {
        Self {
            ids,
            synonyms: SYNONYMS.into_iter().collect(),
            label_rules: compile_rules(&LABEL_RULES),
            description_rules: compile_rules(&DESCRIPTION_RULES),
        }
    }

    pub fn ids(&self) -> &CategoryIdTable {
        &self.ids
    }

    pub fn normalize(&self, input: &CategoryInput<'_>) -> CategoryKey {
        self.resolve(input).key
    }

    pub fn resolve(&self, input: &CategoryInput<'_>) -> Resolution {
        let found = |key, source| Resolution { key, source };

        if let Some(key) = input
            .category_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .and_then(|id| self.ids.lookup(input.franchise_id, id))
        {
            return found(key, MatchSource::Id);
        }

        let label = fold_text(input.label.unwrap_or_default());
        if let Some(key) = self.synonyms.get(label.as_str()) {
            return found(*key, MatchSource::Synonym);
        }
        if let Some(key) = first_rule_match(&self.label_rules, &label) {
            return found(key, MatchSource::LabelKeyword);
        }

        let description = fold_text(input.description.unwrap_or_default());
        if let Some(key) = first_rule_match(&self.description_rules, &description)
            .or_else(|| first_rule_match(&self.description_rules, &label))
        {
            return found(key, MatchSource::DescriptionKeyword);
        }

        found(CategoryKey::Extras, MatchSource::Fallback)
    }
}

impl Default for CategoryNormalizer {
    fn default() -> Self {
        Self::new(CategoryIdTable::builtin())
    }
}
