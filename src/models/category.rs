use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical expense categories. `Extras` is the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKey {
    Aluguel,
    Comissoes,
    Extras,
    Honorarios,
    Impostos,
    Pitney,
    Telefone,
    Veiculos,
    FolhaPagamento,
}

impl CategoryKey {
    /// Display order of the expense columns.
    pub const ALL: [CategoryKey; 9] = [
        Self::Aluguel,
        Self::Comissoes,
        Self::Extras,
        Self::Honorarios,
        Self::Impostos,
        Self::Pitney,
        Self::Telefone,
        Self::Veiculos,
        Self::FolhaPagamento,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aluguel => "aluguel",
            Self::Comissoes => "comissoes",
            Self::Extras => "extras",
            Self::Honorarios => "honorarios",
            Self::Impostos => "impostos",
            Self::Pitney => "pitney",
            Self::Telefone => "telefone",
            Self::Veiculos => "veiculos",
            Self::FolhaPagamento => "folha_pagamento",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Aluguel => "Aluguel",
            Self::Comissoes => "Comissões",
            Self::Extras => "Extras",
            Self::Honorarios => "Honorários",
            Self::Impostos => "Impostos",
            Self::Pitney => "Pitney",
            Self::Telefone => "Telefone",
            Self::Veiculos => "Veículos",
            Self::FolhaPagamento => "Folha de Pagamento",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or(())
    }
}

/// Per-category amounts. Always holds all nine canonical keys, so a
/// serialized value can never miss a column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryTotals([f64; 9]);

impl CategoryTotals {
    pub fn get(&self, key: CategoryKey) -> f64 {
        self.0[key.index()]
    }

    pub fn set(&mut self, key: CategoryKey, value: f64) {
        self.0[key.index()] = value;
    }

    pub fn add(&mut self, key: CategoryKey, amount: f64) {
        self.0[key.index()] += amount;
    }

    pub fn add_all(&mut self, other: &CategoryTotals) {
        for (slot, value) in self.0.iter_mut().zip(other.0.iter()) {
            *slot += value;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryKey, f64)> + '_ {
        CategoryKey::ALL.iter().map(move |key| (*key, self.get(*key)))
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Replace NaN and infinities with zero.
    pub fn sanitize(&mut self) {
        for value in self.0.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
    }
}

impl Serialize for CategoryTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CategoryKey::ALL.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key.as_str(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryTotals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TotalsVisitor;

        impl<'de> Visitor<'de> for TotalsVisitor {
            type Value = CategoryTotals;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category keys to amounts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut totals = CategoryTotals::default();
                while let Some((name, value)) = access.next_entry::<String, f64>()? {
                    let key = name
                        .parse::<CategoryKey>()
                        .map_err(|_| de::Error::unknown_field(&name, &[]))?;
                    totals.set(key, value);
                }
                Ok(totals)
            }
        }

        deserializer.deserialize_map(TotalsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trips_through_str() {
        for key in CategoryKey::ALL {
            assert_eq!(key.as_str().parse::<CategoryKey>(), Ok(key));
        }
        assert!("mercado".parse::<CategoryKey>().is_err());
    }

    #[test]
    fn test_serde_names_match_as_str() {
        let json = serde_json::to_string(&CategoryKey::FolhaPagamento).unwrap();
        assert_eq!(json, "\"folha_pagamento\"");
    }

    #[test]
    fn test_totals_serialize_all_keys_in_order() {
        let mut totals = CategoryTotals::default();
        totals.add(CategoryKey::Veiculos, 120.5);
        let json = serde_json::to_string(&totals).unwrap();
        assert_eq!(
            json,
            "{\"aluguel\":0.0,\"comissoes\":0.0,\"extras\":0.0,\"honorarios\":0.0,\
             \"impostos\":0.0,\"pitney\":0.0,\"telefone\":0.0,\"veiculos\":120.5,\
             \"folha_pagamento\":0.0}"
        );
    }

    #[test]
    fn test_sanitize_and_sum() {
        let mut totals = CategoryTotals::default();
        totals.set(CategoryKey::Aluguel, f64::NAN);
        totals.set(CategoryKey::Impostos, 50.0);
        totals.set(CategoryKey::Telefone, 25.0);
        totals.sanitize();
        assert_eq!(totals.get(CategoryKey::Aluguel), 0.0);
        assert_eq!(totals.sum(), 75.0);
    }

    #[test]
    fn test_totals_deserialize_partial_map() {
        let totals: CategoryTotals = serde_json::from_str("{\"pitney\": 10}").unwrap();
        assert_eq!(totals.get(CategoryKey::Pitney), 10.0);
        assert_eq!(totals.sum(), 10.0);
    }
}
