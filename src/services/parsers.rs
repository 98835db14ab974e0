//! Total parsers for the scalar shapes the upstream platform emits. None of
//! these fail: unrecognized input maps to zero (or `None` for the composite
//! date).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::upstream::{first_in, FieldChain};

/// Option-set objects expose their label under one of these.
const OPTION_LABEL: FieldChain = FieldChain(&["display", "Display", "name", "Name", "nome"]);

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "marco",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

static COMPOSITE_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,2})\s*/\s*(\d{4})(?:[^\d]|$)").expect("valid month/year regex")
});

pub fn parse_year(value: &Value) -> i32 {
    match value {
        Value::Number(n) => n.as_f64().map(truncate_i32).unwrap_or(0),
        Value::String(s) => {
            if let Some((year, _)) = parse_composite_month_year(s) {
                return year;
            }
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<i32>().unwrap_or(0)
        }
        Value::Object(map) => first_in(map, OPTION_LABEL).map(parse_year).unwrap_or(0),
        _ => 0,
    }
}

pub fn parse_month(value: &Value) -> u32 {
    let month = match value {
        Value::Number(n) => n.as_f64().map(truncate_i32).unwrap_or(0),
        Value::String(s) => parse_month_str(s),
        Value::Object(map) => first_in(map, OPTION_LABEL)
            .map(|label| parse_month(label) as i32)
            .unwrap_or(0),
        _ => 0,
    };

    if (1..=12).contains(&month) {
        month as u32
    } else {
        0
    }
}

fn parse_month_str(s: &str) -> i32 {
    let folded = fold_text(s);
    if folded.is_empty() {
        return 0;
    }

    if let Some(pos) = MONTHS.iter().position(|name| *name == folded) {
        return pos as i32 + 1;
    }
    if let Some(pos) = MONTH_ABBREVIATIONS
        .iter()
        .position(|abbr| folded.trim_end_matches('.') == *abbr)
    {
        return pos as i32 + 1;
    }
    if let Some((_, month)) = parse_composite_month_year(&folded) {
        return month as i32;
    }

    folded
        .replace(',', ".")
        .parse::<f64>()
        .map(truncate_i32)
        .unwrap_or(0)
}

/// Parse `M/YYYY` or `MM/YYYY`, anywhere in the string.
pub fn parse_composite_month_year(s: &str) -> Option<(i32, u32)> {
    let caps = COMPOSITE_MONTH_YEAR.captures(s)?;
    let month: u32 = caps[1].parse().ok()?;
    let year: i32 = caps[2].parse().ok()?;

    if (1..=12).contains(&month) && year > 1900 {
        Some((year, month))
    } else {
        None
    }
}

/// Parse a Brazilian-formatted amount (`R$ 1.234,56`) or a plain number.
/// Always returns a finite value.
pub fn parse_currency_br(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_currency_str(s),
        _ => 0.0,
    };

    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

fn parse_currency_str(s: &str) -> f64 {
    // Thousands separators go first, then the decimal comma becomes a dot.
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Lowercase, strip accents and collapse whitespace.
pub fn fold_text(s: &str) -> String {
    let mut folded = String::with_capacity(s.len());
    for ch in s.chars().flat_map(char::to_lowercase) {
        let mapped = match ch {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            c if c.is_whitespace() => ' ',
            c => c,
        };
        folded.push(mapped);
    }

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format as Brazilian currency, e.g. `R$ 17.827,51`.
pub fn format_brl(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}R$ {}", sign, format_number_br(value.abs(), 2))
}

/// Format with `.` thousands separators and a `,` decimal separator.
pub fn format_number_br(value: f64, decimals: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };

    match frac_part {
        Some(frac) => format!("{}{},{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{}%", format_number_br(value, 1))
}

fn truncate_i32(n: f64) -> i32 {
    if n.is_finite() && n.abs() < i32::MAX as f64 {
        n.trunc() as i32
    } else {
        0
    }
}
