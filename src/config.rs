use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Largest page size the upstream data API accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub bubble_base_url: Option<String>,
    pub bubble_api_key: Option<String>,
    pub mock_data_path: PathBuf,
    pub page_limit: u32,
    /// Object-type tag that Balancete rows must carry to be counted.
    /// `None` counts every row.
    pub count_type_filter: Option<String>,
    /// Book the ledger's own expense total under `extras` when a cell has no
    /// expense sub-records.
    pub ledger_expense_fallback: bool,
    pub category_map_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            bubble_base_url: None,
            bubble_api_key: None,
            mock_data_path: PathBuf::from("mocks/dash-mock.json"),
            page_limit: MAX_PAGE_LIMIT,
            count_type_filter: Some("Total".into()),
            ledger_expense_fallback: true,
            category_map_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            host: env::var("AGF_DASH_HOST").unwrap_or(defaults.host),
            port: env::var("AGF_DASH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            bubble_base_url: non_empty_var("BUBBLE_BASE_URL"),
            bubble_api_key: non_empty_var("BUBBLE_API_KEY"),
            mock_data_path: env::var("AGF_DASH_MOCK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.mock_data_path),
            page_limit: env::var("AGF_DASH_PAGE_LIMIT")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .map(|v| v.clamp(1, MAX_PAGE_LIMIT))
                .unwrap_or(defaults.page_limit),
            count_type_filter: match env::var("AGF_DASH_COUNT_TYPE") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(v.trim().to_string()),
                Err(_) => defaults.count_type_filter,
            },
            ledger_expense_fallback: env::var("AGF_DASH_LEDGER_FALLBACK")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.ledger_expense_fallback),
            category_map_path: non_empty_var("AGF_DASH_CATEGORY_MAP").map(PathBuf::from),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL of the upstream platform. Checked on use, not at startup.
    pub fn require_base_url(&self) -> AppResult<&str> {
        self.bubble_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| AppError::Config("BUBBLE_BASE_URL ausente".into()))
    }

    pub fn require_api_key(&self) -> AppResult<&str> {
        self.bubble_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("BUBBLE_API_KEY ausente".into()))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
