use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::upstream::{Constraint, Envelope, Record, SingleEnvelope};

const OBJ_API_PATH: &str = "/api/1.1/obj";

/// Client for the platform's REST object API. Every call goes to the network;
/// nothing is cached.
#[derive(Clone)]
pub struct BubbleClient {
    http: Client,
    base_url: String,
    api_key: String,
    page_limit: u32,
}

impl BubbleClient {
    pub fn new(http: Client, base_url: &str, api_key: &str, page_limit: u32) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            page_limit,
        }
    }

    /// Build a client from configuration. Fails when the base URL or the key
    /// is missing, which only surfaces once a request needs the platform.
    pub fn from_config(http: Client, config: &Config) -> AppResult<Self> {
        Ok(Self::new(
            http,
            config.require_base_url()?,
            config.require_api_key()?,
            config.page_limit,
        ))
    }

    /// GET `{base}{path}` and decode the JSON body.
    pub async fn fetch_collection<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Fetching from upstream");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Every record of `object_type` matching all `constraints`, following the
    /// platform's cursor until nothing remains.
    pub async fn fetch_all(
        &self,
        object_type: &str,
        constraints: &[Constraint],
    ) -> AppResult<Vec<Record>> {
        if constraints.iter().any(Constraint::is_empty_in) {
            debug!(object_type, "Skipping query with empty `in` filter");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut cursor = 0u64;

        loop {
            let path = object_path(object_type, constraints, self.page_limit, cursor)?;
            let envelope: Envelope<Record> = self.fetch_collection(&path).await?;
            let page = envelope.response;
            let fetched = page.results.len() as u64;
            records.extend(page.results);

            let remaining = page.remaining.unwrap_or(0);
            if remaining == 0 || fetched == 0 {
                break;
            }
            cursor = page.cursor.unwrap_or(cursor) + page.count.unwrap_or(fetched);
        }

        debug!(object_type, count = records.len(), "Fetched upstream collection");
        Ok(records)
    }

    /// Single record by id, for ids a bulk query did not return.
    pub async fn fetch_by_id(&self, object_type: &str, id: &str) -> AppResult<Record> {
        let path = format!(
            "{}/{}/{}",
            OBJ_API_PATH,
            urlencoding::encode(object_type),
            urlencoding::encode(id)
        );
        let envelope: SingleEnvelope = self.fetch_collection(&path).await?;
        Ok(envelope.response)
    }

    /// Like [`fetch_by_id`](Self::fetch_by_id) but failures only log.
    pub async fn try_fetch_by_id(&self, object_type: &str, id: &str) -> Option<Record> {
        match self.fetch_by_id(object_type, id).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(object_type, id, error = %e, "Individual lookup failed");
                None
            }
        }
    }
}

/// `/api/1.1/obj/<type>?limit=<n>&cursor=<c>&constraints=<url-encoded JSON>`
pub fn object_path(
    object_type: &str,
    constraints: &[Constraint],
    limit: u32,
    cursor: u64,
) -> AppResult<String> {
    let mut path = format!(
        "{}/{}?limit={}",
        OBJ_API_PATH,
        urlencoding::encode(object_type),
        limit
    );
    if cursor > 0 {
        path.push_str(&format!("&cursor={}", cursor));
    }
    if !constraints.is_empty() {
        let encoded = serde_json::to_string(constraints)?;
        path.push_str("&constraints=");
        path.push_str(&urlencoding::encode(&encoded));
    }
    Ok(path)
}
