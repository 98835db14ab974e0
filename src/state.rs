use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::aggregator::AggregatorOptions;
use crate::services::bubble::BubbleClient;
use crate::services::category::CategoryNormalizer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub normalizer: Arc<CategoryNormalizer>,
}

impl AppState {
    pub fn new(config: Config, normalizer: CategoryNormalizer) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            normalizer: Arc::new(normalizer),
        }
    }

    /// Upstream client for the current configuration. Errors when the
    /// platform credentials are not set.
    pub fn bubble(&self) -> AppResult<BubbleClient> {
        BubbleClient::from_config(self.http.clone(), &self.config)
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions::from(self.config.as_ref())
    }
}
