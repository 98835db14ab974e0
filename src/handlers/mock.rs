use axum::extract::State;
use axum::response::Json;
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::error::AppResult;
use crate::state::AppState;

/// `GET /api/dash-data-mock` - the local fixture, unmodified.
pub async fn show(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let path = &state.config.mock_data_path;
    debug!(path = %path.display(), "Serving mock dashboard data");

    let content = fs::read_to_string(path).await?;
    let value: Value = serde_json::from_str(&content)?;
    Ok(Json(value))
}
