use axum::extract::{Query, State};
use axum::http::header::CACHE_CONTROL;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::services::aggregator::fetch_dash_data;
use crate::services::totals::{totals_by_franchise, TotalsRequest, TotalsResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DashQuery {
    pub empresa_id: Option<String>,
}

/// `GET /api/dash-data?empresa_id=` - the aggregate for one tenant, rebuilt
/// from the platform on every call.
pub async fn show(
    State(state): State<AppState>,
    Query(query): Query<DashQuery>,
) -> AppResult<impl IntoResponse> {
    let empresa_id = query
        .empresa_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("empresa_id ausente".into()))?;

    let client = state.bubble()?;
    let options = state.aggregator_options();
    debug!(empresa_id, ?options, "Building dashboard data");

    let data = fetch_dash_data(&client, &state.normalizer, empresa_id, &options).await?;

    info!(
        empresa_id,
        agfs = data.agfs.len(),
        cells = data.cells().count(),
        "Dashboard data ready"
    );

    Ok(([(CACHE_CONTROL, "no-store")], Json(data)))
}

/// `POST /api/dash-data` - category totals per AGF for sub-records the
/// caller already has.
pub async fn totals(
    State(state): State<AppState>,
    Json(request): Json<TotalsRequest>,
) -> AppResult<impl IntoResponse> {
    debug!(
        subcontas = request.subcontas.len(),
        categorias = request.categorias.len(),
        "Totalling posted sub-records"
    );
    let response: TotalsResponse = totals_by_franchise(&request, &state.normalizer);
    Ok(([(CACHE_CONTROL, "no-store")], Json(response)))
}
