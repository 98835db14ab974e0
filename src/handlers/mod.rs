pub mod dash_data;
pub mod dashboard;
pub mod mock;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Pages
        .route("/", get(dashboard::index))
        // API
        .route(
            "/api/dash-data",
            get(dash_data::show).post(dash_data::totals),
        )
        .route("/api/dash-data-mock", get(mock::show))
        // Health check
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "OK"
}
