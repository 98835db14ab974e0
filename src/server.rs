use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error_pages::{error_page_middleware, fallback_handler};
use crate::handlers;
use crate::services::category::{CategoryIdTable, CategoryNormalizer};
use crate::state::AppState;

/// Build the application state and Axum router from a [`Config`].
///
/// Loads the category id table (built-in ids plus the optional map file) and
/// assembles the middleware stack.
pub fn build_app(config: Config) -> Result<(AppState, Router), Box<dyn std::error::Error>> {
    let ids = match &config.category_map_path {
        Some(path) => CategoryIdTable::load(path)?,
        None => CategoryIdTable::builtin(),
    };

    if config.bubble_base_url.is_none() || config.bubble_api_key.is_none() {
        tracing::warn!("BUBBLE_BASE_URL or BUBBLE_API_KEY not set; /api/dash-data will fail");
    }

    let state = AppState::new(config, CategoryNormalizer::new(ids));
    let app = router(state.clone());

    Ok((state, app))
}

/// Full router with middleware for an existing state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::routes())
        .fallback(fallback_handler)
        .layer(middleware::from_fn(error_page_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the router to `host:port` and spawn the server as a tokio task.
///
/// Returns the actual port the server bound to (useful when `port` is 0 for
/// OS-assigned ports) and a [`JoinHandle`] for the server task.
pub async fn serve(
    app: Router,
    host: &str,
    port: u16,
) -> Result<(u16, JoinHandle<()>), Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    let actual_port = listener.local_addr()?.port();

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_port, handle))
}
