use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use crate::service::cache::{cache_handler, health_handler};
use crate::utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/cache/{*key}", any(cache_handler))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found").into_response() })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
