//! HTTP router for the rsmq server

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rsmq_queue::{handle_request, EphemeralStore, Rsmq};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_router(rsmq: Arc<Rsmq<EphemeralStore>>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", post(handle_request::<EphemeralStore>))
        .layer(TraceLayer::new_for_http())
        .with_state(rsmq)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, r#"{"status": "running"}"#)
}
