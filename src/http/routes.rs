use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Streaming ingestion
        .route(
            "/capture/streaming/:capture_id",
            post(handlers::streaming_capture),
        )
        .route(
            "/capture/streaming/:capture_id/complete",
            post(handlers::complete_streaming),
        )
        // Chunked ingestion
        .route("/capture/upload_chunk", post(handlers::upload_chunk))
        .route("/capture/process_capture", post(handlers::process_capture))
        // Device location reports
        .route("/capture/location", post(handlers::receive_location))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
