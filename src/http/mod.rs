//! HTTP surface for recording devices
//!
//! This module provides the capture ingestion API:
//! - POST /capture/streaming/:capture_id - Long-lived audio byte stream
//! - POST /capture/streaming/:capture_id/complete - End-of-stream signal
//! - POST /capture/upload_chunk - Discrete chunk upload (pcm/wav/aac)
//! - POST /capture/process_capture - Finalize and evict a capture
//! - POST /capture/location - Device location report
//! - GET /health - Health check

pub mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
