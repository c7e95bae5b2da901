use super::state::AppState;
use crate::capture::{AudioFormat, CaptureFile, StreamingCaptureHandler};
use crate::error::CaptureError;
use crate::services::Location;
use crate::tasks::ProcessChunkTask;
use axum::{
    body::Body,
    extract::{Form, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Upload extensions the chunk endpoint accepts
pub const SUPPORTED_UPLOAD_EXTENSIONS: [&str; 3] = ["pcm", "wav", "aac"];

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StreamingParams {
    pub device_type: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessCaptureRequest {
    pub capture_id: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub message: String,
    pub location_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn message_response(message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

fn internal_error(error: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Stream API
// ============================================================================

/// POST /capture/streaming/:capture_id?device_type=...
/// Long-lived streaming ingestion: raw PCM frames arrive as body chunks and
/// are appended (with a synthesized WAV header) as they come in.
pub async fn streaming_capture(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
    Query(params): Query<StreamingParams>,
    body: Body,
) -> impl IntoResponse {
    info!("Client connected for streaming capture {}", capture_id);

    let session = match state
        .registry
        .get_or_create(&capture_id, &params.device_type, Utc::now(), AudioFormat::Wav)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to open streaming session {}: {}", capture_id, e);
            return internal_error(e.to_string());
        }
    };
    let handler =
        StreamingCaptureHandler::new(session, state.task_queue.clone(), state.registry.sample_rate());

    let mut frames = body.into_data_stream();
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(bytes) => {
                if let Err(e) = handler.handle_audio_data(&bytes).await {
                    error!("Failed to append streamed frame for {}: {}", capture_id, e);
                    return internal_error(e.to_string());
                }
            }
            Err(e) => {
                // Mid-stream disconnects are expected: the session stays
                // active and is recoverable by a later finalize call.
                info!("Client disconnected while streaming {}: {}", capture_id, e);
                break;
            }
        }
    }

    message_response("Audio received")
}

/// POST /capture/streaming/:capture_id/complete
/// Explicit completion signal: flushes the trailing in-progress
/// conversation. Does not evict the session (see process_capture).
pub async fn complete_streaming(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    info!("Completing audio capture for {}", capture_id);

    match state.registry.get(&capture_id).await {
        Some(session) => {
            let handler = StreamingCaptureHandler::new(
                session,
                state.task_queue.clone(),
                state.registry.sample_rate(),
            );
            handler.finish_capture_session();
            message_response("Audio processed")
        }
        None => {
            error!("Capture session not found: {}", capture_id);
            internal_error(format!("Capture session not found: {}", capture_id))
        }
    }
}

// ============================================================================
// Chunk API
// ============================================================================

/// POST /capture/upload_chunk
/// One discrete audio chunk per request, multipart form: `capture_id`,
/// `timestamp`, `device_type`, and a file part named `file`.
pub async fn upload_chunk(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    match try_upload_chunk(state, multipart).await {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to upload chunk: {:#}", e);
            internal_error(e.to_string())
        }
    }
}

async fn try_upload_chunk(state: AppState, mut multipart: Multipart) -> anyhow::Result<Response> {
    let mut capture_id: Option<String> = None;
    let mut timestamp: Option<String> = None;
    let mut device_type: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(ToString::to_string);
                file_bytes = Some(field.bytes().await?.to_vec());
            }
            Some("capture_id") => capture_id = Some(field.text().await?),
            Some("timestamp") => timestamp = Some(field.text().await?),
            Some("device_type") => device_type = Some(field.text().await?),
            _ => {}
        }
    }

    let capture_id = capture_id.ok_or_else(|| anyhow::anyhow!("missing form field: capture_id"))?;
    let device_type =
        device_type.ok_or_else(|| anyhow::anyhow!("missing form field: device_type"))?;
    let file_bytes = file_bytes.ok_or_else(|| anyhow::anyhow!("missing file part"))?;

    // Validate file format
    let extension = file_name
        .as_deref()
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if !SUPPORTED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        // Deliberate soft fail: the transport request succeeds, the body
        // carries the failure. No session or file is created.
        return Ok(message_response(format!(
            "Failed to process: {}",
            CaptureError::UnsupportedFormat(extension)
        )));
    }

    // Raw PCM is wrapped into the WAV container on the server so clients
    // need not guarantee delivery of a header chunk.
    let (format, synthesize_header) = if extension == "pcm" {
        (AudioFormat::Wav, true)
    } else {
        let format = AudioFormat::from_extension(&extension)
            .ok_or_else(|| anyhow::anyhow!("unsupported container format: {}", extension))?;
        (format, false)
    };

    let timestamp = parse_device_timestamp(timestamp.as_deref());

    // Look up the capture session or create a new one
    let session = state
        .registry
        .get_or_create(&capture_id, &device_type, timestamp, format)
        .await?;

    let bytes_written = session
        .file
        .append(&file_bytes, synthesize_header, state.registry.sample_rate())
        .await?;
    info!(
        "{}: {} bytes appended",
        session.file.filepath.display(),
        bytes_written
    );

    state.task_queue.submit(ProcessChunkTask {
        session,
        audio: Some(file_bytes),
        format,
    });

    Ok(message_response("Audio processed"))
}

fn parse_device_timestamp(timestamp: Option<&str>) -> DateTime<Utc> {
    match timestamp {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(_) => {
                warn!("Unparseable device timestamp {:?}; using server time", raw);
                Utc::now()
            }
        },
        None => Utc::now(),
    }
}

/// POST /capture/process_capture
/// Finalize a capture: flush detection, then evict the session. The one
/// path that actually removes a capture from the registry. A capture with
/// no in-memory session is recovered from its on-disk file.
pub async fn process_capture(
    State(state): State<AppState>,
    Form(request): Form<ProcessCaptureRequest>,
) -> impl IntoResponse {
    match try_process_capture(state, request.capture_id).await {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to process capture: {:#}", e);
            internal_error(e.to_string())
        }
    }
}

async fn try_process_capture(state: AppState, capture_id: String) -> anyhow::Result<Response> {
    let session = match state.registry.get(&capture_id).await {
        Some(session) => session,
        None => {
            // The in-memory session is gone (e.g. the process restarted
            // mid-capture). Recover the capture from disk and re-run
            // detection over everything recorded so far; duplicate
            // progress updates are accepted in this path.
            let filepath =
                CaptureFile::locate_by_capture_id(state.registry.capture_dir(), &capture_id)?;
            let file = Arc::new(CaptureFile::from_filepath(&filepath)?);
            let session = state.registry.session_for_file(file);

            let payload = tokio::fs::read(&session.file.filepath).await?;
            if !payload.is_empty() {
                state.task_queue.submit(ProcessChunkTask {
                    session: session.clone(),
                    audio: Some(payload),
                    format: session.file.format,
                });
            }
            session
        }
    };

    let format = session.file.format;
    state.task_queue.submit(ProcessChunkTask {
        session,
        audio: None,
        format,
    });

    // Removing an id the registry never held is a no-op
    state.registry.remove(&capture_id).await;

    Ok(message_response("Conversation processed"))
}

// ============================================================================
// Location API
// ============================================================================

/// POST /capture/location
/// Store a device location report via the external storage collaborator
pub async fn receive_location(
    State(state): State<AppState>,
    Json(location): Json<Location>,
) -> impl IntoResponse {
    info!("Received location: {:?}", location);

    match state.locations.create_location(location).await {
        Ok(location_id) => (
            StatusCode::OK,
            Json(LocationResponse {
                message: "Location received".to_string(),
                location_id,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Error processing location: {}", e);
            internal_error(e.to_string())
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
