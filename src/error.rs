use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the capture core.
///
/// Transport handlers map these onto HTTP responses; background tasks log
/// them and keep draining.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Operation referenced a capture id with no in-memory session and no
    /// recoverable file on disk.
    #[error("capture session not found: {0}")]
    SessionNotFound(String),

    /// Chunk upload extension outside the supported set. Surfaced as a
    /// soft failure at the transport level, not an error status.
    #[error("unsupported file extension: {0}")]
    UnsupportedFormat(String),

    /// Path-based recovery matched more than one file for a capture id.
    #[error("capture {capture_id} matched {matches} files on disk")]
    AmbiguousRecovery { capture_id: String, matches: usize },

    /// A filepath does not conform to the {root}/{date}/{device}/{id}.{ext}
    /// layout and cannot be turned back into a capture record.
    #[error("filepath does not conform to capture layout: {0}")]
    InvalidCapturePath(PathBuf),

    /// Audio payload could not be decoded for boundary detection.
    #[error("audio decode failed: {0}")]
    Audio(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
