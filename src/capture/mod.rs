//! Capture session management
//!
//! This module provides the per-capture building blocks:
//! - `CaptureFile`: the append-only audio container and its file layout
//! - `CaptureRegistry`: the process-wide capture id → session map
//! - `StreamingCaptureHandler`: the continuous-stream transport mode

mod file;
mod registry;
mod streaming;

pub use file::{AudioFormat, CaptureFile, SegmentFile};
pub use registry::{CaptureRegistry, CaptureSession};
pub use streaming::StreamingCaptureHandler;
