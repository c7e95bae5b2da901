pub mod audio;
pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod http;
pub mod services;
pub mod tasks;

pub use capture::{
    AudioFormat, CaptureFile, CaptureRegistry, CaptureSession, SegmentFile, StreamingCaptureHandler,
};
pub use config::{Config, DetectionConfig};
pub use detect::{ConversationDetector, ConversationSpan, DetectionResult, SpanState};
pub use error::CaptureError;
pub use http::{create_router, AppState};
pub use services::{
    ConversationProcessor, ConversationProgress, Location, LocationStore, NatsPublisher,
    NotificationService,
};
pub use tasks::{ProcessChunkTask, TaskQueue, TaskWorker};
