use std::sync::Arc;

use crate::capture::CaptureRegistry;
use crate::services::LocationStore;
use crate::tasks::TaskQueue;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active capture sessions (capture_id → frame store + detector)
    pub registry: Arc<CaptureRegistry>,

    /// Background executor handle for conversation processing
    pub task_queue: TaskQueue,

    /// Storage collaborator for device location reports
    pub locations: Arc<dyn LocationStore>,
}

impl AppState {
    pub fn new(
        registry: Arc<CaptureRegistry>,
        task_queue: TaskQueue,
        locations: Arc<dyn LocationStore>,
    ) -> Self {
        Self {
            registry,
            task_queue,
            locations,
        }
    }
}
