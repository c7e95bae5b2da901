use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::config::DetectionConfig;
use crate::detect::ConversationDetector;
use crate::error::Result;

use super::file::{AudioFormat, CaptureFile};

/// The frame store / detector pair for one active capture.
#[derive(Clone)]
pub struct CaptureSession {
    pub file: Arc<CaptureFile>,
    pub detector: Arc<Mutex<ConversationDetector>>,
}

/// Process-wide mapping from capture id to its active session.
///
/// The single source of truth for "is this capture active": sessions are
/// created on first write and evicted only by the finalize path.
pub struct CaptureRegistry {
    capture_dir: PathBuf,
    sample_rate: u32,
    detection: DetectionConfig,
    sessions: RwLock<HashMap<String, CaptureSession>>,
}

impl CaptureRegistry {
    pub fn new(capture_dir: impl Into<PathBuf>, sample_rate: u32, detection: DetectionConfig) -> Self {
        Self {
            capture_dir: capture_dir.into(),
            sample_rate,
            detection,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Return the existing session for `capture_id`, or atomically create
    /// one. Concurrent callers racing on an unseen id get the same
    /// instances; exactly one backing file is ever created.
    pub async fn get_or_create(
        &self,
        capture_id: &str,
        device_type: &str,
        timestamp: DateTime<Utc>,
        format: AudioFormat,
    ) -> Result<CaptureSession> {
        let mut sessions = self.sessions.write().await;

        if let Some(session) = sessions.get(capture_id) {
            return Ok(session.clone());
        }

        let file = Arc::new(CaptureFile::new(
            &self.capture_dir,
            capture_id,
            device_type,
            timestamp,
            format,
        )?);
        info!(
            "Created capture session {} ({}) at {}",
            capture_id,
            device_type,
            file.filepath.display()
        );

        let session = self.session_for_file(file);
        sessions.insert(capture_id.to_string(), session.clone());
        Ok(session)
    }

    pub async fn get(&self, capture_id: &str) -> Option<CaptureSession> {
        self.sessions.read().await.get(capture_id).cloned()
    }

    /// Drop a capture's session. Removing an absent id is a no-op.
    pub async fn remove(&self, capture_id: &str) {
        if self.sessions.write().await.remove(capture_id).is_some() {
            info!("Removed capture session {}", capture_id);
        }
    }

    /// Build a session around an already-materialized capture file without
    /// registering it. Used by the finalize path when recovering a capture
    /// from disk.
    pub fn session_for_file(&self, file: Arc<CaptureFile>) -> CaptureSession {
        let detector = ConversationDetector::new(
            file.filepath.clone(),
            self.sample_rate,
            self.detection.clone(),
        );
        CaptureSession {
            file,
            detector: Arc::new(Mutex::new(detector)),
        }
    }
}
