use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress update for one conversation span, sent to the notifier as each
/// detection pass completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationProgress {
    pub conversation_id: Uuid,
    pub in_conversation: bool,
    /// Seconds since capture start
    pub start_time: f64,
    /// Seconds since capture start
    pub end_time: f64,
    pub device_type: String,
}

/// Completed conversation audio published for the downstream processing
/// pipeline.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationAudioMessage {
    pub capture_id: String,
    pub conversation_id: Uuid,
    pub device_type: String,
    pub format: String,
    pub audio: String, // Base64-encoded segment bytes
    pub timestamp: String, // RFC3339 timestamp
}

/// Envelope for notification delivery.
#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: String,
}
