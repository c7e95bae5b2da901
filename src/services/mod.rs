//! Seams to the external collaborators the capture core hands work to:
//! the conversation processing pipeline (transcription etc.), the
//! notification sender, and location storage. Production implementations
//! publish over NATS; tests substitute recording doubles.

mod location;
mod messages;
mod nats;

use crate::capture::{CaptureFile, SegmentFile};

pub use location::{InMemoryLocationStore, Location};
pub use messages::{ConversationAudioMessage, ConversationProgress, NotificationMessage};
pub use nats::NatsPublisher;

/// Downstream consumer of completed conversation segments.
#[async_trait::async_trait]
pub trait ConversationProcessor: Send + Sync {
    async fn process_conversation(
        &self,
        capture: &CaptureFile,
        segment: &SegmentFile,
    ) -> anyhow::Result<()>;
}

/// Push-notification delivery.
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_notification(
        &self,
        title: &str,
        body: &str,
        kind: &str,
        payload: &str,
    ) -> anyhow::Result<()>;
}

/// Persistent storage for device location reports.
#[async_trait::async_trait]
pub trait LocationStore: Send + Sync {
    async fn create_location(&self, location: Location) -> anyhow::Result<i64>;
}
