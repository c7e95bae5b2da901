use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use tracing::info;

use crate::capture::{CaptureFile, SegmentFile};

use super::messages::{ConversationAudioMessage, NotificationMessage};
use super::{ConversationProcessor, NotificationService};

/// NATS-backed production implementation of the conversation processing
/// and notification seams.
pub struct NatsPublisher {
    client: Client,
}

impl NatsPublisher {
    /// Connect to the NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ConversationProcessor for NatsPublisher {
    /// Publish one completed conversation segment for the downstream
    /// transcription pipeline.
    async fn process_conversation(
        &self,
        capture: &CaptureFile,
        segment: &SegmentFile,
    ) -> Result<()> {
        let subject = format!("conversation.audio.{}", capture.capture_id);

        let audio = tokio::fs::read(&segment.filepath)
            .await
            .with_context(|| format!("Failed to read segment {}", segment.filepath.display()))?;

        let message = ConversationAudioMessage {
            capture_id: capture.capture_id.clone(),
            conversation_id: segment.conversation_id,
            device_type: capture.device_type.clone(),
            format: capture.format.extension().to_string(),
            audio: base64::engine::general_purpose::STANDARD.encode(&audio),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish conversation audio")?;

        info!(
            "Published conversation {} to {} ({} bytes)",
            segment.conversation_id,
            subject,
            audio.len()
        );

        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationService for NatsPublisher {
    async fn send_notification(
        &self,
        title: &str,
        body: &str,
        kind: &str,
        payload: &str,
    ) -> Result<()> {
        let subject = format!("notification.{}", kind);

        let message = NotificationMessage {
            title: title.to_string(),
            body: body.to_string(),
            kind: kind.to_string(),
            payload: payload.to_string(),
        };

        self.client
            .publish(subject.clone(), serde_json::to_vec(&message)?.into())
            .await
            .context("Failed to publish notification")?;

        info!("Published notification to {}", subject);

        Ok(())
    }
}
