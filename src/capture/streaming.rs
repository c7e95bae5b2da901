use tracing::info;

use crate::error::Result;
use crate::tasks::{ProcessChunkTask, TaskQueue};

use super::file::AudioFormat;
use super::registry::CaptureSession;

/// Per-capture handler for the continuous-stream transport mode.
///
/// Streamed frames are raw PCM at the configured sample rate; the session's
/// container format is fixed to WAV with a synthesized header. Each frame
/// is appended and a processing task is enqueued; the explicit completion
/// signal submits one final task with no bytes. Completion does not evict
/// the session from the registry — the capture stays resumable by further
/// writes until the finalize endpoint removes it.
pub struct StreamingCaptureHandler {
    session: CaptureSession,
    queue: TaskQueue,
    sample_rate: u32,
}

impl StreamingCaptureHandler {
    pub fn new(session: CaptureSession, queue: TaskQueue, sample_rate: u32) -> Self {
        Self {
            session,
            queue,
            sample_rate,
        }
    }

    /// Append one streamed frame and enqueue its processing task.
    pub async fn handle_audio_data(&self, frame: &[u8]) -> Result<u64> {
        let bytes_written = self.session.file.append(frame, true, self.sample_rate).await?;

        self.queue.submit(ProcessChunkTask {
            session: self.session.clone(),
            audio: Some(frame.to_vec()),
            format: AudioFormat::Wav,
        });

        Ok(bytes_written)
    }

    /// Handle the explicit completion signal: one final task flushes any
    /// trailing in-progress conversation.
    pub fn finish_capture_session(&self) {
        info!(
            "Finishing streaming capture session {}",
            self.session.file.capture_id
        );
        self.queue.submit(ProcessChunkTask {
            session: self.session.clone(),
            audio: None,
            format: self.session.file.format,
        });
    }
}
