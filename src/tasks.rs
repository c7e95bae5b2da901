//! Background execution for conversation processing.
//!
//! A single worker drains one global FIFO. Ordering across different
//! captures is not guaranteed, but tasks for the same capture run in
//! submission order — the detector's calls are only legal in append order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::capture::{AudioFormat, CaptureSession, SegmentFile};
use crate::detect::ConversationSpan;
use crate::services::{ConversationProcessor, ConversationProgress, NotificationService};

/// Processes the newest chunk of audio in a capture: runs incremental
/// conversation detection and handles any conversations that completed.
///
/// `audio = None` is the capture-finished signal; it flushes the trailing
/// in-progress conversation instead of appending new audio.
pub struct ProcessChunkTask {
    pub session: CaptureSession,
    pub audio: Option<Vec<u8>>,
    pub format: AudioFormat,
}

/// Submission handle for the background executor. Enqueueing never blocks
/// the request path.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<ProcessChunkTask>,
}

impl TaskQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProcessChunkTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn submit(&self, task: ProcessChunkTask) {
        if self.tx.send(task).is_err() {
            warn!("Task worker has shut down; dropping processing task");
        }
    }
}

/// The single consumer draining the task queue.
pub struct TaskWorker {
    rx: mpsc::UnboundedReceiver<ProcessChunkTask>,
    processor: Arc<dyn ConversationProcessor>,
    notifier: Arc<dyn NotificationService>,
}

impl TaskWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<ProcessChunkTask>,
        processor: Arc<dyn ConversationProcessor>,
        notifier: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            rx,
            processor,
            notifier,
        }
    }

    /// Drain tasks until every submission handle is dropped. A failed task
    /// is logged and never stops the worker.
    pub async fn run(mut self) {
        info!("Task worker started");

        while let Some(task) = self.rx.recv().await {
            let capture_id = task.session.file.capture_id.clone();
            if let Err(e) = self.process(task).await {
                error!("Failed to process audio chunk for capture {}: {}", capture_id, e);
            }
        }

        info!("Task worker stopped");
    }

    async fn process(&self, task: ProcessChunkTask) -> anyhow::Result<()> {
        let ProcessChunkTask {
            session,
            audio,
            format,
        } = task;
        let capture_finished = audio.is_none();

        // Run the conversation detection stage (finds conversations thus far)
        let mut detector = session.detector.lock().await;
        let results = detector.detect(audio.as_deref(), format, capture_finished)?;

        // Create conversation segment files and extract the completed
        // conversations into them
        let mut segment_files: Vec<SegmentFile> = Vec::new();
        let mut segment_paths = Vec::new();
        for span in &results.completed {
            let segment = session
                .file
                .create_conversation_segment(span.conversation_id, format.extension())?;
            segment_paths.push(segment.filepath.clone());
            segment_files.push(segment);
        }
        detector.extract(&results.completed, &segment_paths)?;
        drop(detector);

        // Hand each completed conversation to the processing pipeline. A
        // failure is logged per segment and the siblings still run.
        for segment in &segment_files {
            if let Err(e) = self
                .processor
                .process_conversation(&session.file, segment)
                .await
            {
                error!(
                    "Error processing conversation {}: {}",
                    segment.conversation_id, e
                );
            }
        }

        // Completed conversations are no longer in progress; an in-progress
        // one, if any, gets its own update
        let mut progress_updates: Vec<ConversationProgress> = results
            .completed
            .iter()
            .map(|span| self.progress_for(span, false, &session))
            .collect();
        if let Some(span) = &results.in_progress {
            progress_updates.push(self.progress_for(span, true, &session));
        }

        for progress in progress_updates {
            let payload = serde_json::to_string(&progress)?;
            if let Err(e) = self
                .notifier
                .send_notification(
                    "New Conversation-in-Progress",
                    &format!("On device: {}", session.file.device_type),
                    "conversation_progress",
                    &payload,
                )
                .await
            {
                error!(
                    "Failed to send progress update for conversation {}: {}",
                    progress.conversation_id, e
                );
            }
        }

        Ok(())
    }

    fn progress_for(
        &self,
        span: &ConversationSpan,
        in_conversation: bool,
        session: &CaptureSession,
    ) -> ConversationProgress {
        ConversationProgress {
            conversation_id: span.conversation_id,
            in_conversation,
            start_time: span.endpoints.start,
            end_time: span.endpoints.end,
            device_type: session.file.device_type.clone(),
        }
    }
}
