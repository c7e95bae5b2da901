// Integration tests for the background executor: end-to-end chunk
// processing through detection, extraction, the external processor, and
// progress notifications — including per-segment failure isolation.

use anyhow::Result;
use chrono::Utc;
use earshot::services::{ConversationProcessor, NotificationService};
use earshot::{
    AudioFormat, CaptureFile, CaptureRegistry, CaptureSession, ConversationProgress,
    DetectionConfig, ProcessChunkTask, SegmentFile, TaskQueue, TaskWorker,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use uuid::Uuid;

const SAMPLE_RATE: u32 = 16000;

/// Recording double for the conversation processing pipeline
#[derive(Default)]
struct RecordingProcessor {
    processed: Mutex<Vec<Uuid>>,
    fail: bool,
}

#[async_trait::async_trait]
impl ConversationProcessor for RecordingProcessor {
    async fn process_conversation(
        &self,
        _capture: &CaptureFile,
        segment: &SegmentFile,
    ) -> anyhow::Result<()> {
        self.processed.lock().await.push(segment.conversation_id);
        if self.fail {
            anyhow::bail!("transcription backend unavailable");
        }
        Ok(())
    }
}

/// Recording double for the notifier
#[derive(Default)]
struct RecordingNotifier {
    payloads: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl NotificationService for RecordingNotifier {
    async fn send_notification(
        &self,
        _title: &str,
        _body: &str,
        _kind: &str,
        payload: &str,
    ) -> anyhow::Result<()> {
        self.payloads.lock().await.push(payload.to_string());
        Ok(())
    }
}

fn test_registry(temp_dir: &TempDir) -> Arc<CaptureRegistry> {
    Arc::new(CaptureRegistry::new(
        temp_dir.path().to_path_buf(),
        SAMPLE_RATE,
        DetectionConfig {
            speech_threshold: 0.02,
            silence_duration_secs: 0.5,
            min_speech_secs: 0.2,
            window_ms: 30,
        },
    ))
}

fn pcm(amplitude: i16, secs: f64) -> Vec<u8> {
    let samples = (secs * SAMPLE_RATE as f64) as usize;
    amplitude
        .to_le_bytes()
        .iter()
        .copied()
        .cycle()
        .take(samples * 2)
        .collect()
}

/// Append a chunk the way the upload path does, then enqueue its task
async fn ingest_chunk(session: &CaptureSession, queue: &TaskQueue, chunk: Vec<u8>) -> Result<()> {
    session.file.append(&chunk, true, SAMPLE_RATE).await?;
    queue.submit(ProcessChunkTask {
        session: session.clone(),
        audio: Some(chunk),
        format: AudioFormat::Wav,
    });
    Ok(())
}

async fn updates_from(notifier: &RecordingNotifier) -> Vec<ConversationProgress> {
    notifier
        .payloads
        .lock()
        .await
        .iter()
        .map(|payload| serde_json::from_str(payload).expect("progress payload should parse"))
        .collect()
}

#[tokio::test]
async fn test_completed_conversation_yields_one_segment_and_final_update() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let registry = test_registry(&temp_dir);
    let session = registry
        .get_or_create("xyz", "pendant", Utc::now(), AudioFormat::Wav)
        .await?;

    let processor = Arc::new(RecordingProcessor::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let (queue, rx) = TaskQueue::new();
    let worker = TaskWorker::new(
        rx,
        processor.clone() as Arc<dyn ConversationProcessor>,
        notifier.clone() as Arc<dyn NotificationService>,
    );
    let worker_handle = tokio::spawn(worker.run());

    // Two chunk uploads; the second carries the conversation-ending silence
    ingest_chunk(&session, &queue, pcm(3000, 1.0)).await?;
    ingest_chunk(&session, &queue, pcm(0, 1.0)).await?;

    drop(queue);
    worker_handle.await?;

    // Exactly one segment artifact was created and processed
    let segment_dir = session.file.filepath.parent().unwrap().join("xyz");
    let segments: Vec<_> = std::fs::read_dir(&segment_dir)?.collect();
    assert_eq!(segments.len(), 1);
    assert_eq!(processor.processed.lock().await.len(), 1);

    // One in-progress update from the first chunk, one completion from the
    // second
    let updates = updates_from(&notifier).await;
    assert_eq!(updates.len(), 2);
    assert!(updates[0].in_conversation);
    assert!(!updates[1].in_conversation);
    assert_eq!(updates[0].conversation_id, updates[1].conversation_id);
    assert_eq!(updates[1].device_type, "pendant");

    Ok(())
}

#[tokio::test]
async fn test_finalize_task_flushes_open_conversation() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let registry = test_registry(&temp_dir);
    let session = registry
        .get_or_create("abc", "pendant", Utc::now(), AudioFormat::Wav)
        .await?;

    let processor = Arc::new(RecordingProcessor::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let (queue, rx) = TaskQueue::new();
    let worker = TaskWorker::new(
        rx,
        processor.clone() as Arc<dyn ConversationProcessor>,
        notifier.clone() as Arc<dyn NotificationService>,
    );
    let worker_handle = tokio::spawn(worker.run());

    ingest_chunk(&session, &queue, pcm(3000, 1.0)).await?;
    // Capture-finished signal: no new bytes
    queue.submit(ProcessChunkTask {
        session: session.clone(),
        audio: None,
        format: AudioFormat::Wav,
    });

    drop(queue);
    worker_handle.await?;

    assert_eq!(processor.processed.lock().await.len(), 1);
    let updates = updates_from(&notifier).await;
    let last = updates.last().expect("finalize should emit a completion");
    assert!(!last.in_conversation);
    assert!((last.end_time - 1.0).abs() < 0.05);

    Ok(())
}

#[tokio::test]
async fn test_processor_failure_does_not_stall_the_queue() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let registry = test_registry(&temp_dir);
    let session = registry
        .get_or_create("abc", "pendant", Utc::now(), AudioFormat::Wav)
        .await?;

    let processor = Arc::new(RecordingProcessor {
        processed: Mutex::new(Vec::new()),
        fail: true,
    });
    let notifier = Arc::new(RecordingNotifier::default());

    let (queue, rx) = TaskQueue::new();
    let worker = TaskWorker::new(
        rx,
        processor.clone() as Arc<dyn ConversationProcessor>,
        notifier.clone() as Arc<dyn NotificationService>,
    );
    let worker_handle = tokio::spawn(worker.run());

    // Two full conversations, each completed by trailing silence
    ingest_chunk(&session, &queue, pcm(3000, 1.0)).await?;
    ingest_chunk(&session, &queue, pcm(0, 1.0)).await?;
    ingest_chunk(&session, &queue, pcm(3000, 1.0)).await?;
    ingest_chunk(&session, &queue, pcm(0, 1.0)).await?;

    drop(queue);
    worker_handle.await?;

    // Both conversations were attempted despite the failures, and their
    // progress updates still went out
    assert_eq!(processor.processed.lock().await.len(), 2);
    let updates = updates_from(&notifier).await;
    let completions = updates.iter().filter(|u| !u.in_conversation).count();
    assert_eq!(completions, 2);

    Ok(())
}
