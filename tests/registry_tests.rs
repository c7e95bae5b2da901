// Integration tests for the capture session registry: creation
// exclusivity under concurrent callers and idempotent removal.

use anyhow::Result;
use chrono::Utc;
use earshot::{AudioFormat, CaptureRegistry, DetectionConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn registry(temp_dir: &TempDir) -> Arc<CaptureRegistry> {
    Arc::new(CaptureRegistry::new(
        temp_dir.path().to_path_buf(),
        16000,
        DetectionConfig::default(),
    ))
}

#[tokio::test]
async fn test_get_or_create_returns_existing_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let registry = registry(&temp_dir);

    let first = registry
        .get_or_create("abc", "pendant", Utc::now(), AudioFormat::Wav)
        .await?;
    let second = registry
        .get_or_create("abc", "pendant", Utc::now(), AudioFormat::Wav)
        .await?;

    assert!(Arc::ptr_eq(&first.file, &second.file));
    assert!(Arc::ptr_eq(&first.detector, &second.detector));

    Ok(())
}

#[tokio::test]
async fn test_racing_creators_observe_one_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let registry = registry(&temp_dir);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .get_or_create("abc", "pendant", Utc::now(), AudioFormat::Wav)
                .await
        }));
    }

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await??);
    }

    // Every caller got the winner's instances
    for session in &sessions[1..] {
        assert!(Arc::ptr_eq(&sessions[0].file, &session.file));
        assert!(Arc::ptr_eq(&sessions[0].detector, &session.detector));
    }

    // Exactly one device directory with one (lazily created) file slot
    let date_dirs: Vec<_> = std::fs::read_dir(temp_dir.path())?.collect();
    assert_eq!(date_dirs.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_get_absent_id_is_none() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let registry = registry(&temp_dir);

    assert!(registry.get("missing").await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_remove_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let registry = registry(&temp_dir);

    registry
        .get_or_create("abc", "pendant", Utc::now(), AudioFormat::Wav)
        .await?;

    registry.remove("abc").await;
    assert!(registry.get("abc").await.is_none());

    // Removing an id that is already gone is a no-op, not an error
    registry.remove("abc").await;

    Ok(())
}
