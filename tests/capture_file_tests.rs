// Integration tests for the per-capture frame store: the date/device file
// layout, path-based recovery, and append ordering.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use earshot::{AudioFormat, CaptureError, CaptureFile};
use std::fs;
use tempfile::TempDir;
use uuid::Uuid;

fn test_timestamp() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 6, 9, 30, 0).unwrap()
}

#[tokio::test]
async fn test_capture_file_uses_date_device_layout() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let capture = CaptureFile::new(
        temp_dir.path(),
        "abc",
        "pendant",
        test_timestamp(),
        AudioFormat::Wav,
    )?;

    assert_eq!(
        capture.filepath,
        temp_dir.path().join("20260806").join("pendant").join("abc.wav")
    );
    // Directories exist, file is created lazily on first append
    assert!(capture.filepath.parent().unwrap().is_dir());
    assert!(!capture.filepath.exists());

    capture.append(&[0u8; 320], true, 16000).await?;
    assert!(capture.filepath.exists());

    Ok(())
}

#[test]
fn test_from_filepath_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let capture = CaptureFile::new(
        temp_dir.path(),
        "abc",
        "pendant",
        test_timestamp(),
        AudioFormat::Aac,
    )?;

    let recovered = CaptureFile::from_filepath(&capture.filepath)?;
    assert_eq!(recovered.capture_id, "abc");
    assert_eq!(recovered.device_type, "pendant");
    assert_eq!(recovered.format, AudioFormat::Aac);
    assert_eq!(recovered.timestamp.date_naive(), test_timestamp().date_naive());
    assert_eq!(recovered.filepath, capture.filepath);

    Ok(())
}

#[test]
fn test_from_filepath_rejects_unknown_extension() {
    let result = CaptureFile::from_filepath(std::path::Path::new(
        "/captures/20260806/pendant/abc.mp3",
    ));
    assert!(matches!(result, Err(CaptureError::InvalidCapturePath(_))));
}

#[test]
fn test_locate_by_capture_id_finds_single_match() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dir = temp_dir.path().join("20260806").join("pendant");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("abc.wav"), b"payload")?;
    fs::write(dir.join("other.wav"), b"payload")?;

    let found = CaptureFile::locate_by_capture_id(temp_dir.path(), "abc")?;
    assert_eq!(found, dir.join("abc.wav"));

    Ok(())
}

#[test]
fn test_locate_by_capture_id_zero_matches_is_not_found() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let result = CaptureFile::locate_by_capture_id(temp_dir.path(), "missing");
    assert!(matches!(result, Err(CaptureError::SessionNotFound(_))));

    Ok(())
}

#[test]
fn test_locate_by_capture_id_never_guesses_between_matches() -> Result<()> {
    let temp_dir = TempDir::new()?;
    for date in ["20260805", "20260806"] {
        let dir = temp_dir.path().join(date).join("pendant");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("abc.wav"), b"payload")?;
    }

    let result = CaptureFile::locate_by_capture_id(temp_dir.path(), "abc");
    assert!(matches!(
        result,
        Err(CaptureError::AmbiguousRecovery { matches: 2, .. })
    ));

    Ok(())
}

#[test]
fn test_segment_path_is_deterministic() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let capture = CaptureFile::new(
        temp_dir.path(),
        "abc",
        "pendant",
        test_timestamp(),
        AudioFormat::Wav,
    )?;

    let conversation_id = Uuid::new_v4();
    let first = capture.create_conversation_segment(conversation_id, "wav")?;
    let second = capture.create_conversation_segment(conversation_id, "wav")?;

    assert_eq!(first.filepath, second.filepath);
    assert_eq!(
        first.filepath,
        capture
            .filepath
            .parent()
            .unwrap()
            .join("abc")
            .join(format!("conversation_{}.wav", conversation_id))
    );

    Ok(())
}

#[tokio::test]
async fn test_concurrent_appends_never_lose_bytes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let capture = std::sync::Arc::new(CaptureFile::new(
        temp_dir.path(),
        "abc",
        "pendant",
        test_timestamp(),
        AudioFormat::Wav,
    )?);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let capture = capture.clone();
        handles.push(tokio::spawn(async move {
            capture.append(&[0u8; 1000], true, 16000).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    // Total length is the header plus every appended byte, and the header
    // agrees with it
    let data = fs::read(&capture.filepath)?;
    assert_eq!(data.len(), 44 + 8 * 1000);
    let data_len = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
    assert_eq!(data_len, 8000);

    Ok(())
}
