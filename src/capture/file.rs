use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::audio::wav;
use crate::error::{CaptureError, Result};

/// Audio container formats a capture can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Aac,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Aac => "aac",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "wav" => Some(AudioFormat::Wav),
            "aac" => Some(AudioFormat::Aac),
            _ => None,
        }
    }
}

const DATE_DIR_FORMAT: &str = "%Y%m%d";

/// One capture's on-disk audio container and its file-level operations.
///
/// Files live in a three-level layout the recovery path depends on:
/// `{capture_root}/{YYYYMMDD}/{device_type}/{capture_id}.{extension}`.
pub struct CaptureFile {
    pub capture_id: String,
    pub device_type: String,
    pub timestamp: DateTime<Utc>,
    pub format: AudioFormat,
    pub filepath: PathBuf,

    /// Serializes appends so concurrent writers for the same capture never
    /// interleave bytes.
    append_lock: Mutex<()>,
}

impl CaptureFile {
    pub fn new(
        capture_dir: &Path,
        capture_id: &str,
        device_type: &str,
        timestamp: DateTime<Utc>,
        format: AudioFormat,
    ) -> Result<Self> {
        let dir = capture_dir
            .join(timestamp.format(DATE_DIR_FORMAT).to_string())
            .join(device_type);
        std::fs::create_dir_all(&dir)?;

        let filepath = dir.join(format!("{}.{}", capture_id, format.extension()));

        Ok(Self {
            capture_id: capture_id.to_string(),
            device_type: device_type.to_string(),
            timestamp,
            format,
            filepath,
            append_lock: Mutex::new(()),
        })
    }

    /// Reconstruct a capture record purely from its path in the three-level
    /// layout. Used when finalizing a capture whose in-memory session was
    /// lost (e.g. across a process restart).
    pub fn from_filepath(path: &Path) -> Result<Self> {
        let invalid = || CaptureError::InvalidCapturePath(path.to_path_buf());

        let capture_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(invalid)?
            .to_string();
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
            .ok_or_else(invalid)?;

        let device_dir = path.parent().ok_or_else(invalid)?;
        let device_type = device_dir
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(invalid)?
            .to_string();

        let date_str = device_dir
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .ok_or_else(invalid)?;
        let date = NaiveDate::parse_from_str(date_str, DATE_DIR_FORMAT).map_err(|_| invalid())?;
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(invalid)?
            .and_utc();

        Ok(Self {
            capture_id,
            device_type,
            timestamp,
            format,
            filepath: path.to_path_buf(),
            append_lock: Mutex::new(()),
        })
    }

    /// Capture id encoded in a filepath, if the path has a file stem.
    pub fn capture_id_from_filepath(path: &Path) -> Option<String> {
        path.file_stem().and_then(|s| s.to_str()).map(String::from)
    }

    /// Append audio bytes to the backing file, in arrival order.
    ///
    /// With `synthesize_header`, bytes are raw PCM samples: the first
    /// append writes a WAV header for `sample_rate` and every append keeps
    /// the header's length fields consistent. Otherwise bytes are appended
    /// verbatim.
    pub async fn append(
        &self,
        bytes: &[u8],
        synthesize_header: bool,
        sample_rate: u32,
    ) -> Result<u64> {
        let _guard = self.append_lock.lock().await;

        if synthesize_header {
            wav::append_to_wav_file(&self.filepath, bytes, sample_rate)
        } else {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.filepath)?;
            file.write_all(bytes)?;
            file.flush()?;
            Ok(bytes.len() as u64)
        }
    }

    /// Allocate the artifact path for one completed conversation. The path
    /// is deterministic from capture id and conversation id; no audio is
    /// copied here (extraction is the detector's job).
    pub fn create_conversation_segment(
        &self,
        conversation_id: Uuid,
        extension: &str,
    ) -> Result<SegmentFile> {
        let segment_dir = self
            .filepath
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.capture_id);
        std::fs::create_dir_all(&segment_dir)?;

        Ok(SegmentFile {
            conversation_id,
            filepath: segment_dir.join(format!("conversation_{}.{}", conversation_id, extension)),
        })
    }

    /// Scan the two-level date/device layout under `capture_dir` for the
    /// file belonging to `capture_id`. Zero matches and multiple matches
    /// are both errors; a match is never guessed.
    pub fn locate_by_capture_id(capture_dir: &Path, capture_id: &str) -> Result<PathBuf> {
        let mut matches = Vec::new();

        if capture_dir.is_dir() {
            for date_entry in std::fs::read_dir(capture_dir)? {
                let date_dir = date_entry?.path();
                if !date_dir.is_dir() {
                    continue;
                }
                for device_entry in std::fs::read_dir(&date_dir)? {
                    let device_dir = device_entry?.path();
                    if !device_dir.is_dir() {
                        continue;
                    }
                    for file_entry in std::fs::read_dir(&device_dir)? {
                        let path = file_entry?.path();
                        if path.is_file()
                            && Self::capture_id_from_filepath(&path).as_deref() == Some(capture_id)
                        {
                            matches.push(path);
                        }
                    }
                }
            }
        }

        match matches.len() {
            0 => Err(CaptureError::SessionNotFound(capture_id.to_string())),
            1 => {
                let path = matches.remove(0);
                info!("Found file to process: {}", path.display());
                Ok(path)
            }
            n => Err(CaptureError::AmbiguousRecovery {
                capture_id: capture_id.to_string(),
                matches: n,
            }),
        }
    }
}

/// A derived file holding exactly one completed conversation's audio.
#[derive(Debug, Clone)]
pub struct SegmentFile {
    pub conversation_id: Uuid,
    pub filepath: PathBuf,
}
