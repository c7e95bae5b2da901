use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audio::decode_chunk;
use crate::capture::AudioFormat;
use crate::config::DetectionConfig;
use crate::error::{CaptureError, Result};

use super::vad::{Vad, VadConfig, VadEvent};

/// Span boundaries in seconds relative to capture start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpanEndpoints {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanState {
    InProgress,
    Completed,
}

/// One conversation detected within a capture.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSpan {
    pub conversation_id: Uuid,
    pub endpoints: SpanEndpoints,
    pub state: SpanState,
}

/// Outcome of one `detect` call: spans newly completed by this call, plus
/// at most one span still open.
#[derive(Debug, Default)]
pub struct DetectionResult {
    pub completed: Vec<ConversationSpan>,
    pub in_progress: Option<ConversationSpan>,
}

/// Byte/time extent of one appended AAC chunk, for span extraction.
struct ChunkRange {
    start_secs: f64,
    end_secs: f64,
    byte_start: u64,
    byte_end: u64,
}

struct OpenSpan {
    conversation_id: Uuid,
    start_secs: f64,
}

/// Per-capture conversation boundary detector.
///
/// Single-writer state machine over the capture's audio: every appended
/// chunk is decoded to PCM16 mono, cut into fixed analysis windows, and fed
/// through the voice activity gate. Calls must arrive in append order; the
/// task queue guarantees that.
pub struct ConversationDetector {
    capture_filepath: PathBuf,
    config: DetectionConfig,
    vad: Vad,

    /// Stream sample rate; starts at the configured rate and follows the
    /// decoded rate of incoming chunks.
    sample_rate: u32,
    /// Samples already pushed through analysis windows.
    consumed_samples: u64,
    /// Samples received in total (consumed + pending).
    total_samples: u64,
    /// Carry-over shorter than one analysis window.
    pending: Vec<i16>,
    /// Payload bytes appended so far, as seen by detect calls.
    payload_bytes: u64,
    /// Byte extents of appended AAC chunks (unused for WAV captures).
    chunk_ledger: Vec<ChunkRange>,

    current: Option<OpenSpan>,
    finished: bool,
}

impl ConversationDetector {
    pub fn new(capture_filepath: PathBuf, sample_rate: u32, config: DetectionConfig) -> Self {
        let vad = Vad::new(VadConfig {
            speech_threshold: config.speech_threshold,
            hang_secs: config.silence_duration_secs,
        });
        Self {
            capture_filepath,
            config,
            vad,
            sample_rate,
            consumed_samples: 0,
            total_samples: 0,
            pending: Vec::new(),
            payload_bytes: 0,
            chunk_ledger: Vec::new(),
            current: None,
            finished: false,
        }
    }

    /// Consume newly appended audio (or the capture-finished signal) and
    /// return newly completed spans plus the span still open, if any.
    pub fn detect(
        &mut self,
        new_audio: Option<&[u8]>,
        format: AudioFormat,
        capture_finished: bool,
    ) -> Result<DetectionResult> {
        let mut completed = Vec::new();

        if let Some(bytes) = new_audio {
            let decoded = decode_chunk(bytes, format, self.sample_rate)?;
            let rate = decoded.sample_rate.max(1);
            self.sample_rate = rate;

            if format == AudioFormat::Aac {
                self.chunk_ledger.push(ChunkRange {
                    start_secs: self.total_samples as f64 / rate as f64,
                    end_secs: (self.total_samples + decoded.samples.len() as u64) as f64
                        / rate as f64,
                    byte_start: self.payload_bytes,
                    byte_end: self.payload_bytes + bytes.len() as u64,
                });
            }
            self.payload_bytes += bytes.len() as u64;
            self.total_samples += decoded.samples.len() as u64;

            self.pending.extend_from_slice(&decoded.samples);
            let window = ((rate as u64 * self.config.window_ms as u64) / 1000).max(1) as usize;

            let mut offset = 0;
            while self.pending.len() - offset >= window {
                let t0 = self.consumed_samples as f64 / rate as f64;
                self.consumed_samples += window as u64;
                let t1 = self.consumed_samples as f64 / rate as f64;
                let event =
                    self.vad
                        .process_window(&self.pending[offset..offset + window], t0, t1);
                self.apply_event(event, t0, &mut completed);
                offset += window;
            }
            self.pending.drain(..offset);
        }

        if capture_finished {
            self.flush(&mut completed);
        }

        let in_progress = if self.finished {
            None
        } else {
            self.current.as_ref().map(|open| ConversationSpan {
                conversation_id: open.conversation_id,
                endpoints: SpanEndpoints {
                    start: open.start_secs,
                    end: self.vad.last_voice_end().max(open.start_secs),
                },
                state: SpanState::InProgress,
            })
        };

        debug!(
            "Detection pass on {}: {} completed, in_progress={}",
            self.capture_filepath.display(),
            completed.len(),
            in_progress.is_some()
        );

        Ok(DetectionResult {
            completed,
            in_progress,
        })
    }

    fn apply_event(&mut self, event: VadEvent, window_start: f64, completed: &mut Vec<ConversationSpan>) {
        match event {
            VadEvent::SpeechStart => {
                if self.current.is_none() {
                    let conversation_id = Uuid::new_v4();
                    info!(
                        "Conversation {} opened at {:.2}s in {}",
                        conversation_id,
                        window_start,
                        self.capture_filepath.display()
                    );
                    self.current = Some(OpenSpan {
                        conversation_id,
                        start_secs: window_start,
                    });
                }
            }
            VadEvent::SpeechEnd => {
                let end = self.vad.last_voice_end();
                self.close_current(end, completed);
            }
            VadEvent::Speech | VadEvent::Silence => {}
        }
    }

    /// Push any trailing partial window through the gate, then close the
    /// open span. Used exactly once, when the capture is finalized.
    fn flush(&mut self, completed: &mut Vec<ConversationSpan>) {
        if !self.pending.is_empty() {
            let rate = self.sample_rate.max(1);
            let t0 = self.consumed_samples as f64 / rate as f64;
            self.consumed_samples += self.pending.len() as u64;
            let t1 = self.consumed_samples as f64 / rate as f64;
            let tail = std::mem::take(&mut self.pending);
            let event = self.vad.process_window(&tail, t0, t1);
            self.apply_event(event, t0, completed);
        }

        let end = self.vad.finish().unwrap_or_else(|| self.vad.last_voice_end());
        self.close_current(end, completed);
        self.finished = true;
    }

    fn close_current(&mut self, end_secs: f64, completed: &mut Vec<ConversationSpan>) {
        if let Some(open) = self.current.take() {
            if end_secs - open.start_secs >= self.config.min_speech_secs {
                completed.push(ConversationSpan {
                    conversation_id: open.conversation_id,
                    endpoints: SpanEndpoints {
                        start: open.start_secs,
                        end: end_secs,
                    },
                    state: SpanState::Completed,
                });
            } else {
                debug!(
                    "Dropping conversation {} shorter than {:.1}s",
                    open.conversation_id, self.config.min_speech_secs
                );
            }
        }
    }

    /// Materialize each span's audio from the capture file into the
    /// corresponding target path. One-to-one and order-preserving with the
    /// input lists.
    pub fn extract(&self, spans: &[ConversationSpan], target_paths: &[PathBuf]) -> Result<()> {
        for (span, target) in spans.iter().zip(target_paths.iter()) {
            let is_aac = target
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("aac"))
                .unwrap_or(false);

            if is_aac {
                self.extract_aac_span(span, target)?;
            } else {
                self.extract_wav_span(span, target)?;
            }

            info!(
                "Extracted conversation {} ({:.2}s - {:.2}s) to {}",
                span.conversation_id,
                span.endpoints.start,
                span.endpoints.end,
                target.display()
            );
        }
        Ok(())
    }

    /// WAV payload is linear PCM, so span times map to byte ranges exactly.
    fn extract_wav_span(&self, span: &ConversationSpan, target: &Path) -> Result<()> {
        let rate = self.sample_rate.max(1);
        let offset = crate::audio::payload_offset(&self.capture_filepath)?;
        let file_len = std::fs::metadata(&self.capture_filepath)?.len();

        let start_sample = (span.endpoints.start * rate as f64).floor().max(0.0) as u64;
        let end_sample = (span.endpoints.end * rate as f64).ceil().max(0.0) as u64;
        let start_byte = (offset + start_sample * 2).min(file_len);
        let end_byte = (offset + end_sample * 2).min(file_len);

        let bytes = read_range(&self.capture_filepath, start_byte, end_byte)?;

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(target, spec)
            .map_err(|e| CaptureError::Audio(format!("failed to create segment WAV: {e}")))?;
        for pair in bytes.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| CaptureError::Audio(format!("failed to write segment sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Audio(format!("failed to finalize segment WAV: {e}")))?;

        Ok(())
    }

    /// AAC frames are not seekable by time, so spans snap to the byte
    /// extents of the appended chunks that overlap them. ADTS frames are
    /// self-delimiting, so the verbatim copy stays playable.
    fn extract_aac_span(&self, span: &ConversationSpan, target: &Path) -> Result<()> {
        let overlapping: Vec<&ChunkRange> = self
            .chunk_ledger
            .iter()
            .filter(|chunk| {
                chunk.end_secs > span.endpoints.start && chunk.start_secs < span.endpoints.end
            })
            .collect();

        let (Some(first), Some(last)) = (overlapping.first(), overlapping.last()) else {
            return Err(CaptureError::Audio(format!(
                "no recorded bytes overlap conversation {}",
                span.conversation_id
            )));
        };

        let bytes = read_range(&self.capture_filepath, first.byte_start, last.byte_end)?;
        std::fs::write(target, bytes)?;
        Ok(())
    }
}

fn read_range(path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; end.saturating_sub(start) as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
