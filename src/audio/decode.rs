use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

use crate::capture::AudioFormat;
use crate::error::{CaptureError, Result};

use super::wav::WAV_HEADER_LEN;

/// PCM16 mono samples recovered from one appended chunk.
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Decode one chunk of capture audio into PCM16 mono for analysis.
///
/// WAV chunks are little-endian PCM16 mono already (a leading RIFF header,
/// present on the first chunk some devices send, is skipped); AAC chunks go
/// through symphonia.
pub fn decode_chunk(bytes: &[u8], format: AudioFormat, fallback_rate: u32) -> Result<DecodedAudio> {
    match format {
        AudioFormat::Wav => Ok(DecodedAudio {
            samples: pcm16_from_wav_bytes(bytes),
            sample_rate: wav_declared_rate(bytes).unwrap_or(fallback_rate),
        }),
        AudioFormat::Aac => decode_aac(bytes, fallback_rate),
    }
}

/// Sample rate declared by a RIFF header at the start of the chunk, if any.
fn wav_declared_rate(bytes: &[u8]) -> Option<u32> {
    if bytes.len() >= 28 && bytes.starts_with(b"RIFF") {
        Some(u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]))
    } else {
        None
    }
}

/// Interpret WAV/PCM chunk bytes as little-endian 16-bit mono samples.
pub fn pcm16_from_wav_bytes(bytes: &[u8]) -> Vec<i16> {
    let payload = if bytes.len() >= WAV_HEADER_LEN as usize && bytes.starts_with(b"RIFF") {
        &bytes[WAV_HEADER_LEN as usize..]
    } else {
        bytes
    };

    payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Decode an AAC (ADTS) chunk into mono PCM16 via symphonia.
fn decode_aac(bytes: &[u8], fallback_rate: u32) -> Result<DecodedAudio> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("aac");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| CaptureError::Audio(format!("AAC probe failed: {e}")))?;
    let mut reader = probed.format;

    let track = reader
        .default_track()
        .ok_or_else(|| CaptureError::Audio("AAC chunk has no audio track".to_string()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(fallback_rate);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CaptureError::Audio(format!("AAC decoder init failed: {e}")))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<i16>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(CaptureError::Audio(format!("AAC read failed: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let capacity = decoded.capacity() as u64;
                let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(capacity, spec));
                buf.copy_interleaved_ref(decoded);

                let channels = spec.channels.count();
                if channels <= 1 {
                    samples.extend_from_slice(buf.samples());
                } else {
                    // Downmix to mono by averaging the interleaved channels
                    for frame in buf.samples().chunks_exact(channels) {
                        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                        samples.push((sum / channels as i32) as i16);
                    }
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Malformed frames (e.g. a chunk boundary mid-frame) are
                // skipped rather than failing the whole chunk
                warn!("Skipping undecodable AAC frame: {}", e);
                continue;
            }
            Err(e) => return Err(CaptureError::Audio(format!("AAC decode failed: {e}"))),
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}
