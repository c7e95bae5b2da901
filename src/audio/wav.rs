use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

/// Canonical header length for the PCM16 mono containers we write.
pub const WAV_HEADER_LEN: u64 = 44;

/// Build a 44-byte RIFF header for 16-bit mono PCM.
fn wav_header(sample_rate: u32, data_len: u32) -> [u8; 44] {
    let byte_rate = sample_rate * 2; // mono, 2 bytes per sample
    let mut header = [0u8; 44];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&1u16.to_le_bytes()); // mono
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&2u16.to_le_bytes()); // block align
    header[34..36].copy_from_slice(&16u16.to_le_bytes()); // bits per sample
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// Append raw PCM sample bytes to a WAV file, creating it with a synthesized
/// header on first write.
///
/// The RIFF and data chunk length fields are rewritten on every append so
/// the header always agrees with the file length. hound cannot reopen and
/// grow a finalized file, hence the manual patching here.
///
/// Returns the number of payload bytes written.
pub fn append_to_wav_file(path: &Path, sample_bytes: &[u8], sample_rate: u32) -> Result<u64> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    let existing_len = file.metadata()?.len();
    if existing_len == 0 {
        file.write_all(&wav_header(sample_rate, sample_bytes.len() as u32))?;
        file.write_all(sample_bytes)?;
    } else {
        file.seek(SeekFrom::End(0))?;
        file.write_all(sample_bytes)?;

        let total_len = existing_len + sample_bytes.len() as u64;
        let riff_len = (total_len - 8) as u32;
        let data_len = total_len.saturating_sub(WAV_HEADER_LEN) as u32;
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&riff_len.to_le_bytes())?;
        file.seek(SeekFrom::Start(40))?;
        file.write_all(&data_len.to_le_bytes())?;
    }
    file.flush()?;

    Ok(sample_bytes.len() as u64)
}

/// Byte offset of the PCM payload in a capture file: 44 when the file
/// carries a RIFF header, 0 otherwise.
pub fn payload_offset(path: &Path) -> Result<u64> {
    let mut file = std::fs::File::open(path)?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) if &magic == b"RIFF" => Ok(WAV_HEADER_LEN),
        Ok(()) => Ok(0),
        // Shorter than the magic: nothing but payload (or nothing at all)
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
        Err(e) => Err(e.into()),
    }
}
