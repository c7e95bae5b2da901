pub mod decode;
pub mod wav;

pub use decode::{decode_chunk, pcm16_from_wav_bytes, DecodedAudio};
pub use wav::{append_to_wav_file, payload_offset, WAV_HEADER_LEN};
