//! WAV encoding of decoded buffers.

use crate::audio::buffer::DecodedBuffer;
use crate::error::{Result, StreamError};
use bytes::Bytes;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// MIME type of encoded output.
pub const WAV_MIME_TYPE: &str = "audio/wav";

const BITS_PER_SAMPLE: u16 = 16;

/// Encode a buffer as 16-bit PCM WAV.
pub fn encode_wav(buffer: &DecodedBuffer) -> Result<Bytes> {
    let spec = WavSpec {
        channels: buffer.channel_count().max(1),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let frames = buffer.frames();
    let channels = buffer.channels();
    let data_len = frames * channels.len() * (BITS_PER_SAMPLE as usize / 8);
    let mut cursor = Cursor::new(Vec::with_capacity(44 + data_len));

    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(encoding_error)?;
        for frame in 0..frames {
            for plane in channels {
                writer
                    .write_sample(to_i16(plane[frame]))
                    .map_err(encoding_error)?;
            }
        }
        writer.finalize().map_err(encoding_error)?;
    }

    Ok(Bytes::from(cursor.into_inner()))
}

fn to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

fn encoding_error(err: hound::Error) -> StreamError {
    StreamError::Encoding(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_header_matches_buffer() {
        let buffer = DecodedBuffer::new(22050, vec![vec![0.5; 2205], vec![-0.5; 2205]]);
        let wav = encode_wav(&buffer).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav.as_ref())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.duration(), 2205);
    }

    #[test]
    fn test_samples_are_clamped() {
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-2.0), i16::MIN);
        assert_eq!(to_i16(0.0), 0);
    }

    #[test]
    fn test_empty_buffer_encodes() {
        let buffer = DecodedBuffer::zeroed(24000, 1, 0);
        let wav = encode_wav(&buffer).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav.as_ref())).unwrap();
        assert_eq!(reader.duration(), 0);
    }
}
