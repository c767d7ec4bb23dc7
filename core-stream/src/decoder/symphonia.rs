//! # Symphonia Decoder Implementation
//!
//! Whole-file segment decoding using the Symphonia library.

use crate::audio::DecodedBuffer;
use crate::decoder::format_detector::FormatDetector;
use crate::decoder::sample_converter::SampleConverter;
use crate::error::{Result, StreamError};
use crate::traits::SegmentDecoder;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, instrument, warn};

const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Symphonia-backed [`SegmentDecoder`].
///
/// Each call probes the container, decodes every packet of the first audio
/// track and returns planar f32 samples. Decoding runs on the blocking pool
/// so the async caller is not stalled by CPU work.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode synchronously on the current thread.
    pub fn decode_blocking(data: Bytes, hint: Hint) -> Result<DecodedBuffer> {
        let media_source = Box::new(Cursor::new(data)) as Box<dyn MediaSource>;
        let mss = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| StreamError::InvalidFormat(format!("Failed to probe format: {}", e)))?;

        let mut format_reader = probe_result.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| StreamError::UnsupportedCodec("No supported audio tracks".to_string()))?;

        let track_id = track.id;
        let codec = FormatDetector::detect_codec(track.codec_params.codec);
        let mut sample_rate = track.codec_params.sample_rate;
        let expected_channels = track.codec_params.channels.map(|ch| ch.count());

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                StreamError::UnsupportedCodec(format!("Failed to create codec decoder: {}", e))
            })?;

        debug!(?codec, ?sample_rate, ?expected_channels, "Decoding segment audio");

        let mut planes: Vec<Vec<f32>> = Vec::new();
        let mut consecutive_errors = 0;

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(StreamError::DecoderError(
                        "Track list changed, reset required".to_string(),
                    ));
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "I/O error reading packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(StreamError::CorruptedStream(format!(
                            "Stream I/O failure after {} attempts: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                    continue;
                }
                Err(e) => {
                    return Err(StreamError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            while !format_reader.metadata().is_latest() {
                format_reader.metadata().pop();
            }

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    consecutive_errors = 0;
                    if sample_rate.is_none() {
                        sample_rate = Some(decoded.spec().rate);
                    }
                    SampleConverter::append_planar(&decoded, &mut planes);
                }
                Err(SymphoniaError::IoError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupted packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(StreamError::CorruptedStream(format!(
                            "Stream corruption after {} failed packets",
                            MAX_CONSECUTIVE_ERRORS
                        )));
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping packet with decode error (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(StreamError::DecoderError(format!(
                            "Decoder failure after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, e
                        )));
                    }
                }
                Err(e) => {
                    return Err(StreamError::DecoderError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }

        let sample_rate = sample_rate
            .filter(|rate| *rate > 0)
            .ok_or_else(|| StreamError::InvalidFormat("Missing sample rate".to_string()))?;

        if planes.is_empty() {
            let channels = expected_channels.unwrap_or(1);
            planes = vec![Vec::new(); channels];
        }

        Ok(DecodedBuffer::new(sample_rate, planes))
    }
}

#[async_trait]
impl SegmentDecoder for SymphoniaDecoder {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn decode(&self, data: Bytes, hint: Option<&str>) -> Result<DecodedBuffer> {
        let hint = hint
            .map(FormatDetector::hint_from_path)
            .unwrap_or_else(Hint::new);

        let buffer = core_async::task::spawn_blocking(move || Self::decode_blocking(data, hint))
            .await
            .map_err(|e| StreamError::Internal(format!("Decode task failed: {}", e)))?
            .map_err(|e| {
                error!("Segment decode failed: {}", e);
                e
            })?;

        debug!(
            frames = buffer.frames(),
            channels = buffer.channel_count(),
            sample_rate = buffer.sample_rate(),
            "Decoded segment"
        );
        Ok(buffer)
    }
}
