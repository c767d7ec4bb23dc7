//! # Sample Format Converter
//!
//! Normalises Symphonia buffers of any sample type to planar f32.

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;

/// Appends decoded packets to per-channel f32 planes in `[-1.0, 1.0]`.
pub struct SampleConverter;

impl SampleConverter {
    /// Append every channel of `buffer` to `planes`.
    ///
    /// `planes` grows to the packet's channel count if needed; existing
    /// planes keep their samples.
    pub fn append_planar(buffer: &AudioBufferRef<'_>, planes: &mut Vec<Vec<f32>>) {
        match buffer {
            AudioBufferRef::F32(buf) => Self::append(&**buf, planes, |s: f32| s),
            AudioBufferRef::F64(buf) => Self::append(&**buf, planes, |s: f64| s.into_sample()),
            AudioBufferRef::S32(buf) => Self::append(&**buf, planes, |s: i32| s.into_sample()),
            AudioBufferRef::S16(buf) => Self::append(&**buf, planes, |s: i16| s.into_sample()),
            AudioBufferRef::S24(buf) => {
                Self::append(&**buf, planes, |s| IntoSample::into_sample(s))
            }
            AudioBufferRef::S8(buf) => Self::append(&**buf, planes, |s: i8| s.into_sample()),
            AudioBufferRef::U32(buf) => Self::append(&**buf, planes, |s: u32| s.into_sample()),
            AudioBufferRef::U16(buf) => Self::append(&**buf, planes, |s: u16| s.into_sample()),
            AudioBufferRef::U24(buf) => {
                Self::append(&**buf, planes, |s| IntoSample::into_sample(s))
            }
            AudioBufferRef::U8(buf) => Self::append(&**buf, planes, |s: u8| s.into_sample()),
        }
    }

    fn append<T>(buf: &AudioBuffer<T>, planes: &mut Vec<Vec<f32>>, convert: fn(T) -> f32)
    where
        T: Sample + Copy,
    {
        let num_channels = buf.spec().channels.count();
        if planes.len() < num_channels {
            let frames = planes.first().map_or(0, Vec::len);
            planes.resize(num_channels, vec![0.0; frames]);
        }

        for (chan_idx, plane) in planes.iter_mut().enumerate().take(num_channels) {
            plane.extend(buf.chan(chan_idx).iter().map(|s| convert(*s)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::{Channels, SignalSpec};

    fn stereo_i16(frames: usize, left: i16, right: i16) -> AudioBuffer<i16> {
        let spec = SignalSpec::new(8000, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buf = AudioBuffer::<i16>::new(frames as u64, spec);
        buf.render_reserved(Some(frames));
        buf.chan_mut(0).fill(left);
        buf.chan_mut(1).fill(right);
        buf
    }

    #[test]
    fn test_append_normalises_i16() {
        let buf = stereo_i16(4, i16::MAX, i16::MIN);
        let mut planes = Vec::new();
        SampleConverter::append_planar(&AudioBufferRef::S16(std::borrow::Cow::Borrowed(&buf)), &mut planes);

        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].len(), 4);
        assert!(planes[0].iter().all(|s| (*s - 1.0).abs() < 1e-3));
        assert!(planes[1].iter().all(|s| (*s + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_append_accumulates_packets() {
        let buf = stereo_i16(3, 0, 0);
        let mut planes = Vec::new();
        let buf_ref = AudioBufferRef::S16(std::borrow::Cow::Borrowed(&buf));
        SampleConverter::append_planar(&buf_ref, &mut planes);
        SampleConverter::append_planar(&buf_ref, &mut planes);

        assert_eq!(planes[0].len(), 6);
        assert_eq!(planes[1].len(), 6);
    }
}
