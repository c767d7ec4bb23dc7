//! Planar decoded sample buffers.

use std::borrow::Cow;

/// Decoded audio in planar layout.
///
/// One `Vec<f32>` per channel, samples in `[-1.0, 1.0]`. All channels have
/// the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedBuffer {
    /// Build a buffer from channel planes.
    ///
    /// Planes shorter than the longest one are padded with silence.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for plane in &mut channels {
            plane.resize(frames, 0.0);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    /// Zero-amplitude buffer of `frames` frames.
    pub fn zeroed(sample_rate: u32, channel_count: u16, frames: usize) -> Self {
        let channels = (0..channel_count.max(1))
            .map(|_| vec![0.0; frames])
            .collect();
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Return this buffer in the requested layout, converting only when needed.
    pub fn conformed(&self, sample_rate: u32, channel_count: u16) -> Cow<'_, DecodedBuffer> {
        if self.sample_rate == sample_rate && self.channel_count() == channel_count {
            return Cow::Borrowed(self);
        }

        let remapped = remap_channels(&self.channels, channel_count.max(1) as usize);
        let channels = if self.sample_rate == sample_rate || self.sample_rate == 0 {
            remapped
        } else {
            remapped
                .iter()
                .map(|plane| resample_linear(plane, self.sample_rate, sample_rate))
                .collect()
        };

        Cow::Owned(Self {
            sample_rate,
            channels,
        })
    }

    /// Concatenate buffers sample-for-sample per channel.
    ///
    /// The sample rate and channel count of the first buffer win; later
    /// buffers in another layout are converted first. Returns `None` for an
    /// empty input.
    pub fn concat<'a, I>(buffers: I) -> Option<DecodedBuffer>
    where
        I: IntoIterator<Item = &'a DecodedBuffer>,
    {
        let buffers: Vec<&DecodedBuffer> = buffers.into_iter().collect();
        let first = buffers.first()?;
        let sample_rate = first.sample_rate;
        let channel_count = first.channel_count();

        let conformed: Vec<Cow<'_, DecodedBuffer>> = buffers
            .iter()
            .map(|b| b.conformed(sample_rate, channel_count))
            .collect();
        let total_frames: usize = conformed.iter().map(|b| b.frames()).sum();

        let mut channels: Vec<Vec<f32>> = (0..channel_count)
            .map(|_| Vec::with_capacity(total_frames))
            .collect();
        for buffer in &conformed {
            for (out, plane) in channels.iter_mut().zip(buffer.channels.iter()) {
                out.extend_from_slice(plane);
            }
        }

        Some(Self {
            sample_rate,
            channels,
        })
    }
}

fn remap_channels(planes: &[Vec<f32>], target: usize) -> Vec<Vec<f32>> {
    let source = planes.len();
    if source == target {
        return planes.to_vec();
    }
    if source == 0 {
        return vec![Vec::new(); target];
    }

    if target == 1 {
        // Downmix by averaging.
        let frames = planes[0].len();
        let scale = 1.0 / source as f32;
        let mixed = (0..frames)
            .map(|i| planes.iter().map(|p| p[i]).sum::<f32>() * scale)
            .collect();
        return vec![mixed];
    }

    (0..target).map(|c| planes[c % source].clone()).collect()
}

fn resample_linear(plane: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if plane.is_empty() || from_rate == to_rate {
        return plane.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((plane.len() as f64) / ratio).round() as usize;
    let last = plane.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            plane[idx] + (plane[next] - plane[idx]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rate: u32, frames: usize, channels: usize) -> DecodedBuffer {
        let plane: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        DecodedBuffer::new(rate, vec![plane; channels])
    }

    #[test]
    fn test_duration_and_frames() {
        let buffer = DecodedBuffer::zeroed(8000, 2, 4000);
        assert_eq!(buffer.frames(), 4000);
        assert_eq!(buffer.channel_count(), 2);
        assert!((buffer.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_new_pads_short_planes() {
        let buffer = DecodedBuffer::new(100, vec![vec![0.5; 10], vec![0.5; 4]]);
        assert_eq!(buffer.channel(1).len(), 10);
        assert_eq!(buffer.channel(1)[9], 0.0);
    }

    #[test]
    fn test_concat_sums_lengths() {
        let a = ramp(8000, 800, 1);
        let b = DecodedBuffer::zeroed(8000, 1, 400);
        let c = ramp(8000, 1600, 1);

        let merged = DecodedBuffer::concat([&a, &b, &c]).unwrap();
        assert_eq!(merged.frames(), 2800);
        assert_eq!(merged.channel(0)[..800], a.channel(0)[..]);
        assert!(merged.channel(0)[800..1200].iter().all(|s| *s == 0.0));
        assert_eq!(merged.channel(0)[1200..], c.channel(0)[..]);
    }

    #[test]
    fn test_concat_empty() {
        assert!(DecodedBuffer::concat(std::iter::empty()).is_none());
    }

    #[test]
    fn test_concat_converts_mismatched_layouts() {
        let mono = ramp(8000, 800, 1);
        let stereo_fast = DecodedBuffer::new(16000, vec![vec![0.25; 1600], vec![0.75; 1600]]);

        let merged = DecodedBuffer::concat([&mono, &stereo_fast]).unwrap();
        assert_eq!(merged.sample_rate(), 8000);
        assert_eq!(merged.channel_count(), 1);
        assert_eq!(merged.frames(), 1600);
        assert!((merged.channel(0)[1000] - 0.5).abs() < 1e-6);
        assert!((merged.duration() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_upmix_duplicates_mono() {
        let mono = DecodedBuffer::new(8000, vec![vec![0.3; 10]]);
        let stereo = mono.conformed(8000, 2);
        assert_eq!(stereo.channel_count(), 2);
        assert_eq!(stereo.channel(1), mono.channel(0));
    }

    #[test]
    fn test_conformed_borrows_when_matching() {
        let buffer = ramp(8000, 10, 2);
        assert!(matches!(buffer.conformed(8000, 2), Cow::Borrowed(_)));
    }
}
