//! AudioBuffer: Non-interleaved float storage with gain, mixing and metering.

use std::ops::Range;

/// Byte alignment of the first channel's data.
pub const ALIGNMENT: usize = 16;

/// Extra floats allocated so an aligned start always fits.
const PADDING: usize = ALIGNMENT / std::mem::size_of::<f32>();

/// Multichannel audio block. Channel `c` occupies `samples` contiguous floats
/// starting `c * samples` after an aligned base.
///
/// Only [`set_size`](Self::set_size) with new dimensions allocates; every
/// other method works in place.
#[derive(Debug)]
pub struct AudioBuffer {
    data: Vec<f32>,
    offset: usize,
    channels: usize,
    samples: usize,
    sample_rate: f64,
}

impl AudioBuffer {
    pub fn new(channels: usize, samples: usize) -> Self {
        let mut buffer = AudioBuffer {
            data: Vec::new(),
            offset: 0,
            channels: 0,
            samples: 0,
            sample_rate: 48000.0,
        };
        buffer.set_size(channels, samples);
        buffer
    }

    /// Resize, discarding contents. Does nothing when the shape is unchanged.
    pub fn set_size(&mut self, channels: usize, samples: usize) {
        if channels == self.channels && samples == self.samples {
            return;
        }
        self.channels = channels;
        self.samples = samples;
        let total = channels * samples;
        if total == 0 {
            self.data = Vec::new();
            self.offset = 0;
            return;
        }
        self.data = vec![0.0; total + PADDING];
        let offset = self.data.as_ptr().align_offset(ALIGNMENT);
        self.offset = if offset <= PADDING { offset } else { 0 };
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0 || self.samples == 0
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn channel_range(&self, channel: usize) -> Range<usize> {
        let start = self.offset + channel * self.samples;
        start..start + self.samples
    }

    /// Clamp `[start, start + len)` to this buffer. `None` if `start` is past
    /// the end.
    fn span(&self, start: usize, len: usize) -> Option<Range<usize>> {
        if start >= self.samples {
            return None;
        }
        Some(start..start + len.min(self.samples - start))
    }

    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        (channel < self.channels).then(|| &self.data[self.channel_range(channel)])
    }

    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut [f32]> {
        if channel >= self.channels {
            return None;
        }
        let range = self.channel_range(channel);
        Some(&mut self.data[range])
    }

    /// Two distinct channels borrowed mutably at once.
    pub fn channel_pair_mut(&mut self, a: usize, b: usize) -> Option<(&mut [f32], &mut [f32])> {
        if a == b || a >= self.channels || b >= self.channels {
            return None;
        }
        let n = self.samples;
        let (lo, hi) = (a.min(b), a.max(b));
        let body = &mut self.data[self.offset..self.offset + self.channels * n];
        let (head, tail) = body.split_at_mut(hi * n);
        let low = &mut head[lo * n..lo * n + n];
        let high = &mut tail[..n];
        if a < b { Some((low, high)) } else { Some((high, low)) }
    }

    fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let n = self.samples.max(1);
        let end = self.offset + self.channels * self.samples;
        self.data[self.offset..end].chunks_exact_mut(n)
    }

    /// Channels selected by `channel`; `None` means all of them.
    fn selected(&self, channel: Option<usize>) -> Range<usize> {
        match channel {
            None => 0..self.channels,
            Some(c) if c < self.channels => c..c + 1,
            Some(_) => 0..0,
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn clear_range(&mut self, start: usize, len: usize) {
        let Some(span) = self.span(start, len) else {
            return;
        };
        for data in self.channels_mut() {
            data[span.clone()].fill(0.0);
        }
    }

    pub fn apply_gain(&mut self, gain: f32) {
        self.apply_gain_range(gain, 0, self.samples);
    }

    pub fn apply_gain_range(&mut self, gain: f32, start: usize, len: usize) {
        if gain == 1.0 {
            return;
        }
        let Some(span) = self.span(start, len) else {
            return;
        };
        for data in self.channels_mut() {
            data[span.clone()].iter_mut().for_each(|s| *s *= gain);
        }
    }

    pub fn apply_gain_ramp(&mut self, start_gain: f32, end_gain: f32) {
        self.apply_gain_ramp_range(start_gain, end_gain, 0, self.samples);
    }

    /// Linear gain from `start_gain` on the first selected sample to
    /// `end_gain` on the last, the same shape on every channel.
    pub fn apply_gain_ramp_range(&mut self, start_gain: f32, end_gain: f32, start: usize, len: usize) {
        let Some(span) = self.span(start, len) else {
            return;
        };
        let n = span.len();
        if n == 0 {
            return;
        }
        let delta = if n > 1 {
            (end_gain - start_gain) / (n - 1) as f32
        } else {
            0.0
        };
        for data in self.channels_mut() {
            for (i, s) in data[span.clone()].iter_mut().enumerate() {
                *s *= start_gain + delta * i as f32;
            }
        }
    }

    pub fn add_from(&mut self, source: &AudioBuffer) {
        self.mix_from(source, 0, 0, self.samples.max(source.samples), 1.0);
    }

    pub fn add_from_range(&mut self, source: &AudioBuffer, source_start: usize, dest_start: usize, len: usize) {
        self.mix_from(source, source_start, dest_start, len, 1.0);
    }

    pub fn add_from_with_gain(&mut self, source: &AudioBuffer, gain: f32) {
        self.mix_from(source, 0, 0, self.samples.max(source.samples), gain);
    }

    /// Copy the overlapping region and zero channels the source lacks.
    pub fn copy_from(&mut self, source: &AudioBuffer) {
        self.copy_from_range(source, 0, 0, self.samples.max(source.samples));
        for ch in source.channels..self.channels {
            self.clear_channel(ch);
        }
    }

    pub fn copy_from_range(&mut self, source: &AudioBuffer, source_start: usize, dest_start: usize, len: usize) {
        let Some((src, dst)) = self.overlap(source, source_start, dest_start, len) else {
            return;
        };
        for ch in 0..self.channels.min(source.channels) {
            let from = &source.data[source.channel_range(ch)][src.clone()];
            let range = self.channel_range(ch);
            self.data[range][dst.clone()].copy_from_slice(from);
        }
    }

    fn mix_from(&mut self, source: &AudioBuffer, source_start: usize, dest_start: usize, len: usize, gain: f32) {
        let Some((src, dst)) = self.overlap(source, source_start, dest_start, len) else {
            return;
        };
        for ch in 0..self.channels.min(source.channels) {
            let from = &source.data[source.channel_range(ch)][src.clone()];
            let range = self.channel_range(ch);
            for (d, s) in self.data[range][dst.clone()].iter_mut().zip(from) {
                *d += s * gain;
            }
        }
    }

    /// Matching source and destination ranges of equal length.
    fn overlap(
        &self,
        source: &AudioBuffer,
        source_start: usize,
        dest_start: usize,
        len: usize,
    ) -> Option<(Range<usize>, Range<usize>)> {
        let src = source.span(source_start, len)?;
        let dst = self.span(dest_start, len)?;
        let n = src.len().min(dst.len());
        Some((src.start..src.start + n, dst.start..dst.start + n))
    }

    pub fn copy_channel(&mut self, source: usize, dest: usize) {
        if source == dest || source >= self.channels || dest >= self.channels {
            return;
        }
        let from = self.channel_range(source);
        let to = self.channel_range(dest).start;
        self.data.copy_within(from, to);
    }

    pub fn clear_channel(&mut self, channel: usize) {
        if let Some(data) = self.channel_mut(channel) {
            data.fill(0.0);
        }
    }

    pub fn apply_channel_gain(&mut self, channel: usize, gain: f32) {
        if gain == 1.0 {
            return;
        }
        if let Some(data) = self.channel_mut(channel) {
            data.iter_mut().for_each(|s| *s *= gain);
        }
    }

    /// RMS over the selected channels; `None` aggregates all channels.
    pub fn rms_level(&self, channel: Option<usize>) -> f32 {
        let selected = self.selected(channel);
        let count = selected.len() * self.samples;
        if count == 0 {
            return 0.0;
        }
        let sum: f64 = selected
            .flat_map(|ch| self.data[self.channel_range(ch)].iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum / count as f64).sqrt() as f32
    }

    pub fn peak_level(&self, channel: Option<usize>) -> f32 {
        self.selected(channel)
            .flat_map(|ch| self.data[self.channel_range(ch)].iter())
            .fold(0.0f32, |peak, &s| peak.max(s.abs()))
    }

    /// `(min, max)` over the selected channels, `(0, 0)` when nothing is
    /// selected.
    pub fn find_min_max(&self, channel: Option<usize>) -> (f32, f32) {
        let mut samples = self
            .selected(channel)
            .flat_map(|ch| self.data[self.channel_range(ch)].iter().copied());
        let Some(first) = samples.next() else {
            return (0.0, 0.0);
        };
        samples.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s)))
    }
}

impl Clone for AudioBuffer {
    /// The copy gets its own aligned storage; offsets are not shared.
    fn clone(&self) -> Self {
        let mut copy = AudioBuffer::new(self.channels, self.samples);
        copy.sample_rate = self.sample_rate;
        copy.copy_from(self);
        copy
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(channels: usize, samples: usize, value: f32) -> AudioBuffer {
        let mut b = AudioBuffer::new(channels, samples);
        for ch in 0..channels {
            b.channel_mut(ch).unwrap().fill(value);
        }
        b
    }

    #[test]
    fn channels_are_aligned() {
        for samples in [1, 3, 4, 7, 512] {
            let b = AudioBuffer::new(2, samples);
            let ptr = b.channel(0).unwrap().as_ptr() as usize;
            assert_eq!(ptr % ALIGNMENT, 0, "samples = {samples}");
            assert_eq!(b.channel(1).unwrap().len(), samples);
        }
    }

    #[test]
    fn set_size_same_shape_keeps_data() {
        let mut b = filled(2, 8, 0.5);
        b.set_size(2, 8);
        assert!(b.channel(1).unwrap().iter().all(|&s| s == 0.5));
        b.set_size(1, 8);
        assert_eq!(b.channel_count(), 1);
        assert!(b.channel(0).unwrap().iter().all(|&s| s == 0.0));
        assert!(b.channel(1).is_none());
    }

    #[test]
    fn empty_buffer_is_harmless() {
        let mut b = AudioBuffer::default();
        assert!(b.is_empty());
        b.clear();
        b.apply_gain(2.0);
        b.apply_gain_ramp(0.0, 1.0);
        assert_eq!(b.rms_level(None), 0.0);
        assert_eq!(b.find_min_max(None), (0.0, 0.0));
    }

    #[test]
    fn gain_ramp_inclusive_endpoints() {
        let mut b = filled(1, 5, 1.0);
        b.apply_gain_ramp_range(0.0, 1.0, 0, 5);
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
        for (got, want) in b.channel(0).unwrap().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
    }

    #[test]
    fn gain_ramp_same_on_every_channel() {
        let mut b = filled(2, 3, 2.0);
        b.apply_gain_ramp(1.0, 0.0);
        assert_eq!(b.channel(0).unwrap(), b.channel(1).unwrap());
        assert_eq!(b.channel(0).unwrap(), &[2.0, 1.0, 0.0]);
    }

    #[test]
    fn gain_ramp_single_sample_uses_start_gain() {
        let mut b = filled(1, 4, 1.0);
        b.apply_gain_ramp_range(0.5, 1.0, 3, 1);
        assert_eq!(b.channel(0).unwrap(), &[1.0, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn ranged_gain_and_clear() {
        let mut b = filled(2, 4, 1.0);
        b.apply_gain_range(0.5, 1, 2);
        assert_eq!(b.channel(1).unwrap(), &[1.0, 0.5, 0.5, 1.0]);
        b.clear_range(2, 100);
        assert_eq!(b.channel(0).unwrap(), &[1.0, 0.5, 0.0, 0.0]);
        b.clear_range(4, 1);
        assert_eq!(b.channel(0).unwrap(), &[1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn add_from_overlapping_region_only() {
        let mut dst = filled(2, 4, 1.0);
        let src = filled(1, 2, 0.5);
        dst.add_from(&src);
        assert_eq!(dst.channel(0).unwrap(), &[1.5, 1.5, 1.0, 1.0]);
        assert_eq!(dst.channel(1).unwrap(), &[1.0; 4]);
        dst.add_from_with_gain(&src, 2.0);
        assert_eq!(dst.channel(0).unwrap(), &[2.5, 2.5, 1.0, 1.0]);
    }

    #[test]
    fn add_from_range_offsets() {
        let mut dst = AudioBuffer::new(1, 4);
        let mut src = AudioBuffer::new(1, 4);
        src.channel_mut(0).unwrap().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        dst.add_from_range(&src, 2, 1, 10);
        assert_eq!(dst.channel(0).unwrap(), &[0.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn copy_from_zero_fills_extra_channels() {
        let mut dst = filled(3, 4, 9.0);
        let src = filled(2, 4, 0.25);
        dst.copy_from(&src);
        assert_eq!(dst.channel(0).unwrap(), &[0.25; 4]);
        assert_eq!(dst.channel(1).unwrap(), &[0.25; 4]);
        assert_eq!(dst.channel(2).unwrap(), &[0.0; 4]);
    }

    #[test]
    fn copy_from_range() {
        let mut dst = AudioBuffer::new(1, 3);
        let mut src = AudioBuffer::new(1, 3);
        src.channel_mut(0).unwrap().copy_from_slice(&[1.0, 2.0, 3.0]);
        dst.copy_from_range(&src, 1, 0, 2);
        assert_eq!(dst.channel(0).unwrap(), &[2.0, 3.0, 0.0]);
    }

    #[test]
    fn channel_operations() {
        let mut b = AudioBuffer::new(2, 2);
        b.channel_mut(0).unwrap().copy_from_slice(&[1.0, -1.0]);
        b.copy_channel(0, 1);
        assert_eq!(b.channel(1).unwrap(), &[1.0, -1.0]);
        b.apply_channel_gain(1, 0.5);
        assert_eq!(b.channel(1).unwrap(), &[0.5, -0.5]);
        b.clear_channel(0);
        assert_eq!(b.channel(0).unwrap(), &[0.0, 0.0]);
        b.copy_channel(0, 7);
        b.clear_channel(7);
    }

    #[test]
    fn channel_pair_mut_order() {
        let mut b = AudioBuffer::new(3, 2);
        {
            let (x, y) = b.channel_pair_mut(2, 0).unwrap();
            x.fill(2.0);
            y.fill(0.5);
        }
        assert_eq!(b.channel(0).unwrap(), &[0.5, 0.5]);
        assert_eq!(b.channel(2).unwrap(), &[2.0, 2.0]);
        assert!(b.channel_pair_mut(1, 1).is_none());
        assert!(b.channel_pair_mut(0, 3).is_none());
    }

    #[test]
    fn clone_is_aligned_copy() {
        let b = filled(2, 3, 0.75);
        let c = b.clone();
        assert_eq!(c.channel(1).unwrap(), &[0.75; 3]);
        assert_eq!(c.channel(0).unwrap().as_ptr() as usize % ALIGNMENT, 0);
    }

    #[test]
    fn metering() {
        let mut b = AudioBuffer::new(2, 4);
        b.channel_mut(0).unwrap().copy_from_slice(&[1.0, -1.0, 1.0, -1.0]);
        b.channel_mut(1).unwrap().copy_from_slice(&[0.0, 0.5, -2.0, 0.0]);
        assert!((b.rms_level(Some(0)) - 1.0).abs() < 1e-6);
        let all = ((4.0 + 0.25 + 4.0) / 8.0f64).sqrt() as f32;
        assert!((b.rms_level(None) - all).abs() < 1e-6);
        assert_eq!(b.peak_level(Some(0)), 1.0);
        assert_eq!(b.peak_level(None), 2.0);
        assert_eq!(b.find_min_max(Some(1)), (-2.0, 0.5));
        assert_eq!(b.find_min_max(None), (-2.0, 1.0));
        assert_eq!(b.rms_level(Some(5)), 0.0);
        assert_eq!(b.find_min_max(Some(5)), (0.0, 0.0));
    }
}
