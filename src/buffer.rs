//! Sample buffers handed to buffer-playback sources.

/// Planar, non-interleaved sample data at a fixed sample rate.
///
/// Buffers are created through [`HostContext::create_buffer`](crate::host::HostContext::create_buffer),
/// which applies the host's limits on channel count, length and sample rate.
/// A source acquires a copy of the contents when the buffer is assigned, so
/// later edits do not affect playback.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f32,
}

impl AudioBuffer {
    pub(crate) fn silent(number_of_channels: usize, length: usize, sample_rate: f32) -> Self {
        Self {
            channels: vec![vec![0.0; length]; number_of_channels],
            sample_rate,
        }
    }

    #[inline]
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in sample frames.
    #[inline]
    pub fn length(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Duration in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.length() as f64 / self.sample_rate as f64
    }

    pub fn channel_data(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    pub fn channel_data_mut(&mut self, channel: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(channel).map(Vec::as_mut_slice)
    }

    /// Copy `source` into `channel`, truncated to the buffer length.
    ///
    /// Returns the number of frames written.
    pub fn copy_to_channel(&mut self, source: &[f32], channel: usize) -> usize {
        match self.channels.get_mut(channel) {
            Some(data) => {
                let n = data.len().min(source.len());
                data[..n].copy_from_slice(&source[..n]);
                n
            }
            None => 0,
        }
    }

    /// Fill every sample of every channel with `value`.
    pub fn fill(&mut self, value: f32) {
        for channel in &mut self.channels {
            channel.iter_mut().for_each(|s| *s = value);
        }
    }
}
