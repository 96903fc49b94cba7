//! Channel configuration and node construction options.
//!
//! Options are partial records: a `None` field leaves the host default in place.

use crate::buffer::AudioBuffer;

/// How the number of channels of a node's input is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelCountMode {
    /// The maximum channel count over all connections.
    #[default]
    Max,
    /// Like `Max`, but limited to `channelCount`.
    ClampedMax,
    /// Exactly `channelCount`.
    Explicit,
}

/// How channels are mapped when up- or down-mixing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelInterpretation {
    /// Speaker layout aware mixing (mono <-> stereo).
    #[default]
    Speakers,
    /// Channel by channel copy; missing channels are silent.
    Discrete,
}

/// The configuration every node type accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioNodeOptions {
    pub channel_count: Option<u32>,
    pub channel_count_mode: Option<ChannelCountMode>,
    pub channel_interpretation: Option<ChannelInterpretation>,
}

impl AudioNodeOptions {
    pub fn with_channel_count(mut self, count: u32) -> Self {
        self.channel_count = Some(count);
        self
    }

    pub fn with_channel_count_mode(mut self, mode: ChannelCountMode) -> Self {
        self.channel_count_mode = Some(mode);
        self
    }

    pub fn with_channel_interpretation(mut self, interpretation: ChannelInterpretation) -> Self {
        self.channel_interpretation = Some(interpretation);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GainOptions {
    pub audio_node: AudioNodeOptions,
    pub gain: Option<f32>,
}

impl GainOptions {
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = Some(gain);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBufferSourceOptions {
    pub audio_node: AudioNodeOptions,
    pub buffer: Option<AudioBuffer>,
    pub detune: Option<f32>,
    pub r#loop: Option<bool>,
    pub loop_start: Option<f64>,
    pub loop_end: Option<f64>,
    pub playback_rate: Option<f32>,
}

impl AudioBufferSourceOptions {
    pub fn with_buffer(mut self, buffer: AudioBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.r#loop = Some(looping);
        self
    }

    pub fn with_loop_points(mut self, start: f64, end: f64) -> Self {
        self.loop_start = Some(start);
        self.loop_end = Some(end);
        self
    }

    pub fn with_playback_rate(mut self, rate: f32) -> Self {
        self.playback_rate = Some(rate);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConstantSourceOptions {
    pub audio_node: AudioNodeOptions,
    pub offset: Option<f32>,
}

impl ConstantSourceOptions {
    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = Some(offset);
        self
    }
}
