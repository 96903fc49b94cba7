//! Render kernels of the software host.
//!
//! Each node in the host graph is a [`RenderNode`]: the static description
//! (arity, channel configuration, parameters) plus one [`Kernel`] holding the
//! per-type playback state. Blocks are `dasp_graph` buffers, one per channel.

use dasp_graph::Buffer;
use rtrb::Producer;

use crate::buffer::AudioBuffer;
use crate::error::HostError;
use crate::host::{ChannelConfig, NodeArity, NodeKind, ParamDescriptor, ParamName};
use crate::options::{ChannelCountMode, ChannelInterpretation};

use super::quirks::Quirks;
use super::timeline::Timeline;
use super::RENDER_QUANTUM_SIZE;

/// One output of a node: one buffer per channel.
pub(crate) type Block = Vec<Buffer>;

/// Per-frame values of an a-rate parameter for one quantum.
pub(crate) type ParamValues = [f32; RENDER_QUANTUM_SIZE];

/// Information available while rendering one quantum.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RenderContext {
    pub sample_rate: f32,
    /// Context time of the first frame of the quantum
    pub time: f64,
    pub quirks: Quirks,
}

impl RenderContext {
    #[inline]
    pub fn frame_time(&self, frame: usize) -> f64 {
        self.time + frame as f64 / self.sample_rate as f64
    }
}

pub(crate) fn silent_block(channels: usize) -> Block {
    vec![Buffer::default(); channels.max(1)]
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
enum Playback {
    Unstarted,
    Scheduled {
        start: f64,
        stop: Option<f64>,
        /// End implied by a `duration` passed to `start`
        until: Option<f64>,
    },
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameState {
    Idle,
    Playing,
    Finished,
}

/// Start/stop bookkeeping shared by all scheduled sources.
#[derive(Clone, Debug)]
pub(crate) struct Schedule {
    playback: Playback,
    stop_called: bool,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            playback: Playback::Unstarted,
            stop_called: false,
        }
    }

    pub fn start(&mut self, when: f64, duration: Option<f64>) -> Result<(), HostError> {
        match self.playback {
            Playback::Unstarted => {
                self.playback = Playback::Scheduled {
                    start: when,
                    stop: None,
                    until: duration.map(|d| when + d),
                };
                Ok(())
            }
            _ => Err(HostError::invalid_state("start() may only be called once")),
        }
    }

    pub fn stop(&mut self, when: f64, quirks: &Quirks) -> Result<(), HostError> {
        if self.playback == Playback::Unstarted {
            return Err(HostError::invalid_state(
                "cannot stop a source that has not been started",
            ));
        }
        if self.stop_called && quirks.throws_on_consecutive_stop {
            return Err(HostError::invalid_state("stop() has already been called"));
        }
        self.stop_called = true;

        // the last call wins, unless the source already ended
        if let Playback::Scheduled { ref mut stop, .. } = self.playback {
            *stop = Some(when);
        }
        Ok(())
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self.playback, Playback::Scheduled { .. })
    }

    fn frame_state(&self, t: f64) -> FrameState {
        match self.playback {
            Playback::Scheduled { start, stop, until } => {
                let end = match (stop, until) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                if end.map_or(false, |end| t >= end) {
                    FrameState::Finished
                } else if t < start {
                    FrameState::Idle
                } else {
                    FrameState::Playing
                }
            }
            _ => FrameState::Idle,
        }
    }

    fn finish(&mut self) {
        self.playback = Playback::Ended;
    }
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

/// Plays (a region of) an [`AudioBuffer`], optionally looping.
pub(crate) struct BufferPlayback {
    pub schedule: Schedule,
    pub buffer: Option<AudioBuffer>,
    pub looping: bool,
    pub loop_start: f64,
    pub loop_end: f64,
    pub offset: f64,
    /// Read position in buffer frames, set on the first audible frame
    playhead: Option<f64>,
}

impl BufferPlayback {
    fn new() -> Self {
        Self {
            schedule: Schedule::new(),
            buffer: None,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            offset: 0.0,
            playhead: None,
        }
    }

    /// Loop region in buffer frames. Falls back to the whole buffer when
    /// the loop points do not describe a usable region.
    fn loop_region(loop_start: f64, loop_end: f64, buffer: &AudioBuffer) -> (f64, f64) {
        let rate = buffer.sample_rate() as f64;
        let len = buffer.length() as f64;
        let start = loop_start * rate;
        let end = (loop_end * rate).min(len);

        if loop_start >= 0.0 && loop_end > 0.0 && start < end {
            (start, end)
        } else {
            (0.0, len)
        }
    }

    /// Returns `true` if playback ended during this quantum.
    fn render(&mut self, ctx: &RenderContext, rate: f32, output: &mut Block) -> bool {
        let channels = match &self.buffer {
            Some(buffer) if self.schedule.is_playing() => buffer.number_of_channels(),
            _ => 1,
        };
        *output = silent_block(channels);

        for i in 0..RENDER_QUANTUM_SIZE {
            match self.schedule.frame_state(ctx.frame_time(i)) {
                FrameState::Idle => continue,
                FrameState::Finished => {
                    self.schedule.finish();
                    return true;
                }
                FrameState::Playing => {}
            }

            // no buffer: play silence until stopped
            let Some(buffer) = self.buffer.as_ref() else {
                continue;
            };
            let len = buffer.length() as f64;
            let looping = self.looping
                && !(ctx.quirks.refuses_single_sample_loops && buffer.length() <= 1);

            let offset = self.offset;
            let position = self
                .playhead
                .get_or_insert_with(|| (offset * buffer.sample_rate() as f64).min(len));

            if looping {
                let (start, end) = Self::loop_region(self.loop_start, self.loop_end, buffer);
                if *position >= end {
                    *position = start + (*position - end) % (end - start);
                }
            } else if *position >= len {
                self.schedule.finish();
                return true;
            }

            let index = (position.floor() as usize).min(buffer.length().saturating_sub(1));
            for (ch, out) in output.iter_mut().enumerate() {
                if let Some(data) = buffer.channel_data(ch) {
                    out[i] = data[index];
                }
            }

            *position += rate.max(0.0) as f64 * buffer.sample_rate() as f64 / ctx.sample_rate as f64;
        }
        false
    }
}

/// Emits its offset parameter while playing.
pub(crate) struct ConstantOutput {
    pub schedule: Schedule,
}

impl ConstantOutput {
    fn render(&mut self, ctx: &RenderContext, offset: &ParamValues, output: &mut Block) -> bool {
        *output = silent_block(1);

        for i in 0..RENDER_QUANTUM_SIZE {
            match self.schedule.frame_state(ctx.frame_time(i)) {
                FrameState::Idle => {}
                FrameState::Finished => {
                    self.schedule.finish();
                    return true;
                }
                FrameState::Playing => output[0][i] = offset[i],
            }
        }
        false
    }
}

/// Pushes the final mix into a ring buffer, interleaved.
pub(crate) struct Capture {
    pub producer: Option<Producer<f32>>,
}

impl Capture {
    fn push(&mut self, block: &Block) {
        let Some(producer) = self.producer.as_mut() else {
            return;
        };
        let channels = block.len();
        let samples_needed = RENDER_QUANTUM_SIZE * channels;

        // Skip if buffer is full
        if producer.slots() < samples_needed {
            tracing::trace!("capture buffer full, dropping quantum");
            return;
        }

        for i in 0..RENDER_QUANTUM_SIZE {
            for buffer in block {
                let _ = producer.push(buffer[i]);
            }
        }
    }
}

pub(crate) enum Kernel {
    Destination(Capture),
    Gain,
    BufferSource(BufferPlayback),
    ConstantSource(ConstantOutput),
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

pub(crate) struct RenderNode {
    pub kind: NodeKind,
    pub arity: NodeArity,
    pub channels: ChannelConfig,
    pub params: Vec<(ParamName, Timeline)>,
    pub kernel: Kernel,
    /// Most recent rendered block, per output
    pub outputs: Vec<Block>,
    /// No handle refers to this node anymore
    pub released: bool,
}

impl RenderNode {
    pub fn new(kind: NodeKind) -> Self {
        let (arity, channels, params, kernel) = match kind {
            NodeKind::Destination => (
                NodeArity { inputs: 1, outputs: 1 },
                ChannelConfig {
                    count: 2,
                    mode: ChannelCountMode::Explicit,
                    interpretation: ChannelInterpretation::Speakers,
                },
                vec![],
                Kernel::Destination(Capture { producer: None }),
            ),
            NodeKind::Gain => (
                NodeArity { inputs: 1, outputs: 1 },
                ChannelConfig::default(),
                vec![(ParamName::Gain, Timeline::new(ParamDescriptor::unbounded(1.0)))],
                Kernel::Gain,
            ),
            NodeKind::AudioBufferSource => (
                NodeArity { inputs: 0, outputs: 1 },
                ChannelConfig::default(),
                vec![
                    (ParamName::PlaybackRate, Timeline::new(ParamDescriptor::unbounded(1.0))),
                    (ParamName::Detune, Timeline::new(ParamDescriptor::unbounded(0.0))),
                ],
                Kernel::BufferSource(BufferPlayback::new()),
            ),
            NodeKind::ConstantSource => (
                NodeArity { inputs: 0, outputs: 1 },
                ChannelConfig::default(),
                vec![(ParamName::Offset, Timeline::new(ParamDescriptor::unbounded(1.0)))],
                Kernel::ConstantSource(ConstantOutput { schedule: Schedule::new() }),
            ),
        };

        Self {
            kind,
            arity,
            channels,
            params,
            kernel,
            outputs: vec![silent_block(1); arity.outputs],
            released: false,
        }
    }

    pub fn param(&self, name: ParamName) -> Option<&Timeline> {
        self.params.iter().find(|(n, _)| *n == name).map(|(_, tl)| tl)
    }

    pub fn param_mut(&mut self, name: ParamName) -> Option<&mut Timeline> {
        self.params.iter_mut().find(|(n, _)| *n == name).map(|(_, tl)| tl)
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        match &self.kernel {
            Kernel::BufferSource(playback) => Some(&playback.schedule),
            Kernel::ConstantSource(constant) => Some(&constant.schedule),
            _ => None,
        }
    }

    /// Whether this node can never produce sound again once no handle
    /// refers to it: a source that is not playing, or a processing node
    /// with nothing feeding it.
    pub fn is_spent(&self, has_inputs: bool) -> bool {
        match self.schedule() {
            Some(schedule) => !schedule.is_playing(),
            None => !has_inputs,
        }
    }

    pub fn schedule_mut(&mut self) -> Option<&mut Schedule> {
        match &mut self.kernel {
            Kernel::BufferSource(playback) => Some(&mut playback.schedule),
            Kernel::ConstantSource(constant) => Some(&mut constant.schedule),
            _ => None,
        }
    }

    pub fn playback(&self) -> Option<&BufferPlayback> {
        match &self.kernel {
            Kernel::BufferSource(playback) => Some(playback),
            _ => None,
        }
    }

    pub fn playback_mut(&mut self) -> Option<&mut BufferPlayback> {
        match &mut self.kernel {
            Kernel::BufferSource(playback) => Some(playback),
            _ => None,
        }
    }

    /// Render one quantum.
    ///
    /// `inputs` holds, per input port, the blocks of every connection into it.
    /// `modulation` holds the audio-rate connections into each parameter.
    /// Returns `true` if a source ended during this quantum.
    pub fn render(
        &mut self,
        ctx: &RenderContext,
        inputs: &[Vec<Block>],
        modulation: &[(ParamName, Block)],
    ) -> bool {
        let mixed: Vec<Block> = inputs
            .iter()
            .map(|connections| mix_input(connections, self.channels))
            .collect();

        let values: Vec<(ParamName, ParamValues)> = self
            .params
            .iter()
            .map(|(name, timeline)| (*name, param_values(ctx, timeline, *name, modulation)))
            .collect();
        let value_of = |name: ParamName| -> ParamValues {
            values
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .unwrap_or([0.0; RENDER_QUANTUM_SIZE])
        };

        let Some(output) = self.outputs.first_mut() else {
            return false;
        };

        match &mut self.kernel {
            Kernel::Destination(capture) => {
                let block = mixed.into_iter().next().unwrap_or_else(|| silent_block(1));
                capture.push(&block);
                *output = block;
                false
            }
            Kernel::Gain => {
                let input = mixed.first().cloned().unwrap_or_else(|| silent_block(1));
                *output = apply_gain(&input, &value_of(ParamName::Gain));
                false
            }
            Kernel::BufferSource(playback) => {
                // playbackRate and detune are k-rate
                let rate = value_of(ParamName::PlaybackRate)[0];
                let detune = value_of(ParamName::Detune)[0];
                let computed = rate * 2f32.powf(detune / 1200.0);
                playback.render(ctx, computed, output)
            }
            Kernel::ConstantSource(constant) => {
                constant.render(ctx, &value_of(ParamName::Offset), output)
            }
        }
    }
}

fn param_values(
    ctx: &RenderContext,
    timeline: &Timeline,
    name: ParamName,
    modulation: &[(ParamName, Block)],
) -> ParamValues {
    let mut values = [0.0; RENDER_QUANTUM_SIZE];

    if timeline.has_automation() {
        for (i, v) in values.iter_mut().enumerate() {
            *v = timeline.intrinsic_at(ctx.frame_time(i));
        }
    } else {
        values = [timeline.intrinsic_at(ctx.time); RENDER_QUANTUM_SIZE];
    }

    // audio-rate input is mixed down to mono and summed
    for (_, block) in modulation.iter().filter(|(n, _)| *n == name) {
        let mono = mix_to(block, 1, ChannelInterpretation::Speakers);
        for (v, s) in values.iter_mut().zip(mono[0].iter()) {
            *v += *s;
        }
    }

    for v in values.iter_mut() {
        *v = timeline.clamp(*v);
    }
    values
}

// adapted from the gain effect: no smoothing, the parameter is already per-frame
fn apply_gain(input: &Block, gain: &ParamValues) -> Block {
    let mut output = silent_block(input.len());
    for (out_buffer, in_buffer) in output.iter_mut().zip(input.iter()) {
        for ((out_sample, &in_sample), &g) in out_buffer.iter_mut().zip(in_buffer.iter()).zip(gain.iter()) {
            *out_sample = in_sample * g;
        }
    }
    output
}

// ---------------------------------------------------------------------------
// Channel mixing
// ---------------------------------------------------------------------------

/// Sum every connection into one input, using the node's channel rules.
pub(crate) fn mix_input(connections: &[Block], config: ChannelConfig) -> Block {
    let widest = connections.iter().map(Vec::len).max().unwrap_or(1);
    let count = config.count as usize;
    let computed = match config.mode {
        ChannelCountMode::Max => widest,
        ChannelCountMode::ClampedMax => widest.min(count),
        ChannelCountMode::Explicit => count,
    }
    .max(1);

    let mut output = silent_block(computed);
    for block in connections {
        let converted = mix_to(block, computed, config.interpretation);
        for (out_buf, in_buf) in output.iter_mut().zip(converted.iter()) {
            for (out_sample, in_sample) in out_buf.iter_mut().zip(in_buf.iter()) {
                *out_sample += *in_sample;
            }
        }
    }
    output
}

/// Up- or down-mix `block` to `channels` channels.
pub(crate) fn mix_to(block: &Block, channels: usize, interpretation: ChannelInterpretation) -> Block {
    let mut output = silent_block(channels);
    let input_channels = block.len();

    match (interpretation, input_channels, channels) {
        (_, a, b) if a == b => return block.clone(),
        // mono -> stereo: copy to both sides
        (ChannelInterpretation::Speakers, 1, 2) => {
            output[0].copy_from_slice(&block[0]);
            output[1].copy_from_slice(&block[0]);
        }
        // stereo -> mono: average
        (ChannelInterpretation::Speakers, 2, 1) => {
            for (i, out) in output[0].iter_mut().enumerate() {
                *out = 0.5 * (block[0][i] + block[1][i]);
            }
        }
        // discrete: copy what fits, leave the rest silent
        _ => {
            for (out_buf, in_buf) in output.iter_mut().zip(block.iter()) {
                out_buf.copy_from_slice(in_buf);
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(values: &[f32]) -> Block {
        values
            .iter()
            .map(|&v| {
                let mut b = Buffer::default();
                b.iter_mut().for_each(|s| *s = v);
                b
            })
            .collect()
    }

    fn ctx() -> RenderContext {
        RenderContext {
            sample_rate: 64.0,
            time: 0.0,
            quirks: Quirks::default(),
        }
    }

    #[test]
    fn speakers_upmix_copies_mono() {
        let out = mix_to(&block_of(&[0.5]), 2, ChannelInterpretation::Speakers);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|b| b.iter().all(|&s| s == 0.5)));
    }

    #[test]
    fn speakers_downmix_averages() {
        let out = mix_to(&block_of(&[1.0, 0.0]), 1, ChannelInterpretation::Speakers);
        assert!(out[0].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn discrete_upmix_leaves_extra_channels_silent() {
        let out = mix_to(&block_of(&[1.0]), 2, ChannelInterpretation::Discrete);
        assert!(out[0].iter().all(|&s| s == 1.0));
        assert!(out[1].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn clamped_max_limits_computed_channels() {
        let config = ChannelConfig {
            count: 1,
            mode: ChannelCountMode::ClampedMax,
            interpretation: ChannelInterpretation::Speakers,
        };
        let out = mix_input(&[block_of(&[1.0, 1.0]), block_of(&[0.5])], config);
        assert_eq!(out.len(), 1);
        assert!(out[0].iter().all(|&s| s == 1.5));
    }

    #[test]
    fn second_stop_replaces_pending_stop_time() {
        let mut schedule = Schedule::new();
        schedule.start(0.0, None).unwrap();
        schedule.stop(3.0, &Quirks::default()).unwrap();
        schedule.stop(2.0, &Quirks::default()).unwrap();
        assert_eq!(schedule.frame_state(2.5), FrameState::Finished);
        assert_eq!(schedule.frame_state(1.0), FrameState::Playing);
    }

    #[test]
    fn second_stop_throws_with_quirk() {
        let quirks = Quirks::conformant().with_throws_on_consecutive_stop(true);
        let mut schedule = Schedule::new();
        schedule.start(0.0, None).unwrap();
        schedule.stop(1.0, &quirks).unwrap();
        let err = schedule.stop(2.0, &quirks).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidState);
    }

    #[test]
    fn constant_output_respects_start_time() {
        // 64 Hz: one frame per 1/64 s, so frame 32 is t = 0.5
        let mut constant = ConstantOutput { schedule: Schedule::new() };
        constant.schedule.start(0.5, None).unwrap();
        let mut out = silent_block(1);
        let ended = constant.render(&ctx(), &[0.25; RENDER_QUANTUM_SIZE], &mut out);

        assert!(!ended);
        assert!(out[0][..32].iter().all(|&s| s == 0.0));
        assert!(out[0][32..].iter().all(|&s| s == 0.25));
    }

    #[test]
    fn looping_two_frame_buffer_repeats() {
        let mut buffer = AudioBuffer::silent(1, 2, 64.0);
        buffer.copy_to_channel(&[0.1, 0.2], 0);

        let mut playback = BufferPlayback::new();
        playback.buffer = Some(buffer);
        playback.looping = true;
        playback.schedule.start(0.0, None).unwrap();

        let mut out = silent_block(1);
        assert!(!playback.render(&ctx(), 1.0, &mut out));
        assert_eq!(&out[0][..4], &[0.1, 0.2, 0.1, 0.2]);
    }

    #[test]
    fn single_frame_loop_plays_once_with_quirk() {
        let mut buffer = AudioBuffer::silent(1, 1, 64.0);
        buffer.fill(1.0);

        let mut playback = BufferPlayback::new();
        playback.buffer = Some(buffer);
        playback.looping = true;
        playback.schedule.start(0.0, None).unwrap();

        let quirky = RenderContext {
            quirks: Quirks::conformant().with_refuses_single_sample_loops(true),
            ..ctx()
        };
        let mut out = silent_block(1);
        assert!(playback.render(&quirky, 1.0, &mut out));
        assert_eq!(out[0][0], 1.0);
        assert!(out[0][1..].iter().all(|&s| s == 0.0));
    }
}
