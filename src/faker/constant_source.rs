use std::fmt;

use crate::capability::probes::test_stop_method_consecutive_calls_support;
use crate::capability::{CapabilityCache, STOP_METHOD_CONSECUTIVE_CALLS_SUPPORT};
use crate::error::HostError;
use crate::event::{Event, EventKind, EventListener, ListenerId, ListenerOptions};
use crate::host::{HostContext, ParamName};
use crate::node::sealed::{InputTarget, Sealed};
use crate::node::{
    AudioBufferSourceNode, AudioNode, AudioParam, AudioScheduledSourceNode, ConstantSourceNode,
    Destination, Disconnect, GainNode,
};
use crate::options::{
    AudioBufferSourceOptions, ChannelCountMode, ChannelInterpretation, ConstantSourceOptions,
    GainOptions,
};
use crate::primitive::{create_native_audio_buffer_source_node, create_native_gain_node};
use crate::wrapper::wrap_stop_method_consecutive_calls;

/// Frames in the looped buffer. Some hosts refuse to loop a single frame.
const LOOP_LENGTH: usize = 2;

/// A constant source assembled from a looping buffer source and a gain stage.
///
/// The buffer holds ones, so the gain stage's `gain` parameter is the
/// emitted value and doubles as the facade's `offset`. Playback control and
/// events belong to the buffer source; connections and channel settings
/// belong to the gain stage, which is the facade's output. The edge between
/// the two is internal and cannot be disconnected from outside.
#[derive(Clone)]
pub struct ConstantSourceNodeFaker {
    source: AudioBufferSourceNode,
    gain: GainNode,
}

/// Build a constant source on `context` without a native one.
///
/// `cache` decides whether the internal source needs
/// [`wrap_stop_method_consecutive_calls`]. Host errors propagate; nothing
/// already created is rolled back.
pub fn fake_constant_source_node(
    context: &HostContext,
    cache: &CapabilityCache,
    options: &ConstantSourceOptions,
) -> Result<ConstantSourceNodeFaker, HostError> {
    let mut buffer = context.create_buffer(1, LOOP_LENGTH, context.sample_rate())?;
    buffer.fill(1.0);
    let loop_end = buffer.duration();

    let source = create_native_audio_buffer_source_node(
        context,
        &AudioBufferSourceOptions {
            buffer: Some(buffer),
            r#loop: Some(true),
            loop_start: Some(0.0),
            loop_end: Some(loop_end),
            ..AudioBufferSourceOptions::default()
        },
    )?;
    let gain = create_native_gain_node(
        context,
        &GainOptions {
            audio_node: options.audio_node,
            gain: options.offset,
        },
    )?;

    // wrap before wiring, so the internal edge runs through the splice
    let consecutive_stops = cache.resolve(
        STOP_METHOD_CONSECUTIVE_CALLS_SUPPORT,
        context,
        test_stop_method_consecutive_calls_support,
    )?;
    if !consecutive_stops {
        wrap_stop_method_consecutive_calls(&source, context)?;
    }

    source.connect(Destination::node(&gain), 0)?;

    tracing::debug!(
        context = %context.id(),
        wrapped = !consecutive_stops,
        "faked constant source"
    );
    Ok(ConstantSourceNodeFaker { source, gain })
}

impl Sealed for ConstantSourceNodeFaker {
    fn input_target(&self) -> InputTarget {
        // a constant source has no inputs, and neither has the buffer source
        self.source.input_target()
    }
}

impl AudioNode for ConstantSourceNodeFaker {
    delegate::delegate! {
        to self.gain {
            fn context(&self) -> &HostContext;
            fn number_of_outputs(&self) -> usize;
            fn channel_count(&self) -> u32;
            fn set_channel_count(&self, count: u32) -> Result<(), HostError>;
            fn channel_count_mode(&self) -> ChannelCountMode;
            fn set_channel_count_mode(&self, mode: ChannelCountMode) -> Result<(), HostError>;
            fn channel_interpretation(&self) -> ChannelInterpretation;
            fn set_channel_interpretation(&self, interpretation: ChannelInterpretation) -> Result<(), HostError>;
            fn connect<'a>(
                &self,
                destination: Destination<'a>,
                output: usize,
            ) -> Result<Option<&'a dyn AudioNode>, HostError>;
            fn disconnect(&self, selection: Disconnect<'_>) -> Result<(), HostError>;
        }

        to self.source {
            fn number_of_inputs(&self) -> usize;
            fn add_event_listener(
                &self,
                kind: EventKind,
                listener: EventListener,
                options: ListenerOptions,
            ) -> ListenerId;
            fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool;
            fn dispatch_event(&self, event: &Event) -> bool;
        }
    }
}

impl AudioScheduledSourceNode for ConstantSourceNodeFaker {
    delegate::delegate! {
        to self.source {
            fn start(&self, when: f64) -> Result<(), HostError>;
            fn stop(&self, when: f64) -> Result<(), HostError>;
        }
    }
}

impl ConstantSourceNode for ConstantSourceNodeFaker {
    fn offset(&self) -> AudioParam {
        self.gain.gain().exposed_as(ParamName::Offset)
    }
}

impl PartialEq for ConstantSourceNodeFaker {
    fn eq(&self, other: &Self) -> bool {
        self.gain == other.gain
    }
}

impl Eq for ConstantSourceNodeFaker {}

impl fmt::Debug for ConstantSourceNodeFaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantSourceNodeFaker")
            .field("context", &self.gain.context().id())
            .field("offset", &self.offset().value())
            .finish()
    }
}
