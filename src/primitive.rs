//! Factories for single native nodes.
//!
//! Each factory creates exactly one node, applies the shared channel options
//! and the node's own parameters, and leaves it unconnected. Host errors
//! propagate unchanged; a half-configured node is simply dropped.

use crate::error::HostError;
use crate::host::HostContext;
use crate::node::{
    AudioBufferSourceNode, AudioNode, ConstantSourceNode, GainNode, NativeConstantSourceNode,
};
use crate::options::{AudioBufferSourceOptions, AudioNodeOptions, ConstantSourceOptions, GainOptions};

/// Assign every channel option that is set. Unset options keep the node's defaults.
pub fn assign_native_audio_node_options(
    node: &dyn AudioNode,
    options: &AudioNodeOptions,
) -> Result<(), HostError> {
    if let Some(count) = options.channel_count {
        node.set_channel_count(count)?;
    }
    if let Some(mode) = options.channel_count_mode {
        node.set_channel_count_mode(mode)?;
    }
    if let Some(interpretation) = options.channel_interpretation {
        node.set_channel_interpretation(interpretation)?;
    }
    Ok(())
}

pub fn create_native_gain_node(context: &HostContext, options: &GainOptions) -> Result<GainNode, HostError> {
    let node = GainNode::create(context)?;
    assign_native_audio_node_options(&node, &options.audio_node)?;

    if let Some(gain) = options.gain {
        node.gain().set_value(gain)?;
    }
    Ok(node)
}

pub fn create_native_audio_buffer_source_node(
    context: &HostContext,
    options: &AudioBufferSourceOptions,
) -> Result<AudioBufferSourceNode, HostError> {
    let node = AudioBufferSourceNode::create(context)?;
    assign_native_audio_node_options(&node, &options.audio_node)?;

    if let Some(buffer) = &options.buffer {
        node.set_buffer(Some(buffer.clone()))?;
    }
    if let Some(detune) = options.detune {
        node.detune().set_value(detune)?;
    }
    if let Some(looping) = options.r#loop {
        node.set_loop(looping)?;
    }
    if let Some(loop_end) = options.loop_end {
        node.set_loop_end(loop_end)?;
    }
    if let Some(loop_start) = options.loop_start {
        node.set_loop_start(loop_start)?;
    }
    if let Some(rate) = options.playback_rate {
        node.playback_rate().set_value(rate)?;
    }
    Ok(node)
}

/// Fails with `NotSupportedError` on hosts without a native constant source.
pub fn create_native_constant_source_node(
    context: &HostContext,
    options: &ConstantSourceOptions,
) -> Result<NativeConstantSourceNode, HostError> {
    let node = NativeConstantSourceNode::create(context)?;
    assign_native_audio_node_options(&node, &options.audio_node)?;

    if let Some(offset) = options.offset {
        node.offset().set_value(offset)?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::{Quirks, SoftwareHost};
    use crate::options::{ChannelCountMode, ChannelInterpretation};

    fn context() -> HostContext {
        HostContext::new(SoftwareHost::new(48000.0))
    }

    #[test]
    fn gain_defaults_match_the_host() {
        let context = context();
        let gain = create_native_gain_node(&context, &GainOptions::default()).unwrap();
        assert_eq!(gain.gain().value(), 1.0);
        assert_eq!(gain.channel_count(), 2);
        assert_eq!(gain.channel_count_mode(), ChannelCountMode::Max);
        assert_eq!(gain.channel_interpretation(), ChannelInterpretation::Speakers);
    }

    #[test]
    fn shared_options_are_applied() {
        let context = context();
        let options = GainOptions {
            audio_node: AudioNodeOptions::default()
                .with_channel_count(1)
                .with_channel_count_mode(ChannelCountMode::Explicit)
                .with_channel_interpretation(ChannelInterpretation::Discrete),
            gain: Some(0.25),
        };
        let gain = create_native_gain_node(&context, &options).unwrap();

        assert_eq!(gain.channel_count(), 1);
        assert_eq!(gain.channel_count_mode(), ChannelCountMode::Explicit);
        assert_eq!(gain.channel_interpretation(), ChannelInterpretation::Discrete);
        assert_eq!(gain.gain().value(), 0.25);
    }

    #[test]
    fn invalid_channel_count_propagates() {
        let context = context();
        let options = GainOptions {
            audio_node: AudioNodeOptions::default().with_channel_count(0),
            gain: None,
        };
        let err = create_native_gain_node(&context, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
    }

    #[test]
    fn buffer_source_takes_loop_settings() {
        let context = context();
        let buffer = context.create_buffer(1, 4, 48000.0).unwrap();
        let options = AudioBufferSourceOptions::default()
            .with_buffer(buffer.clone())
            .with_loop(true)
            .with_loop_points(0.0, 4.0 / 48000.0)
            .with_playback_rate(2.0);
        let source = create_native_audio_buffer_source_node(&context, &options).unwrap();

        assert_eq!(source.buffer(), Some(buffer));
        assert!(source.is_looping());
        assert_eq!(source.loop_end(), 4.0 / 48000.0);
        assert_eq!(source.playback_rate().value(), 2.0);
        assert_eq!(source.number_of_inputs(), 0);
    }

    #[test]
    fn constant_source_needs_host_support() {
        let context = HostContext::new(SoftwareHost::new(48000.0).with_quirks(Quirks::legacy()));
        let err = create_native_constant_source_node(&context, &ConstantSourceOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
    }

    #[test]
    fn constant_source_offset_is_applied() {
        let context = context();
        let options = ConstantSourceOptions::default().with_offset(0.5);
        let source = create_native_constant_source_node(&context, &options).unwrap();
        assert_eq!(source.offset().value(), 0.5);
        assert_eq!(source.offset().default_value(), 1.0);
    }

    #[test]
    fn factories_do_not_connect() {
        let context = context();
        let _gain = create_native_gain_node(&context, &GainOptions::default()).unwrap();
        let _source =
            create_native_audio_buffer_source_node(&context, &AudioBufferSourceOptions::default())
                .unwrap();
        assert_eq!(context.connection_count(), 0);
        assert_eq!(context.node_count(), 3);
    }
}
