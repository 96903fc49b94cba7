use std::rc::Rc;

use crate::buffer::AudioBuffer;
use crate::error::HostError;
use crate::host::{HostContext, NodeKind, ParamName};

use super::core::NodeCore;
use super::{impl_native_audio_node, AudioParam, AudioScheduledSourceNode, NativeScheduledSourceNode};

/// A native buffer player.
///
/// Plays its buffer once, or loops the region between `loop_start` and
/// `loop_end` (the whole buffer when both are zero).
#[derive(Clone)]
pub struct AudioBufferSourceNode {
    pub(crate) core: Rc<NodeCore>,
}

impl AudioBufferSourceNode {
    pub(crate) fn create(context: &HostContext) -> Result<Self, HostError> {
        let id = context.create_node(NodeKind::AudioBufferSource)?;
        Ok(Self {
            core: NodeCore::new(context, id, NodeKind::AudioBufferSource),
        })
    }

    fn host(&self) -> &HostContext {
        self.core.context()
    }

    pub fn buffer(&self) -> Option<AudioBuffer> {
        self.host().backend(|b| b.buffer(self.core.id()))
    }

    /// Assign the buffer. A buffer can only be assigned once; clearing it is always allowed.
    pub fn set_buffer(&self, buffer: Option<AudioBuffer>) -> Result<(), HostError> {
        self.host().backend_mut(|b| b.set_buffer(self.core.id(), buffer))
    }

    pub fn is_looping(&self) -> bool {
        self.host().backend(|b| b.is_looping(self.core.id()))
    }

    pub fn set_loop(&self, looping: bool) -> Result<(), HostError> {
        self.host().backend_mut(|b| b.set_loop(self.core.id(), looping))
    }

    pub fn loop_start(&self) -> f64 {
        self.host().backend(|b| b.loop_start(self.core.id()))
    }

    pub fn set_loop_start(&self, seconds: f64) -> Result<(), HostError> {
        self.host().backend_mut(|b| b.set_loop_start(self.core.id(), seconds))
    }

    pub fn loop_end(&self) -> f64 {
        self.host().backend(|b| b.loop_end(self.core.id()))
    }

    pub fn set_loop_end(&self, seconds: f64) -> Result<(), HostError> {
        self.host().backend_mut(|b| b.set_loop_end(self.core.id(), seconds))
    }

    pub fn playback_rate(&self) -> AudioParam {
        AudioParam::new(Rc::clone(&self.core), ParamName::PlaybackRate)
    }

    pub fn detune(&self) -> AudioParam {
        AudioParam::new(Rc::clone(&self.core), ParamName::Detune)
    }

    /// Start at `when`, `offset` seconds into the buffer, for at most `duration` seconds.
    pub fn start_with(&self, when: f64, offset: f64, duration: Option<f64>) -> Result<(), HostError> {
        self.host()
            .backend_mut(|b| b.start(self.core.id(), when, offset, duration))
    }
}

impl_native_audio_node!(AudioBufferSourceNode);

impl AudioScheduledSourceNode for AudioBufferSourceNode {
    fn start(&self, when: f64) -> Result<(), HostError> {
        self.start_with(when, 0.0, None)
    }

    fn stop(&self, when: f64) -> Result<(), HostError> {
        self.core.stop(when)
    }
}

impl NativeScheduledSourceNode for AudioBufferSourceNode {}
