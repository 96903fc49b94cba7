use std::rc::Rc;

use crate::error::HostError;
use crate::host::{HostContext, NodeKind, ParamName};

use super::core::NodeCore;
use super::{
    impl_native_audio_node, AudioParam, AudioScheduledSourceNode, ConstantSourceNode,
    NativeScheduledSourceNode,
};

/// A constant source provided by the host itself.
///
/// Hosts without one fail to create it with `NotSupportedError`; see
/// [`fake_constant_source_node`](crate::faker::fake_constant_source_node).
#[derive(Clone)]
pub struct NativeConstantSourceNode {
    pub(crate) core: Rc<NodeCore>,
}

impl NativeConstantSourceNode {
    pub(crate) fn create(context: &HostContext) -> Result<Self, HostError> {
        let id = context.create_node(NodeKind::ConstantSource)?;
        Ok(Self {
            core: NodeCore::new(context, id, NodeKind::ConstantSource),
        })
    }
}

impl_native_audio_node!(NativeConstantSourceNode);

impl AudioScheduledSourceNode for NativeConstantSourceNode {
    fn start(&self, when: f64) -> Result<(), HostError> {
        self.core
            .context()
            .backend_mut(|b| b.start(self.core.id(), when, 0.0, None))
    }

    fn stop(&self, when: f64) -> Result<(), HostError> {
        self.core.stop(when)
    }
}

impl ConstantSourceNode for NativeConstantSourceNode {
    fn offset(&self) -> AudioParam {
        AudioParam::new(Rc::clone(&self.core), ParamName::Offset)
    }
}

impl NativeScheduledSourceNode for NativeConstantSourceNode {}
