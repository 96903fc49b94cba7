use std::rc::Rc;

use crate::error::HostError;
use crate::host::{HostContext, NodeKind, ParamName};

use super::core::NodeCore;
use super::{impl_native_audio_node, AudioParam};

/// A native gain stage: one input, one output, an a-rate `gain` parameter.
#[derive(Clone)]
pub struct GainNode {
    pub(crate) core: Rc<NodeCore>,
}

impl GainNode {
    pub(crate) fn create(context: &HostContext) -> Result<Self, HostError> {
        let id = context.create_node(NodeKind::Gain)?;
        Ok(Self {
            core: NodeCore::new(context, id, NodeKind::Gain),
        })
    }

    pub fn gain(&self) -> AudioParam {
        AudioParam::new(Rc::clone(&self.core), ParamName::Gain)
    }
}

impl_native_audio_node!(GainNode);
