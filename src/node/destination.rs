use std::rc::Rc;

use super::core::NodeCore;
use super::impl_native_audio_node;

/// The output of a context. Obtained from [`HostContext::destination`](crate::host::HostContext::destination).
#[derive(Clone)]
pub struct AudioDestinationNode {
    pub(crate) core: Rc<NodeCore>,
}

impl AudioDestinationNode {
    pub(crate) fn from_core(core: Rc<NodeCore>) -> Self {
        Self { core }
    }
}

impl_native_audio_node!(AudioDestinationNode);
