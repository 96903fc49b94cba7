//! Shared handle to one host instance.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use crate::buffer::AudioBuffer;
use crate::capability::CapabilityCache;
use crate::error::HostError;
use crate::node::core::NodeCore;
use crate::node::AudioDestinationNode;

use super::{Backend, ContextId, ContextState, DisconnectSelector, Endpoint, NodeId, NodeKind};

/// A live host context: the owner of a processing graph.
///
/// `HostContext` is a cheap reference-counted handle. Cloning it hands out
/// another reference to the *same* context; equality is identity. Nodes keep
/// their context alive, mirroring how a native node is only valid while its
/// owning context exists.
///
/// # Example
///
/// ```
/// use gleichklang::host::{HostContext, SoftwareHost};
///
/// let context = HostContext::new(SoftwareHost::new(48000.0));
/// assert_eq!(context.sample_rate(), 48000.0);
/// assert_eq!(context.clone(), context);
/// ```
#[derive(Clone)]
pub struct HostContext {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    id: ContextId,
    backend: RefCell<Box<dyn Backend>>,
    /// Routes host notifications back to node handles. Weak, so handles can drop.
    nodes: RefCell<HashMap<NodeId, Weak<NodeCore>>>,
    /// Releases queued by dropped handles, applied on the next backend access.
    pending_releases: RefCell<Vec<NodeId>>,
}

impl HostContext {
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        let id = ContextId::next();
        tracing::debug!(context = %id, "host context created");

        Self {
            inner: Rc::new(ContextInner {
                id,
                backend: RefCell::new(Box::new(backend)),
                nodes: RefCell::new(HashMap::new()),
                pending_releases: RefCell::new(Vec::new()),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn sample_rate(&self) -> f32 {
        self.backend(|b| b.sample_rate())
    }

    pub fn current_time(&self) -> f64 {
        self.backend(|b| b.current_time())
    }

    pub fn state(&self) -> ContextState {
        self.backend(|b| b.state())
    }

    /// The final node of the graph.
    pub fn destination(&self) -> AudioDestinationNode {
        let id = self.backend(|b| b.destination());
        let existing = self.inner.nodes.borrow().get(&id).and_then(Weak::upgrade);
        match existing {
            Some(core) => AudioDestinationNode::from_core(core),
            None => AudioDestinationNode::from_core(NodeCore::new(self, id, NodeKind::Destination)),
        }
    }

    pub fn create_buffer(
        &self,
        number_of_channels: usize,
        length: usize,
        sample_rate: f32,
    ) -> Result<AudioBuffer, HostError> {
        self.backend(|b| b.create_buffer(number_of_channels, length, sample_rate))
    }

    /// Render `quanta` render quanta, delivering "ended" events as sources finish.
    pub fn advance(&self, quanta: usize) -> Result<(), HostError> {
        for _ in 0..quanta {
            let ended = self.backend_mut(|b| b.process())?;

            for id in ended {
                // registry borrow must end before listeners run
                let core = self.inner.nodes.borrow().get(&id).and_then(Weak::upgrade);
                if let Some(core) = core {
                    tracing::trace!(context = %self.id(), node = %id, "delivering ended");
                    core.host_ended();
                }
            }
        }
        Ok(())
    }

    /// Close the context. Later graph operations fail with `InvalidStateError`.
    pub fn close(&self) -> Result<(), HostError> {
        tracing::debug!(context = %self.id(), "closing host context");
        self.backend_mut(|b| b.close())
    }

    /// Nodes the host keeps alive, including the destination.
    pub fn node_count(&self) -> usize {
        self.backend_mut(|b| b.node_count())
    }

    /// Live connections in the host graph.
    pub fn connection_count(&self) -> usize {
        self.backend_mut(|b| b.connection_count())
    }

    pub(crate) fn backend<R>(&self, f: impl FnOnce(&dyn Backend) -> R) -> R {
        f(self.inner.backend.borrow().as_ref())
    }

    pub(crate) fn backend_mut<R>(&self, f: impl FnOnce(&mut dyn Backend) -> R) -> R {
        let mut backend = self.inner.backend.borrow_mut();
        let pending: Vec<NodeId> = self.inner.pending_releases.borrow_mut().drain(..).collect();
        for id in pending {
            backend.release(id);
        }
        f(backend.as_mut())
    }

    pub(crate) fn create_node(&self, kind: NodeKind) -> Result<NodeId, HostError> {
        self.backend_mut(|b| b.create_node(kind))
    }

    pub(crate) fn register(&self, core: &Rc<NodeCore>) {
        self.inner
            .nodes
            .borrow_mut()
            .insert(core.id(), Rc::downgrade(core));
    }

    /// Called when the last handle to a node is dropped.
    pub(crate) fn release(&self, id: NodeId) {
        self.inner.nodes.borrow_mut().remove(&id);
        self.inner.pending_releases.borrow_mut().push(id);
    }

    pub(crate) fn connect(
        &self,
        from: NodeId,
        output: usize,
        target_context: ContextId,
        to: Endpoint,
    ) -> Result<(), HostError> {
        if target_context != self.id() {
            return Err(HostError::invalid_access(
                "cannot connect to a node or parameter of another context",
            ));
        }
        self.backend_mut(|b| b.connect(from, output, to))
    }

    pub(crate) fn disconnect(
        &self,
        from: NodeId,
        target_context: Option<ContextId>,
        selector: DisconnectSelector,
    ) -> Result<(), HostError> {
        if matches!(target_context, Some(ctx) if ctx != self.id()) {
            return Err(HostError::invalid_access(
                "the given destination is not connected to this node",
            ));
        }
        self.backend_mut(|b| b.disconnect(from, selector))
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        tracing::debug!(context = %self.id, "host context dropped");
        CapabilityCache::forget_global(self.id);
    }
}

impl PartialEq for HostContext {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for HostContext {}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext").field("id", &self.inner.id).finish()
    }
}
