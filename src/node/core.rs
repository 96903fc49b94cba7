//! State shared by all handles to one native node.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::HostError;
use crate::event::{Event, EventKind, EventListener, EventTarget, ListenerId, ListenerOptions};
use crate::host::{
    ContextId, DisconnectSelector, DisconnectTarget, Endpoint, HostContext, NodeId, NodeKind,
};
use crate::options::{ChannelCountMode, ChannelInterpretation};

use super::sealed::InputTarget;
use super::{AudioNode, Destination, Disconnect};

/// A connection request with its destination already resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub context: ContextId,
    pub endpoint: Endpoint,
}

/// A disconnect request with its target already resolved.
///
/// `context` is `None` when the selection names no node or parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unlink {
    pub context: Option<ContextId>,
    pub selector: DisconnectSelector,
}

pub type ConnectFn = Rc<dyn Fn(usize, Link) -> Result<(), HostError>>;
pub type DisconnectFn = Rc<dyn Fn(Unlink) -> Result<(), HostError>>;
pub type StopFn = Rc<dyn Fn(f64) -> Result<(), HostError>>;
pub type EndedHook = Box<dyn FnOnce()>;

/// The installable methods of a node.
///
/// Everything a handle does that a wrapper may need to correct goes through
/// this table. Replacing an entry patches every handle to the node at once.
#[derive(Clone)]
pub struct Methods {
    pub connect: ConnectFn,
    pub disconnect: DisconnectFn,
    pub stop: StopFn,
}

impl Methods {
    fn native(context: &HostContext, id: NodeId, kind: NodeKind) -> Self {
        let ctx = context.clone();
        let connect: ConnectFn =
            Rc::new(move |output, link| ctx.connect(id, output, link.context, link.endpoint));

        let ctx = context.clone();
        let disconnect: DisconnectFn =
            Rc::new(move |unlink| ctx.disconnect(id, unlink.context, unlink.selector));

        let stop: StopFn = match kind {
            NodeKind::AudioBufferSource | NodeKind::ConstantSource => {
                let ctx = context.clone();
                Rc::new(move |when| ctx.backend_mut(|b| b.stop(id, when)))
            }
            _ => Rc::new(move |_| {
                Err(HostError::invalid_access(format!("{id} is not a scheduled source")))
            }),
        };

        Self {
            connect,
            disconnect,
            stop,
        }
    }
}

/// One native node as seen from this side of the host.
///
/// Dropping the last core releases the node in the host, which reclaims it
/// once nothing it feeds depends on it anymore.
pub struct NodeCore {
    context: HostContext,
    id: NodeId,
    kind: NodeKind,
    events: EventTarget,
    methods: RefCell<Methods>,
    /// Run when the host reports playback finished, before listeners.
    /// Not reachable through `dispatch_event`.
    ended_hooks: RefCell<Vec<EndedHook>>,
}

impl NodeCore {
    pub fn new(context: &HostContext, id: NodeId, kind: NodeKind) -> Rc<Self> {
        let core = Rc::new(Self {
            context: context.clone(),
            id,
            kind,
            events: EventTarget::new(),
            methods: RefCell::new(Methods::native(context, id, kind)),
            ended_hooks: RefCell::new(Vec::new()),
        });
        context.register(&core);
        core
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[inline]
    pub fn context(&self) -> &HostContext {
        &self.context
    }

    /// Run `hook` once the host reports that this node finished playing.
    pub fn on_host_ended(&self, hook: EndedHook) {
        self.ended_hooks.borrow_mut().push(hook);
    }

    /// The host finished this node: run the internal hooks, then the listeners.
    pub(crate) fn host_ended(&self) {
        let hooks = std::mem::take(&mut *self.ended_hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
        self.events.dispatch(&Event::ended());
    }

    pub fn input_target(&self) -> InputTarget {
        InputTarget {
            context: self.context.id(),
            node: self.id,
        }
    }

    /// The currently installed methods.
    pub fn methods(&self) -> Methods {
        self.methods.borrow().clone()
    }

    /// Install `connect` and `disconnect` overrides.
    pub fn install_routing(&self, connect: ConnectFn, disconnect: DisconnectFn) {
        let mut methods = self.methods.borrow_mut();
        methods.connect = connect;
        methods.disconnect = disconnect;
    }

    pub fn install_stop(&self, stop: StopFn) {
        self.methods.borrow_mut().stop = stop;
    }

    // cloned out of the table so an installed method may reach the table itself
    pub fn connect_link(&self, output: usize, link: Link) -> Result<(), HostError> {
        let connect = Rc::clone(&self.methods.borrow().connect);
        connect(output, link)
    }

    pub fn disconnect_unlink(&self, unlink: Unlink) -> Result<(), HostError> {
        let disconnect = Rc::clone(&self.methods.borrow().disconnect);
        disconnect(unlink)
    }

    pub fn stop(&self, when: f64) -> Result<(), HostError> {
        let stop = Rc::clone(&self.methods.borrow().stop);
        stop(when)
    }

    pub fn number_of_inputs(&self) -> usize {
        self.context.backend(|b| b.arity(self.id)).inputs
    }

    pub fn number_of_outputs(&self) -> usize {
        self.context.backend(|b| b.arity(self.id)).outputs
    }

    pub fn channel_count(&self) -> u32 {
        self.context.backend(|b| b.channel_config(self.id)).count
    }

    pub fn set_channel_count(&self, count: u32) -> Result<(), HostError> {
        self.context.backend_mut(|b| b.set_channel_count(self.id, count))
    }

    pub fn channel_count_mode(&self) -> ChannelCountMode {
        self.context.backend(|b| b.channel_config(self.id)).mode
    }

    pub fn set_channel_count_mode(&self, mode: ChannelCountMode) -> Result<(), HostError> {
        self.context.backend_mut(|b| b.set_channel_count_mode(self.id, mode))
    }

    pub fn channel_interpretation(&self) -> ChannelInterpretation {
        self.context.backend(|b| b.channel_config(self.id)).interpretation
    }

    pub fn set_channel_interpretation(&self, interpretation: ChannelInterpretation) -> Result<(), HostError> {
        self.context
            .backend_mut(|b| b.set_channel_interpretation(self.id, interpretation))
    }

    pub fn connect<'a>(
        &self,
        destination: Destination<'a>,
        output: usize,
    ) -> Result<Option<&'a dyn AudioNode>, HostError> {
        match destination {
            Destination::Node { node, input } => {
                let target = node.input_target();
                let link = Link {
                    context: target.context,
                    endpoint: Endpoint::Input {
                        node: target.node,
                        input,
                    },
                };
                self.connect_link(output, link)?;
                Ok(Some(node))
            }
            Destination::Param(param) => {
                let link = Link {
                    context: param.context().id(),
                    endpoint: Endpoint::Param(param.id()),
                };
                self.connect_link(output, link)?;
                Ok(None)
            }
        }
    }

    pub fn disconnect(&self, selection: Disconnect<'_>) -> Result<(), HostError> {
        self.disconnect_unlink(resolve_disconnect(selection))
    }

    pub fn add_event_listener(
        &self,
        kind: EventKind,
        listener: EventListener,
        options: ListenerOptions,
    ) -> ListenerId {
        self.events.add(kind, listener, options)
    }

    pub fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        self.events.remove(kind, id)
    }

    pub fn dispatch_event(&self, event: &Event) -> bool {
        self.events.dispatch(event)
    }
}

impl Drop for NodeCore {
    fn drop(&mut self) {
        tracing::trace!(context = %self.context.id(), node = %self.id, "node handle dropped");
        self.context.release(self.id);
    }
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("context", &self.context.id())
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Turn a disconnect overload into the host's selector.
pub fn resolve_disconnect(selection: Disconnect<'_>) -> Unlink {
    let node_target = |node: &dyn AudioNode, input: Option<usize>| {
        let target = node.input_target();
        (
            Some(target.context),
            Some(DisconnectTarget::Node {
                node: target.node,
                input,
            }),
        )
    };

    let (output, (context, target)) = match selection {
        Disconnect::All => (None, (None, None)),
        Disconnect::Output(output) => (Some(output), (None, None)),
        Disconnect::Node(node) => (None, node_target(node, None)),
        Disconnect::NodeOutput(node, output) => (Some(output), node_target(node, None)),
        Disconnect::NodeOutputInput(node, output, input) => {
            (Some(output), node_target(node, Some(input)))
        }
        Disconnect::Param(param) => (
            None,
            (Some(param.context().id()), Some(DisconnectTarget::Param(param.id()))),
        ),
        Disconnect::ParamOutput(param, output) => (
            Some(output),
            (Some(param.context().id()), Some(DisconnectTarget::Param(param.id()))),
        ),
    };

    Unlink {
        context,
        selector: DisconnectSelector { output, target },
    }
}
