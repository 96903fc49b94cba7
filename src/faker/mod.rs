//! Stand-ins for node types a host does not provide.
//!
//! A faker assembles a small private graph of native nodes that together
//! behave like the missing node, and returns a facade implementing the same
//! traits a native node would. [`fake`] picks the faker by node type.
//!
//! ```
//! use gleichklang::capability::CapabilityCache;
//! use gleichklang::faker::{fake, FakeOptions};
//! use gleichklang::host::{HostContext, Quirks, SoftwareHost};
//! use gleichklang::node::{AudioNode, AudioScheduledSourceNode, Destination};
//! use gleichklang::options::ConstantSourceOptions;
//!
//! let context = HostContext::new(SoftwareHost::new(48000.0).with_quirks(Quirks::legacy()));
//! let cache = CapabilityCache::new();
//!
//! let node = fake(
//!     &context,
//!     &cache,
//!     FakeOptions::ConstantSource(ConstantSourceOptions::default().with_offset(0.5)),
//! )
//! .unwrap();
//! node.connect(Destination::node(&context.destination()), 0).unwrap();
//! node.start(0.0).unwrap();
//! ```

mod constant_source;

pub use constant_source::{fake_constant_source_node, ConstantSourceNodeFaker};

use crate::capability::CapabilityCache;
use crate::error::HostError;
use crate::event::{Event, EventKind, EventListener, ListenerId, ListenerOptions};
use crate::host::HostContext;
use crate::node::sealed::{InputTarget, Sealed};
use crate::node::{AudioNode, AudioScheduledSourceNode, Destination, Disconnect};
use crate::options::{ChannelCountMode, ChannelInterpretation, ConstantSourceOptions};

/// Construction options, tagged with the node type to fake.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FakeOptions {
    ConstantSource(ConstantSourceOptions),
}

/// A facade produced by [`fake`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FacadeNode {
    ConstantSource(ConstantSourceNodeFaker),
}

impl FacadeNode {
    pub fn as_constant_source(&self) -> Option<&ConstantSourceNodeFaker> {
        match self {
            FacadeNode::ConstantSource(node) => Some(node),
        }
    }
}

impl From<ConstantSourceNodeFaker> for FacadeNode {
    fn from(node: ConstantSourceNodeFaker) -> Self {
        FacadeNode::ConstantSource(node)
    }
}

/// Fake the node type named by `options` on `context`.
pub fn fake(context: &HostContext, cache: &CapabilityCache, options: FakeOptions) -> Result<FacadeNode, HostError> {
    match options {
        FakeOptions::ConstantSource(options) => {
            fake_constant_source_node(context, cache, &options).map(FacadeNode::from)
        }
    }
}

/// Expand to `$body` with `$node` bound to the facade behind every variant.
macro_rules! each_facade {
    ($facade:expr, $node:ident => $body:expr) => {
        match $facade {
            FacadeNode::ConstantSource($node) => $body,
        }
    };
}

impl Sealed for FacadeNode {
    fn input_target(&self) -> InputTarget {
        each_facade!(self, node => node.input_target())
    }
}

impl AudioNode for FacadeNode {
    fn context(&self) -> &HostContext {
        each_facade!(self, node => node.context())
    }

    fn number_of_inputs(&self) -> usize {
        each_facade!(self, node => node.number_of_inputs())
    }

    fn number_of_outputs(&self) -> usize {
        each_facade!(self, node => node.number_of_outputs())
    }

    fn channel_count(&self) -> u32 {
        each_facade!(self, node => node.channel_count())
    }

    fn set_channel_count(&self, count: u32) -> Result<(), HostError> {
        each_facade!(self, node => node.set_channel_count(count))
    }

    fn channel_count_mode(&self) -> ChannelCountMode {
        each_facade!(self, node => node.channel_count_mode())
    }

    fn set_channel_count_mode(&self, mode: ChannelCountMode) -> Result<(), HostError> {
        each_facade!(self, node => node.set_channel_count_mode(mode))
    }

    fn channel_interpretation(&self) -> ChannelInterpretation {
        each_facade!(self, node => node.channel_interpretation())
    }

    fn set_channel_interpretation(&self, interpretation: ChannelInterpretation) -> Result<(), HostError> {
        each_facade!(self, node => node.set_channel_interpretation(interpretation))
    }

    fn connect<'a>(
        &self,
        destination: Destination<'a>,
        output: usize,
    ) -> Result<Option<&'a dyn AudioNode>, HostError> {
        each_facade!(self, node => node.connect(destination, output))
    }

    fn disconnect(&self, selection: Disconnect<'_>) -> Result<(), HostError> {
        each_facade!(self, node => node.disconnect(selection))
    }

    fn add_event_listener(
        &self,
        kind: EventKind,
        listener: EventListener,
        options: ListenerOptions,
    ) -> ListenerId {
        each_facade!(self, node => node.add_event_listener(kind, listener, options))
    }

    fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        each_facade!(self, node => node.remove_event_listener(kind, id))
    }

    fn dispatch_event(&self, event: &Event) -> bool {
        each_facade!(self, node => node.dispatch_event(event))
    }
}

impl AudioScheduledSourceNode for FacadeNode {
    fn start(&self, when: f64) -> Result<(), HostError> {
        each_facade!(self, node => node.start(when))
    }

    fn stop(&self, when: f64) -> Result<(), HostError> {
        each_facade!(self, node => node.stop(when))
    }
}
