//! The consumer-facing node contract and the native node handles.
//!
//! Every node, native or faked, is used through [`AudioNode`] and its
//! sub-traits. Native handles are thin `Rc` wrappers around a shared
//! [`NodeCore`](core::NodeCore); cloning a handle never creates a new node.
//!
//! Connections are made with [`AudioNode::connect`], which returns the
//! destination node when connecting to a node so that calls can be chained:
//!
//! ```
//! use gleichklang::host::{HostContext, SoftwareHost};
//! use gleichklang::node::{AudioNode, Destination};
//! use gleichklang::options::GainOptions;
//! use gleichklang::primitive::create_native_gain_node;
//!
//! let context = HostContext::new(SoftwareHost::new(48000.0));
//! let a = create_native_gain_node(&context, &GainOptions::default()).unwrap();
//! let b = create_native_gain_node(&context, &GainOptions::default()).unwrap();
//!
//! a.connect(Destination::node(&b), 0)
//!     .unwrap()
//!     .unwrap()
//!     .connect(Destination::node(&context.destination()), 0)
//!     .unwrap();
//! assert_eq!(context.connection_count(), 2);
//!
//! // connecting to a parameter returns nothing to chain on
//! let gain = b.gain();
//! let chained = a.connect(Destination::param(&gain), 0).unwrap();
//! assert!(chained.is_none());
//! ```

pub(crate) mod core;

mod buffer_source;
mod constant_source;
mod destination;
mod gain;
mod param;

pub use buffer_source::AudioBufferSourceNode;
pub use constant_source::NativeConstantSourceNode;
pub use destination::AudioDestinationNode;
pub use gain::GainNode;
pub use param::AudioParam;

use std::fmt;

use crate::error::HostError;
use crate::event::{Event, EventKind, EventListener, ListenerId, ListenerOptions};
use crate::host::HostContext;
use crate::options::{ChannelCountMode, ChannelInterpretation};

pub(crate) mod sealed {
    use std::rc::Rc;

    use crate::host::{ContextId, NodeId};
    use crate::node::core::NodeCore;

    /// Where connections into a node land.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct InputTarget {
        pub context: ContextId,
        pub node: NodeId,
    }

    pub trait Sealed {
        fn input_target(&self) -> InputTarget;
    }

    /// Handles backed by exactly one native node.
    pub trait NativeCore: Sealed {
        fn core(&self) -> &Rc<NodeCore>;
    }
}

/// The target of [`AudioNode::connect`].
#[derive(Clone, Copy)]
pub enum Destination<'a> {
    /// An input of another node.
    Node { node: &'a dyn AudioNode, input: usize },
    /// A control parameter, driven at audio rate.
    Param(&'a AudioParam),
}

impl<'a> Destination<'a> {
    /// Input 0 of `node`.
    pub fn node(node: &'a dyn AudioNode) -> Self {
        Destination::Node { node, input: 0 }
    }

    pub fn node_input(node: &'a dyn AudioNode, input: usize) -> Self {
        Destination::Node { node, input }
    }

    pub fn param(param: &'a AudioParam) -> Self {
        Destination::Param(param)
    }
}

/// Which connections [`AudioNode::disconnect`] removes.
///
/// Mirrors the overloads of a native `disconnect`: the more arguments, the
/// narrower the selection. Targeted forms fail with `InvalidAccessError` if
/// nothing matches; `All` and `Output` never do.
#[derive(Clone, Copy)]
pub enum Disconnect<'a> {
    All,
    Output(usize),
    Node(&'a dyn AudioNode),
    NodeOutput(&'a dyn AudioNode, usize),
    NodeOutputInput(&'a dyn AudioNode, usize, usize),
    Param(&'a AudioParam),
    ParamOutput(&'a AudioParam, usize),
}

/// A node of a processing graph.
///
/// Implemented by the native handles of this module and by the facades built
/// in [`faker`](crate::faker). The trait is sealed: code using only this
/// contract cannot tell a facade from a native node.
pub trait AudioNode: sealed::Sealed {
    fn context(&self) -> &HostContext;

    fn number_of_inputs(&self) -> usize;
    fn number_of_outputs(&self) -> usize;

    fn channel_count(&self) -> u32;
    fn set_channel_count(&self, count: u32) -> Result<(), HostError>;
    fn channel_count_mode(&self) -> ChannelCountMode;
    fn set_channel_count_mode(&self, mode: ChannelCountMode) -> Result<(), HostError>;
    fn channel_interpretation(&self) -> ChannelInterpretation;
    fn set_channel_interpretation(&self, interpretation: ChannelInterpretation) -> Result<(), HostError>;

    /// Connect output `output` of this node to `destination`.
    ///
    /// Returns the destination node for node targets, and `None` for
    /// parameter targets.
    fn connect<'a>(
        &self,
        destination: Destination<'a>,
        output: usize,
    ) -> Result<Option<&'a dyn AudioNode>, HostError>;

    fn disconnect(&self, selection: Disconnect<'_>) -> Result<(), HostError>;

    fn add_event_listener(
        &self,
        kind: EventKind,
        listener: EventListener,
        options: ListenerOptions,
    ) -> ListenerId;

    fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool;

    /// Deliver `event` to this node's listeners. Returns `true` if any ran.
    fn dispatch_event(&self, event: &Event) -> bool;
}

impl fmt::Debug for dyn AudioNode + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = sealed::Sealed::input_target(self);
        f.debug_struct("AudioNode")
            .field("context", &target.context)
            .field("node", &target.node)
            .finish()
    }
}

/// A source that plays between a start and a stop time.
pub trait AudioScheduledSourceNode: AudioNode {
    /// Start playback at context time `when`. Valid once.
    fn start(&self, when: f64) -> Result<(), HostError>;

    /// Stop playback at context time `when`.
    fn stop(&self, when: f64) -> Result<(), HostError>;
}

/// A source emitting the value of its `offset` parameter.
pub trait ConstantSourceNode: AudioScheduledSourceNode {
    fn offset(&self) -> AudioParam;
}

/// A scheduled source backed by a single native node.
///
/// These are the nodes method wrappers can patch in place.
pub trait NativeScheduledSourceNode: AudioScheduledSourceNode + sealed::NativeCore {}

/// Forwards the [`AudioNode`] contract of a native handle to its core.
macro_rules! impl_native_audio_node {
    ($handle:ty) => {
        impl $crate::node::sealed::Sealed for $handle {
            fn input_target(&self) -> $crate::node::sealed::InputTarget {
                self.core.input_target()
            }
        }

        impl $crate::node::sealed::NativeCore for $handle {
            fn core(&self) -> &std::rc::Rc<$crate::node::core::NodeCore> {
                &self.core
            }
        }

        impl $crate::node::AudioNode for $handle {
            delegate::delegate! {
                to self.core {
                    fn context(&self) -> &$crate::host::HostContext;
                    fn number_of_inputs(&self) -> usize;
                    fn number_of_outputs(&self) -> usize;
                    fn channel_count(&self) -> u32;
                    fn set_channel_count(&self, count: u32) -> Result<(), $crate::error::HostError>;
                    fn channel_count_mode(&self) -> $crate::options::ChannelCountMode;
                    fn set_channel_count_mode(
                        &self,
                        mode: $crate::options::ChannelCountMode,
                    ) -> Result<(), $crate::error::HostError>;
                    fn channel_interpretation(&self) -> $crate::options::ChannelInterpretation;
                    fn set_channel_interpretation(
                        &self,
                        interpretation: $crate::options::ChannelInterpretation,
                    ) -> Result<(), $crate::error::HostError>;
                    fn connect<'a>(
                        &self,
                        destination: $crate::node::Destination<'a>,
                        output: usize,
                    ) -> Result<Option<&'a dyn $crate::node::AudioNode>, $crate::error::HostError>;
                    fn disconnect(
                        &self,
                        selection: $crate::node::Disconnect<'_>,
                    ) -> Result<(), $crate::error::HostError>;
                    fn add_event_listener(
                        &self,
                        kind: $crate::event::EventKind,
                        listener: $crate::event::EventListener,
                        options: $crate::event::ListenerOptions,
                    ) -> $crate::event::ListenerId;
                    fn remove_event_listener(
                        &self,
                        kind: $crate::event::EventKind,
                        id: $crate::event::ListenerId,
                    ) -> bool;
                    fn dispatch_event(&self, event: &$crate::event::Event) -> bool;
                }
            }
        }

        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                std::rc::Rc::ptr_eq(&self.core, &other.core)
            }
        }

        impl Eq for $handle {}

        impl std::fmt::Debug for $handle {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($handle))
                    .field("context", &self.core.context().id())
                    .field("node", &self.core.id())
                    .finish()
            }
        }
    };
}

pub(crate) use impl_native_audio_node;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::SoftwareHost;
    use crate::options::GainOptions;
    use crate::primitive::create_native_gain_node;

    #[test]
    fn connect_results_can_be_debugged() {
        let context = HostContext::new(SoftwareHost::new(48000.0));
        let gain = create_native_gain_node(&context, &GainOptions::default()).unwrap();
        let destination = context.destination();

        let returned = gain.connect(Destination::node(&destination), 0);
        let rendered = format!("{returned:?}");
        assert!(rendered.starts_with("Ok(Some(AudioNode {"), "{rendered}");

        let err = gain.connect(Destination::node(&destination), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexSize);
    }
}
