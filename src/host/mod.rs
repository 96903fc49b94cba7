//! Host implementations and the narrow interface the conformance layer needs.
//!
//! A host owns a processing graph and renders it. Hosts disagree with each
//! other: some lack node types, some get method semantics wrong. The
//! [`Backend`] trait is the seam between a host and this crate, and
//! [`HostContext`] is the shared handle everything else holds.
//!
//! [`SoftwareHost`] is an in-process host that renders through petgraph. Its
//! [`Quirks`] let it reproduce the gaps and bugs found in real hosts.

mod backend;
mod context;
pub mod software;

pub use backend::Backend;
pub use context::HostContext;
pub use software::{Quirks, SoftwareHost, RENDER_QUANTUM_SIZE};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::options::{ChannelCountMode, ChannelInterpretation};

/// Identity of one host context.
///
/// Allocated from a process-wide counter and never reused, so a stale id can
/// never alias a newer context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Identifier for a node within one host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// The native node types a host may provide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    Destination,
    Gain,
    AudioBufferSource,
    ConstantSource,
}

/// Named control parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ParamName {
    Gain,
    Offset,
    PlaybackRate,
    Detune,
}

/// A control parameter of a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ParamId {
    pub node: NodeId,
    pub name: ParamName,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContextState {
    Running,
    Closed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodeArity {
    pub inputs: usize,
    pub outputs: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChannelConfig {
    pub count: u32,
    pub mode: ChannelCountMode,
    pub interpretation: ChannelInterpretation,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            count: 2,
            mode: ChannelCountMode::Max,
            interpretation: ChannelInterpretation::Speakers,
        }
    }
}

/// Static properties of a parameter.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ParamDescriptor {
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
}

impl ParamDescriptor {
    /// Full single-precision range.
    pub const fn unbounded(default_value: f32) -> Self {
        Self {
            default_value,
            min_value: f32::MIN,
            max_value: f32::MAX,
        }
    }
}

/// Where a connection lands.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Endpoint {
    Input { node: NodeId, input: usize },
    Param(ParamId),
}

/// Which outgoing connections a `disconnect` call removes.
///
/// `None` fields match everything, so the default selector removes all
/// connections of the node.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DisconnectSelector {
    pub output: Option<usize>,
    pub target: Option<DisconnectTarget>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DisconnectTarget {
    Node { node: NodeId, input: Option<usize> },
    Param(ParamId),
}
