//! Detecting what a host gets wrong.
//!
//! [`probes`] holds the experiments, [`CapabilityCache`] makes sure each one
//! runs at most once per context.

mod cache;
pub mod probes;

pub use cache::{CapabilityCache, ProbeId};
pub use probes::{CONSTANT_SOURCE_NODE_SUPPORT, STOP_METHOD_CONSECUTIVE_CALLS_SUPPORT};
