//! In-place corrections for native methods that misbehave on some hosts.
//!
//! A wrapper installs closures into a node's method table. The closures
//! capture the previous method and whatever state the correction needs, so
//! the node keeps its identity and every handle to it is corrected at once.

mod stop_consecutive_calls;

pub use stop_consecutive_calls::wrap_stop_method_consecutive_calls;
