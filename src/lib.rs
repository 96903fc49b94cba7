//! Gleichklang - one conformant node model over hosts that disagree
//!
//! Design principles:
//! - Probe a host once per context, remember the verdict
//! - Fake missing node types out of native nodes that work
//! - Correct buggy methods in place, so node identity never changes
//! - Host errors pass through untouched, except where a correction absorbs one
//!
//! ```
//! use gleichklang::capability::{probes, CapabilityCache, CONSTANT_SOURCE_NODE_SUPPORT};
//! use gleichklang::faker::fake_constant_source_node;
//! use gleichklang::host::{HostContext, Quirks, SoftwareHost};
//! use gleichklang::node::{AudioNode, AudioScheduledSourceNode, ConstantSourceNode, Destination};
//! use gleichklang::options::ConstantSourceOptions;
//! use gleichklang::primitive::create_native_constant_source_node;
//!
//! let context = HostContext::new(SoftwareHost::new(48000.0).with_quirks(Quirks::legacy()));
//! let options = ConstantSourceOptions::default().with_offset(0.5);
//!
//! let native = CapabilityCache::with_global(|cache| {
//!     cache.resolve(CONSTANT_SOURCE_NODE_SUPPORT, &context, probes::test_constant_source_node_support)
//! })
//! .unwrap();
//!
//! let node: Box<dyn ConstantSourceNode> = if native {
//!     Box::new(create_native_constant_source_node(&context, &options).unwrap())
//! } else {
//!     CapabilityCache::with_global(|cache| {
//!         fake_constant_source_node(&context, cache, &options).map(|n| Box::new(n) as Box<dyn ConstantSourceNode>)
//!     })
//!     .unwrap()
//! };
//!
//! node.connect(Destination::node(&context.destination()), 0).unwrap();
//! node.start(0.0).unwrap();
//! assert_eq!(node.offset().value(), 0.5);
//! ```

pub mod buffer;
pub mod capability;
pub mod error;
pub mod event;
pub mod faker;
pub mod host;
pub mod node;
pub mod options;
pub mod primitive;
pub mod wrapper;

pub use buffer::AudioBuffer;
pub use capability::{CapabilityCache, ProbeId};
pub use error::{ErrorKind, HostError};
pub use faker::{fake, FacadeNode, FakeOptions};
pub use host::{HostContext, SoftwareHost};
pub use node::{AudioNode, AudioParam, AudioScheduledSourceNode, ConstantSourceNode, Destination, Disconnect};
