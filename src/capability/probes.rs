//! Runtime experiments against a live context.
//!
//! Each probe uses the shortest sequence of native calls that tells a
//! conformant host from a broken one. Scratch nodes are never connected and
//! are released before the probe returns.

use crate::error::{ErrorKind, HostError};
use crate::host::HostContext;
use crate::node::AudioScheduledSourceNode;
use crate::options::{AudioBufferSourceOptions, ConstantSourceOptions};
use crate::primitive::{create_native_audio_buffer_source_node, create_native_constant_source_node};

use super::ProbeId;

/// Does the host provide a native constant source?
pub const CONSTANT_SOURCE_NODE_SUPPORT: ProbeId = ProbeId::new("constant-source-node-support");

/// May `stop()` be called more than once on a scheduled source?
pub const STOP_METHOD_CONSECUTIVE_CALLS_SUPPORT: ProbeId =
    ProbeId::new("stop-method-consecutive-calls-support");

/// Try to create a constant source.
///
/// `NotSupportedError` means the host lacks the node. Any other error is
/// a real failure (a closed context, for instance) and propagates.
pub fn test_constant_source_node_support(context: &HostContext) -> Result<bool, HostError> {
    match create_native_constant_source_node(context, &ConstantSourceOptions::default()) {
        Ok(_) => Ok(true),
        Err(err) if err.is(ErrorKind::NotSupported) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Start a scratch buffer source, then stop it twice.
///
/// Only the second `stop` is allowed to fail; it failing is the defect.
pub fn test_stop_method_consecutive_calls_support(context: &HostContext) -> Result<bool, HostError> {
    let scratch = create_native_audio_buffer_source_node(context, &AudioBufferSourceOptions::default())?;

    scratch.start(0.0)?;
    scratch.stop(0.0)?;

    Ok(scratch.stop(0.0).is_ok())
}
