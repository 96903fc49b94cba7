use crate::buffer::AudioBuffer;
use crate::error::HostError;
use crate::options::{ChannelCountMode, ChannelInterpretation};

use super::{
    ChannelConfig, ContextState, DisconnectSelector, Endpoint, NodeArity, NodeId, NodeKind,
    ParamDescriptor, ParamId,
};

/// The native entry points of one host instance.
///
/// Implementations are expected to behave like the host they stand for,
/// including its bugs; this crate detects and corrects those from the outside.
/// Every method runs synchronously on the thread that owns the context.
///
/// Errors are the host's own. Callers in this crate propagate them unchanged.
pub trait Backend {
    fn sample_rate(&self) -> f32;

    /// Seconds of audio rendered so far.
    fn current_time(&self) -> f64;

    fn state(&self) -> ContextState;

    /// The node all audible output ends up in. Exists for the host's lifetime.
    fn destination(&self) -> NodeId;

    /// Create an unconnected node of the given kind.
    ///
    /// Hosts that lack a node type report `NotSupportedError`.
    fn create_node(&mut self, kind: NodeKind) -> Result<NodeId, HostError>;

    fn arity(&self, node: NodeId) -> NodeArity;

    fn channel_config(&self, node: NodeId) -> ChannelConfig;
    fn set_channel_count(&mut self, node: NodeId, count: u32) -> Result<(), HostError>;
    fn set_channel_count_mode(&mut self, node: NodeId, mode: ChannelCountMode) -> Result<(), HostError>;
    fn set_channel_interpretation(
        &mut self,
        node: NodeId,
        interpretation: ChannelInterpretation,
    ) -> Result<(), HostError>;

    fn param_descriptor(&self, param: ParamId) -> ParamDescriptor;
    /// The parameter value at the current time.
    fn param_value(&self, param: ParamId) -> f32;
    fn set_param_value(&mut self, param: ParamId, value: f32) -> Result<(), HostError>;
    fn set_param_value_at_time(&mut self, param: ParamId, value: f32, time: f64) -> Result<(), HostError>;
    fn linear_ramp_param_to_value_at_time(
        &mut self,
        param: ParamId,
        value: f32,
        time: f64,
    ) -> Result<(), HostError>;
    fn cancel_scheduled_param_values(&mut self, param: ParamId, cancel_time: f64) -> Result<(), HostError>;

    fn connect(&mut self, from: NodeId, output: usize, to: Endpoint) -> Result<(), HostError>;
    fn disconnect(&mut self, from: NodeId, selector: DisconnectSelector) -> Result<(), HostError>;

    /// Schedule playback of a source node.
    fn start(&mut self, node: NodeId, when: f64, offset: f64, duration: Option<f64>) -> Result<(), HostError>;
    fn stop(&mut self, node: NodeId, when: f64) -> Result<(), HostError>;

    fn set_buffer(&mut self, node: NodeId, buffer: Option<AudioBuffer>) -> Result<(), HostError>;
    fn buffer(&self, node: NodeId) -> Option<AudioBuffer>;
    fn set_loop(&mut self, node: NodeId, looping: bool) -> Result<(), HostError>;
    fn is_looping(&self, node: NodeId) -> bool;
    fn set_loop_start(&mut self, node: NodeId, seconds: f64) -> Result<(), HostError>;
    fn loop_start(&self, node: NodeId) -> f64;
    fn set_loop_end(&mut self, node: NodeId, seconds: f64) -> Result<(), HostError>;
    fn loop_end(&self, node: NodeId) -> f64;

    fn create_buffer(
        &self,
        number_of_channels: usize,
        length: usize,
        sample_rate: f32,
    ) -> Result<AudioBuffer, HostError>;

    /// Render one quantum. Returns the source nodes that ended during it.
    fn process(&mut self) -> Result<Vec<NodeId>, HostError>;

    /// The last handle to `node` is gone. The host may reclaim it once it can
    /// no longer be observed.
    fn release(&mut self, node: NodeId);

    fn close(&mut self) -> Result<(), HostError>;

    /// Number of nodes the host currently keeps alive, destination included.
    fn node_count(&self) -> usize;

    /// Number of live connections in the graph.
    fn connection_count(&self) -> usize;
}
