//! In-process host built on petgraph.
//!
//! `SoftwareHost` owns the node graph, renders it one quantum at a time and
//! implements [`Backend`] with the validation a native host performs. Its
//! [`Quirks`] switch on the defects of real hosts, so the conformance layer
//! can be exercised against them without a browser.
//!
//! # Example
//!
//! ```
//! use gleichklang::host::{HostContext, Quirks, SoftwareHost};
//!
//! let (producer, mut consumer) = rtrb::RingBuffer::<f32>::new(4096);
//! let host = SoftwareHost::new(48000.0)
//!     .with_channels(1)
//!     .with_capture(producer)
//!     .with_quirks(Quirks::legacy());
//! let context = HostContext::new(host);
//!
//! context.advance(1).unwrap();
//! assert_eq!(consumer.slots(), 64);
//! while let Ok(sample) = consumer.pop() {
//!     assert_eq!(sample, 0.0);
//! }
//! ```

mod quirks;
mod render;
mod timeline;

pub use quirks::Quirks;

use hashbrown::HashMap;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rtrb::Producer;

use crate::buffer::AudioBuffer;
use crate::error::HostError;
use crate::host::{
    Backend, ChannelConfig, ContextState, DisconnectSelector, DisconnectTarget, Endpoint, NodeArity,
    NodeId, NodeKind, ParamDescriptor, ParamId, ParamName,
};
use crate::options::{ChannelCountMode, ChannelInterpretation};

use render::{Block, Kernel, RenderContext, RenderNode};

/// Frames rendered per call to [`Backend::process`] (the `dasp_graph` buffer length).
pub const RENDER_QUANTUM_SIZE: usize = 64;

/// Upper bound for channel counts and buffer channels.
pub const MAX_CHANNELS: u32 = 32;

const MIN_BUFFER_SAMPLE_RATE: f32 = 3000.0;
const MAX_BUFFER_SAMPLE_RATE: f32 = 768_000.0;

/// Where an edge lands on its target node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeTarget {
    Input(usize),
    Param(ParamName),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Edge {
    output: usize,
    target: EdgeTarget,
}

type InnerGraph = StableGraph<RenderNode, Edge>;

/// A software rendering host.
pub struct SoftwareHost {
    graph: InnerGraph,
    node_indices: HashMap<NodeId, NodeIndex>,
    next_node_id: u32,
    destination: NodeId,

    sample_rate: f32,
    frames_rendered: u64,
    state: ContextState,
    quirks: Quirks,
}

impl SoftwareHost {
    /// Create a conformant host rendering at `sample_rate`, with a stereo
    /// destination and no capture.
    pub fn new(sample_rate: f32) -> Self {
        let mut host = Self {
            graph: InnerGraph::with_capacity(64, 64),
            node_indices: HashMap::new(),
            next_node_id: 0,
            destination: NodeId(0),
            sample_rate,
            frames_rendered: 0,
            state: ContextState::Running,
            quirks: Quirks::default(),
        };
        host.destination = host.insert(NodeKind::Destination);
        host
    }

    /// Set the channel count of the destination.
    pub fn with_channels(mut self, channels: u32) -> Self {
        let destination = self.destination;
        if let Some(node) = self.node_mut(destination) {
            node.channels.count = channels.clamp(1, MAX_CHANNELS);
        }
        self
    }

    /// Push every rendered destination quantum into `producer`, interleaved.
    pub fn with_capture(mut self, producer: Producer<f32>) -> Self {
        let destination = self.destination;
        if let Some(RenderNode {
            kernel: Kernel::Destination(capture),
            ..
        }) = self.node_mut(destination)
        {
            capture.producer = Some(producer);
        }
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    #[inline]
    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let idx = self.graph.add_node(RenderNode::new(kind));
        self.node_indices.insert(id, idx);
        tracing::debug!(node = %id, ?kind, "host node created");
        id
    }

    fn index(&self, node: NodeId) -> Result<NodeIndex, HostError> {
        self.node_indices
            .get(&node)
            .copied()
            .ok_or_else(|| HostError::invalid_access(format!("{node} does not belong to this context")))
    }

    fn node(&self, node: NodeId) -> Option<&RenderNode> {
        self.node_indices.get(&node).and_then(|idx| self.graph.node_weight(*idx))
    }

    fn node_mut(&mut self, node: NodeId) -> Option<&mut RenderNode> {
        let idx = *self.node_indices.get(&node)?;
        self.graph.node_weight_mut(idx)
    }

    fn ensure_running(&self) -> Result<(), HostError> {
        match self.state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(HostError::invalid_state("the context is closed")),
        }
    }

    fn timeline_mut(&mut self, param: ParamId) -> Result<&mut timeline::Timeline, HostError> {
        self.node_mut(param.node)
            .and_then(|n| n.param_mut(param.name))
            .ok_or_else(|| HostError::invalid_access(format!("{} has no {:?} parameter", param.node, param.name)))
    }

    fn playback_mut(&mut self, node: NodeId) -> Result<&mut render::BufferPlayback, HostError> {
        self.node_mut(node)
            .and_then(RenderNode::playback_mut)
            .ok_or_else(|| HostError::invalid_access(format!("{node} is not a buffer source")))
    }

    fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    /// Remove released nodes that can no longer be heard.
    ///
    /// A released node goes once nothing downstream listens to it, or once
    /// it is spent. Removing a node drops its edges, so the pass repeats
    /// until the nodes it fed are settled too.
    fn prune(&mut self) {
        loop {
            let spent: Vec<NodeId> = self
                .node_indices
                .iter()
                .filter(|(id, idx)| {
                    let node = &self.graph[**idx];
                    if **id == self.destination || !node.released {
                        return false;
                    }
                    let unheard = self
                        .graph
                        .edges_directed(**idx, Direction::Outgoing)
                        .next()
                        .is_none();
                    let fed = self
                        .graph
                        .edges_directed(**idx, Direction::Incoming)
                        .next()
                        .is_some();
                    unheard || node.is_spent(fed)
                })
                .map(|(id, _)| *id)
                .collect();

            if spent.is_empty() {
                break;
            }
            for id in spent {
                if let Some(idx) = self.node_indices.remove(&id) {
                    if let Some(node) = self.graph.remove_node(idx) {
                        tracing::debug!(node = %id, kind = ?node.kind, "host node reclaimed");
                    }
                }
            }
        }
    }

    fn gather(&self, idx: NodeIndex) -> (Vec<Vec<Block>>, Vec<(ParamName, Block)>) {
        let mut inputs = vec![Vec::new(); self.graph[idx].arity.inputs];
        let mut modulation = Vec::new();

        for edge in self.graph.edges_directed(idx, Direction::Incoming) {
            let block = self.graph[edge.source()]
                .outputs
                .get(edge.weight().output)
                .cloned()
                .unwrap_or_else(|| render::silent_block(1));

            match edge.weight().target {
                EdgeTarget::Input(i) => {
                    if let Some(port) = inputs.get_mut(i) {
                        port.push(block);
                    }
                }
                EdgeTarget::Param(name) => modulation.push((name, block)),
            }
        }
        (inputs, modulation)
    }

    fn check_time(value: f64, what: &str) -> Result<(), HostError> {
        if !value.is_finite() {
            return Err(HostError::type_error(format!("{what} must be finite")));
        }
        if value < 0.0 {
            return Err(HostError::range(format!("{what} must not be negative")));
        }
        Ok(())
    }

    fn check_value(value: f32) -> Result<(), HostError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(HostError::type_error("parameter values must be finite"))
        }
    }
}

impl Backend for SoftwareHost {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.now()
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_node(&mut self, kind: NodeKind) -> Result<NodeId, HostError> {
        self.ensure_running()?;
        match kind {
            NodeKind::Destination => Err(HostError::not_supported(
                "a context has exactly one destination",
            )),
            NodeKind::ConstantSource if self.quirks.missing_constant_source => Err(
                HostError::not_supported("this host does not implement constant sources"),
            ),
            kind => Ok(self.insert(kind)),
        }
    }

    fn arity(&self, node: NodeId) -> NodeArity {
        self.node(node)
            .map(|n| n.arity)
            .unwrap_or(NodeArity { inputs: 0, outputs: 0 })
    }

    fn channel_config(&self, node: NodeId) -> ChannelConfig {
        self.node(node).map(|n| n.channels).unwrap_or_default()
    }

    fn set_channel_count(&mut self, node: NodeId, count: u32) -> Result<(), HostError> {
        if count == 0 || count > MAX_CHANNELS {
            return Err(HostError::not_supported(format!(
                "channelCount must be between 1 and {MAX_CHANNELS}, got {count}"
            )));
        }
        let idx = self.index(node)?;
        self.graph[idx].channels.count = count;
        Ok(())
    }

    fn set_channel_count_mode(&mut self, node: NodeId, mode: ChannelCountMode) -> Result<(), HostError> {
        let idx = self.index(node)?;
        self.graph[idx].channels.mode = mode;
        Ok(())
    }

    fn set_channel_interpretation(
        &mut self,
        node: NodeId,
        interpretation: ChannelInterpretation,
    ) -> Result<(), HostError> {
        let idx = self.index(node)?;
        self.graph[idx].channels.interpretation = interpretation;
        Ok(())
    }

    fn param_descriptor(&self, param: ParamId) -> ParamDescriptor {
        self.node(param.node)
            .and_then(|n| n.param(param.name))
            .map(|tl| tl.descriptor())
            .unwrap_or(ParamDescriptor::unbounded(0.0))
    }

    fn param_value(&self, param: ParamId) -> f32 {
        let now = self.now();
        self.node(param.node)
            .and_then(|n| n.param(param.name))
            .map(|tl| tl.value_at(now))
            .unwrap_or(0.0)
    }

    fn set_param_value(&mut self, param: ParamId, value: f32) -> Result<(), HostError> {
        Self::check_value(value)?;
        let now = self.now();
        self.timeline_mut(param)?.set_value(value, now);
        Ok(())
    }

    fn set_param_value_at_time(&mut self, param: ParamId, value: f32, time: f64) -> Result<(), HostError> {
        self.ensure_running()?;
        Self::check_value(value)?;
        Self::check_time(time, "startTime")?;
        self.timeline_mut(param)?.set_value_at_time(value, time);
        Ok(())
    }

    fn linear_ramp_param_to_value_at_time(
        &mut self,
        param: ParamId,
        value: f32,
        time: f64,
    ) -> Result<(), HostError> {
        self.ensure_running()?;
        Self::check_value(value)?;
        Self::check_time(time, "endTime")?;
        self.timeline_mut(param)?.linear_ramp_to_value_at_time(value, time);
        Ok(())
    }

    fn cancel_scheduled_param_values(&mut self, param: ParamId, cancel_time: f64) -> Result<(), HostError> {
        self.ensure_running()?;
        Self::check_time(cancel_time, "cancelTime")?;
        self.timeline_mut(param)?.cancel_scheduled_values(cancel_time);
        Ok(())
    }

    fn connect(&mut self, from: NodeId, output: usize, to: Endpoint) -> Result<(), HostError> {
        self.ensure_running()?;
        let from_idx = self.index(from)?;
        if output >= self.graph[from_idx].arity.outputs {
            return Err(HostError::index_size(format!(
                "output {output} is out of range for {from}"
            )));
        }

        let (to_idx, target) = match to {
            Endpoint::Input { node, input } => {
                let idx = self.index(node)?;
                if input >= self.graph[idx].arity.inputs {
                    return Err(HostError::index_size(format!(
                        "input {input} is out of range for {node}"
                    )));
                }
                (idx, EdgeTarget::Input(input))
            }
            Endpoint::Param(param) => {
                let idx = self.index(param.node)?;
                if self.graph[idx].param(param.name).is_none() {
                    return Err(HostError::invalid_access(format!(
                        "{} has no {:?} parameter",
                        param.node, param.name
                    )));
                }
                (idx, EdgeTarget::Param(param.name))
            }
        };

        let edge = Edge { output, target };
        let exists = self
            .graph
            .edges_directed(from_idx, Direction::Outgoing)
            .any(|e| e.target() == to_idx && *e.weight() == edge);
        if exists {
            return Ok(());
        }

        if from_idx == to_idx || has_path_connecting(&self.graph, to_idx, from_idx, None) {
            return Err(HostError::not_supported(
                "this host cannot render cycles",
            ));
        }

        self.graph.add_edge(from_idx, to_idx, edge);
        tracing::debug!(%from, output, ?to, "host connect");
        Ok(())
    }

    fn disconnect(&mut self, from: NodeId, selector: DisconnectSelector) -> Result<(), HostError> {
        let from_idx = self.index(from)?;
        if let Some(output) = selector.output {
            if output >= self.graph[from_idx].arity.outputs {
                return Err(HostError::index_size(format!(
                    "output {output} is out of range for {from}"
                )));
            }
        }

        // resolve the target; an unknown node cannot be connected to us
        let target = match selector.target {
            None => None,
            Some(DisconnectTarget::Node { node, input }) => {
                let idx = self.index(node).map_err(|_| {
                    HostError::invalid_access("the given destination is not connected")
                })?;
                if let Some(input) = input {
                    if input >= self.graph[idx].arity.inputs {
                        return Err(HostError::index_size(format!(
                            "input {input} is out of range for {node}"
                        )));
                    }
                }
                Some((idx, input.map(EdgeTarget::Input)))
            }
            Some(DisconnectTarget::Param(param)) => {
                let idx = self.index(param.node).map_err(|_| {
                    HostError::invalid_access("the given parameter is not connected")
                })?;
                Some((idx, Some(EdgeTarget::Param(param.name))))
            }
        };
        let param_target = matches!(selector.target, Some(DisconnectTarget::Param(_)));

        let matching: Vec<EdgeIndex> = self
            .graph
            .edges_directed(from_idx, Direction::Outgoing)
            .filter(|e| selector.output.map_or(true, |o| e.weight().output == o))
            .filter(|e| match target {
                None => true,
                Some((idx, None)) => {
                    e.target() == idx && matches!(e.weight().target, EdgeTarget::Input(_))
                }
                Some((idx, Some(t))) => e.target() == idx && e.weight().target == t,
            })
            .map(|e| e.id())
            .collect();

        if target.is_some() && matching.is_empty() {
            return Err(HostError::invalid_access(if param_target {
                "the given parameter is not connected"
            } else {
                "the given destination is not connected"
            }));
        }

        for edge in &matching {
            self.graph.remove_edge(*edge);
        }
        tracing::debug!(%from, removed = matching.len(), "host disconnect");

        self.prune();
        Ok(())
    }

    fn start(&mut self, node: NodeId, when: f64, offset: f64, duration: Option<f64>) -> Result<(), HostError> {
        self.ensure_running()?;
        Self::check_time(when, "when")?;
        Self::check_time(offset, "offset")?;
        if let Some(duration) = duration {
            Self::check_time(duration, "duration")?;
        }

        let idx = self.index(node)?;
        let target = &mut self.graph[idx];
        target
            .schedule_mut()
            .ok_or_else(|| HostError::invalid_access(format!("{node} is not a scheduled source")))?
            .start(when, duration)?;
        if let Some(playback) = target.playback_mut() {
            playback.offset = offset;
        }
        Ok(())
    }

    fn stop(&mut self, node: NodeId, when: f64) -> Result<(), HostError> {
        self.ensure_running()?;
        Self::check_time(when, "when")?;

        let quirks = self.quirks;
        let idx = self.index(node)?;
        self.graph[idx]
            .schedule_mut()
            .ok_or_else(|| HostError::invalid_access(format!("{node} is not a scheduled source")))?
            .stop(when, &quirks)
    }

    fn set_buffer(&mut self, node: NodeId, buffer: Option<AudioBuffer>) -> Result<(), HostError> {
        let playback = self.playback_mut(node)?;
        if playback.buffer.is_some() && buffer.is_some() {
            return Err(HostError::invalid_state("the buffer can only be assigned once"));
        }
        playback.buffer = buffer;
        Ok(())
    }

    fn buffer(&self, node: NodeId) -> Option<AudioBuffer> {
        self.node(node)
            .and_then(RenderNode::playback)
            .and_then(|p| p.buffer.clone())
    }

    fn set_loop(&mut self, node: NodeId, looping: bool) -> Result<(), HostError> {
        self.playback_mut(node)?.looping = looping;
        Ok(())
    }

    fn is_looping(&self, node: NodeId) -> bool {
        self.node(node)
            .and_then(RenderNode::playback)
            .map_or(false, |p| p.looping)
    }

    fn set_loop_start(&mut self, node: NodeId, seconds: f64) -> Result<(), HostError> {
        if !seconds.is_finite() {
            return Err(HostError::type_error("loopStart must be finite"));
        }
        self.playback_mut(node)?.loop_start = seconds;
        Ok(())
    }

    fn loop_start(&self, node: NodeId) -> f64 {
        self.node(node)
            .and_then(RenderNode::playback)
            .map_or(0.0, |p| p.loop_start)
    }

    fn set_loop_end(&mut self, node: NodeId, seconds: f64) -> Result<(), HostError> {
        if !seconds.is_finite() {
            return Err(HostError::type_error("loopEnd must be finite"));
        }
        self.playback_mut(node)?.loop_end = seconds;
        Ok(())
    }

    fn loop_end(&self, node: NodeId) -> f64 {
        self.node(node)
            .and_then(RenderNode::playback)
            .map_or(0.0, |p| p.loop_end)
    }

    fn create_buffer(
        &self,
        number_of_channels: usize,
        length: usize,
        sample_rate: f32,
    ) -> Result<AudioBuffer, HostError> {
        if number_of_channels == 0 || number_of_channels > MAX_CHANNELS as usize {
            return Err(HostError::not_supported(format!(
                "numberOfChannels must be between 1 and {MAX_CHANNELS}, got {number_of_channels}"
            )));
        }
        if length == 0 {
            return Err(HostError::not_supported("length must be at least 1"));
        }
        if !(MIN_BUFFER_SAMPLE_RATE..=MAX_BUFFER_SAMPLE_RATE).contains(&sample_rate) {
            return Err(HostError::not_supported(format!(
                "sampleRate {sample_rate} is outside the supported range"
            )));
        }
        Ok(AudioBuffer::silent(number_of_channels, length, sample_rate))
    }

    fn process(&mut self) -> Result<Vec<NodeId>, HostError> {
        self.ensure_running()?;

        let ctx = RenderContext {
            sample_rate: self.sample_rate,
            time: self.now(),
            quirks: self.quirks,
        };
        let order = toposort(&self.graph, None)
            .map_err(|_| HostError::invalid_state("the host graph contains a cycle"))?;

        let mut ended = Vec::new();
        for idx in order {
            let (inputs, modulation) = self.gather(idx);
            if self.graph[idx].render(&ctx, &inputs, &modulation) {
                ended.push(idx);
            }
        }
        self.frames_rendered += RENDER_QUANTUM_SIZE as u64;
        tracing::trace!(time = ctx.time, ended = ended.len(), "rendered quantum");

        let ended: Vec<NodeId> = self
            .node_indices
            .iter()
            .filter(|(_, idx)| ended.contains(*idx))
            .map(|(id, _)| *id)
            .collect();
        if !ended.is_empty() {
            self.prune();
        }
        Ok(ended)
    }

    fn release(&mut self, node: NodeId) {
        if node == self.destination {
            return;
        }
        if let Some(n) = self.node_mut(node) {
            n.released = true;
        }
        self.prune();
    }

    fn close(&mut self) -> Result<(), HostError> {
        self.ensure_running()?;
        self.state = ContextState::Closed;
        Ok(())
    }

    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }
}
