//! Node graph
//!
//! A [`NodeGraph`] owns a set of [`AudioNode`]s and the directed channel
//! connections between them. The processing order is a topological sort
//! recomputed on every structural change; connections that would create a
//! cycle are rejected.
//!
//! # Routing
//!
//! - Nodes with no incoming connections read the host input (channel `i`
//!   from host channel `i`; missing host channels are silent).
//! - Nodes with incoming connections get the sum of every source channel
//!   routed to each of their inputs.
//! - Nodes with no outgoing connections are summed into the host output.
//!
//! All routing buffers are sized in [`NodeGraph::prepare`], so
//! [`NodeGraph::process`] does not allocate.

pub mod description;

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::engine::AudioBuffer;
use crate::error::{ConnectionError, PlexusError, Result};
use crate::node::{parameter, AudioNode, NodeRegistry, Parameter, PassThroughNode};

pub use description::{ConnectionDescription, GraphDescription, GraphFile, NodeDescription};

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a node within one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Directed connection from one node's output channel to another's input channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Connection {
    pub source: NodeId,
    pub source_channel: usize,
    pub dest: NodeId,
    pub dest_channel: usize,
}

impl Connection {
    pub fn new(source: NodeId, source_channel: usize, dest: NodeId, dest_channel: usize) -> Self {
        Self {
            source,
            source_channel,
            dest,
            dest_channel,
        }
    }

    fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.dest == id
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source, self.source_channel, self.dest, self.dest_channel
        )
    }
}

// ============================================================================
// Internal storage
// ============================================================================

struct Slot {
    id: NodeId,
    name: String,
    node: Box<dyn AudioNode>,
    buffer: AudioBuffer,
}

/// One entry of the processing plan, resolved to slot indices
struct Step {
    slot: usize,
    num_inputs: usize,
    num_outputs: usize,
    /// (source slot, source channel, dest channel)
    inputs: Vec<(usize, usize, usize)>,
    is_sink: bool,
}

/// Borrow one slot for reading and another for writing
fn split_pair(slots: &mut [Slot], read: usize, write: usize) -> (&Slot, &mut Slot) {
    debug_assert_ne!(read, write);
    if read < write {
        let (head, tail) = slots.split_at_mut(write);
        (&head[read], &mut tail[0])
    } else {
        let (head, tail) = slots.split_at_mut(read);
        (&tail[0], &mut head[write])
    }
}

// ============================================================================
// Node Graph
// ============================================================================

/// Directed acyclic graph of audio nodes
pub struct NodeGraph {
    uuid: Uuid,
    /// Sorted by id
    slots: Vec<Slot>,
    connections: Vec<Connection>,
    order: Vec<NodeId>,
    plan: Vec<Step>,
    next_id: u32,
    sample_rate: f64,
    max_block_size: usize,
    prepared: bool,
    mix: AudioBuffer,
}

impl NodeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            slots: Vec::new(),
            connections: Vec::new(),
            order: Vec::new(),
            plan: Vec::new(),
            next_id: 1,
            sample_rate: 44100.0,
            max_block_size: 512,
            prepared: false,
            mix: AudioBuffer::new(0, 0),
        }
    }

    /// Minimal starting graph: a single stereo pass-through node
    pub fn create_default_graph() -> Self {
        let mut graph = Self::new();
        graph.add_node(Box::new(PassThroughNode::stereo()));
        graph
    }

    /// Stable identity of this graph, kept across save and load
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Node ids in ascending order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Option<&dyn AudioNode> {
        self.index_of(id).map(|index| self.slots[index].node.as_ref())
    }

    /// Mutably borrow a node
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn AudioNode> {
        let index = self.index_of(id)?;
        let node: &mut dyn AudioNode = self.slots[index].node.as_mut();
        Some(node)
    }

    /// Display name of a node
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.index_of(id).map(|index| self.slots[index].name.as_str())
    }

    /// Current connections in insertion order
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Topological processing order
    pub fn processing_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Whether `prepare` has been called since the last release
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Parameter handles of every node, keyed by node id
    pub fn parameter_handles(&self) -> BTreeMap<NodeId, Vec<Arc<Parameter>>> {
        self.slots
            .iter()
            .map(|slot| (slot.id, slot.node.parameters().to_vec()))
            .collect()
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.slots.binary_search_by_key(&id, |slot| slot.id).ok()
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Add a node and return its id
    ///
    /// If the graph is prepared, the node is prepared with the same settings.
    pub fn add_node(&mut self, node: Box<dyn AudioNode>) -> NodeId {
        let id = NodeId(self.next_id);
        let name = node.descriptor().name.to_string();
        self.insert_node(id, name, node);
        id
    }

    /// Add a node under an explicit display name
    pub fn add_named_node(&mut self, name: impl Into<String>, node: Box<dyn AudioNode>) -> NodeId {
        let id = NodeId(self.next_id);
        self.insert_node(id, name.into(), node);
        id
    }

    fn insert_node(&mut self, id: NodeId, name: String, mut node: Box<dyn AudioNode>) {
        let channels = node.descriptor().buffer_channels();
        let mut buffer = AudioBuffer::with_capacity(channels, self.max_block_size);
        if self.prepared {
            node.prepare(self.sample_rate, self.max_block_size);
            buffer.set_num_samples(self.max_block_size);
            let outputs = node.descriptor().num_outputs;
            if outputs > self.mix.num_channels() {
                self.mix = AudioBuffer::with_capacity(outputs, self.max_block_size);
                self.mix.set_num_samples(self.max_block_size);
            }
        }

        let index = self.slots.partition_point(|slot| slot.id < id);
        self.slots.insert(
            index,
            Slot {
                id,
                name,
                node,
                buffer,
            },
        );
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.rebuild_plan();
        debug!(node = %id, "added node");
    }

    /// Remove a node, releasing it first and dropping its connections
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let index = self
            .index_of(id)
            .ok_or(PlexusError::NodeNotFound { id })?;

        let mut slot = self.slots.remove(index);
        slot.node.release_resources();
        self.connections.retain(|c| !c.touches(id));
        self.rebuild_plan();
        debug!(node = %id, "removed node");
        Ok(())
    }

    /// Connect an output channel to an input channel
    ///
    /// Rejected requests leave the graph unchanged.
    pub fn connect(&mut self, connection: Connection) -> std::result::Result<(), ConnectionError> {
        self.validate(&connection)?;
        if self.connections.contains(&connection) {
            return Err(ConnectionError::Duplicate);
        }
        if connection.source == connection.dest || self.can_reach(connection.dest, connection.source) {
            return Err(ConnectionError::WouldCreateCycle {
                source_node: connection.source,
                dest_node: connection.dest,
            });
        }

        self.connections.push(connection);
        self.rebuild_plan();
        debug!(%connection, "connected");
        Ok(())
    }

    /// Remove an existing connection
    pub fn disconnect(&mut self, connection: Connection) -> std::result::Result<(), ConnectionError> {
        let position = self
            .connections
            .iter()
            .position(|c| *c == connection)
            .ok_or(ConnectionError::NotConnected)?;

        self.connections.remove(position);
        self.rebuild_plan();
        debug!(%connection, "disconnected");
        Ok(())
    }

    /// Set a parameter on a node (clamped to its range)
    pub fn set_parameter(&mut self, id: NodeId, parameter_id: &str, value: f32) -> Result<()> {
        let node = self.node(id).ok_or(PlexusError::NodeNotFound { id })?;
        let param = parameter::find(node.parameters(), parameter_id).ok_or_else(|| {
            PlexusError::ParameterNotFound {
                node: id,
                parameter: parameter_id.to_string(),
            }
        })?;
        param.set_value(value);
        Ok(())
    }

    fn validate(&self, connection: &Connection) -> std::result::Result<(), ConnectionError> {
        let source = self
            .node(connection.source)
            .ok_or(ConnectionError::UnknownNode(connection.source))?;
        let dest = self
            .node(connection.dest)
            .ok_or(ConnectionError::UnknownNode(connection.dest))?;

        if connection.source_channel >= source.descriptor().num_outputs {
            return Err(ConnectionError::InvalidSourceChannel {
                node: connection.source,
                channel: connection.source_channel,
            });
        }
        if connection.dest_channel >= dest.descriptor().num_inputs {
            return Err(ConnectionError::InvalidDestChannel {
                node: connection.dest,
                channel: connection.dest_channel,
            });
        }
        Ok(())
    }

    /// True if `to` is reachable from `from` along existing connections
    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut visited = Vec::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            stack.extend(
                self.connections
                    .iter()
                    .filter(|c| c.source == current)
                    .map(|c| c.dest),
            );
        }
        false
    }

    // ------------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------------

    /// Recompute the topological order and the slot-level processing plan
    fn rebuild_plan(&mut self) {
        // Kahn's algorithm; the lowest ready id goes first
        let mut in_degree: BTreeMap<NodeId, usize> =
            self.slots.iter().map(|slot| (slot.id, 0)).collect();
        for connection in &self.connections {
            if let Some(degree) = in_degree.get_mut(&connection.dest) {
                *degree += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(self.slots.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for connection in self.connections.iter().filter(|c| c.source == id) {
                if let Some(degree) = in_degree.get_mut(&connection.dest) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(connection.dest));
                    }
                }
            }
        }
        debug_assert_eq!(order.len(), self.slots.len(), "connection set must stay acyclic");

        let mut plan = Vec::with_capacity(order.len());
        for &id in &order {
            let Some(slot) = self.index_of(id) else { continue };
            let descriptor = self.slots[slot].node.descriptor();
            let inputs = self
                .connections
                .iter()
                .filter(|c| c.dest == id)
                .filter_map(|c| {
                    self.index_of(c.source)
                        .map(|source| (source, c.source_channel, c.dest_channel))
                })
                .collect();
            let is_sink = !self.connections.iter().any(|c| c.source == id);
            plan.push(Step {
                slot,
                num_inputs: descriptor.num_inputs,
                num_outputs: descriptor.num_outputs,
                inputs,
                is_sink,
            });
        }

        self.order = order;
        self.plan = plan;
    }

    // ------------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------------

    /// Prepare every node and size the routing buffers
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        let max_block_size = max_block_size.max(1);
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;

        let mut mix_channels = 2;
        for slot in &mut self.slots {
            slot.node.prepare(sample_rate, max_block_size);
            let descriptor = slot.node.descriptor();
            mix_channels = mix_channels.max(descriptor.num_outputs);
            slot.buffer = AudioBuffer::with_capacity(descriptor.buffer_channels(), max_block_size);
            slot.buffer.set_num_samples(max_block_size);
        }
        self.mix = AudioBuffer::with_capacity(mix_channels, max_block_size);
        self.mix.set_num_samples(max_block_size);
        self.prepared = true;
        debug!(sample_rate, max_block_size, nodes = self.slots.len(), "prepared graph");
    }

    /// Process one host block in place
    ///
    /// Blocks longer than the prepared maximum are processed in chunks.
    /// An unprepared graph outputs silence.
    pub fn process(&mut self, host: &mut AudioBuffer) {
        if !self.prepared {
            host.clear();
            return;
        }

        let total = host.num_samples();
        let mut start = 0;
        while start < total {
            let frames = (total - start).min(self.max_block_size);
            self.process_chunk(host, start, frames);
            start += frames;
        }
    }

    fn process_chunk(&mut self, host: &mut AudioBuffer, start: usize, frames: usize) {
        let Self {
            slots, plan, mix, ..
        } = self;
        let host_channels = host.num_channels();

        mix.set_num_samples(frames);
        mix.clear();

        for step in plan.iter() {
            {
                let slot = &mut slots[step.slot];
                slot.buffer.set_num_samples(frames);
                slot.buffer.clear();
                if step.inputs.is_empty() {
                    let channels = step.num_inputs.min(host_channels);
                    for ch in 0..channels {
                        slot.buffer
                            .copy_from(ch, &host.channel(ch)[start..start + frames]);
                    }
                }
            }

            for &(source, source_channel, dest_channel) in &step.inputs {
                let (source, dest) = split_pair(slots, source, step.slot);
                dest.buffer
                    .add_from(dest_channel, source.buffer.channel(source_channel));
            }

            let slot = &mut slots[step.slot];
            slot.node.process(&mut slot.buffer);

            if step.is_sink {
                let channels = step.num_outputs.min(mix.num_channels());
                for ch in 0..channels {
                    mix.add_from(ch, slot.buffer.channel(ch));
                }
            }
        }

        for ch in 0..host_channels {
            let dest = &mut host.channel_mut(ch)[start..start + frames];
            if ch < mix.num_channels() {
                dest.copy_from_slice(mix.channel(ch));
            } else {
                dest.fill(0.0);
            }
        }
    }

    /// Release every node; the graph outputs silence until prepared again
    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            slot.node.release_resources();
        }
        self.prepared = false;
    }

    // ------------------------------------------------------------------------
    // Description
    // ------------------------------------------------------------------------

    /// Snapshot the graph in its persisted form
    pub fn describe(&self, name: &str) -> GraphDescription {
        let nodes = self
            .slots
            .iter()
            .map(|slot| NodeDescription {
                id: slot.id.0,
                class: slot.node.descriptor().class_id.to_string(),
                name: slot.name.clone(),
                parameters: slot
                    .node
                    .parameters()
                    .iter()
                    .map(|p| (p.id().to_string(), p.value()))
                    .collect(),
                state: slot.node.get_state(),
            })
            .collect();
        let connections = self
            .connections
            .iter()
            .map(|c| ConnectionDescription {
                source: c.source.0,
                source_channel: c.source_channel,
                dest: c.dest.0,
                dest_channel: c.dest_channel,
            })
            .collect();

        GraphDescription {
            name: name.to_string(),
            uuid: self.uuid,
            active: false,
            nodes,
            connections,
        }
    }

    /// Rebuild a graph from its persisted form
    ///
    /// Parameters are applied first, then the state blob. Every connection is
    /// validated as if it were added by hand.
    pub fn from_description(description: &GraphDescription, registry: &NodeRegistry) -> Result<Self> {
        let mut graph = Self::new();
        graph.uuid = description.uuid;

        for node_desc in &description.nodes {
            let id = NodeId(node_desc.id);
            if node_desc.id == u32::MAX {
                return Err(PlexusError::InvalidGraph {
                    reason: format!("node id {id} is out of range"),
                });
            }
            if graph.index_of(id).is_some() {
                return Err(PlexusError::InvalidGraph {
                    reason: format!("duplicate node id {id}"),
                });
            }

            let mut node = registry
                .create(&node_desc.class)
                .ok_or_else(|| PlexusError::UnknownNodeClass {
                    class: node_desc.class.clone(),
                })?;
            for (param_id, &value) in &node_desc.parameters {
                match parameter::find(node.parameters(), param_id) {
                    Some(param) => param.set_value(value),
                    None => debug!(node = %id, parameter = %param_id, "skipping unknown parameter"),
                }
            }
            if !node_desc.state.is_empty() {
                node.set_state(&node_desc.state);
            }
            graph.insert_node(id, node_desc.name.clone(), node);
        }

        for conn in &description.connections {
            graph.connect(Connection::new(
                NodeId(conn.source),
                conn.source_channel,
                NodeId(conn.dest),
                conn.dest_channel,
            ))?;
        }

        Ok(graph)
    }

    /// Build an independent copy with fresh node instances
    pub fn instantiate(&self, registry: &NodeRegistry) -> Result<Self> {
        Self::from_description(&self.describe(""), registry)
    }
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NodeGraph {
    fn drop(&mut self) {
        if self.prepared {
            self.release_all();
        }
    }
}

impl fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("uuid", &self.uuid)
            .field("nodes", &self.node_ids())
            .field("connections", &self.connections)
            .field("prepared", &self.prepared)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AllPassFilterNode, GainNode, ALLPASS_MONO_CLASS};
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn mono_pass() -> Box<dyn AudioNode> {
        Box::new(PassThroughNode::mono())
    }

    #[test]
    fn test_default_graph() {
        let graph = NodeGraph::create_default_graph();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.processing_order(), &[NodeId(1)]);
        assert!(graph.connections().is_empty());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(mono_pass());
        graph.remove_node(a).unwrap();
        let b = graph.add_node(mono_pass());
        assert_ne!(a, b);
    }

    #[test]
    fn test_connect_validates_channels() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(mono_pass());
        let b = graph.add_node(mono_pass());

        assert_eq!(
            graph.connect(Connection::new(a, 1, b, 0)),
            Err(ConnectionError::InvalidSourceChannel { node: a, channel: 1 })
        );
        assert_eq!(
            graph.connect(Connection::new(a, 0, b, 3)),
            Err(ConnectionError::InvalidDestChannel { node: b, channel: 3 })
        );
        assert_eq!(
            graph.connect(Connection::new(a, 0, NodeId(99), 0)),
            Err(ConnectionError::UnknownNode(NodeId(99)))
        );
        assert!(graph.connections().is_empty());
    }

    #[test]
    fn test_duplicate_and_cycle_rejected() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(mono_pass());
        let b = graph.add_node(mono_pass());
        let c = graph.add_node(mono_pass());

        graph.connect(Connection::new(a, 0, b, 0)).unwrap();
        graph.connect(Connection::new(b, 0, c, 0)).unwrap();
        assert_eq!(
            graph.connect(Connection::new(a, 0, b, 0)),
            Err(ConnectionError::Duplicate)
        );
        assert!(matches!(
            graph.connect(Connection::new(c, 0, a, 0)),
            Err(ConnectionError::WouldCreateCycle { .. })
        ));
        assert!(matches!(
            graph.connect(Connection::new(b, 0, b, 0)),
            Err(ConnectionError::WouldCreateCycle { .. })
        ));
        assert_eq!(graph.connections().len(), 2);
        assert_eq!(graph.processing_order(), &[a, b, c]);
    }

    #[test]
    fn test_order_follows_connections() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(mono_pass());
        let b = graph.add_node(mono_pass());
        let c = graph.add_node(mono_pass());

        graph.connect(Connection::new(c, 0, a, 0)).unwrap();
        assert_eq!(graph.processing_order(), &[b, c, a]);

        graph
            .disconnect(Connection::new(c, 0, a, 0))
            .unwrap();
        assert_eq!(graph.processing_order(), &[a, b, c]);
        assert_eq!(
            graph.disconnect(Connection::new(c, 0, a, 0)),
            Err(ConnectionError::NotConnected)
        );
    }

    #[test]
    fn test_remove_node_drops_connections() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(mono_pass());
        let b = graph.add_node(mono_pass());
        graph.connect(Connection::new(a, 0, b, 0)).unwrap();

        graph.remove_node(a).unwrap();
        assert!(graph.connections().is_empty());
        assert_eq!(graph.processing_order(), &[b]);
        assert!(matches!(
            graph.remove_node(a),
            Err(PlexusError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_host_routing_through_chain() {
        let mut graph = NodeGraph::new();
        let gain = graph.add_node(Box::new(GainNode::new(1, -6.0)));
        let thru = graph.add_node(mono_pass());
        graph.connect(Connection::new(gain, 0, thru, 0)).unwrap();
        graph.prepare(48000.0, 64);

        let mut host = AudioBuffer::new(2, 64);
        host.channel_mut(0).fill(1.0);
        host.channel_mut(1).fill(1.0);
        graph.process(&mut host);

        assert_abs_diff_eq!(host.channel(0)[5], 0.501187, epsilon = 0.001);
        // Mono sink leaves the right channel silent
        assert_abs_diff_eq!(host.channel(1)[5], 0.0);
    }

    #[test]
    fn test_fan_in_sums() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(mono_pass());
        let b = graph.add_node(mono_pass());
        let sum = graph.add_node(mono_pass());
        graph.connect(Connection::new(a, 0, sum, 0)).unwrap();
        graph.connect(Connection::new(b, 0, sum, 0)).unwrap();
        graph.prepare(44100.0, 16);

        let mut host = AudioBuffer::new(1, 16);
        host.channel_mut(0).fill(0.25);
        graph.process(&mut host);
        assert_abs_diff_eq!(host.channel(0)[0], 0.5);
    }

    #[test]
    fn test_long_block_is_chunked() {
        let mut graph = NodeGraph::create_default_graph();
        graph.prepare(44100.0, 32);

        let mut host = AudioBuffer::new(2, 100);
        for (i, s) in host.channel_mut(0).iter_mut().enumerate() {
            *s = i as f32;
        }
        let expected = host.clone();
        graph.process(&mut host);
        assert_eq!(host, expected);
    }

    #[test]
    fn test_wide_node_added_after_prepare_reaches_host() {
        let mut graph = NodeGraph::new();
        graph.prepare(48000.0, 32);
        graph.add_node(Box::new(PassThroughNode::new(4)));

        let mut host = AudioBuffer::new(4, 32);
        host.channel_mut(3).fill(0.7);
        graph.process(&mut host);
        assert_abs_diff_eq!(host.channel(3)[31], 0.7);
        assert_abs_diff_eq!(host.channel(0)[0], 0.0);
    }

    #[test]
    fn test_unprepared_graph_is_silent() {
        let mut graph = NodeGraph::create_default_graph();
        let mut host = AudioBuffer::new(2, 8);
        host.channel_mut(0).fill(1.0);
        graph.process(&mut host);
        assert_abs_diff_eq!(host.peak(), 0.0);
    }

    #[test]
    fn test_set_parameter() {
        let mut graph = NodeGraph::new();
        let id = graph.add_node(Box::new(AllPassFilterNode::mono()));
        graph.set_parameter(id, "length", 900.0).unwrap();
        let value = graph.node(id).unwrap().parameters()[0].value();
        assert_abs_diff_eq!(value, 500.0);

        assert!(matches!(
            graph.set_parameter(id, "mix", 1.0),
            Err(PlexusError::ParameterNotFound { .. })
        ));
        assert!(matches!(
            graph.set_parameter(NodeId(42), "length", 1.0),
            Err(PlexusError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_description_round_trip() {
        let registry = NodeRegistry::with_builtins();
        let mut graph = NodeGraph::new();
        let ap = graph.add_named_node("Diffuser", Box::new(AllPassFilterNode::mono()));
        let gain = graph.add_node(Box::new(GainNode::new(1, -3.0)));
        graph.set_parameter(ap, "length", 42.0).unwrap();
        graph.connect(Connection::new(ap, 0, gain, 0)).unwrap();

        assert_eq!(graph.node_name(ap), Some("Diffuser"));
        assert_eq!(graph.node_name(gain), Some("Gain (mono)"));

        let desc = graph.describe("Main");
        assert_eq!(desc.nodes[0].class, ALLPASS_MONO_CLASS);
        assert_eq!(desc.nodes[0].name, "Diffuser");

        let rebuilt = NodeGraph::from_description(&desc, &registry).unwrap();
        assert_eq!(rebuilt.describe("Main"), desc);
        assert_eq!(rebuilt.uuid(), graph.uuid());
    }

    #[test]
    fn test_node_mut_reaches_node() {
        let mut graph = NodeGraph::new();
        let ap = graph.add_node(Box::new(AllPassFilterNode::mono()));
        graph.node_mut(ap).unwrap().prepare(44100.0, 64);
        assert!(graph.node(ap).unwrap().is_prepared());
        assert!(graph.node_mut(NodeId(42)).is_none());
    }

    #[test]
    fn test_from_description_rejects_unknown_class() {
        let registry = NodeRegistry::with_builtins();
        let mut desc = NodeGraph::create_default_graph().describe("Main");
        desc.nodes[0].class = "vendor.missing".to_string();
        assert!(matches!(
            NodeGraph::from_description(&desc, &registry),
            Err(PlexusError::UnknownNodeClass { .. })
        ));
    }

    #[test]
    fn test_from_description_rejects_last_node_id() {
        let registry = NodeRegistry::with_builtins();
        let mut desc = NodeGraph::create_default_graph().describe("Main");
        desc.nodes[0].id = u32::MAX;
        assert!(matches!(
            NodeGraph::from_description(&desc, &registry),
            Err(PlexusError::InvalidGraph { .. })
        ));

        desc.nodes[0].id = u32::MAX - 1;
        let mut graph = NodeGraph::from_description(&desc, &registry).unwrap();
        assert_eq!(graph.add_node(mono_pass()), NodeId(u32::MAX));
    }

    #[test]
    fn test_from_description_rejects_cycles() {
        let registry = NodeRegistry::with_builtins();
        let mut graph = NodeGraph::new();
        let a = graph.add_node(mono_pass());
        let b = graph.add_node(mono_pass());
        graph.connect(Connection::new(a, 0, b, 0)).unwrap();

        let mut desc = graph.describe("Loop");
        desc.connections.push(ConnectionDescription {
            source: b.0,
            source_channel: 0,
            dest: a.0,
            dest_channel: 0,
        });
        assert!(matches!(
            NodeGraph::from_description(&desc, &registry),
            Err(PlexusError::Connection(ConnectionError::WouldCreateCycle { .. }))
        ));
    }

    #[test]
    fn test_instantiate_is_independent() {
        let registry = NodeRegistry::with_builtins();
        let mut graph = NodeGraph::new();
        let id = graph.add_node(Box::new(AllPassFilterNode::mono()));
        let copy = graph.instantiate(&registry).unwrap();

        graph.set_parameter(id, "length", 10.0).unwrap();
        let copied = copy.node(id).unwrap().parameters()[0].value();
        assert_abs_diff_eq!(copied, 90.0);
    }
}
