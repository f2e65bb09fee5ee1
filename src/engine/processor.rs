//! Real-time graph processing
//!
//! The control thread owns an [`AudioEngine`]; the audio thread owns an
//! [`AudioProcessor`]. They share one atomically swappable handle to the
//! running graph:
//!
//! - The control thread builds a new graph, prepares every node, then
//!   publishes it with a single store.
//! - The audio thread loads the handle once per block and processes that
//!   graph in full. It only ever `try_lock`s the graph; if it cannot, the
//!   block is silent.
//! - Graphs taken out of service are parked on the control thread and
//!   dropped there once the audio thread no longer holds them.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::engine::AudioBuffer;
use crate::error::{PlexusError, Result};
use crate::graph::{NodeGraph, NodeId};
use crate::node::{parameter, NodeRegistry, Parameter};
use crate::session::{EngineSubsystem, Session};

/// Published graph; locked only by the audio thread while it processes
pub struct GraphCell {
    graph: Mutex<NodeGraph>,
}

impl GraphCell {
    fn new(graph: NodeGraph) -> Self {
        Self {
            graph: Mutex::new(graph),
        }
    }
}

type SharedGraph = Arc<ArcSwapOption<GraphCell>>;

/// Control-side handle to the running graph
pub struct AudioEngine {
    registry: Arc<NodeRegistry>,
    sample_rate: f64,
    block_size: usize,
    current: SharedGraph,
    parameters: Mutex<BTreeMap<NodeId, Vec<Arc<Parameter>>>>,
    retired: Mutex<Vec<Arc<GraphCell>>>,
}

impl AudioEngine {
    /// Create an engine with nothing published
    pub fn new(registry: Arc<NodeRegistry>, sample_rate: f64, block_size: usize) -> Self {
        Self {
            registry,
            sample_rate,
            block_size: block_size.max(1),
            current: Arc::new(ArcSwapOption::empty()),
            parameters: Mutex::new(BTreeMap::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Audio-thread side sharing this engine's graph handle
    pub fn processor(&self) -> AudioProcessor {
        AudioProcessor {
            current: Arc::clone(&self.current),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether a graph is currently published
    pub fn has_graph(&self) -> bool {
        self.current.load().is_some()
    }

    /// Instantiate the session's active graph and publish it
    ///
    /// An empty session unpublishes the running graph. On error the running
    /// graph stays in place.
    pub fn load_session(&self, session: &Session) -> Result<()> {
        match session.active_graph() {
            Some(description) => {
                let graph = NodeGraph::from_description(description, &self.registry)?;
                self.publish(graph);
                info!(graph = %description.name, "engine reloaded from session");
            }
            None => {
                self.unpublish();
                info!("engine cleared; session has no active graph");
            }
        }
        Ok(())
    }

    /// Prepare `graph` and make it the running graph
    pub fn publish(&self, mut graph: NodeGraph) {
        graph.prepare(self.sample_rate, self.block_size);
        let parameters = graph.parameter_handles();
        let previous = self.current.swap(Some(Arc::new(GraphCell::new(graph))));
        *self.parameters.lock() = parameters;
        self.retire(previous);
    }

    /// Stop processing; the audio thread outputs silence
    pub fn unpublish(&self) {
        let previous = self.current.swap(None);
        self.parameters.lock().clear();
        self.retire(previous);
    }

    /// Write a parameter of the running graph
    pub fn set_parameter(&self, node: NodeId, parameter_id: &str, value: f32) -> Result<()> {
        let parameters = self.parameters.lock();
        let handles = parameters
            .get(&node)
            .ok_or(PlexusError::NodeNotFound { id: node })?;
        let param = parameter::find(handles, parameter_id).ok_or_else(|| {
            PlexusError::ParameterNotFound {
                node,
                parameter: parameter_id.to_string(),
            }
        })?;
        param.set_value(value);
        Ok(())
    }

    /// Read a parameter of the running graph
    pub fn parameter_value(&self, node: NodeId, parameter_id: &str) -> Option<f32> {
        let parameters = self.parameters.lock();
        parameters
            .get(&node)
            .and_then(|handles| parameter::find(handles, parameter_id))
            .map(|param| param.value())
    }

    /// Drop retired graphs the audio thread no longer references
    ///
    /// Returns how many are still held.
    pub fn collect_retired(&self) -> usize {
        let mut retired = self.retired.lock();
        retired.retain(|cell| Arc::strong_count(cell) > 1);
        retired.len()
    }

    fn retire(&self, previous: Option<Arc<GraphCell>>) {
        if let Some(cell) = previous {
            self.retired.lock().push(cell);
        }
        let pending = self.collect_retired();
        if pending > 0 {
            debug!(pending, "retired graphs still in use by the audio thread");
        }
    }
}

impl EngineSubsystem for AudioEngine {
    fn reload_from_session(&self, session: &Session) {
        if let Err(err) = self.load_session(session) {
            warn!(code = err.error_code(), "engine kept its previous graph: {err}");
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.current.store(None);
        if self.collect_retired() > 0 {
            warn!("audio processor still holds a graph at engine shutdown");
        }
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("sample_rate", &self.sample_rate)
            .field("block_size", &self.block_size)
            .field("has_graph", &self.has_graph())
            .finish()
    }
}

/// Audio-thread handle
///
/// Never blocks, allocates or logs.
#[derive(Clone)]
pub struct AudioProcessor {
    current: SharedGraph,
}

impl AudioProcessor {
    /// Process one block in place
    ///
    /// Returns false (and clears the block) if no graph is published or the
    /// graph is busy.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) -> bool {
        let guard = self.current.load();
        if let Some(cell) = &*guard {
            if let Some(mut graph) = cell.graph.try_lock() {
                graph.process(buffer);
                return true;
            }
        }
        buffer.clear();
        false
    }
}
