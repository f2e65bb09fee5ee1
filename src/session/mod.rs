//! Session state and graph lifecycle orchestration
//!
//! The [`Session`] is the set of graphs the running host knows about, one of
//! them active. The [`GraphSessionController`] replaces that set on
//! new/open, keeps the document in step, and tells the sibling subsystems
//! the graph changed.

mod controller;
mod prompt;
mod siblings;

pub use controller::{ControllerState, GraphSessionController, SessionOutcome};
pub use prompt::{AutoPrompt, SaveChoice, UserPrompt};
pub use siblings::{
    DeviceSubsystem, EditorWindows, EngineSubsystem, MappingSubsystem, NullSubsystem,
    PresetSubsystem, Siblings,
};

use crate::graph::GraphDescription;

/// Graphs loaded in the running host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    graphs: Vec<GraphDescription>,
    active: Option<usize>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every graph
    pub fn clear(&mut self) {
        self.graphs.clear();
        self.active = None;
    }

    /// Add a graph, optionally making it the active one
    ///
    /// The first graph added always becomes active.
    pub fn add_graph(&mut self, graph: GraphDescription, make_active: bool) {
        self.graphs.push(graph);
        if make_active || self.active.is_none() {
            self.active = Some(self.graphs.len() - 1);
        }
    }

    /// The active graph
    pub fn active_graph(&self) -> Option<&GraphDescription> {
        self.active.and_then(|index| self.graphs.get(index))
    }

    /// Index of the active graph
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// All graphs in insertion order
    pub fn graphs(&self) -> &[GraphDescription] {
        &self.graphs
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeGraph;

    #[test]
    fn test_session_active_graph() {
        let mut session = Session::new();
        assert!(session.active_graph().is_none());

        session.add_graph(NodeGraph::new().describe("A"), false);
        assert_eq!(session.active_graph().unwrap().name, "A");

        session.add_graph(NodeGraph::new().describe("B"), false);
        assert_eq!(session.active_graph().unwrap().name, "A");

        session.add_graph(NodeGraph::new().describe("C"), true);
        assert_eq!(session.active_index(), Some(2));
        assert_eq!(session.len(), 3);

        session.clear();
        assert!(session.is_empty());
        assert!(session.active_graph().is_none());
    }
}
