//! Graph documents
//!
//! A [`GraphDocument`] owns the graph being edited, the file it belongs to,
//! and a dirty flag. Loading replaces the graph wholesale or not at all;
//! saving writes through a temporary file and renames it into place, so a
//! failed or cancelled save never leaves a partial document on disk.
//!
//! # File layout
//!
//! ```text
//! {
//!   "format": "plexus-graph",
//!   "version": 1,
//!   "modified_at": "2024-05-01T12:00:00Z",
//!   "graphs": [ { "name": "Main", "uuid": "…", "active": true,
//!                 "nodes": [...], "connections": [...] } ]
//! }
//! ```

pub mod claims;
pub mod migration;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{ConnectionError, PlexusError, Result};
use crate::graph::description::{FILE_EXTENSION, FORMAT_TAG};
use crate::graph::{Connection, GraphDescription, GraphFile, NodeGraph, NodeId};
use crate::node::{AudioNode, NodeRegistry};
use crate::session::UserPrompt;

pub use claims::PathClaim;

/// Name given to graphs created from scratch
pub const DEFAULT_GRAPH_NAME: &str = "Graph";

/// Result of a save request that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The document was written to this path
    Saved(PathBuf),
    /// The destination prompt was dismissed; nothing was written
    UserCancelled,
}

/// Contents of a graph document read from disk
#[derive(Debug)]
pub struct LoadedDocument {
    /// Active graph, instantiated
    pub graph: NodeGraph,
    /// Name of the active graph
    pub name: String,
    /// The other graphs stored alongside it, kept verbatim
    pub other_graphs: Vec<GraphDescription>,
}

/// Change-tracked document wrapping one node graph
pub struct GraphDocument {
    registry: Arc<NodeRegistry>,
    graph: NodeGraph,
    name: String,
    other_graphs: Vec<GraphDescription>,
    claim: Option<PathClaim>,
    last_opened: Option<PathBuf>,
    changed: bool,
    /// Parameter values as of the last save, load or explicit clear
    saved_parameters: ParameterSnapshot,
}

/// Bit patterns of every parameter value, keyed by node
type ParameterSnapshot = Vec<(NodeId, Vec<u32>)>;

fn parameter_snapshot(graph: &NodeGraph) -> ParameterSnapshot {
    graph
        .parameter_handles()
        .into_iter()
        .map(|(id, handles)| (id, handles.iter().map(|p| p.value().to_bits()).collect()))
        .collect()
}

impl GraphDocument {
    /// Create an untitled document holding the default graph
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        let graph = NodeGraph::create_default_graph();
        Self {
            registry,
            saved_parameters: parameter_snapshot(&graph),
            graph,
            name: DEFAULT_GRAPH_NAME.to_string(),
            other_graphs: Vec::new(),
            claim: None,
            last_opened: None,
            changed: false,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The edited graph
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Mutable access to the graph; marks the document as changed
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        self.changed = true;
        &mut self.graph
    }

    /// Name of the active graph
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the active graph
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.changed = true;
    }

    /// Backing file, if the document has been loaded or saved
    pub fn file(&self) -> Option<&Path> {
        self.claim.as_ref().map(PathClaim::path)
    }

    /// Registry used to instantiate loaded graphs
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Remember where documents were last opened; used to suggest save locations
    pub fn set_last_document_opened(&mut self, path: impl Into<PathBuf>) {
        self.last_opened = Some(path.into());
    }

    /// Location of the last opened document
    pub fn last_document_opened(&self) -> Option<&Path> {
        self.last_opened.as_deref()
    }

    /// Whether the graph changed since the last save or load
    ///
    /// Parameter handles are shared, so a value written through
    /// [`GraphDocument::graph`] also counts as a change.
    pub fn has_changed_since_saved(&self) -> bool {
        self.changed || self.saved_parameters != parameter_snapshot(&self.graph)
    }

    /// Force the dirty flag; clearing it also takes the current parameter
    /// values as the saved state
    pub fn set_changed_flag(&mut self, changed: bool) {
        if changed {
            self.changed = true;
        } else {
            self.mark_clean();
        }
    }

    fn mark_clean(&mut self) {
        self.changed = false;
        self.saved_parameters = parameter_snapshot(&self.graph);
    }

    // ========================================================================
    // Graph editing
    // ========================================================================

    /// Replace the graph wholesale with a fresh, untitled one
    ///
    /// The old graph is released; the document detaches from its file and
    /// starts clean.
    pub fn set_graph(&mut self, graph: NodeGraph) {
        let mut old = std::mem::replace(&mut self.graph, graph);
        old.release_all();
        self.name = DEFAULT_GRAPH_NAME.to_string();
        self.other_graphs.clear();
        self.claim = None;
        self.mark_clean();
        debug!("installed new graph in document");
    }

    /// Add a node of a registered class
    pub fn add_node(&mut self, class_id: &str) -> Result<NodeId> {
        let node = self
            .registry
            .create(class_id)
            .ok_or_else(|| PlexusError::UnknownNodeClass {
                class: class_id.to_string(),
            })?;
        Ok(self.add_node_instance(node))
    }

    /// Add an already constructed node
    pub fn add_node_instance(&mut self, node: Box<dyn AudioNode>) -> NodeId {
        self.changed = true;
        self.graph.add_node(node)
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.graph.remove_node(id)?;
        self.changed = true;
        Ok(())
    }

    /// Connect two nodes; rejected requests leave the document untouched
    pub fn connect(&mut self, connection: Connection) -> std::result::Result<(), ConnectionError> {
        self.graph.connect(connection)?;
        self.changed = true;
        Ok(())
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection: Connection) -> std::result::Result<(), ConnectionError> {
        self.graph.disconnect(connection)?;
        self.changed = true;
        Ok(())
    }

    /// Set a node parameter
    pub fn set_parameter(&mut self, id: NodeId, parameter: &str, value: f32) -> Result<()> {
        self.graph.set_parameter(id, parameter, value)?;
        self.changed = true;
        Ok(())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persisted form of the whole document
    pub fn describe(&self) -> GraphFile {
        let mut active = self.graph.describe(&self.name);
        active.active = true;

        let mut graphs = Vec::with_capacity(1 + self.other_graphs.len());
        graphs.push(active);
        graphs.extend(self.other_graphs.iter().cloned().map(|mut g| {
            g.active = false;
            g
        }));
        GraphFile::new(graphs)
    }

    /// Load a document, replacing the current graph
    ///
    /// On success the previous graph is released, the document takes over
    /// `file` and the dirty flag is cleared. On failure nothing changes.
    /// With `show_error_message` the failure is also logged at error level.
    pub fn load_from(&mut self, file: &Path, show_error_message: bool) -> Result<()> {
        let result = self.try_load(file);
        if let Err(err) = &result {
            if show_error_message {
                error!(path = %file.display(), code = err.error_code(), "could not open graph: {err}");
            } else {
                debug!(path = %file.display(), "could not open graph: {err}");
            }
        }
        result
    }

    fn try_load(&mut self, file: &Path) -> Result<()> {
        let loaded = read_document(file, &self.registry)?;
        let claim = self.claim_for(file)?;

        let mut old = std::mem::replace(&mut self.graph, loaded.graph);
        old.release_all();
        self.name = loaded.name;
        self.other_graphs = loaded.other_graphs;
        if let Some(claim) = claim {
            self.claim = Some(claim);
        }
        self.last_opened = Some(file.to_path_buf());
        self.mark_clean();

        info!(path = %file.display(), nodes = self.graph.len(), "loaded graph document");
        Ok(())
    }

    /// Save to the current file, asking for a destination if there is none
    pub fn save(&mut self, prompt: &dyn UserPrompt) -> Result<SaveOutcome> {
        match self.file().map(Path::to_path_buf) {
            Some(path) => self.write_to(path),
            None => self.save_as(None, prompt),
        }
    }

    /// Save to `file`, or to a destination chosen through `prompt`
    ///
    /// Returns [`SaveOutcome::UserCancelled`] if the prompt is dismissed.
    pub fn save_as(&mut self, file: Option<PathBuf>, prompt: &dyn UserPrompt) -> Result<SaveOutcome> {
        let destination = match file {
            Some(path) => path,
            None => match prompt.choose_destination(&self.suggested_destination()) {
                Some(path) => path,
                None => {
                    debug!("save cancelled by user");
                    return Ok(SaveOutcome::UserCancelled);
                }
            },
        };
        self.write_to(with_extension(destination))
    }

    fn write_to(&mut self, path: PathBuf) -> Result<SaveOutcome> {
        let claim = self.claim_for(&path)?;
        let json = serde_json::to_string_pretty(&self.describe())?;
        write_atomic(&path, json.as_bytes())?;

        if let Some(claim) = claim {
            self.claim = Some(claim);
        }
        self.mark_clean();
        info!(path = %path.display(), "saved graph document");
        Ok(SaveOutcome::Saved(path))
    }

    /// New claim for `path`, or `None` if the document already holds it
    fn claim_for(&self, path: &Path) -> Result<Option<PathClaim>> {
        match &self.claim {
            Some(claim) if claim.covers(path) => Ok(None),
            _ => PathClaim::acquire(path).map(Some),
        }
    }

    fn suggested_destination(&self) -> PathBuf {
        if let Some(file) = self.file() {
            return file.to_path_buf();
        }
        let file_name = format!("{}.{}", self.name, FILE_EXTENSION);
        match self.last_opened.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

impl std::fmt::Debug for GraphDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDocument")
            .field("name", &self.name)
            .field("file", &self.file())
            .field("changed", &self.has_changed_since_saved())
            .field("graph", &self.graph)
            .finish()
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Read and validate a graph document without touching any live document
pub fn read_graph_file(path: &Path) -> Result<GraphFile> {
    let text = std::fs::read_to_string(path).map_err(|e| PlexusError::io(path, e))?;
    let raw: Value =
        serde_json::from_str(&text).map_err(|e| PlexusError::format(path, e.to_string()))?;
    let migrated = migration::migrate_document(raw).map_err(|e| PlexusError::format(path, e))?;
    let file: GraphFile =
        serde_json::from_value(migrated).map_err(|e| PlexusError::format(path, e.to_string()))?;

    if file.format != FORMAT_TAG {
        return Err(PlexusError::format(
            path,
            format!("unexpected format tag '{}'", file.format),
        ));
    }
    Ok(file)
}

/// Read a document and instantiate its active graph
///
/// Any problem past opening the file (bad JSON, unknown node class, invalid
/// connection) is reported as [`PlexusError::Format`].
pub fn read_document(path: &Path, registry: &NodeRegistry) -> Result<LoadedDocument> {
    let mut file = read_graph_file(path)?;
    let index = file
        .active_index()
        .ok_or_else(|| PlexusError::format(path, "document contains no graphs"))?;

    let active = file.graphs.remove(index);
    let graph = NodeGraph::from_description(&active, registry)
        .map_err(|e| PlexusError::format(path, e.to_string()))?;

    Ok(LoadedDocument {
        graph,
        name: active.name,
        other_graphs: file.graphs,
    })
}

/// Write `contents` to `path` through a temporary file in the same directory
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| PlexusError::io(&dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| PlexusError::io(&dir, e))?;
    temp.write_all(contents)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| PlexusError::io(path, e))?;
    temp.persist(path)
        .map_err(|e| PlexusError::io(path, e.error))?;
    Ok(())
}

/// Append the document extension when `path` has none
fn with_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(FILE_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ALLPASS_STEREO_CLASS;
    use crate::session::SaveChoice;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    struct FixedPrompt(Option<PathBuf>);

    impl UserPrompt for FixedPrompt {
        fn confirm_save(&self, _message: &str) -> SaveChoice {
            SaveChoice::Deny
        }

        fn choose_destination(&self, _suggested: &Path) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    fn document() -> GraphDocument {
        GraphDocument::new(Arc::new(NodeRegistry::with_builtins()))
    }

    #[test]
    fn test_new_document_is_clean_default() {
        let doc = document();
        assert!(!doc.has_changed_since_saved());
        assert_eq!(doc.graph().len(), 1);
        assert!(doc.file().is_none());
    }

    #[test]
    fn test_mutations_set_dirty_flag() {
        let mut doc = document();
        let id = doc.add_node(ALLPASS_STEREO_CLASS).unwrap();
        assert!(doc.has_changed_since_saved());

        doc.set_changed_flag(false);
        doc.set_parameter(id, "length", 12.0).unwrap();
        assert!(doc.has_changed_since_saved());

        doc.set_changed_flag(false);
        assert!(doc.connect(Connection::new(id, 0, id, 0)).is_err());
        assert!(!doc.has_changed_since_saved());
    }

    #[test]
    fn test_parameter_write_through_shared_graph_is_a_change() {
        let mut doc = document();
        let id = doc.add_node(ALLPASS_STEREO_CLASS).unwrap();
        doc.set_changed_flag(false);

        let length = doc.graph().node(id).unwrap().parameters()[0].clone();
        length.set_value(12.0);
        assert!(doc.has_changed_since_saved());

        doc.set_changed_flag(false);
        assert!(!doc.has_changed_since_saved());
        length.set_value(12.0);
        assert!(!doc.has_changed_since_saved());
    }

    #[test]
    fn test_save_as_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("round.plxg");

        let mut doc = document();
        let ap = doc.add_node(ALLPASS_STEREO_CLASS).unwrap();
        doc.set_parameter(ap, "length", 33.0).unwrap();
        doc.connect(Connection::new(NodeId(1), 1, ap, 0)).unwrap();
        let before = doc.graph().describe(doc.name());

        let outcome = doc.save_as(Some(path.clone()), &FixedPrompt(None)).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved(path.clone()));
        assert!(!doc.has_changed_since_saved());
        drop(doc);

        let mut other = document();
        other.load_from(&path, false).unwrap();
        assert_eq!(other.graph().describe(other.name()), before);
        assert!(!other.has_changed_since_saved());
    }

    #[test]
    fn test_save_as_cancelled() {
        let mut doc = document();
        doc.graph_mut();
        let outcome = doc.save_as(None, &FixedPrompt(None)).unwrap();
        assert_eq!(outcome, SaveOutcome::UserCancelled);
        assert!(doc.has_changed_since_saved());
        assert!(doc.file().is_none());
    }

    #[test]
    fn test_save_adds_extension_and_uses_prompt() {
        let dir = tempdir().unwrap();
        let mut doc = document();
        let outcome = doc
            .save(&FixedPrompt(Some(dir.path().join("picked"))))
            .unwrap();
        let expected = dir.path().join("picked.plxg");
        assert_eq!(outcome, SaveOutcome::Saved(expected.clone()));
        assert!(expected.exists());

        // Second save goes to the same file without asking
        doc.graph_mut();
        let outcome = doc.save(&FixedPrompt(None)).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved(expected));
    }

    #[test]
    fn test_load_missing_file_leaves_document_untouched() {
        let dir = tempdir().unwrap();
        let mut doc = document();
        doc.add_node(ALLPASS_STEREO_CLASS).unwrap();
        let before = doc.graph().describe(doc.name());

        let err = doc.load_from(&dir.path().join("missing.plxg"), false).unwrap_err();
        assert!(matches!(err, PlexusError::FileNotFound { .. }));
        assert_eq!(doc.graph().describe(doc.name()), before);
        assert!(doc.has_changed_since_saved());
    }

    #[test]
    fn test_load_corrupt_file_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.plxg");
        std::fs::write(&path, "{ not json").unwrap();

        let mut doc = document();
        let err = doc.load_from(&path, true).unwrap_err();
        assert!(err.is_format_error());
        assert!(doc.file().is_none());
    }

    #[test]
    fn test_load_unknown_class_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unknown.plxg");
        let mut file = document().describe();
        file.graphs[0].nodes[0].class = "vendor.missing".to_string();
        std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let err = document().load_from(&path, false).unwrap_err();
        assert!(matches!(err, PlexusError::Format { .. }));
    }

    #[test]
    fn test_two_documents_cannot_share_a_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.plxg");

        let mut first = document();
        first.save_as(Some(path.clone()), &FixedPrompt(None)).unwrap();

        let mut second = document();
        let err = second.load_from(&path, false).unwrap_err();
        assert!(matches!(err, PlexusError::PathInUse { .. }));
        let err = second
            .save_as(Some(path.clone()), &FixedPrompt(None))
            .unwrap_err();
        assert!(matches!(err, PlexusError::PathInUse { .. }));

        drop(first);
        assert!(second.load_from(&path, false).is_ok());
    }

    #[test]
    fn test_other_graphs_survive_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("multi.plxg");

        let mut file = document().describe();
        let mut extra = NodeGraph::new().describe("Spare");
        extra.active = false;
        file.graphs.push(extra);
        std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let mut doc = document();
        doc.load_from(&path, false).unwrap();
        doc.save(&FixedPrompt(None)).unwrap();

        let reread = read_graph_file(&path).unwrap();
        assert_eq!(reread.graphs.len(), 2);
        assert_eq!(reread.graphs[1].name, "Spare");
        assert_eq!(reread.active_index(), Some(0));
    }

    #[test]
    fn test_set_graph_detaches_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("detach.plxg");
        let mut doc = document();
        doc.save_as(Some(path.clone()), &FixedPrompt(None)).unwrap();

        doc.set_graph(NodeGraph::create_default_graph());
        assert!(doc.file().is_none());
        assert!(!claims::is_claimed(&path));
    }
}
