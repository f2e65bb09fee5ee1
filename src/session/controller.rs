//! Graph session controller
//!
//! Drives document lifecycle operations against the running host:
//!
//! ```text
//!   Idle ──new/open──▶ ReplacingGraph ──done or failed──▶ Idle
//! ```
//!
//! A graph replacement either completes fully (editors closed, session
//! rebuilt, every sibling notified in order) or leaves the previous graph,
//! its dirty flag and all siblings untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::document::{GraphDocument, SaveOutcome};
use crate::error::Result;
use crate::graph::NodeGraph;
use crate::session::{SaveChoice, Session, Siblings, UserPrompt};

const SAVE_CHANGES_MESSAGE: &str = "The current graph has changes. Would you like to save it?";

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    ReplacingGraph,
}

/// Result of a controller operation that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A new graph is installed and every sibling was notified
    Replaced,
    /// The document was written to this path
    Saved(PathBuf),
    /// The user cancelled; nothing changed
    Cancelled,
}

/// Orchestrates new/open/save of the host's graph
pub struct GraphSessionController {
    document: GraphDocument,
    session: Session,
    siblings: Siblings,
    prompt: Arc<dyn UserPrompt>,
    untitled_path: PathBuf,
    state: ControllerState,
}

impl GraphSessionController {
    /// Create a controller around an existing document
    ///
    /// # Arguments
    /// * `config` - Host configuration; supplies the untitled document location
    /// * `document` - The document being edited
    /// * `siblings` - Subsystems notified after every graph replacement
    /// * `prompt` - Answers save and destination questions
    pub fn new(
        config: &HostConfig,
        document: GraphDocument,
        siblings: Siblings,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        Self {
            document,
            session: Session::new(),
            siblings,
            prompt,
            untitled_path: config.untitled_path(),
            state: ControllerState::Idle,
        }
    }

    /// Point the document at the default untitled location
    pub fn activate(&mut self) {
        self.document
            .set_last_document_opened(self.untitled_path.clone());
    }

    pub fn document(&self) -> &GraphDocument {
        &self.document
    }

    /// Mutable access for graph edits; edits mark the document dirty
    pub fn document_mut(&mut self) -> &mut GraphDocument {
        &mut self.document
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether the document has unsaved changes
    pub fn has_graph_changed(&self) -> bool {
        self.document.has_changed_since_saved()
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Install the default graph as the only session graph
    pub fn open_default_graph(&mut self) -> SessionOutcome {
        self.state = ControllerState::ReplacingGraph;
        self.siblings.editors.close_all_editor_windows();
        self.session.clear();
        self.document.set_graph(NodeGraph::create_default_graph());
        self.add_document_graph_to_session();
        self.refresh_other_controllers();
        self.siblings.editors.stabilize_content();
        self.state = ControllerState::Idle;

        info!("opened default graph");
        SessionOutcome::Replaced
    }

    /// Load `file` and make it the session graph
    ///
    /// If the document is dirty the user is asked to save first; cancelling
    /// that prompt (or the destination prompt behind it) aborts. A load
    /// failure is returned with the current graph still active and no
    /// sibling notified.
    pub fn open_graph(&mut self, file: &Path) -> Result<SessionOutcome> {
        if !self.save_if_needed_and_user_agrees()? {
            return Ok(SessionOutcome::Cancelled);
        }

        self.state = ControllerState::ReplacingGraph;
        let loaded = self.document.load_from(file, true);
        if let Err(err) = loaded {
            self.state = ControllerState::Idle;
            return Err(err);
        }

        self.siblings.editors.close_all_editor_windows();
        self.session.clear();
        self.add_document_graph_to_session();
        self.refresh_other_controllers();
        self.document.set_changed_flag(false);
        self.state = ControllerState::Idle;

        info!(path = %file.display(), "opened graph");
        Ok(SessionOutcome::Replaced)
    }

    /// Replace the session with the default graph, offering to save first
    ///
    /// Only *Cancel* aborts. *Confirm* attempts a save, but the default
    /// graph replaces the document whether or not that save went through;
    /// a cancelled or failed save is logged and its changes are discarded.
    pub fn new_graph(&mut self) -> Result<SessionOutcome> {
        if self.document.has_changed_since_saved() {
            match self.prompt.confirm_save(SAVE_CHANGES_MESSAGE) {
                SaveChoice::Cancel => {
                    debug!("new graph cancelled by user");
                    return Ok(SessionOutcome::Cancelled);
                }
                SaveChoice::Deny => {}
                SaveChoice::Confirm => match self.document.save(self.prompt.as_ref()) {
                    Ok(SaveOutcome::Saved(_)) => {}
                    Ok(SaveOutcome::UserCancelled) => {
                        warn!("save before new graph was cancelled; discarding changes");
                    }
                    Err(err) => {
                        warn!(
                            code = err.error_code(),
                            "save before new graph failed, discarding changes: {err}"
                        );
                    }
                },
            }
        }
        Ok(self.open_default_graph())
    }

    /// Save the document, or save it under a new name when `save_as` is set
    pub fn save_graph(&mut self, save_as: bool) -> Result<SessionOutcome> {
        let outcome = if save_as {
            self.document.save_as(None, self.prompt.as_ref())?
        } else {
            self.document.save(self.prompt.as_ref())?
        };

        match outcome {
            SaveOutcome::UserCancelled => Ok(SessionOutcome::Cancelled),
            SaveOutcome::Saved(path) => {
                debug_assert!(
                    !self.has_graph_changed(),
                    "document still dirty after a successful save"
                );
                self.document.set_changed_flag(false);
                Ok(SessionOutcome::Saved(path))
            }
        }
    }

    /// Tell every sibling the session graph changed
    ///
    /// Always notifies all four, in this order: engine, devices, mapping,
    /// presets.
    pub fn refresh_other_controllers(&self) {
        debug!("refreshing sibling subsystems");
        self.siblings.engine.reload_from_session(&self.session);
        self.siblings.devices.refresh_device_list();
        self.siblings.mapping.exit_learn_mode();
        self.siblings.presets.refresh_preset_list();
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Returns false if the operation should be abandoned
    fn save_if_needed_and_user_agrees(&mut self) -> Result<bool> {
        if !self.document.has_changed_since_saved() {
            return Ok(true);
        }

        match self.prompt.confirm_save(SAVE_CHANGES_MESSAGE) {
            SaveChoice::Cancel => {
                debug!("graph replacement cancelled by user");
                Ok(false)
            }
            SaveChoice::Deny => Ok(true),
            SaveChoice::Confirm => match self.document.save(self.prompt.as_ref())? {
                SaveOutcome::Saved(_) => Ok(true),
                SaveOutcome::UserCancelled => Ok(false),
            },
        }
    }

    fn add_document_graph_to_session(&mut self) {
        let mut description = self.document.graph().describe(self.document.name());
        description.active = true;
        self.session.add_graph(description, true);
    }
}

impl std::fmt::Debug for GraphSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSessionController")
            .field("state", &self.state)
            .field("document", &self.document)
            .field("session_graphs", &self.session.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeRegistry;
    use crate::session::{AutoPrompt, NullSubsystem};

    fn controller(prompt: AutoPrompt) -> GraphSessionController {
        let document = GraphDocument::new(Arc::new(NodeRegistry::with_builtins()));
        let siblings = Siblings::headless(Arc::new(NullSubsystem));
        GraphSessionController::new(&HostConfig::default(), document, siblings, Arc::new(prompt))
    }

    #[test]
    fn test_open_default_graph_fills_session() {
        let mut ctrl = controller(AutoPrompt::never_save());
        assert!(ctrl.session().is_empty());

        assert_eq!(ctrl.open_default_graph(), SessionOutcome::Replaced);
        assert_eq!(ctrl.session().len(), 1);
        assert_eq!(ctrl.state(), ControllerState::Idle);
        assert!(!ctrl.has_graph_changed());
    }

    #[test]
    fn test_new_graph_discards_when_denied() {
        let mut ctrl = controller(AutoPrompt::never_save());
        ctrl.document_mut().add_node("plexus.gain.stereo").unwrap();

        assert_eq!(ctrl.new_graph().unwrap(), SessionOutcome::Replaced);
        assert_eq!(ctrl.document().graph().len(), 1);
        assert!(!ctrl.has_graph_changed());
    }

    #[test]
    fn test_save_cancelled_by_destination_prompt() {
        let mut ctrl = controller(AutoPrompt::never_save());
        ctrl.document_mut().add_node("plexus.gain.stereo").unwrap();
        assert_eq!(ctrl.save_graph(true).unwrap(), SessionOutcome::Cancelled);
        assert!(ctrl.has_graph_changed());
    }

    #[test]
    fn test_confirm_saves_to_suggested_location() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig {
            graphs_dir: dir.path().to_path_buf(),
            ..HostConfig::default()
        };
        let document = GraphDocument::new(Arc::new(NodeRegistry::with_builtins()));
        let siblings = Siblings::headless(Arc::new(NullSubsystem));
        let mut ctrl =
            GraphSessionController::new(&config, document, siblings, Arc::new(AutoPrompt::always_save()));
        ctrl.activate();
        ctrl.document_mut().add_node("plexus.gain.stereo").unwrap();

        assert_eq!(ctrl.new_graph().unwrap(), SessionOutcome::Replaced);
        assert!(dir.path().join("Graph.plxg").exists());
        assert_eq!(ctrl.document().graph().len(), 1);
    }

    #[test]
    fn test_new_graph_proceeds_when_confirmed_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = HostConfig {
            graphs_dir: blocker.clone(),
            ..HostConfig::default()
        };
        let document = GraphDocument::new(Arc::new(NodeRegistry::with_builtins()));
        let siblings = Siblings::headless(Arc::new(NullSubsystem));
        let mut ctrl =
            GraphSessionController::new(&config, document, siblings, Arc::new(AutoPrompt::always_save()));
        ctrl.activate();
        ctrl.document_mut().add_node("plexus.gain.stereo").unwrap();

        assert_eq!(ctrl.new_graph().unwrap(), SessionOutcome::Replaced);
        assert!(!blocker.join("Graph.plxg").exists());
        assert_eq!(ctrl.document().graph().len(), 1);
        assert!(!ctrl.has_graph_changed());
    }

    #[test]
    fn test_activate_sets_untitled_location() {
        let mut ctrl = controller(AutoPrompt::never_save());
        ctrl.activate();
        let expected = HostConfig::default().untitled_path();
        assert_eq!(ctrl.document().last_document_opened(), Some(expected.as_path()));
    }
}
