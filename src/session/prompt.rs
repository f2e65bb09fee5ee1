//! User prompt collaborator

use std::path::{Path, PathBuf};

/// Answer to "save changes before discarding them?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveChoice {
    /// Save first, then continue
    Confirm,
    /// Discard the changes and continue
    Deny,
    /// Abort the whole operation
    Cancel,
}

/// Questions the controller needs a user (or a script) to answer
pub trait UserPrompt: Send + Sync {
    /// Ask whether unsaved changes should be saved
    fn confirm_save(&self, message: &str) -> SaveChoice;

    /// Ask where to save; `None` means the user cancelled
    fn choose_destination(&self, suggested: &Path) -> Option<PathBuf>;
}

/// Non-interactive prompt with fixed answers
///
/// Used by the command line, where documents always have a file.
#[derive(Debug, Clone)]
pub struct AutoPrompt {
    pub save_choice: SaveChoice,
    pub accept_suggested_destination: bool,
}

impl AutoPrompt {
    /// Save when asked and accept every suggested destination
    pub fn always_save() -> Self {
        Self {
            save_choice: SaveChoice::Confirm,
            accept_suggested_destination: true,
        }
    }

    /// Discard changes and cancel every destination request
    pub fn never_save() -> Self {
        Self {
            save_choice: SaveChoice::Deny,
            accept_suggested_destination: false,
        }
    }
}

impl UserPrompt for AutoPrompt {
    fn confirm_save(&self, _message: &str) -> SaveChoice {
        self.save_choice
    }

    fn choose_destination(&self, suggested: &Path) -> Option<PathBuf> {
        self.accept_suggested_destination
            .then(|| suggested.to_path_buf())
    }
}
