//! Process-wide registry of document paths.
//!
//! A [`PathClaim`] is held by the document that owns a file. Claims are
//! released on drop, so two live documents can never point at one path.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::error::{PlexusError, Result};

lazy_static! {
    static ref CLAIMED_PATHS: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Exclusive claim on a document path
#[derive(Debug, PartialEq, Eq)]
pub struct PathClaim {
    path: PathBuf,
    key: PathBuf,
}

impl PathClaim {
    /// Claim `path`, failing with [`PlexusError::PathInUse`] if another
    /// document already holds it under any spelling
    pub fn acquire(path: &Path) -> Result<Self> {
        let path = absolute(path);
        let key = claim_key(&path);
        let mut claimed = CLAIMED_PATHS.lock();
        if !claimed.insert(key.clone()) {
            return Err(PlexusError::PathInUse { path });
        }
        Ok(Self { path, key })
    }

    /// The claimed path, made absolute
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if this claim covers `path`
    pub fn covers(&self, path: &Path) -> bool {
        self.key == claim_key(&absolute(path))
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        CLAIMED_PATHS.lock().remove(&self.key);
    }
}

/// Check whether any live document holds `path`
pub fn is_claimed(path: &Path) -> bool {
    CLAIMED_PATHS.lock().contains(&claim_key(&absolute(path)))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Identity of an absolute path in the registry.
///
/// The parent directory is canonicalized when it exists, which resolves
/// symlinks and `..`; the file itself may not exist yet. Otherwise the
/// path is normalized lexically.
fn claim_key(path: &Path) -> PathBuf {
    let lexical = lexical_normalize(path);
    match (lexical.parent(), lexical.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|dir| dir.join(name))
            .unwrap_or(lexical),
        _ => lexical,
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
