//! Host configuration
//!
//! Read from a JSON file; every field is optional and falls back to its
//! default. Command line flags override the file.
//!
//! ```json
//! {
//!   "sample_rate": 48000.0,
//!   "block_size": 256,
//!   "graphs_dir": "/home/me/graphs",
//!   "untitled_name": "Untitled"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlexusError, Result};
use crate::graph::description::FILE_EXTENSION;

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Default processing block size in samples
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Largest accepted block size
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Host-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Engine sample rate in Hz
    pub sample_rate: f64,
    /// Engine block size in samples
    pub block_size: usize,
    /// Directory holding graph documents
    pub graphs_dir: PathBuf,
    /// File stem of the untitled document
    pub untitled_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            graphs_dir: default_graphs_dir(),
            untitled_name: "Untitled".to_string(),
        }
    }
}

impl HostConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PlexusError::io(path, e))?;
        let config: HostConfig =
            serde_json::from_str(&text).map_err(|e| PlexusError::InvalidConfig {
                reason: format!("{}: {e}", path.display()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given and present, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => match Self::load(path) {
                Err(PlexusError::FileNotFound { .. }) => {
                    debug!(path = %path.display(), "config file not found, using defaults");
                    Ok(Self::default())
                }
                other => other,
            },
            None => Ok(Self::default()),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(PlexusError::InvalidConfig {
                reason: format!("sample rate must be positive, got {}", self.sample_rate),
            });
        }
        if !(1..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(PlexusError::InvalidConfig {
                reason: format!(
                    "block size must be between 1 and {MAX_BLOCK_SIZE}, got {}",
                    self.block_size
                ),
            });
        }
        Ok(())
    }

    /// Apply command line overrides, then re-validate
    pub fn with_overrides(mut self, sample_rate: Option<f64>, block_size: Option<usize>) -> Result<Self> {
        if let Some(sample_rate) = sample_rate {
            self.sample_rate = sample_rate;
        }
        if let Some(block_size) = block_size {
            self.block_size = block_size;
        }
        self.validate()?;
        Ok(self)
    }

    /// Default location of the untitled document
    pub fn untitled_path(&self) -> PathBuf {
        self.graphs_dir
            .join(format!("{}.{}", self.untitled_name, FILE_EXTENSION))
    }
}

/// `<data dir>/plexus/graphs`, or `./plexus/graphs` if there is no data dir
pub fn default_graphs_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plexus")
        .join("graphs")
}
