//! Error handling for Plexus
//!
//! Document and file failures are recoverable: the current graph is left
//! untouched and the error is reported to the caller. Nothing in the audio
//! path returns these errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;

/// Result type alias for Plexus operations
pub type Result<T> = std::result::Result<T, PlexusError>;

/// Main error type for Plexus operations
#[derive(Error, Debug)]
pub enum PlexusError {
    // File Errors
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt graph document {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("File is already open in another document: {}", path.display())]
    PathInUse { path: PathBuf },

    // Graph Errors
    #[error("Connection rejected: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    #[error("Node {node} has no parameter '{parameter}'")]
    ParameterNotFound { node: NodeId, parameter: String },

    #[error("Unknown node class: {class}")]
    UnknownNodeClass { class: String },

    #[error("Invalid graph: {reason}")]
    InvalidGraph { reason: String },

    // Audio Errors
    #[error("Invalid audio: {reason}")]
    InvalidAudio { reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlexusError {
    /// Wrap an I/O error with the path it happened on.
    ///
    /// `NotFound` is reported as [`PlexusError::FileNotFound`] so callers can
    /// tell a missing file apart from other I/O failures.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            PlexusError::FileNotFound { path }
        } else {
            PlexusError::Io { path, source }
        }
    }

    /// Build a format error for a document path
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PlexusError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PlexusError::FileNotFound { .. } => "FILE_NOT_FOUND",
            PlexusError::Io { .. } => "IO_ERROR",
            PlexusError::Format { .. } => "FORMAT_ERROR",
            PlexusError::PathInUse { .. } => "PATH_IN_USE",
            PlexusError::Connection(_) => "CONNECTION_ERROR",
            PlexusError::NodeNotFound { .. } => "NODE_NOT_FOUND",
            PlexusError::ParameterNotFound { .. } => "PARAMETER_NOT_FOUND",
            PlexusError::UnknownNodeClass { .. } => "UNKNOWN_NODE_CLASS",
            PlexusError::InvalidGraph { .. } => "INVALID_GRAPH",
            PlexusError::InvalidAudio { .. } => "INVALID_AUDIO",
            PlexusError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            PlexusError::InvalidConfig { .. } => "INVALID_CONFIG",
            PlexusError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// True for missing or unreadable/unwritable files
    pub fn is_io_error(&self) -> bool {
        matches!(self, PlexusError::FileNotFound { .. } | PlexusError::Io { .. })
    }

    /// True when a file was read but its content is corrupt
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlexusError::Format { .. } | PlexusError::Serialization(_)
        )
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the active graph in its previous valid state.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PlexusError::InvalidConfig { .. })
    }

    /// Get a user-facing recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            PlexusError::FileNotFound { .. } => Some("Check the file path and try again."),
            PlexusError::Io { .. } => Some("Check file permissions and free disk space."),
            PlexusError::Format { .. } => {
                Some("The graph file is damaged. Restore it from a backup or start a new graph.")
            }
            PlexusError::PathInUse { .. } => Some("Close the other document or pick another file."),
            PlexusError::Connection(ConnectionError::WouldCreateCycle { .. }) => {
                Some("Feedback loops are not supported. Remove a connection in the loop first.")
            }
            PlexusError::UnknownNodeClass { .. } => {
                Some("The graph uses a node that is not installed on this host.")
            }
            _ => None,
        }
    }
}

/// Reasons a connect/disconnect request is rejected
///
/// A rejected request never mutates the graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {node} has no output channel {channel}")]
    InvalidSourceChannel { node: NodeId, channel: usize },

    #[error("node {node} has no input channel {channel}")]
    InvalidDestChannel { node: NodeId, channel: usize },

    #[error("connecting {source_node} to {dest_node} would create a cycle")]
    WouldCreateCycle { source_node: NodeId, dest_node: NodeId },

    #[error("connection already exists")]
    Duplicate,

    #[error("connection does not exist")]
    NotConnected,
}

/// Problems decoding a per-node state blob
///
/// Nodes log these and keep their previous parameter values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateParseWarning {
    #[error("state blob too short ({len} bytes)")]
    TooShort { len: usize },

    #[error("state blob has an unknown header")]
    BadMagic,

    #[error("state blob version {version} is not supported")]
    UnsupportedVersion { version: u8 },

    #[error("state blob payload is unreadable: {reason}")]
    Payload { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PlexusError::FileNotFound {
            path: PathBuf::from("missing.plxg"),
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert!(err.is_io_error());
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_io_not_found_maps_to_file_not_found() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PlexusError::io("a.plxg", source);
        assert!(matches!(err, PlexusError::FileNotFound { .. }));

        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = PlexusError::io("a.plxg", source);
        assert!(matches!(err, PlexusError::Io { .. }));
    }

    #[test]
    fn test_connection_error_converts() {
        let err: PlexusError = ConnectionError::Duplicate.into();
        assert_eq!(err.error_code(), "CONNECTION_ERROR");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = PlexusError::format("x.plxg", "truncated");
        assert!(err.is_format_error());
        assert!(err.recovery_suggestion().is_some());
    }
}
