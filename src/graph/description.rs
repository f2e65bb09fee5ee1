//! Persisted graph form
//!
//! Serde types for the `.plxg` document. A file holds one or more named
//! graphs; each graph lists its nodes (class id, parameter values, opaque
//! state blob) and its connections. State blobs are embedded as base64.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `format` tag in every graph document
pub const FORMAT_TAG: &str = "plexus-graph";

/// Current document schema version
pub const CURRENT_VERSION: u32 = 1;

/// File extension for graph documents
pub const FILE_EXTENSION: &str = "plxg";

/// Top-level graph document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphFile {
    /// Always [`FORMAT_TAG`]
    pub format: String,
    /// Schema version
    pub version: u32,
    /// Last write time
    pub modified_at: DateTime<Utc>,
    /// Graphs stored in this document
    pub graphs: Vec<GraphDescription>,
}

impl GraphFile {
    /// Create a document at the current version
    pub fn new(graphs: Vec<GraphDescription>) -> Self {
        Self {
            format: FORMAT_TAG.to_string(),
            version: CURRENT_VERSION,
            modified_at: Utc::now(),
            graphs,
        }
    }

    /// Index of the graph flagged active, falling back to the first one
    pub fn active_index(&self) -> Option<usize> {
        if self.graphs.is_empty() {
            return None;
        }
        Some(self.graphs.iter().position(|g| g.active).unwrap_or(0))
    }
}

/// One named graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub name: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
}

/// One node of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Node id, unique within the graph
    pub id: u32,
    /// Processor class id resolved through the node registry
    pub class: String,
    /// Display name
    pub name: String,
    /// Parameter id → value
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
    /// Opaque state blob produced by the node
    #[serde(default, with = "base64_blob", skip_serializing_if = "Vec::is_empty")]
    pub state: Vec<u8>,
}

/// One directed channel connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub source: u32,
    pub source_channel: usize,
    pub dest: u32,
    pub dest_channel: usize,
}

mod base64_blob {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
