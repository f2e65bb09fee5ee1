//! Schema migration for graph documents.
//!
//! Documents carry an integer `version`. Older documents are upgraded one
//! step at a time before being deserialized; a document newer than this
//! build understands is rejected.
//!
//! Version history:
//! - 0: a single graph at the top level (`name`, `nodes`, `connections`)
//! - 1: `graphs` array with per-graph `uuid` and `active` flag

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::graph::description::{CURRENT_VERSION, FORMAT_TAG};

/// Migration step: takes the document at version `n`, returns version `n + 1`
type MigrationFn = fn(Value) -> Result<Value, String>;

/// Ordered migration steps; entry `i` upgrades version `i` to `i + 1`
const MIGRATIONS: &[MigrationFn] = &[migrate_0_to_1];

/// Read the schema version of a raw document
///
/// Documents written before versioning carry no `version` field; a
/// top-level `graphs` array then means version 1, otherwise version 0.
pub fn document_version(data: &Value) -> Result<u32, String> {
    match data.get("version") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("invalid version number {n}")),
        Some(other) => Err(format!("version must be a number, found {other}")),
        None if data.get("graphs").is_some() => Ok(1),
        None => Ok(0),
    }
}

/// Upgrade a raw document to [`CURRENT_VERSION`].
///
/// # Errors
/// Returns a description of the problem when the document is not a JSON
/// object, is newer than this build, or a migration step fails.
pub fn migrate_document(mut data: Value) -> Result<Value, String> {
    if !data.is_object() {
        return Err("document root must be an object".to_string());
    }

    let mut version = document_version(&data)?;
    if version > CURRENT_VERSION {
        return Err(format!(
            "document version {version} is newer than supported version {CURRENT_VERSION}"
        ));
    }

    while version < CURRENT_VERSION {
        let step = MIGRATIONS
            .get(version as usize)
            .ok_or_else(|| format!("no migration from version {version}"))?;
        data = step(data).map_err(|e| format!("migration from version {version} failed: {e}"))?;
        version += 1;
        tracing::debug!(version, "migrated graph document");
    }

    if let Some(obj) = data.as_object_mut() {
        obj.insert("version".to_string(), Value::from(CURRENT_VERSION));
        obj.entry("format".to_string())
            .or_insert_with(|| Value::String(FORMAT_TAG.to_string()));
        obj.entry("modified_at".to_string())
            .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));
    }
    Ok(data)
}

/// Wrap the single top-level graph of a version 0 document in a `graphs` array
fn migrate_0_to_1(data: Value) -> Result<Value, String> {
    let Value::Object(mut root) = data else {
        return Err("document root must be an object".to_string());
    };

    let mut graph = Map::new();
    let name = root
        .remove("name")
        .unwrap_or_else(|| Value::String("Graph".to_string()));
    graph.insert("name".to_string(), name);
    graph.insert(
        "uuid".to_string(),
        Value::String(Uuid::new_v4().to_string()),
    );
    graph.insert("active".to_string(), Value::Bool(true));
    graph.insert(
        "nodes".to_string(),
        root.remove("nodes").unwrap_or_else(|| Value::Array(Vec::new())),
    );
    graph.insert(
        "connections".to_string(),
        root.remove("connections")
            .unwrap_or_else(|| Value::Array(Vec::new())),
    );

    root.insert("graphs".to_string(), Value::Array(vec![Value::Object(graph)]));
    Ok(Value::Object(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::graph::GraphFile;

    #[test]
    fn test_document_version() {
        assert_eq!(document_version(&json!({"version": 1})), Ok(1));
        assert_eq!(document_version(&json!({"graphs": []})), Ok(1));
        assert_eq!(document_version(&json!({"nodes": []})), Ok(0));
        assert!(document_version(&json!({"version": "one"})).is_err());
    }

    #[test]
    fn test_current_version_passes_through() {
        let file = GraphFile::new(Vec::new());
        let value = serde_json::to_value(&file).unwrap();
        let migrated = migrate_document(value.clone()).unwrap();
        assert_eq!(migrated, value);
    }

    #[test]
    fn test_migrate_legacy_single_graph() {
        let legacy = json!({
            "name": "Legacy",
            "nodes": [ { "id": 1, "class": "plexus.passthrough.stereo", "name": "Thru" } ],
            "connections": []
        });

        let migrated = migrate_document(legacy).unwrap();
        let file: GraphFile = serde_json::from_value(migrated).unwrap();
        assert_eq!(file.version, CURRENT_VERSION);
        assert_eq!(file.format, FORMAT_TAG);
        assert_eq!(file.graphs.len(), 1);
        assert_eq!(file.graphs[0].name, "Legacy");
        assert!(file.graphs[0].active);
        assert_eq!(file.graphs[0].nodes.len(), 1);
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = migrate_document(json!({"version": 99, "graphs": []})).unwrap_err();
        assert!(err.contains("newer"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(migrate_document(json!([1, 2, 3])).is_err());
    }
}
