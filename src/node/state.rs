//! Per-node state blobs
//!
//! Layout: 4-byte magic `PXST`, one version byte, then a JSON object:
//!
//! ```text
//! {"parameters": {"length": 90.0, ...}}
//! ```
//!
//! Values are looked up by parameter id. Missing keys keep the current
//! value and unknown keys are ignored, so nodes can gain parameters without
//! breaking old blobs. Buffer contents are never stored.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StateParseWarning;
use crate::node::parameter::Parameter;

/// Header magic for node state blobs
pub const STATE_MAGIC: &[u8; 4] = b"PXST";

/// Current state blob version
pub const STATE_VERSION: u8 = 1;

const HEADER_LEN: usize = STATE_MAGIC.len() + 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatePayload {
    #[serde(default)]
    parameters: BTreeMap<String, f32>,
}

/// Encode parameter values into a state blob
pub fn encode_parameters(parameters: &[Arc<Parameter>]) -> Vec<u8> {
    let payload = StatePayload {
        parameters: parameters
            .iter()
            .map(|p| (p.id().to_string(), p.value()))
            .collect(),
    };

    let mut blob = Vec::with_capacity(64);
    blob.extend_from_slice(STATE_MAGIC);
    blob.push(STATE_VERSION);
    // A BTreeMap<String, f32> always serializes
    if let Ok(json) = serde_json::to_vec(&payload) {
        blob.extend_from_slice(&json);
    }
    blob
}

/// Decode a state blob into id → value pairs
pub fn decode_parameters(data: &[u8]) -> Result<BTreeMap<String, f32>, StateParseWarning> {
    if data.len() < HEADER_LEN {
        return Err(StateParseWarning::TooShort { len: data.len() });
    }
    if &data[..STATE_MAGIC.len()] != STATE_MAGIC {
        return Err(StateParseWarning::BadMagic);
    }
    let version = data[STATE_MAGIC.len()];
    if version == 0 || version > STATE_VERSION {
        return Err(StateParseWarning::UnsupportedVersion { version });
    }

    let payload: StatePayload =
        serde_json::from_slice(&data[HEADER_LEN..]).map_err(|e| StateParseWarning::Payload {
            reason: e.to_string(),
        })?;
    Ok(payload.parameters)
}

/// Apply a state blob to a parameter list
///
/// On any decode problem nothing is changed and the warning is returned
/// for the caller to log. Values pass through [`Parameter::set_value`], so
/// out-of-range values are clamped.
pub fn apply_parameters(parameters: &[Arc<Parameter>], data: &[u8]) -> Result<(), StateParseWarning> {
    let values = decode_parameters(data)?;
    for param in parameters {
        if let Some(value) = values.get(param.id()) {
            param.set_value(*value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> Vec<Arc<Parameter>> {
        vec![
            Parameter::shared("length", "Buffer Length", 1.0, 500.0, 90.0),
            Parameter::shared("mix", "Mix", 0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn test_encode_has_header() {
        let blob = encode_parameters(&params());
        assert_eq!(&blob[..4], STATE_MAGIC);
        assert_eq!(blob[4], STATE_VERSION);
    }

    #[test]
    fn test_apply_restores_values() {
        let source = params();
        source[0].set_value(123.5);
        source[1].set_value(0.25);
        let blob = encode_parameters(&source);

        let target = params();
        apply_parameters(&target, &blob).unwrap();
        assert_relative_eq!(target[0].value(), 123.5);
        assert_relative_eq!(target[1].value(), 0.25);
    }

    #[test]
    fn test_missing_keys_keep_current_value() {
        let mut blob = STATE_MAGIC.to_vec();
        blob.push(STATE_VERSION);
        blob.extend_from_slice(br#"{"parameters": {"length": 42.0, "future": 7.0}}"#);

        let target = params();
        target[1].set_value(0.5);
        apply_parameters(&target, &blob).unwrap();
        assert_relative_eq!(target[0].value(), 42.0);
        assert_relative_eq!(target[1].value(), 0.5);
    }

    #[test]
    fn test_malformed_blobs_change_nothing() {
        let target = params();
        target[0].set_value(77.0);

        assert_eq!(
            apply_parameters(&target, b"PX"),
            Err(StateParseWarning::TooShort { len: 2 })
        );
        assert_eq!(
            apply_parameters(&target, b"NOPE\x01{}"),
            Err(StateParseWarning::BadMagic)
        );
        assert!(matches!(
            apply_parameters(&target, b"PXST\x09{}"),
            Err(StateParseWarning::UnsupportedVersion { version: 9 })
        ));
        assert!(matches!(
            apply_parameters(&target, b"PXST\x01{not json"),
            Err(StateParseWarning::Payload { .. })
        ));
        assert_relative_eq!(target[0].value(), 77.0);
    }
}
