use serde_json::Value;

use crate::error::{Result, SchemaError};

/// JSON Schema (2020-12) of the descriptor file format.
pub const DESCRIPTOR_FORMAT: &str = r##"{
    "$schema": "https://json-schema.org/draft/2020-12/schema",
    "type": "object",
    "properties": {
        "children": { "type": "array", "items": { "$ref": "#/$defs/child" } }
    },
    "additionalProperties": false,
    "$defs": {
        "child": {
            "type": "object",
            "properties": {
                "identifier": { "type": "string", "minLength": 1 },
                "kind": { "enum": ["node", "parameter", "function"] },
                "optional": { "type": "boolean" },
                "children": { "type": "array", "items": { "$ref": "#/$defs/child" } }
            },
            "required": ["identifier", "kind"],
            "additionalProperties": false
        }
    }
}"##;

pub(crate) fn validate_descriptor(descriptor: &Value) -> Result<()> {
    let format: Value = serde_json::from_str(DESCRIPTOR_FORMAT)?;
    let validator = jsonschema::validator_for(&format)
        .map_err(|err| SchemaError::InvalidDescriptor(err.to_string()))?;

    let mut errors = validator.iter_errors(descriptor);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(SchemaError::InvalidDescriptor(message));
    }

    Ok(())
}
