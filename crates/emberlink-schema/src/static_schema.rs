use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::SchemaConfig;
use crate::descriptor::{ElementKind, Schema, SchemaRef};
use crate::error::{Result, SchemaError};
use crate::validator::validate_descriptor;

/// Declared shape of the root node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub children: Vec<ChildSpec>,
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, child: ChildSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Declared child of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSpec {
    pub identifier: String,
    pub kind: ElementKind,
    /// Optional children may be absent without failing the readiness check.
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildSpec>,
}

impl ChildSpec {
    pub fn new(identifier: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            optional: false,
            children: Vec::new(),
        }
    }

    pub fn node(identifier: impl Into<String>) -> Self {
        Self::new(identifier, ElementKind::Node)
    }

    pub fn parameter(identifier: impl Into<String>) -> Self {
        Self::new(identifier, ElementKind::Parameter)
    }

    pub fn function(identifier: impl Into<String>) -> Self {
        Self::new(identifier, ElementKind::Function)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_child(mut self, child: ChildSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug)]
struct Declared {
    identifier: String,
    kind: ElementKind,
    optional: bool,
    entry: u32,
}

#[derive(Debug)]
struct Entry {
    path: String,
    children: Vec<Declared>,
}

/// A schema declared up front, either in code or in a JSON descriptor file.
///
/// Children are matched by identifier; the numeric key a provider assigns is
/// not part of the declaration.
#[derive(Debug)]
pub struct StaticSchema {
    entries: Vec<Entry>,
    config: SchemaConfig,
}

impl StaticSchema {
    /// Build a schema with default config.
    pub fn new(root: &NodeSpec) -> Result<Self> {
        Self::with_config(root, SchemaConfig::default())
    }

    /// Build a schema with explicit config.
    pub fn with_config(root: &NodeSpec, config: SchemaConfig) -> Result<Self> {
        let mut schema = Self {
            entries: vec![Entry {
                path: String::new(),
                children: Vec::new(),
            }],
            config,
        };
        schema.add_children(0, &root.children)?;
        Ok(schema)
    }

    /// Load a descriptor from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with_config(json, SchemaConfig::default())
    }

    pub fn from_json_with_config(json: &str, config: SchemaConfig) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        validate_descriptor(&value)?;
        let root: NodeSpec = serde_json::from_value(value)?;
        Self::with_config(&root, config)
    }

    /// Load a descriptor file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_config(path, SchemaConfig::default())
    }

    pub fn from_file_with_config(path: &Path, config: SchemaConfig) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|err| {
            SchemaError::LoadFailed(format!("failed opening {}: {err}", path.display()))
        })?;
        let metadata = file
            .metadata()
            .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
        if !metadata.is_file() {
            return Err(SchemaError::LoadFailed(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let max_bytes = config.max_descriptor_file_size;
        let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                SchemaError::LoadFailed(format!("failed reading {}: {err}", path.display()))
            })?;
        if content.len() > max_bytes {
            return Err(SchemaError::LoadFailed(format!(
                "descriptor file too large (max {max_bytes} bytes): {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "loaded schema descriptor");
        Self::from_json_with_config(&content, config)
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Number of declared elements, excluding the root.
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add_children(&mut self, parent: usize, children: &[ChildSpec]) -> Result<()> {
        let mut seen = HashSet::new();
        for child in children {
            if !seen.insert(child.identifier.as_str()) {
                return Err(SchemaError::DuplicateIdentifier {
                    parent: self.entries[parent].path.clone(),
                    identifier: child.identifier.clone(),
                });
            }
            if child.kind != ElementKind::Node && !child.children.is_empty() {
                return Err(SchemaError::ChildrenOnLeaf {
                    identifier: child.identifier.clone(),
                    kind: child.kind,
                });
            }

            let index = self.entries.len();
            let entry = u32::try_from(index).map_err(|_| {
                SchemaError::InvalidDescriptor("too many declared elements".to_string())
            })?;
            let path = format!("{}/{}", self.entries[parent].path, child.identifier);
            self.entries.push(Entry {
                path,
                children: Vec::new(),
            });
            self.entries[parent].children.push(Declared {
                identifier: child.identifier.clone(),
                kind: child.kind,
                optional: child.optional,
                entry,
            });
            self.add_children(index, &child.children)?;
        }
        Ok(())
    }
}

impl Schema for StaticSchema {
    fn construct(
        &self,
        parent: SchemaRef,
        number: u32,
        identifier: &str,
        kind: ElementKind,
    ) -> Option<SchemaRef> {
        if parent == SchemaRef::UNCONSTRAINED {
            return Some(SchemaRef::UNCONSTRAINED);
        }
        let entry = self.entries.get(parent.0 as usize)?;

        match entry.children.iter().find(|c| c.identifier == identifier) {
            Some(declared) if declared.kind == kind => Some(SchemaRef(declared.entry)),
            Some(declared) => {
                debug!(
                    parent = %entry.path,
                    identifier,
                    declared = %declared.kind,
                    received = %kind,
                    "element kind differs from declaration"
                );
                None
            }
            None if self.config.allow_unknown_children => Some(SchemaRef::UNCONSTRAINED),
            None => {
                trace!(parent = %entry.path, number, identifier, "undeclared element ignored");
                None
            }
        }
    }

    fn required_children_present(
        &self,
        node: SchemaRef,
        present: &[&str],
    ) -> std::result::Result<(), String> {
        let Some(entry) = self.entries.get(node.0 as usize) else {
            return Ok(());
        };
        match entry
            .children
            .iter()
            .find(|c| !c.optional && !present.contains(&c.identifier.as_str()))
        {
            Some(missing) => Err(missing.identifier.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer() -> NodeSpec {
        NodeSpec::new()
            .with_child(
                ChildSpec::node("Channel")
                    .with_child(ChildSpec::parameter("Gain"))
                    .with_child(ChildSpec::parameter("Mute").optional()),
            )
            .with_child(ChildSpec::function("Reset").optional())
    }

    #[test]
    fn construct_matches_by_identifier_and_kind() {
        let schema = StaticSchema::new(&mixer()).unwrap();
        let channel = schema
            .construct(SchemaRef::ROOT, 1, "Channel", ElementKind::Node)
            .unwrap();
        assert!(schema
            .construct(channel, 1, "Gain", ElementKind::Parameter)
            .is_some());
        assert!(schema
            .construct(channel, 2, "Gain", ElementKind::Function)
            .is_none());
        assert!(schema
            .construct(SchemaRef::ROOT, 9, "Unknown", ElementKind::Node)
            .is_none());
        assert_eq!(schema.len(), 4);
    }

    #[test]
    fn required_children_reports_first_missing() {
        let schema = StaticSchema::new(&mixer()).unwrap();
        let channel = schema
            .construct(SchemaRef::ROOT, 1, "Channel", ElementKind::Node)
            .unwrap();

        assert_eq!(
            schema.required_children_present(channel, &["Mute"]),
            Err("Gain".to_string())
        );
        assert!(schema.required_children_present(channel, &["Gain"]).is_ok());
        assert!(schema
            .required_children_present(SchemaRef::ROOT, &["Channel"])
            .is_ok());
    }

    #[test]
    fn unknown_children_allowed_when_configured() {
        let config = SchemaConfig {
            allow_unknown_children: true,
            ..SchemaConfig::default()
        };
        let schema = StaticSchema::with_config(&mixer(), config).unwrap();
        let extra = schema
            .construct(SchemaRef::ROOT, 5, "Extra", ElementKind::Node)
            .unwrap();
        assert_eq!(extra, SchemaRef::UNCONSTRAINED);
        assert_eq!(
            schema.construct(extra, 1, "Deep", ElementKind::Parameter),
            Some(SchemaRef::UNCONSTRAINED)
        );
        assert!(schema.required_children_present(extra, &[]).is_ok());
    }

    #[test]
    fn duplicate_identifier_rejected() {
        let spec = NodeSpec::new()
            .with_child(ChildSpec::parameter("Gain"))
            .with_child(ChildSpec::parameter("Gain"));
        assert!(matches!(
            StaticSchema::new(&spec),
            Err(SchemaError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn leaf_with_children_rejected() {
        let spec =
            NodeSpec::new().with_child(ChildSpec::parameter("Gain").with_child(ChildSpec::node("x")));
        assert!(matches!(
            StaticSchema::new(&spec),
            Err(SchemaError::ChildrenOnLeaf { .. })
        ));
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{
            "children": [
                { "identifier": "Channel", "kind": "node", "children": [
                    { "identifier": "Gain", "kind": "parameter" }
                ]},
                { "identifier": "Reset", "kind": "function", "optional": true }
            ]
        }"#;
        let schema = StaticSchema::from_json(json).unwrap();
        let channel = schema
            .construct(SchemaRef::ROOT, 1, "Channel", ElementKind::Node)
            .unwrap();
        assert_eq!(
            schema.required_children_present(channel, &[]),
            Err("Gain".to_string())
        );
    }

    #[test]
    fn json_descriptor_is_validated() {
        let bad_kind = r#"{ "children": [ { "identifier": "Gain", "kind": "matrix" } ] }"#;
        assert!(matches!(
            StaticSchema::from_json(bad_kind),
            Err(SchemaError::InvalidDescriptor(_))
        ));

        let extra_field = r#"{ "children": [], "version": 2 }"#;
        assert!(matches!(
            StaticSchema::from_json(extra_field),
            Err(SchemaError::InvalidDescriptor(_))
        ));

        assert!(matches!(
            StaticSchema::from_json("not json"),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn spec_roundtrips_through_serde() {
        let json = serde_json::to_string(&mixer()).unwrap();
        let parsed: NodeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, mixer());
    }

    #[test]
    fn loads_from_file_with_size_limit() {
        let dir = std::env::temp_dir().join(format!(
            "emberlink-schema-file-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mixer.json");
        std::fs::write(&path, serde_json::to_string(&mixer()).unwrap()).unwrap();

        let schema = StaticSchema::from_file(&path).unwrap();
        assert_eq!(schema.len(), 4);

        let tiny = SchemaConfig {
            max_descriptor_file_size: 8,
            ..SchemaConfig::default()
        };
        assert!(matches!(
            StaticSchema::from_file_with_config(&path, tiny),
            Err(SchemaError::LoadFailed(_))
        ));
        assert!(matches!(
            StaticSchema::from_file(&dir.join("missing.json")),
            Err(SchemaError::LoadFailed(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
