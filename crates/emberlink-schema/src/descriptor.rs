use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a schema entry, handed back to the schema on later calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaRef(pub u32);

impl SchemaRef {
    /// The tree root.
    pub const ROOT: SchemaRef = SchemaRef(0);
    /// An element the schema accepts but places no constraints on.
    pub const UNCONSTRAINED: SchemaRef = SchemaRef(u32::MAX);
}

/// The three element variants of an EmBER tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Parameter,
    Function,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Node => "node",
            ElementKind::Parameter => "parameter",
            ElementKind::Function => "function",
        };
        f.write_str(name)
    }
}

/// Declares which elements an application expects to find in a provider's tree.
///
/// The synchronization engine only ever talks to the schema through these
/// two callbacks.
pub trait Schema: Send + Sync {
    /// Decide whether a newly announced child is mirrored.
    ///
    /// Returns `None` if the child is not recognized under `parent`, in which
    /// case its record is skipped and no element is created.
    fn construct(
        &self,
        parent: SchemaRef,
        number: u32,
        identifier: &str,
        kind: ElementKind,
    ) -> Option<SchemaRef>;

    /// Check that every required child of `node` is among `present`.
    ///
    /// On failure returns the identifier of the first missing child.
    fn required_children_present(
        &self,
        node: SchemaRef,
        present: &[&str],
    ) -> std::result::Result<(), String>;
}

/// Accepts every element and requires nothing; mirrors whatever the provider exposes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicSchema;

impl Schema for DynamicSchema {
    fn construct(
        &self,
        _parent: SchemaRef,
        _number: u32,
        _identifier: &str,
        _kind: ElementKind,
    ) -> Option<SchemaRef> {
        Some(SchemaRef::UNCONSTRAINED)
    }

    fn required_children_present(
        &self,
        _node: SchemaRef,
        _present: &[&str],
    ) -> std::result::Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_schema_accepts_everything() {
        let schema = DynamicSchema;
        for kind in [ElementKind::Node, ElementKind::Parameter, ElementKind::Function] {
            assert_eq!(
                schema.construct(SchemaRef::ROOT, 7, "anything", kind),
                Some(SchemaRef::UNCONSTRAINED)
            );
        }
        assert!(schema
            .required_children_present(SchemaRef::UNCONSTRAINED, &[])
            .is_ok());
    }

    #[test]
    fn element_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ElementKind::Parameter).unwrap();
        assert_eq!(json, "\"parameter\"");
        assert_eq!(ElementKind::Function.to_string(), "function");
    }
}
