/// Errors that can occur while building or loading a schema descriptor.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The descriptor file could not be loaded.
    #[error("failed to load schema descriptor: {0}")]
    LoadFailed(String),

    /// The descriptor is not valid JSON.
    #[error("schema descriptor is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The descriptor does not match the descriptor format.
    #[error("invalid schema descriptor: {0}")]
    InvalidDescriptor(String),

    /// Two children of one node share an identifier.
    #[error("duplicate child identifier {identifier:?} under {parent:?}")]
    DuplicateIdentifier { parent: String, identifier: String },

    /// A parameter or function declares children.
    #[error("{identifier:?} is a {kind} and cannot declare children")]
    ChildrenOnLeaf { identifier: String, kind: crate::ElementKind },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
