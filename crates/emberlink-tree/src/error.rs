use emberlink_ber::BerError;

/// Errors that can occur while decoding Glow messages or encoding requests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    /// The message is not well-formed BER.
    #[error("BER error: {0}")]
    Ber(#[from] BerError),

    /// A known element changed its kind (e.g. a parameter reported as a node).
    #[error("element {path:?} was reported with a different kind")]
    UnexpectedElement { path: String },

    /// No element matches the given path.
    #[error("unknown element: {0}")]
    UnknownElement(String),

    /// The element exists but is not a function.
    #[error("not a function: {0}")]
    NotAFunction(String),

    /// The element exists but is not a parameter.
    #[error("not a parameter: {0}")]
    NotAParameter(String),

    /// A field held a value of a type Glow does not allow there.
    #[error("unexpected {0} value")]
    UnexpectedValue(&'static str),

    /// The arena cannot address another element.
    #[error("too many elements (max {max})")]
    TooManyElements { max: u32 },
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Failure of the final readiness check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A child the schema requires was never announced by the provider.
    #[error("required element missing: {path}")]
    MissingRequiredChild { path: String },
}
