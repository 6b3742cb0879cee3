use emberlink_s101::FrameError;
use emberlink_tree::{SyncError, TreeError, Value};

/// Errors surfaced by a [`Consumer`](crate::Consumer).
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// Framing or transport failure while talking to the provider.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A request could not be encoded or named an unsuitable element.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// The tree was fully received but does not satisfy the schema.
    #[error("synchronization failed: {0}")]
    Sync(#[from] SyncError),

    /// The transport ended or failed; carries the cause.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The provider reported the invocation as unsuccessful.
    #[error("invocation {invocation_id} failed")]
    InvocationFailed {
        invocation_id: i32,
        result: Vec<Value>,
    },

    /// The consumer was closed.
    #[error("consumer closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ConsumerError>;
