use std::fmt;

use serde::Serialize;

/// How much of an element (and its subtree) is known.
///
/// The declaration order is the lattice order: `None < RequestSent < Complete < Verified`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Nothing has been requested yet.
    #[default]
    None,
    /// A request is in flight.
    RequestSent,
    /// The element's own data and direct children are known.
    Complete,
    /// The element and its entire subtree are known and schema-complete.
    Verified,
}

impl RequestState {
    /// The weaker of two states.
    pub fn meet(self, other: RequestState) -> RequestState {
        self.min(other)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::None => "none",
            RequestState::RequestSent => "request-sent",
            RequestState::Complete => "complete",
            RequestState::Verified => "verified",
        };
        f.write_str(name)
    }
}
