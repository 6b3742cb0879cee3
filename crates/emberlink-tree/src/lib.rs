//! Element model and synchronization engine for EmBER consumers.
//!
//! [`Synchronizer`] applies incoming Glow messages to an arena-backed
//! [`Tree`], tracks a [`RequestState`] per element and produces the
//! getDirectory requests needed until every element the schema cares about
//! is [`RequestState::Verified`].

mod contents;
pub mod element;
pub mod error;
pub mod glow;
pub mod invocation;
pub mod request;
pub mod state;
pub mod sync;
pub mod tree;
pub mod value;

pub use element::{Element, ElementData, ElementId, Function, Node, Parameter};
pub use error::{Result, SyncError, TreeError};
pub use invocation::InvocationResult;
pub use request::{encode_invocation, encode_set_value};
pub use state::RequestState;
pub use sync::{Applied, Progress, Synchronizer};
pub use tree::{Change, Tree};
pub use value::{Access, ParameterType, StreamDescriptor, TupleItem, Value};
