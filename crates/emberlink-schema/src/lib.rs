//! Schema descriptors for EmBER consumers.
//!
//! A schema declares which nodes, parameters and functions an application
//! expects a provider to expose, and which of them are required before the
//! mirrored tree counts as ready. [`StaticSchema`] is declared up front (in
//! code or as a JSON descriptor file); [`DynamicSchema`] mirrors everything.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod static_schema;
pub mod validator;

pub use config::SchemaConfig;
pub use descriptor::{DynamicSchema, ElementKind, Schema, SchemaRef};
pub use error::{Result, SchemaError};
pub use static_schema::{ChildSpec, NodeSpec, StaticSchema};
