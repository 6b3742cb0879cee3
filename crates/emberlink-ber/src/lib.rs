//! Streaming BER codec for EmBER payloads.
//!
//! EmBER encodes every field with an explicit outer tag (context-specific or
//! application) that wraps exactly one inner TLV. [`EmberWriter`] produces
//! that layout in either the definite or the indefinite length form;
//! [`EmberReader`] pulls it back field by field, accepting both forms.

pub mod error;
pub mod primitive;
pub mod reader;
pub mod scalar;
pub mod tag;
pub mod writer;

pub use error::{BerError, Result};
pub use reader::EmberReader;
pub use scalar::Scalar;
pub use tag::{Class, Length, Tag};
pub use writer::{EmberWriter, LengthForm};
