use crate::tag::Tag;

/// Errors that can occur while encoding or decoding BER data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BerError {
    /// The input ended in the middle of a tag, length or value.
    #[error("unexpected end of input at offset {offset}")]
    Truncated { offset: usize },

    /// A length field uses a reserved or oversized encoding.
    #[error("invalid length encoding at offset {offset}")]
    InvalidLength { offset: usize },

    /// A high-tag-number form does not fit in 32 bits.
    #[error("tag number too large at offset {offset}")]
    TagTooLarge { offset: usize },

    /// The encoded type does not match the requested one.
    #[error("expected {expected}, found {actual}")]
    TagMismatch { expected: Tag, actual: Tag },

    /// An explicit field tag was encoded as primitive.
    #[error("field tag {0} must be constructed")]
    PrimitiveOuter(Tag),

    /// A primitive value announced an indefinite length.
    #[error("primitive {0} cannot use the indefinite length form")]
    IndefinitePrimitive(Tag),

    /// An element claims more bytes than its enclosing container holds.
    #[error("element overruns its enclosing container at offset {offset}")]
    LengthOverrun { offset: usize },

    /// An indefinite-length container is missing its end-of-contents marker.
    #[error("indefinite-length container not terminated at offset {offset}")]
    Unterminated { offset: usize },

    /// A typed accessor was called while the reader is not positioned on an element.
    #[error("reader is not positioned on an element")]
    NoCurrentElement,

    /// A scalar accessor was called on a container.
    #[error("{0} is a container, not a scalar")]
    NotScalar(Tag),

    /// `end_container` was called with no container open.
    #[error("end_container called with no open container")]
    UnbalancedContainer,

    /// The writer was finished with containers still open.
    #[error("{0} container(s) left open")]
    OpenContainers(usize),

    /// An integer does not fit in the requested width.
    #[error("integer does not fit in {bits} bits")]
    IntegerOverflow { bits: u32 },

    /// An INTEGER with zero content octets.
    #[error("empty integer encoding")]
    EmptyInteger,

    /// A BOOLEAN whose content is not exactly one octet.
    #[error("invalid boolean encoding")]
    InvalidBoolean,

    /// A NULL with content octets.
    #[error("invalid null encoding")]
    InvalidNull,

    /// A REAL that does not follow X.690 8.5.
    #[error("invalid real encoding: {0}")]
    InvalidReal(&'static str),

    /// A RELATIVE-OID with a truncated or oversized subidentifier.
    #[error("invalid relative OID encoding")]
    InvalidRelativeOid,

    /// A UTF8String with invalid UTF-8 content.
    #[error("invalid UTF-8 string: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, BerError>;
