//! Consumer side of the EmBER+ remote-control protocol.
//!
//! emberlink mirrors the tree of nodes, parameters and functions a provider
//! exposes, requesting only what the application's schema needs and telling
//! it when that part of the tree is fully known.
//!
//! # Crate Structure
//!
//! - [`s101`]: S101 framing: escaping, checksums, multi-packet messages
//! - [`ber`]: BER tag-length-value reader and writer
//! - [`schema`]: Schema descriptors declaring the expected tree shape
//! - [`tree`]: Element model and tree synchronization engine
//! - [`consumer`]: Async connection handle (behind `consumer` feature)

/// Re-export S101 framing types.
pub mod s101 {
    pub use emberlink_s101::*;
}

/// Re-export BER codec types.
pub mod ber {
    pub use emberlink_ber::*;
}

/// Re-export schema descriptor types.
pub mod schema {
    pub use emberlink_schema::*;
}

/// Re-export element model and synchronization types.
pub mod tree {
    pub use emberlink_tree::*;
}

/// Re-export consumer types (requires `consumer` feature).
#[cfg(feature = "consumer")]
pub mod consumer {
    pub use emberlink_consumer::*;
}
