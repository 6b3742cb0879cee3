//! Async EmBER consumer.
//!
//! A [`Consumer`] owns one transport and one mirrored tree. It requests
//! directories until the tree is verified against the schema, answers
//! keep-alives, correlates function invocations with their results and
//! reports tree changes to subscribers.
//!
//! ```no_run
//! # async fn demo() -> emberlink_consumer::Result<()> {
//! use std::sync::Arc;
//!
//! use emberlink_consumer::{Consumer, ConsumerConfig};
//! use emberlink_schema::DynamicSchema;
//!
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:9000")
//!     .await
//!     .map_err(emberlink_s101::FrameError::from)?;
//! let consumer = Consumer::open(stream, Arc::new(DynamicSchema), ConsumerConfig::default());
//! consumer.await_ready().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer;
pub mod error;

pub use config::ConsumerConfig;
pub use consumer::{Consumer, Subscriber};
pub use error::{ConsumerError, Result};
