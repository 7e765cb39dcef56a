//! Session writers.
//!
//! Sessions flow through:
//! - [`ProtosessionCloser`]: hits grouped upstream become sessions
//! - [`BatchingWriter`]: per-property memory buffers spooled to disk
//! - [`DirectWriter`]: column evaluation, modifiers and warehouse writes

pub mod batching;
pub mod cache;
pub mod closer;
pub mod codec;
pub mod config;
pub mod direct;
pub mod spool;
pub mod writer;

pub use batching::BatchingWriter;
pub use closer::ProtosessionCloser;
pub use codec::{BincodeCodec, Encoding, JsonCodec, SessionCodec};
pub use config::{BatchingConfig, CloserConfig, WriterConfig};
pub use direct::DirectWriter;
pub use spool::Spool;
pub use writer::{NoopWriter, SessionWriter};

pub use tokio_util::sync::CancellationToken;
