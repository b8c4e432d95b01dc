//! Output adapter forwarding tagged log records to Logentries.
//!
//! A host log-collection pipeline hands this crate decoded batches of
//! `(tag, timestamp, record)` events. Each record's destination token is
//! resolved from an operator-maintained YAML table, and the record's
//! message plus token is written as one line to a persistent TCP (or
//! TLS) connection, with bounded retry and exponential backoff on
//! transient connection failures.
//!
//! The crate is library-only: construct a [`LogentriesOutput`] from a
//! host-populated [`OutputConfig`] (or via [`OutputBuilder`]) and call
//! [`LogentriesOutput::write`] once per batch.

pub mod builder;
pub mod chunk;
pub mod config;
pub mod output;
pub mod resolver;
pub mod token_table;
pub mod transport;

pub use builder::{BuildError, OutputBuilder};
pub use chunk::{Chunk, ChunkError, Event, format_event};
pub use config::{OutputConfig, RetryPolicy};
pub use output::{DeliveryError, LogentriesOutput};
pub use resolver::{CategoryTags, resolve};
pub use token_table::{TableError, TokenTable, TokenValue};
pub use transport::{ActiveConnection, ConnectionManager, LineSink};
