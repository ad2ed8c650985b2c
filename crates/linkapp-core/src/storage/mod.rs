//! Storage layer
//!
//! The repositories talk to a [`KeyValueStore`]: hashes, plain sets and
//! sorted sets under string keys, mutated only through atomic batches.
//!
//! ## Architecture
//!
//! - **kv**: the store trait, commands, replies and batches
//! - **sqlite**: the shipped engine, one transaction per batch
//! - **schema**: tables backing the engine

pub mod error;
pub mod kv;
pub mod schema;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use kv::{
    nth_reply, Aggregate, Batch, Combine, Command, KeyValueStore, Reply, ScoredMember, Watch,
};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
