//! Stockroom Store — durable store implementations.
//!
//! `MemoryStore` is the reference implementation used by engine tests;
//! `SqliteStore` is the embedded production store backing a single-node
//! deployment.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
