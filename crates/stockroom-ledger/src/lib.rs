//! Stockroom Ledger — the inventory ledger and consistency engine.
//!
//! The `LedgerEngine` is the only component allowed to change a material's
//! stock level or append operation records. Every mutation validates,
//! appends an immutable ledger entry, persists the material, and updates
//! the projection cache as one logical unit; startup recovery replays the
//! operation chain to heal a crash between the append and the material
//! write.

pub mod engine;

pub use engine::{LedgerEngine, StockMovement};
