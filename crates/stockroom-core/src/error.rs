//! Ledger error taxonomy.

use thiserror::Error;
use uuid::Uuid;

/// Failures produced by ledger commands and the durable store.
///
/// Validation failures (`InvalidSpec`, `InvalidQuantity`, `DuplicateBarcode`,
/// `InsufficientStock`, `NotFound`) are deterministic and returned to the
/// caller so the presentation layer can show a specific message.
/// `StorageUnavailable` wraps infrastructure failures; the ledger never
/// retries those on its own, since blindly retrying a stock mutation risks
/// double-application.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A material spec failed validation (empty name/barcode, bad bounds).
    #[error("invalid material spec: {0}")]
    InvalidSpec(String),

    /// A movement quantity was out of range for the requested operation.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The barcode is already registered to a live material.
    #[error("barcode already registered: {0}")]
    DuplicateBarcode(String),

    /// A stock-out would drive the stock level below zero.
    #[error("insufficient stock on material {material_id}: have {available}, requested {requested}")]
    InsufficientStock {
        /// The material the stock-out targeted.
        material_id: Uuid,
        /// Stock on hand when the command was validated.
        available: i64,
        /// Quantity the command asked to remove.
        requested: i64,
    },

    /// The material id did not resolve to a live material.
    #[error("material not found: {0}")]
    NotFound(Uuid),

    /// The durable store failed or timed out.
    #[error("durable store unavailable: {0}")]
    StorageUnavailable(String),
}
