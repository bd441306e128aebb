//! Durable store abstraction.
//!
//! The store persists the two relations (materials, operations) and offers
//! single-row atomic CRUD over them. It enforces no business rules beyond
//! the unique barcode index; composing a material update with an operation
//! insert into one logical unit is the ledger engine's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::material::Material;
use crate::operation::{NewOperation, Operation};

/// Persistence contract consumed by the ledger engine.
///
/// Every call is atomic at the single-row level. Infrastructure failures
/// surface as `LedgerError::StorageUnavailable`; a violated unique barcode
/// index surfaces as `LedgerError::DuplicateBarcode`.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persists a new material row.
    async fn insert_material(&self, material: &Material) -> Result<(), LedgerError>;

    /// Rewrites an existing material row.
    async fn update_material(&self, material: &Material) -> Result<(), LedgerError>;

    /// Removes a material row. Operation rows are untouched.
    async fn delete_material(&self, id: Uuid) -> Result<(), LedgerError>;

    /// Looks a material up by id.
    async fn material_by_id(&self, id: Uuid) -> Result<Option<Material>, LedgerError>;

    /// Looks a material up by its barcode.
    async fn material_by_barcode(&self, barcode: &str) -> Result<Option<Material>, LedgerError>;

    /// All materials, ordered by name.
    async fn list_materials(&self) -> Result<Vec<Material>, LedgerError>;

    /// Materials whose name, barcode, specification, or location contains
    /// the keyword, ordered by name.
    async fn search_materials(&self, keyword: &str) -> Result<Vec<Material>, LedgerError>;

    /// Materials in the given category, ordered by name.
    async fn materials_by_category(&self, category: &str) -> Result<Vec<Material>, LedgerError>;

    /// Materials at or below their reorder threshold, lowest stock first.
    async fn list_low_stock(&self) -> Result<Vec<Material>, LedgerError>;

    /// Distinct non-empty categories, sorted.
    async fn list_categories(&self) -> Result<Vec<String>, LedgerError>;

    /// Distinct non-empty locations, sorted.
    async fn list_locations(&self) -> Result<Vec<String>, LedgerError>;

    /// Appends a ledger entry, assigning its insertion sequence.
    async fn insert_operation(&self, operation: NewOperation) -> Result<Operation, LedgerError>;

    /// Ledger entries for one material, newest first.
    async fn operations_by_material(&self, material_id: Uuid)
    -> Result<Vec<Operation>, LedgerError>;

    /// Ledger entries across all materials, newest first, optionally capped.
    async fn list_operations(&self, limit: Option<usize>) -> Result<Vec<Operation>, LedgerError>;

    /// Number of ledger entries recorded on the calendar day of `now` (UTC).
    async fn count_operations_today(&self, now: DateTime<Utc>) -> Result<u64, LedgerError>;
}
