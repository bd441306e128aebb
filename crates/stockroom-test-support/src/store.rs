//! Test stores — `DurableStore` fakes for error-handling paths.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use stockroom_core::error::LedgerError;
use stockroom_core::material::Material;
use stockroom_core::operation::{NewOperation, Operation};
use stockroom_core::store::DurableStore;

/// A durable store whose every call fails with `StorageUnavailable`.
/// Useful for testing that storage outages surface as typed errors and
/// leave no partial effects behind.
#[derive(Debug, Default)]
pub struct FailingStore;

fn unavailable<T>() -> Result<T, LedgerError> {
    Err(LedgerError::StorageUnavailable("connection refused".into()))
}

#[async_trait]
impl DurableStore for FailingStore {
    async fn insert_material(&self, _material: &Material) -> Result<(), LedgerError> {
        unavailable()
    }

    async fn update_material(&self, _material: &Material) -> Result<(), LedgerError> {
        unavailable()
    }

    async fn delete_material(&self, _id: Uuid) -> Result<(), LedgerError> {
        unavailable()
    }

    async fn material_by_id(&self, _id: Uuid) -> Result<Option<Material>, LedgerError> {
        unavailable()
    }

    async fn material_by_barcode(&self, _barcode: &str) -> Result<Option<Material>, LedgerError> {
        unavailable()
    }

    async fn list_materials(&self) -> Result<Vec<Material>, LedgerError> {
        unavailable()
    }

    async fn search_materials(&self, _keyword: &str) -> Result<Vec<Material>, LedgerError> {
        unavailable()
    }

    async fn materials_by_category(&self, _category: &str) -> Result<Vec<Material>, LedgerError> {
        unavailable()
    }

    async fn list_low_stock(&self) -> Result<Vec<Material>, LedgerError> {
        unavailable()
    }

    async fn list_categories(&self) -> Result<Vec<String>, LedgerError> {
        unavailable()
    }

    async fn list_locations(&self) -> Result<Vec<String>, LedgerError> {
        unavailable()
    }

    async fn insert_operation(&self, _operation: NewOperation) -> Result<Operation, LedgerError> {
        unavailable()
    }

    async fn operations_by_material(
        &self,
        _material_id: Uuid,
    ) -> Result<Vec<Operation>, LedgerError> {
        unavailable()
    }

    async fn list_operations(&self, _limit: Option<usize>) -> Result<Vec<Operation>, LedgerError> {
        unavailable()
    }

    async fn count_operations_today(&self, _now: DateTime<Utc>) -> Result<u64, LedgerError> {
        unavailable()
    }
}

/// A store that delegates everything to an inner store except ledger
/// appends, which always fail. Exercises the engine's compensation on
/// multi-step writes that break between the material row and the ledger.
pub struct AppendFailingStore {
    inner: Arc<dyn DurableStore>,
}

impl AppendFailingStore {
    /// Wraps `inner`, keeping all of its behavior except operation appends.
    #[must_use]
    pub fn new(inner: Arc<dyn DurableStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DurableStore for AppendFailingStore {
    async fn insert_material(&self, material: &Material) -> Result<(), LedgerError> {
        self.inner.insert_material(material).await
    }

    async fn update_material(&self, material: &Material) -> Result<(), LedgerError> {
        self.inner.update_material(material).await
    }

    async fn delete_material(&self, id: Uuid) -> Result<(), LedgerError> {
        self.inner.delete_material(id).await
    }

    async fn material_by_id(&self, id: Uuid) -> Result<Option<Material>, LedgerError> {
        self.inner.material_by_id(id).await
    }

    async fn material_by_barcode(&self, barcode: &str) -> Result<Option<Material>, LedgerError> {
        self.inner.material_by_barcode(barcode).await
    }

    async fn list_materials(&self) -> Result<Vec<Material>, LedgerError> {
        self.inner.list_materials().await
    }

    async fn search_materials(&self, keyword: &str) -> Result<Vec<Material>, LedgerError> {
        self.inner.search_materials(keyword).await
    }

    async fn materials_by_category(&self, category: &str) -> Result<Vec<Material>, LedgerError> {
        self.inner.materials_by_category(category).await
    }

    async fn list_low_stock(&self) -> Result<Vec<Material>, LedgerError> {
        self.inner.list_low_stock().await
    }

    async fn list_categories(&self) -> Result<Vec<String>, LedgerError> {
        self.inner.list_categories().await
    }

    async fn list_locations(&self) -> Result<Vec<String>, LedgerError> {
        self.inner.list_locations().await
    }

    async fn insert_operation(&self, _operation: NewOperation) -> Result<Operation, LedgerError> {
        unavailable()
    }

    async fn operations_by_material(
        &self,
        material_id: Uuid,
    ) -> Result<Vec<Operation>, LedgerError> {
        self.inner.operations_by_material(material_id).await
    }

    async fn list_operations(&self, limit: Option<usize>) -> Result<Vec<Operation>, LedgerError> {
        self.inner.list_operations(limit).await
    }

    async fn count_operations_today(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        self.inner.count_operations_today(now).await
    }
}
