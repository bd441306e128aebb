//! In-memory `DurableStore` implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use stockroom_core::error::LedgerError;
use stockroom_core::material::Material;
use stockroom_core::operation::{NewOperation, Operation};
use stockroom_core::store::DurableStore;

#[derive(Debug, Default)]
struct Inner {
    materials: HashMap<Uuid, Material>,
    operations: Vec<Operation>,
    next_sequence: i64,
}

/// Mutex-guarded in-memory store.
///
/// Mirrors the semantics of `SqliteStore`, including the unique barcode
/// index, so engine tests exercise the same failure surface the embedded
/// store has.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-mutation; propagating the panic
        // is the only honest option for an in-memory store.
        self.inner.lock().expect("memory store lock poisoned")
    }
}

fn sorted_by_name(mut materials: Vec<Material>) -> Vec<Material> {
    materials.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.barcode.cmp(&b.barcode)));
    materials
}

fn newest_first(mut operations: Vec<Operation>) -> Vec<Operation> {
    operations.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
    operations
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn insert_material(&self, material: &Material) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        if inner
            .materials
            .values()
            .any(|m| m.barcode == material.barcode)
        {
            return Err(LedgerError::DuplicateBarcode(material.barcode.clone()));
        }
        inner.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn update_material(&self, material: &Material) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        if !inner.materials.contains_key(&material.id) {
            return Err(LedgerError::NotFound(material.id));
        }
        if inner
            .materials
            .values()
            .any(|m| m.id != material.id && m.barcode == material.barcode)
        {
            return Err(LedgerError::DuplicateBarcode(material.barcode.clone()));
        }
        inner.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn delete_material(&self, id: Uuid) -> Result<(), LedgerError> {
        let mut inner = self.lock();
        if inner.materials.remove(&id).is_none() {
            return Err(LedgerError::NotFound(id));
        }
        Ok(())
    }

    async fn material_by_id(&self, id: Uuid) -> Result<Option<Material>, LedgerError> {
        Ok(self.lock().materials.get(&id).cloned())
    }

    async fn material_by_barcode(&self, barcode: &str) -> Result<Option<Material>, LedgerError> {
        Ok(self
            .lock()
            .materials
            .values()
            .find(|m| m.barcode == barcode)
            .cloned())
    }

    async fn list_materials(&self) -> Result<Vec<Material>, LedgerError> {
        Ok(sorted_by_name(
            self.lock().materials.values().cloned().collect(),
        ))
    }

    async fn search_materials(&self, keyword: &str) -> Result<Vec<Material>, LedgerError> {
        let needle = keyword.to_lowercase();
        let matches = self
            .lock()
            .materials
            .values()
            .filter(|m| {
                m.name.to_lowercase().contains(&needle)
                    || m.barcode.to_lowercase().contains(&needle)
                    || m.specification.to_lowercase().contains(&needle)
                    || m.location.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(sorted_by_name(matches))
    }

    async fn materials_by_category(&self, category: &str) -> Result<Vec<Material>, LedgerError> {
        let matches = self
            .lock()
            .materials
            .values()
            .filter(|m| m.category == category)
            .cloned()
            .collect();
        Ok(sorted_by_name(matches))
    }

    async fn list_low_stock(&self) -> Result<Vec<Material>, LedgerError> {
        let mut matches: Vec<Material> = self
            .lock()
            .materials
            .values()
            .filter(|m| m.is_low_stock())
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.current_stock
                .cmp(&b.current_stock)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(matches)
    }

    async fn list_categories(&self) -> Result<Vec<String>, LedgerError> {
        let mut categories: Vec<String> = self
            .lock()
            .materials
            .values()
            .filter(|m| !m.category.is_empty())
            .map(|m| m.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn list_locations(&self) -> Result<Vec<String>, LedgerError> {
        let mut locations: Vec<String> = self
            .lock()
            .materials
            .values()
            .filter(|m| !m.location.is_empty())
            .map(|m| m.location.clone())
            .collect();
        locations.sort();
        locations.dedup();
        Ok(locations)
    }

    async fn insert_operation(&self, operation: NewOperation) -> Result<Operation, LedgerError> {
        let mut inner = self.lock();
        inner.next_sequence += 1;
        let sequence = inner.next_sequence;
        let stored = operation.into_operation(sequence);
        inner.operations.push(stored.clone());
        Ok(stored)
    }

    async fn operations_by_material(
        &self,
        material_id: Uuid,
    ) -> Result<Vec<Operation>, LedgerError> {
        let matches = self
            .lock()
            .operations
            .iter()
            .filter(|op| op.material_id == material_id)
            .cloned()
            .collect();
        Ok(newest_first(matches))
    }

    async fn list_operations(&self, limit: Option<usize>) -> Result<Vec<Operation>, LedgerError> {
        let mut operations = newest_first(self.lock().operations.clone());
        if let Some(limit) = limit {
            operations.truncate(limit);
        }
        Ok(operations)
    }

    async fn count_operations_today(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let today = now.date_naive();
        let count = self
            .lock()
            .operations
            .iter()
            .filter(|op| op.created_at.date_naive() == today)
            .count();
        Ok(count as u64)
    }
}
