//! The ledger engine: validates and applies stock-mutating commands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use stockroom_core::clock::Clock;
use stockroom_core::error::LedgerError;
use stockroom_core::material::{Material, MaterialPatch, MaterialSpec};
use stockroom_core::operation::{NewOperation, Operation, OperationKind};
use stockroom_core::store::DurableStore;
use stockroom_projection::{ProjectionCache, Stats};

/// Operator recorded on operations unless overridden via `with_operator`.
pub const DEFAULT_OPERATOR: &str = "admin";

/// Reason recorded on the internal stock-in that explains a non-zero
/// starting stock level.
pub const INITIAL_STOCK_REASON: &str = "initial stock";

/// Result of an accepted stock movement: the updated material together
/// with the ledger entry that was appended for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    /// The material after the movement was applied.
    pub material: Material,
    /// The appended ledger entry.
    pub operation: Operation,
}

/// The inventory ledger and consistency engine.
///
/// Owns the authority to mutate `Material::current_stock` and to append
/// operation records. Mutations to the same material are serialized
/// through a per-material critical section so read-modify-write of the
/// stock level cannot race between two near-simultaneous scans; reads are
/// served from the projection cache without locking and observe either the
/// pre- or post-mutation state, never a torn one.
///
/// Constructed once at process start via [`LedgerEngine::open`] and shared
/// behind an `Arc`; there is no global instance.
pub struct LedgerEngine {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    cache: RwLock<ProjectionCache>,
    material_locks: StdMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
    // Serializes barcode registration: material creation and any edit that
    // changes a barcode, so two creates cannot both pass the uniqueness
    // check.
    registry: AsyncMutex<()>,
    operator: String,
}

impl LedgerEngine {
    /// Opens the engine: runs crash recovery over the operation chains and
    /// builds the projection cache from the durable store.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StorageUnavailable` if the store cannot be
    /// read during recovery or the initial rebuild.
    pub async fn open(
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let engine = Self {
            store,
            clock,
            cache: RwLock::new(ProjectionCache::new()),
            material_locks: StdMutex::new(HashMap::new()),
            registry: AsyncMutex::new(()),
            operator: DEFAULT_OPERATOR.to_owned(),
        };
        engine.recover().await?;
        engine.rebuild_cache().await?;
        tracing::info!("ledger engine opened");
        Ok(engine)
    }

    /// Sets the operator name recorded on appended operations.
    #[must_use]
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    /// Creates a material, optionally with an opening stock level.
    ///
    /// When `initial_stock` is positive the engine issues an internal
    /// stock-in with reason `"initial stock"` so the ledger explains the
    /// non-zero starting value.
    ///
    /// # Errors
    ///
    /// `InvalidSpec` for an empty name or barcode, `min_stock` above
    /// `max_stock`, or a negative `initial_stock`; `DuplicateBarcode` if
    /// the barcode already belongs to a live material;
    /// `StorageUnavailable` on store failure.
    pub async fn create_material(
        &self,
        spec: MaterialSpec,
        initial_stock: i64,
    ) -> Result<Material, LedgerError> {
        self.create_material_inner(spec, initial_stock)
            .await
            .map_err(log_storage_failure)
    }

    async fn create_material_inner(
        &self,
        spec: MaterialSpec,
        initial_stock: i64,
    ) -> Result<Material, LedgerError> {
        spec.validate()?;
        if initial_stock < 0 {
            return Err(LedgerError::InvalidSpec(format!(
                "initial stock cannot be negative: {initial_stock}"
            )));
        }

        let _registry = self.registry.lock().await;
        if let Some(existing) = self.store.material_by_barcode(&spec.barcode).await? {
            return Err(LedgerError::DuplicateBarcode(existing.barcode));
        }

        let now = self.clock.now();
        let mut material = Material {
            id: Uuid::new_v4(),
            barcode: spec.barcode,
            name: spec.name,
            specification: spec.specification,
            unit: spec.unit,
            current_stock: 0,
            min_stock: spec.min_stock,
            max_stock: spec.max_stock,
            location: spec.location,
            category: spec.category,
            description: spec.description,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_material(&material).await?;

        if initial_stock > 0 {
            let opening = self
                .apply_movement(
                    &mut material,
                    OperationKind::In,
                    initial_stock,
                    initial_stock,
                    Some(INITIAL_STOCK_REASON.to_owned()),
                )
                .await;
            if let Err(err) = opening {
                // The material row is already durable but was never
                // reported created; a rejected create must leave nothing
                // behind, so compensate by removing the row. Recovery
                // cannot do it later: a material with zero operations
                // looks consistent to replay.
                if let Err(cleanup) = self.store.delete_material(material.id).await {
                    tracing::error!(
                        material_id = %material.id,
                        barcode = %material.barcode,
                        %cleanup,
                        "failed to remove material after rejected opening stock-in"
                    );
                }
                return Err(err);
            }
        }

        tracing::info!(
            material_id = %material.id,
            barcode = %material.barcode,
            initial_stock,
            "material created"
        );
        self.cache_upsert(material.clone());
        Ok(material)
    }

    /// Records a stock receipt.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` if `quantity <= 0`; `NotFound` if the id does not
    /// resolve; `StorageUnavailable` on store failure.
    pub async fn stock_in(
        &self,
        material_id: Uuid,
        quantity: i64,
        reason: Option<String>,
    ) -> Result<StockMovement, LedgerError> {
        self.move_stock(material_id, OperationKind::In, quantity, reason)
            .await
            .map_err(log_storage_failure)
    }

    /// Records a stock issue.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` if `quantity <= 0`; `InsufficientStock` if the
    /// issue would drive the stock level negative (the command is rejected,
    /// never floored); `NotFound`; `StorageUnavailable`.
    pub async fn stock_out(
        &self,
        material_id: Uuid,
        quantity: i64,
        reason: Option<String>,
    ) -> Result<StockMovement, LedgerError> {
        self.move_stock(material_id, OperationKind::Out, quantity, reason)
            .await
            .map_err(log_storage_failure)
    }

    /// Corrects the stock level to a new absolute target.
    ///
    /// The recorded operation's `quantity` is the absolute target, not a
    /// signed delta.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` if `new_stock < 0`; `NotFound`;
    /// `StorageUnavailable`.
    pub async fn adjust_stock(
        &self,
        material_id: Uuid,
        new_stock: i64,
        reason: Option<String>,
    ) -> Result<StockMovement, LedgerError> {
        self.move_stock(material_id, OperationKind::Adjustment, new_stock, reason)
            .await
            .map_err(log_storage_failure)
    }

    async fn move_stock(
        &self,
        material_id: Uuid,
        kind: OperationKind,
        quantity: i64,
        reason: Option<String>,
    ) -> Result<StockMovement, LedgerError> {
        match kind {
            OperationKind::In | OperationKind::Out => {
                if quantity <= 0 {
                    return Err(LedgerError::InvalidQuantity(quantity));
                }
            }
            OperationKind::Adjustment => {
                if quantity < 0 {
                    return Err(LedgerError::InvalidQuantity(quantity));
                }
            }
        }

        let lock = self.material_lock(material_id);
        let _guard = lock.lock().await;

        let mut material = self
            .store
            .material_by_id(material_id)
            .await?
            .ok_or(LedgerError::NotFound(material_id))?;

        let new_stock = match kind {
            OperationKind::In => material.current_stock + quantity,
            OperationKind::Out => {
                if quantity > material.current_stock {
                    return Err(LedgerError::InsufficientStock {
                        material_id,
                        available: material.current_stock,
                        requested: quantity,
                    });
                }
                material.current_stock - quantity
            }
            OperationKind::Adjustment => quantity,
        };

        let operation = self
            .apply_movement(&mut material, kind, quantity, new_stock, reason)
            .await?;

        self.cache_upsert(material.clone());
        Ok(StockMovement {
            material,
            operation,
        })
    }

    /// Appends the ledger entry first, then persists the material. A crash
    /// between the two leaves the ledger ahead of the material row, which
    /// `recover` heals on the next open.
    async fn apply_movement(
        &self,
        material: &mut Material,
        kind: OperationKind,
        quantity: i64,
        new_stock: i64,
        reason: Option<String>,
    ) -> Result<Operation, LedgerError> {
        let now = self.clock.now();
        let entry = NewOperation {
            id: Uuid::new_v4(),
            material_id: material.id,
            material_barcode: material.barcode.clone(),
            material_name: material.name.clone(),
            kind,
            quantity,
            previous_stock: material.current_stock,
            current_stock: new_stock,
            operator: self.operator.clone(),
            reason,
            created_at: now,
        };
        let operation = self.store.insert_operation(entry).await?;

        material.current_stock = new_stock;
        touch(material, now);
        self.store.update_material(material).await?;

        tracing::debug!(
            material_id = %material.id,
            kind = %kind,
            quantity,
            previous_stock = operation.previous_stock,
            current_stock = operation.current_stock,
            "stock movement applied"
        );
        Ok(operation)
    }

    /// Applies a partial field edit. Field edits are not stock movements:
    /// no operation is appended, but `updated_at` is bumped.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id does not resolve; `DuplicateBarcode` if the
    /// edit changes the barcode to one used by a different live material;
    /// `InvalidSpec` if the resulting fields fail validation;
    /// `StorageUnavailable` on store failure.
    pub async fn update_material(
        &self,
        material_id: Uuid,
        patch: MaterialPatch,
    ) -> Result<Material, LedgerError> {
        self.update_material_inner(material_id, patch)
            .await
            .map_err(log_storage_failure)
    }

    async fn update_material_inner(
        &self,
        material_id: Uuid,
        patch: MaterialPatch,
    ) -> Result<Material, LedgerError> {
        // Lock order is registry before material everywhere, so barcode
        // edits cannot deadlock against creates.
        let changes_barcode = patch.barcode.is_some();
        let _registry = if changes_barcode {
            Some(self.registry.lock().await)
        } else {
            None
        };

        let lock = self.material_lock(material_id);
        let _guard = lock.lock().await;

        let mut material = self
            .store
            .material_by_id(material_id)
            .await?
            .ok_or(LedgerError::NotFound(material_id))?;

        if let Some(barcode) = &patch.barcode
            && *barcode != material.barcode
            && let Some(other) = self.store.material_by_barcode(barcode).await?
            && other.id != material_id
        {
            return Err(LedgerError::DuplicateBarcode(other.barcode));
        }

        apply_patch(&mut material, patch);
        validate_fields(&material)?;
        touch(&mut material, self.clock.now());
        self.store.update_material(&material).await?;

        self.cache_upsert(material.clone());
        Ok(material)
    }

    /// Deletes a material. Its operation history is retained untouched;
    /// the orphaned `material_id` reference is acceptable because history
    /// is read-only audit data.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id does not resolve; `StorageUnavailable` on
    /// store failure.
    pub async fn delete_material(&self, material_id: Uuid) -> Result<(), LedgerError> {
        self.delete_material_inner(material_id)
            .await
            .map_err(log_storage_failure)
    }

    async fn delete_material_inner(&self, material_id: Uuid) -> Result<(), LedgerError> {
        let lock = self.material_lock(material_id);
        let _guard = lock.lock().await;

        self.store.delete_material(material_id).await?;
        self.cache_delete(material_id).await?;

        tracing::info!(%material_id, "material deleted; history retained");
        drop(_guard);
        self.material_locks
            .lock()
            .expect("material lock table poisoned")
            .remove(&material_id);
        Ok(())
    }

    /// The operation history for a material, newest first.
    ///
    /// Deliberately performs no liveness check so the audit trail of a
    /// deleted material stays readable, denormalized name and barcode
    /// included.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` on store failure.
    pub async fn history(&self, material_id: Uuid) -> Result<Vec<Operation>, LedgerError> {
        self.store.operations_by_material(material_id).await
    }

    /// Operations across all materials, newest first, optionally capped.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` on store failure.
    pub async fn recent_operations(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<Operation>, LedgerError> {
        self.store.list_operations(limit).await
    }

    /// Number of operations recorded today (UTC).
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` on store failure.
    pub async fn operations_today(&self) -> Result<u64, LedgerError> {
        self.store.count_operations_today(self.clock.now()).await
    }

    /// Distinct storage locations in use.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` on store failure.
    pub async fn locations(&self) -> Result<Vec<String>, LedgerError> {
        self.store.list_locations().await
    }

    /// All live materials, ordered by name. Served from the cache.
    #[must_use]
    pub fn materials(&self) -> Vec<Material> {
        self.read_cache().list()
    }

    /// The material with this id, if live. Served from the cache.
    #[must_use]
    pub fn material(&self, material_id: Uuid) -> Option<Material> {
        self.read_cache().get(material_id).cloned()
    }

    /// The material with this barcode, if live. Served from the cache.
    #[must_use]
    pub fn material_by_barcode(&self, barcode: &str) -> Option<Material> {
        self.read_cache().by_barcode(barcode).cloned()
    }

    /// Text search over name, barcode, specification, and location.
    #[must_use]
    pub fn search(&self, keyword: &str) -> Vec<Material> {
        self.read_cache().search(keyword)
    }

    /// Materials in the given category, ordered by name.
    #[must_use]
    pub fn materials_by_category(&self, category: &str) -> Vec<Material> {
        self.read_cache().by_category(category)
    }

    /// Materials at or below their reorder threshold, lowest stock first.
    #[must_use]
    pub fn low_stock(&self) -> Vec<Material> {
        self.read_cache().low_stock()
    }

    /// Distinct categories in use, sorted.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.read_cache().categories()
    }

    /// Dashboard aggregates.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.read_cache().stats()
    }

    /// On-demand consistency check: recomputes the cache aggregates and,
    /// on disagreement, rebuilds the cache from the durable store. Drift
    /// is invisible to callers except as latency.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if a required rebuild cannot read the store.
    pub async fn verify_projection(&self) -> Result<(), LedgerError> {
        let verdict = self.read_cache().verify();
        if let Err(drift) = verdict {
            tracing::warn!(%drift, "projection drift detected; rebuilding cache");
            self.rebuild_cache().await?;
        }
        Ok(())
    }

    /// Heals a crash between an operation append and its material update:
    /// for every material whose row disagrees with the newest ledger
    /// entry, the stock level is recomputed from the operation history and
    /// written back.
    async fn recover(&self) -> Result<(), LedgerError> {
        for mut material in self.store.list_materials().await? {
            let operations = self.store.operations_by_material(material.id).await?;
            let Some(newest) = operations.first() else {
                continue;
            };
            if newest.current_stock != material.current_stock {
                tracing::warn!(
                    material_id = %material.id,
                    material_stock = material.current_stock,
                    ledger_stock = newest.current_stock,
                    "material row lags its ledger; replaying"
                );
                material.current_stock = newest.current_stock;
                touch(&mut material, self.clock.now());
                self.store.update_material(&material).await?;
            }
        }
        Ok(())
    }

    async fn rebuild_cache(&self) -> Result<(), LedgerError> {
        let materials = self.store.list_materials().await?;
        self.write_cache().rebuild_from(materials);
        Ok(())
    }

    fn material_lock(&self, material_id: Uuid) -> Arc<AsyncMutex<()>> {
        self.material_locks
            .lock()
            .expect("material lock table poisoned")
            .entry(material_id)
            .or_default()
            .clone()
    }

    fn cache_upsert(&self, material: Material) {
        self.write_cache().apply_material_upserted(material);
    }

    async fn cache_delete(&self, material_id: Uuid) -> Result<(), LedgerError> {
        let verdict = self.write_cache().apply_material_deleted(material_id);
        if let Err(drift) = verdict {
            tracing::warn!(%drift, "projection drift on delete; rebuilding cache");
            self.rebuild_cache().await?;
        }
        Ok(())
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, ProjectionCache> {
        self.cache.read().expect("projection cache lock poisoned")
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, ProjectionCache> {
        self.cache.write().expect("projection cache lock poisoned")
    }
}

impl std::fmt::Debug for LedgerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEngine")
            .field("operator", &self.operator)
            .finish_non_exhaustive()
    }
}

/// `updated_at` must be monotonically non-decreasing even under a clock
/// that stands still or steps backwards.
fn touch(material: &mut Material, now: DateTime<Utc>) {
    material.updated_at = material.updated_at.max(now);
}

fn apply_patch(material: &mut Material, patch: MaterialPatch) {
    if let Some(barcode) = patch.barcode {
        material.barcode = barcode;
    }
    if let Some(name) = patch.name {
        material.name = name;
    }
    if let Some(specification) = patch.specification {
        material.specification = specification;
    }
    if let Some(unit) = patch.unit {
        material.unit = unit;
    }
    if let Some(min_stock) = patch.min_stock {
        material.min_stock = min_stock;
    }
    if let Some(max_stock) = patch.max_stock {
        material.max_stock = max_stock;
    }
    if let Some(location) = patch.location {
        material.location = location;
    }
    if let Some(category) = patch.category {
        material.category = category;
    }
    if let Some(description) = patch.description {
        material.description = description;
    }
}

fn validate_fields(material: &Material) -> Result<(), LedgerError> {
    let spec = MaterialSpec {
        barcode: material.barcode.clone(),
        name: material.name.clone(),
        specification: material.specification.clone(),
        unit: material.unit.clone(),
        min_stock: material.min_stock,
        max_stock: material.max_stock,
        location: material.location.clone(),
        category: material.category.clone(),
        description: material.description.clone(),
    };
    spec.validate()
}

fn log_storage_failure(err: LedgerError) -> LedgerError {
    if let LedgerError::StorageUnavailable(reason) = &err {
        tracing::error!(%reason, "durable store unavailable");
    }
    err
}
