//! The projection cache and its derived aggregates.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use stockroom_core::material::Material;

/// Raised when an incremental update cannot determine the prior value it
/// needs. Handled internally by the ledger engine with a full rebuild;
/// never surfaced to callers.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("projection drift detected: {0}")]
pub struct CacheDrift(pub String);

/// Dashboard aggregates derived from the material set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    /// Number of live materials.
    pub total_materials: usize,
    /// Sum of stock on hand across all materials.
    pub total_stock: i64,
    /// Number of materials at or below their reorder threshold.
    pub low_stock_count: usize,
}

/// In-memory mirror of all live materials plus derived aggregates.
///
/// Aggregates are maintained incrementally from the delta between the old
/// and new value of each upsert/delete; at any quiescent point they must
/// equal a fresh recomputation from the full material set (`verify`
/// checks exactly that). Only the ledger engine writes to the cache.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    materials: HashMap<Uuid, Material>,
    barcode_index: HashMap<String, Uuid>,
    total_stock: i64,
    low_stock_count: usize,
    categories: HashMap<String, usize>,
}

impl ProjectionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a created or updated material, adjusting aggregates by the
    /// delta against the previously cached value. An id the cache has not
    /// seen yet is an insert.
    pub fn apply_material_upserted(&mut self, material: Material) {
        if let Some(old) = self.materials.remove(&material.id) {
            self.retire(&old);
        }
        self.total_stock += material.current_stock;
        if material.is_low_stock() {
            self.low_stock_count += 1;
        }
        if !material.category.is_empty() {
            *self.categories.entry(material.category.clone()).or_insert(0) += 1;
        }
        self.barcode_index
            .insert(material.barcode.clone(), material.id);
        self.materials.insert(material.id, material);
    }

    /// Applies a deletion.
    ///
    /// # Errors
    ///
    /// Returns `CacheDrift` when the id is not cached: the prior value is
    /// unknown, so the aggregates cannot be adjusted and the caller must
    /// rebuild from the durable store instead.
    pub fn apply_material_deleted(&mut self, id: Uuid) -> Result<(), CacheDrift> {
        let Some(old) = self.materials.remove(&id) else {
            return Err(CacheDrift(format!("delete of uncached material {id}")));
        };
        self.retire(&old);
        Ok(())
    }

    /// Replaces the whole cache from a durable-store snapshot. Used at
    /// startup and whenever drift is detected.
    pub fn rebuild_from(&mut self, materials: Vec<Material>) {
        self.materials.clear();
        self.barcode_index.clear();
        self.total_stock = 0;
        self.low_stock_count = 0;
        self.categories.clear();
        for material in materials {
            self.apply_material_upserted(material);
        }
    }

    /// Recomputes every aggregate from the mirrored material set and
    /// compares it with the incrementally maintained value.
    ///
    /// # Errors
    ///
    /// Returns `CacheDrift` naming the first aggregate that disagrees.
    pub fn verify(&self) -> Result<(), CacheDrift> {
        let total_stock: i64 = self.materials.values().map(|m| m.current_stock).sum();
        if total_stock != self.total_stock {
            return Err(CacheDrift(format!(
                "total_stock {} != recomputed {total_stock}",
                self.total_stock
            )));
        }

        let low_stock_count = self.materials.values().filter(|m| m.is_low_stock()).count();
        if low_stock_count != self.low_stock_count {
            return Err(CacheDrift(format!(
                "low_stock_count {} != recomputed {low_stock_count}",
                self.low_stock_count
            )));
        }

        let mut categories: HashMap<String, usize> = HashMap::new();
        for material in self.materials.values() {
            if !material.category.is_empty() {
                *categories.entry(material.category.clone()).or_insert(0) += 1;
            }
        }
        if categories != self.categories {
            return Err(CacheDrift("category multiset disagrees".into()));
        }

        Ok(())
    }

    fn retire(&mut self, old: &Material) {
        self.total_stock -= old.current_stock;
        if old.is_low_stock() {
            self.low_stock_count -= 1;
        }
        if !old.category.is_empty()
            && let Some(count) = self.categories.get_mut(&old.category)
        {
            *count -= 1;
            if *count == 0 {
                self.categories.remove(&old.category);
            }
        }
        if self.barcode_index.get(&old.barcode) == Some(&old.id) {
            self.barcode_index.remove(&old.barcode);
        }
    }

    /// The cached material with this id, if any.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Material> {
        self.materials.get(&id)
    }

    /// The cached material with this barcode, if any.
    #[must_use]
    pub fn by_barcode(&self, barcode: &str) -> Option<&Material> {
        self.barcode_index
            .get(barcode)
            .and_then(|id| self.materials.get(id))
    }

    /// All cached materials, ordered by name then barcode.
    #[must_use]
    pub fn list(&self) -> Vec<Material> {
        let mut materials: Vec<Material> = self.materials.values().cloned().collect();
        materials.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.barcode.cmp(&b.barcode)));
        materials
    }

    /// Materials whose name, barcode, specification, or location contains
    /// the keyword (case-insensitive), ordered by name.
    #[must_use]
    pub fn search(&self, keyword: &str) -> Vec<Material> {
        let needle = keyword.to_lowercase();
        let mut matches: Vec<Material> = self
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
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.barcode.cmp(&b.barcode)));
        matches
    }

    /// Materials in the given category, ordered by name.
    #[must_use]
    pub fn by_category(&self, category: &str) -> Vec<Material> {
        let mut matches: Vec<Material> = self
            .materials
            .values()
            .filter(|m| m.category == category)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.barcode.cmp(&b.barcode)));
        matches
    }

    /// Materials at or below their reorder threshold, lowest stock first.
    #[must_use]
    pub fn low_stock(&self) -> Vec<Material> {
        let mut matches: Vec<Material> = self
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
        matches
    }

    /// Distinct categories in use, sorted.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.categories.keys().cloned().collect();
        categories.sort();
        categories
    }

    /// Current dashboard aggregates.
    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats {
            total_materials: self.materials.len(),
            total_stock: self.total_stock,
            low_stock_count: self.low_stock_count,
        }
    }
}
