//! Material — the trackable stock-keeping unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Default unit of measure when a spec does not name one.
pub const DEFAULT_UNIT: &str = "pcs";

/// Default maximum stock when a spec does not name one.
pub const DEFAULT_MAX_STOCK: i64 = 999_999;

/// A trackable stock-keeping unit, identified by a unique barcode.
///
/// `current_stock` is owned by the ledger engine: it always equals the
/// creation value plus the sum of applied movement deltas, and only the
/// engine may change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    /// Stable identifier, assigned on creation.
    pub id: Uuid,
    /// Unique, non-empty, immutable business key.
    pub barcode: String,
    /// Display name, non-empty.
    pub name: String,
    /// Free-form specification (size, grade, model).
    pub specification: String,
    /// Unit of measure.
    pub unit: String,
    /// Stock on hand, never negative.
    pub current_stock: i64,
    /// Reorder threshold.
    pub min_stock: i64,
    /// Upper stocking bound, at least `min_stock`.
    pub max_stock: i64,
    /// Storage location.
    pub location: String,
    /// Category label, empty when uncategorized.
    pub category: String,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp, monotonically non-decreasing.
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Returns true when the material is at or below its reorder threshold.
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock
    }
}

/// Creation input for a material: everything except the identifier, the
/// stock level, and the timestamps, which the ledger engine assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSpec {
    /// Unique, non-empty business key.
    pub barcode: String,
    /// Display name, non-empty.
    pub name: String,
    /// Free-form specification.
    pub specification: String,
    /// Unit of measure.
    pub unit: String,
    /// Reorder threshold.
    pub min_stock: i64,
    /// Upper stocking bound.
    pub max_stock: i64,
    /// Storage location.
    pub location: String,
    /// Category label.
    pub category: String,
    /// Free-form description.
    pub description: String,
}

impl MaterialSpec {
    /// Creates a spec with the given barcode and name and the field
    /// defaults the original intake form uses.
    #[must_use]
    pub fn new(barcode: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            name: name.into(),
            specification: String::new(),
            unit: DEFAULT_UNIT.to_owned(),
            min_stock: 0,
            max_stock: DEFAULT_MAX_STOCK,
            location: String::new(),
            category: String::new(),
            description: String::new(),
        }
    }

    /// Validates the spec.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidSpec` if the barcode or name is empty
    /// after trimming, if `min_stock` is negative, or if `min_stock`
    /// exceeds `max_stock`.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.barcode.trim().is_empty() {
            return Err(LedgerError::InvalidSpec("barcode cannot be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::InvalidSpec("name cannot be empty".into()));
        }
        if self.min_stock < 0 {
            return Err(LedgerError::InvalidSpec(format!(
                "min_stock cannot be negative: {}",
                self.min_stock
            )));
        }
        if self.min_stock > self.max_stock {
            return Err(LedgerError::InvalidSpec(format!(
                "min_stock {} exceeds max_stock {}",
                self.min_stock, self.max_stock
            )));
        }
        Ok(())
    }
}

/// Partial field edit for a material.
///
/// Carries no stock level on purpose: stock changes must go through the
/// ledger so every change leaves an operation behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPatch {
    /// New barcode, must stay unique among live materials.
    pub barcode: Option<String>,
    /// New display name.
    pub name: Option<String>,
    /// New specification.
    pub specification: Option<String>,
    /// New unit of measure.
    pub unit: Option<String>,
    /// New reorder threshold.
    pub min_stock: Option<i64>,
    /// New upper stocking bound.
    pub max_stock: Option<i64>,
    /// New storage location.
    pub location: Option<String>,
    /// New category label.
    pub category: Option<String>,
    /// New description.
    pub description: Option<String>,
}

impl MaterialPatch {
    /// Returns true when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults_use_generic_unit_and_max_stock() {
        let spec = MaterialSpec::new("A1", "Widget");

        assert_eq!(spec.unit, DEFAULT_UNIT);
        assert_eq!(spec.max_stock, DEFAULT_MAX_STOCK);
        assert_eq!(spec.min_stock, 0);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_barcode() {
        let spec = MaterialSpec::new("   ", "Widget");

        let result = spec.validate();

        assert!(matches!(result, Err(LedgerError::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let spec = MaterialSpec::new("A1", "");

        assert!(matches!(spec.validate(), Err(LedgerError::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_rejects_min_stock_above_max_stock() {
        let mut spec = MaterialSpec::new("A1", "Widget");
        spec.min_stock = 50;
        spec.max_stock = 10;

        assert!(matches!(spec.validate(), Err(LedgerError::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_rejects_negative_min_stock() {
        let mut spec = MaterialSpec::new("A1", "Widget");
        spec.min_stock = -1;

        assert!(matches!(spec.validate(), Err(LedgerError::InvalidSpec(_))));
    }

    #[test]
    fn test_empty_patch_reports_empty() {
        assert!(MaterialPatch::default().is_empty());

        let patch = MaterialPatch {
            name: Some("Gadget".into()),
            ..MaterialPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
