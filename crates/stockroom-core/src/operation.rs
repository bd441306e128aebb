//! Operation — one immutable ledger entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Stock receipt: quantity is added to the stock level.
    In,
    /// Stock issue: quantity is removed from the stock level.
    Out,
    /// Correction: quantity is the new absolute stock level.
    Adjustment,
}

impl OperationKind {
    /// Stable string form, used by the durable store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjustment => "adjustment",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry recording one stock movement.
///
/// Once written an operation is never updated or deleted. For one material
/// the entries form a chain ordered by `(created_at, sequence)` where each
/// entry's `current_stock` equals the next entry's `previous_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Stable identifier.
    pub id: Uuid,
    /// Store-assigned insertion sequence; total-order tiebreak for entries
    /// sharing a timestamp.
    pub sequence: i64,
    /// The material this movement applied to.
    pub material_id: Uuid,
    /// Barcode captured at write time, kept even if the material is later
    /// renamed or deleted.
    pub material_barcode: String,
    /// Name captured at write time.
    pub material_name: String,
    /// Movement direction.
    pub kind: OperationKind,
    /// Magnitude applied, or for `Adjustment` the new absolute target.
    pub quantity: i64,
    /// Stock level before the movement.
    pub previous_stock: i64,
    /// Stock level after the movement.
    pub current_stock: i64,
    /// Who recorded the movement.
    pub operator: String,
    /// Optional free-form justification.
    pub reason: Option<String>,
    /// When the movement was recorded.
    pub created_at: DateTime<Utc>,
}

/// A ledger entry about to be written; the store assigns the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    /// Stable identifier chosen by the ledger engine.
    pub id: Uuid,
    /// The material this movement applies to.
    pub material_id: Uuid,
    /// Barcode captured at write time.
    pub material_barcode: String,
    /// Name captured at write time.
    pub material_name: String,
    /// Movement direction.
    pub kind: OperationKind,
    /// Magnitude applied, or for `Adjustment` the new absolute target.
    pub quantity: i64,
    /// Stock level before the movement.
    pub previous_stock: i64,
    /// Stock level after the movement.
    pub current_stock: i64,
    /// Who recorded the movement.
    pub operator: String,
    /// Optional free-form justification.
    pub reason: Option<String>,
    /// When the movement was recorded.
    pub created_at: DateTime<Utc>,
}

impl NewOperation {
    /// Completes the entry with the store-assigned sequence.
    #[must_use]
    pub fn into_operation(self, sequence: i64) -> Operation {
        Operation {
            id: self.id,
            sequence,
            material_id: self.material_id,
            material_barcode: self.material_barcode,
            material_name: self.material_name,
            kind: self.kind,
            quantity: self.quantity,
            previous_stock: self.previous_stock,
            current_stock: self.current_stock,
            operator: self.operator,
            reason: self.reason,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_round_trips_through_stable_strings() {
        for kind in [OperationKind::In, OperationKind::Out, OperationKind::Adjustment] {
            assert_eq!(OperationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::parse("transfer"), None);
    }

    #[test]
    fn test_operation_kind_serializes_lowercase() {
        let json = serde_json::to_string(&OperationKind::Adjustment).unwrap();
        assert_eq!(json, "\"adjustment\"");
    }
}
