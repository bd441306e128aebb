//! The decode-driven scan workflow state machine.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockroom_core::clock::Clock;
use stockroom_core::error::LedgerError;
use stockroom_core::material::{Material, MaterialSpec};
use stockroom_core::operation::Operation;
use stockroom_ledger::LedgerEngine;

/// How many accepted decodes the recent-scan log retains.
pub const RECENT_SCAN_CAP: usize = 50;

/// Reorder threshold applied to materials created from the scan flow.
pub const SCAN_DEFAULT_MIN_STOCK: i64 = 10;

/// Upper stocking bound applied to materials created from the scan flow.
pub const SCAN_DEFAULT_MAX_STOCK: i64 = 99_999;

/// Direction the operator chose for a confirmed movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementDirection {
    /// Stock receipt.
    In,
    /// Stock issue.
    Out,
}

/// The action a completed scan resolved into.
#[derive(Debug)]
pub enum ScanResolution {
    /// An existing material received a stock movement.
    StockMoved {
        /// The material after the movement.
        material: Material,
        /// The ledger entry appended for it.
        operation: Operation,
    },
    /// An unknown barcode was registered as a new material.
    MaterialCreated {
        /// The newly created material.
        material: Material,
    },
}

/// Workflow state. One physical scan walks
/// `Idle → MaterialFound | MaterialNotFound → Resolved | Rejected → Idle`.
#[derive(Debug)]
pub enum ScanState {
    /// Waiting for a decode.
    Idle,
    /// The barcode resolved to a live material; awaiting quantity and
    /// direction from the operator.
    MaterialFound {
        /// The looked-up material.
        material: Material,
    },
    /// The barcode is unknown; awaiting name and initial quantity for a
    /// new material.
    MaterialNotFound {
        /// The decoded barcode value.
        barcode: String,
        /// The decoded symbology.
        symbology: String,
    },
    /// The scan completed; carries what happened for display.
    Resolved(ScanResolution),
    /// The ledger rejected the chosen action; the operator must re-decide.
    /// There is no automatic retry.
    Rejected {
        /// The barcode the scan was for.
        barcode: String,
        /// The ledger failure that caused the rejection.
        reason: LedgerError,
    },
}

impl ScanState {
    /// True when the workflow will accept the next decode.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// A confirmation arrived in a state that was not awaiting it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    /// `confirm_movement` is only valid from `MaterialFound`.
    #[error("workflow is not awaiting a movement confirmation")]
    NotAwaitingMovement,
    /// `confirm_creation` is only valid from `MaterialNotFound`.
    #[error("workflow is not awaiting a creation confirmation")]
    NotAwaitingCreation,
}

/// One accepted decode, kept in the bounded recent-scan log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    /// The decoded barcode value.
    pub barcode: String,
    /// The decoded symbology.
    pub symbology: String,
    /// When the decode was accepted.
    pub scanned_at: DateTime<Utc>,
}

/// The scan resolution workflow.
///
/// Holds `&mut self` through each step, so a second decode event cannot
/// interleave while a mutation for the current scan is suspended awaiting
/// the durable store; decodes arriving in any non-idle state are ignored
/// (debounce), preventing duplicate ledger entries from one physical scan
/// held in front of the sensor for multiple frames.
pub struct ScanWorkflow {
    engine: Arc<LedgerEngine>,
    clock: Arc<dyn Clock>,
    state: ScanState,
    recent: VecDeque<ScanRecord>,
}

impl ScanWorkflow {
    /// Creates an idle workflow bound to the given engine.
    #[must_use]
    pub fn new(engine: Arc<LedgerEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            clock,
            state: ScanState::Idle,
            recent: VecDeque::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Accepted decodes, newest first, capped at [`RECENT_SCAN_CAP`].
    #[must_use]
    pub fn recent_scans(&self) -> impl Iterator<Item = &ScanRecord> {
        self.recent.iter()
    }

    /// Empties the recent-scan log.
    pub fn clear_recent_scans(&mut self) {
        self.recent.clear();
    }

    /// Handles a "barcode decoded" event from the scanner.
    ///
    /// Returns `true` when the decode was accepted and the state advanced;
    /// `false` when it was debounced because a scan is already in flight.
    pub fn decode(&mut self, value: &str, symbology: &str) -> bool {
        if !self.state.is_idle() {
            tracing::debug!(barcode = value, "decode ignored; scan already in flight");
            return false;
        }

        self.recent.push_front(ScanRecord {
            barcode: value.to_owned(),
            symbology: symbology.to_owned(),
            scanned_at: self.clock.now(),
        });
        self.recent.truncate(RECENT_SCAN_CAP);

        self.state = match self.engine.material_by_barcode(value) {
            Some(material) => {
                tracing::debug!(barcode = value, material_id = %material.id, "barcode resolved");
                ScanState::MaterialFound { material }
            }
            None => {
                tracing::debug!(barcode = value, "barcode unknown");
                ScanState::MaterialNotFound {
                    barcode: value.to_owned(),
                    symbology: symbology.to_owned(),
                }
            }
        };
        true
    }

    /// Applies the operator's quantity and direction to the found
    /// material. On ledger failure the workflow moves to `Rejected`; the
    /// operator must re-decide.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::NotAwaitingMovement` when the workflow is not
    /// in `MaterialFound`; the current state is left untouched.
    pub async fn confirm_movement(
        &mut self,
        direction: MovementDirection,
        quantity: i64,
        reason: Option<String>,
    ) -> Result<&ScanState, ScanError> {
        let ScanState::MaterialFound { material } = &self.state else {
            return Err(ScanError::NotAwaitingMovement);
        };
        let material = material.clone();

        let result = match direction {
            MovementDirection::In => {
                self.engine
                    .stock_in(material.id, quantity, reason)
                    .await
            }
            MovementDirection::Out => {
                self.engine
                    .stock_out(material.id, quantity, reason)
                    .await
            }
        };

        self.state = match result {
            Ok(movement) => ScanState::Resolved(ScanResolution::StockMoved {
                material: movement.material,
                operation: movement.operation,
            }),
            Err(reason) => ScanState::Rejected {
                barcode: material.barcode,
                reason,
            },
        };
        Ok(&self.state)
    }

    /// Registers the unknown barcode as a new material with the operator's
    /// name and initial quantity, using the scan-flow stocking defaults.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::NotAwaitingCreation` when the workflow is not
    /// in `MaterialNotFound`; the current state is left untouched.
    pub async fn confirm_creation(
        &mut self,
        name: &str,
        initial_stock: i64,
    ) -> Result<&ScanState, ScanError> {
        let ScanState::MaterialNotFound { barcode, .. } = &self.state else {
            return Err(ScanError::NotAwaitingCreation);
        };
        let barcode = barcode.clone();

        let mut spec = MaterialSpec::new(barcode.clone(), name);
        spec.min_stock = SCAN_DEFAULT_MIN_STOCK;
        spec.max_stock = SCAN_DEFAULT_MAX_STOCK;

        self.state = match self.engine.create_material(spec, initial_stock).await {
            Ok(material) => ScanState::Resolved(ScanResolution::MaterialCreated { material }),
            Err(reason) => ScanState::Rejected { barcode, reason },
        };
        Ok(&self.state)
    }

    /// Returns the workflow to `Idle`, completing the current scan (or
    /// cancelling an unresolved lookup).
    pub fn acknowledge(&mut self) -> &ScanState {
        self.state = ScanState::Idle;
        &self.state
    }
}

impl std::fmt::Debug for ScanWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanWorkflow")
            .field("state", &self.state)
            .field("recent", &self.recent.len())
            .finish_non_exhaustive()
    }
}
