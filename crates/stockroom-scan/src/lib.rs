//! Stockroom Scan — the scan resolution workflow.
//!
//! A small state machine driven by one external event, "barcode decoded":
//! it turns a decoded barcode into either a stock movement against an
//! existing material or a new-material creation, using the ledger engine.

pub mod workflow;

pub use workflow::{
    MovementDirection, ScanError, ScanRecord, ScanResolution, ScanState, ScanWorkflow,
};
