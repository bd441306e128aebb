//! Stockroom Core — shared inventory domain types.
//!
//! This crate defines the material and operation data model, the ledger
//! error taxonomy, and the collaborator seams (`Clock`, `DurableStore`)
//! that every other crate depends on. It contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod material;
pub mod operation;
pub mod store;
