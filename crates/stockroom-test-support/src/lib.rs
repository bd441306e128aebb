//! Shared test fakes and utilities for the stockroom workspace.

mod clock;
mod store;
mod tracing_init;

pub use clock::{FixedClock, SteppingClock};
pub use store::{AppendFailingStore, FailingStore};
pub use tracing_init::init_test_tracing;
