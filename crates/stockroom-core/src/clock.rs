//! Time source for ledger timestamps.
//!
//! Every timestamp the system writes (material bookkeeping, operation
//! `created_at`) flows through a `Clock`, so tests can pin time to a fixed
//! instant or step it deterministically between movements.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current moment.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, used everywhere outside of tests.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
