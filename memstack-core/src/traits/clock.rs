//! [`Clock`] — an injectable time source, so tests can control `now()`
//! (spec.md §9 "Embedding-dimension mismatch", TTL caches generally).

use chrono::{DateTime, Utc};

/// A source of the current time. Implementations must be cheap to call —
/// it is read on nearly every cache/TTL check.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
