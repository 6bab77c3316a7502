//! FakeClock — a settable clock for deterministic TTL/expiry tests.

use crate::traits::Clock;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// A clock whose value is set explicitly and never advances on its own.
pub struct FakeClock {
    now: RwLock<DateTime<Utc>>,
}

impl FakeClock {
    /// Create a clock fixed at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Move the clock forward or backward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.write().expect("fake clock lock poisoned");
        *now += delta;
    }

    /// Set the clock to an explicit instant.
    pub fn set(&self, value: DateTime<Utc>) {
        *self.now.write().expect("fake clock lock poisoned") = value;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("fake clock lock poisoned")
    }
}
