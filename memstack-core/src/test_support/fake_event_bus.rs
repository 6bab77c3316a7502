//! FakeEventBus — records published events for assertion in tests.

use crate::traits::{EventBus, SessionEvent};
use async_trait::async_trait;
use std::sync::Mutex;

/// An event bus that appends every published event to an in-memory
/// log, retrievable via [`FakeEventBus::events`].
#[derive(Default)]
pub struct FakeEventBus {
    events: Mutex<Vec<SessionEvent>>,
}

impl FakeEventBus {
    /// Create a new empty event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event published so far, in publish order.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl EventBus for FakeEventBus {
    async fn publish(&self, event: SessionEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}
