//! [`HitlRegistry`] — process-local waiter map keyed by `request_id`,
//! indexed by `conversation_id` (spec.md §4.8).

use memstack_core::model::{HitlResponse, HitlType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};

/// A callback invoked synchronously when a response is delivered, in
/// addition to (not instead of) the one-shot channel `wait_for_response`
/// reads from.
pub type ResponseCallback = Arc<dyn Fn(&HitlResponse) + Send + Sync>;

/// Handle returned from [`HitlRegistry::register_waiter`]. Its only
/// purpose is to name the request id the caller just registered; holding
/// it is not required to later call `wait_for_response` or
/// `unregister_waiter`; both take the `request_id` directly.
#[derive(Debug, Clone)]
pub struct WaiterHandle {
    /// The request id this handle was issued for.
    pub request_id: String,
}

/// A snapshot of one in-flight waiter, as returned by
/// `get_waiters_by_conversation`.
#[derive(Debug, Clone)]
pub struct WaiterInfo {
    /// The waiter's request id.
    pub request_id: String,
    /// The HITL type it is waiting on.
    pub hitl_type: HitlType,
    /// Seconds elapsed since registration.
    pub age_seconds: u64,
}

/// Running counters, exposed for observability (spec.md §4.8
/// "Statistics").
#[derive(Debug, Default)]
pub struct HitlRegistryStats {
    /// Total waiters ever registered.
    pub total_registered: u64,
    /// Total responses ever delivered.
    pub total_delivered: u64,
    /// Total waiters that expired without a response.
    pub total_timeouts: u64,
}

struct Waiter {
    conversation_id: String,
    hitl_type: HitlType,
    registered_at: Instant,
    sender: Option<oneshot::Sender<HitlResponse>>,
    callback: Option<ResponseCallback>,
}

struct Counters {
    registered: AtomicU64,
    delivered: AtomicU64,
    timeouts: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            registered: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }
}

/// Process-local store of pending HITL waiters. Concurrency-safe: every
/// mutation takes the single internal lock only for the map update, never
/// across an `.await` on the channel itself.
pub struct HitlRegistry {
    waiters: Mutex<HashMap<String, Waiter>>,
    by_conversation: Mutex<HashMap<String, Vec<String>>>,
    receivers: Mutex<HashMap<String, oneshot::Receiver<HitlResponse>>>,
    counters: Counters,
}

impl Default for HitlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HitlRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
            by_conversation: Mutex::new(HashMap::new()),
            receivers: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Register a waiter for `request_id`. `callback`, if given, runs
    /// synchronously inside `deliver_response` in addition to the
    /// channel `wait_for_response` reads from.
    pub async fn register_waiter(
        &self,
        request_id: impl Into<String>,
        conversation_id: impl Into<String>,
        hitl_type: HitlType,
        callback: Option<ResponseCallback>,
    ) -> WaiterHandle {
        let request_id = request_id.into();
        let conversation_id = conversation_id.into();
        let (tx, rx) = oneshot::channel();

        self.waiters.lock().await.insert(
            request_id.clone(),
            Waiter {
                conversation_id: conversation_id.clone(),
                hitl_type,
                registered_at: Instant::now(),
                sender: Some(tx),
                callback,
            },
        );
        self.receivers.lock().await.insert(request_id.clone(), rx);
        self.by_conversation
            .lock()
            .await
            .entry(conversation_id)
            .or_default()
            .push(request_id.clone());

        self.counters.registered.fetch_add(1, Ordering::Relaxed);
        WaiterHandle { request_id }
    }

    /// Deliver a response to the waiter registered for `request_id`.
    /// Returns `false` if no such waiter exists (already delivered,
    /// expired, or never registered).
    pub async fn deliver_response(&self, request_id: &str, response: HitlResponse) -> bool {
        let waiter = self.waiters.lock().await.remove(request_id);
        let Some(mut waiter) = waiter else {
            return false;
        };
        self.remove_from_conversation_index(&waiter.conversation_id, request_id)
            .await;

        if let Some(callback) = waiter.callback.take() {
            callback(&response);
        }
        if let Some(sender) = waiter.sender.take() {
            // The receiver may already have been dropped by a caller that
            // gave up waiting; that's not a delivery failure.
            let _ = sender.send(response);
        }
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Wait for the response to `request_id`, or `None` once `timeout`
    /// elapses. On timeout the waiter is removed and the timeout counter
    /// incremented.
    pub async fn wait_for_response(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Option<HitlResponse> {
        let receiver = self.receivers.lock().await.remove(request_id)?;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(_)) => None, // sender dropped without delivering
            Err(_) => {
                self.unregister_waiter(request_id).await;
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remove a waiter without delivering a response (used on explicit
    /// cancellation, spec.md §4.9).
    pub async fn unregister_waiter(&self, request_id: &str) {
        let waiter = self.waiters.lock().await.remove(request_id);
        self.receivers.lock().await.remove(request_id);
        if let Some(waiter) = waiter {
            self.remove_from_conversation_index(&waiter.conversation_id, request_id)
                .await;
        }
    }

    /// Whether a waiter is currently registered for `request_id`.
    pub async fn has_waiter(&self, request_id: &str) -> bool {
        self.waiters.lock().await.contains_key(request_id)
    }

    /// List all in-flight waiters for a conversation.
    pub async fn get_waiters_by_conversation(&self, conversation_id: &str) -> Vec<WaiterInfo> {
        let ids = self
            .by_conversation
            .lock()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        let waiters = self.waiters.lock().await;
        ids.into_iter()
            .filter_map(|id| {
                waiters.get(&id).map(|w| WaiterInfo {
                    request_id: id,
                    hitl_type: w.hitl_type,
                    age_seconds: w.registered_at.elapsed().as_secs(),
                })
            })
            .collect()
    }

    /// Remove every waiter older than `max_age_seconds`, counting each as
    /// a timeout. Returns the number removed.
    pub async fn cleanup_expired(&self, max_age_seconds: u64) -> usize {
        let expired: Vec<(String, String)> = {
            let waiters = self.waiters.lock().await;
            waiters
                .iter()
                .filter(|(_, w)| w.registered_at.elapsed().as_secs() >= max_age_seconds)
                .map(|(id, w)| (id.clone(), w.conversation_id.clone()))
                .collect()
        };

        for (request_id, conversation_id) in &expired {
            self.waiters.lock().await.remove(request_id);
            self.receivers.lock().await.remove(request_id);
            self.remove_from_conversation_index(conversation_id, request_id)
                .await;
        }
        let count = expired.len();
        self.counters
            .timeouts
            .fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Snapshot the running counters.
    pub async fn stats(&self) -> HitlRegistryStats {
        HitlRegistryStats {
            total_registered: self.counters.registered.load(Ordering::Relaxed),
            total_delivered: self.counters.delivered.load(Ordering::Relaxed),
            total_timeouts: self.counters.timeouts.load(Ordering::Relaxed),
        }
    }

    async fn remove_from_conversation_index(&self, conversation_id: &str, request_id: &str) {
        let mut index = self.by_conversation.lock().await;
        if let Some(ids) = index.get_mut(conversation_id) {
            ids.retain(|id| id != request_id);
            if ids.is_empty() {
                index.remove(conversation_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memstack_core::model::HitlResponsePayload;

    fn response(request_id: &str) -> HitlResponse {
        HitlResponse {
            request_id: request_id.to_string(),
            payload: HitlResponsePayload::Clarification {
                answer: "yes".into(),
            },
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn deliver_then_wait_round_trips() {
        let registry = HitlRegistry::new();
        registry
            .register_waiter("clar_1", "conv-1", HitlType::Clarification, None)
            .await;
        assert!(registry.has_waiter("clar_1").await);

        assert!(registry.deliver_response("clar_1", response("clar_1")).await);
        let answer = registry
            .wait_for_response("clar_1", Duration::from_secs(1))
            .await;
        assert_eq!(answer.unwrap().request_id, "clar_1");
        assert!(!registry.has_waiter("clar_1").await);
    }

    #[tokio::test]
    async fn wait_for_response_times_out_and_removes_waiter() {
        let registry = HitlRegistry::new();
        registry
            .register_waiter("clar_2", "conv-1", HitlType::Clarification, None)
            .await;

        let answer = registry
            .wait_for_response("clar_2", Duration::from_millis(10))
            .await;
        assert!(answer.is_none());
        assert!(!registry.has_waiter("clar_2").await);
        assert_eq!(registry.stats().await.total_timeouts, 1);
    }

    #[tokio::test]
    async fn deliver_response_invokes_callback() {
        let registry = HitlRegistry::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_clone = seen.clone();
        registry
            .register_waiter(
                "deci_1",
                "conv-1",
                HitlType::Decision,
                Some(Arc::new(move |r: &HitlResponse| {
                    *seen_clone.lock().unwrap() = Some(r.request_id.clone());
                })),
            )
            .await;

        registry.deliver_response("deci_1", response("deci_1")).await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("deci_1"));
    }

    #[tokio::test]
    async fn deliver_response_to_unknown_request_returns_false() {
        let registry = HitlRegistry::new();
        assert!(!registry.deliver_response("clar_missing", response("clar_missing")).await);
    }

    #[tokio::test]
    async fn get_waiters_by_conversation_lists_all_in_flight() {
        let registry = HitlRegistry::new();
        registry
            .register_waiter("clar_1", "conv-1", HitlType::Clarification, None)
            .await;
        registry
            .register_waiter("perm_1", "conv-1", HitlType::Permission, None)
            .await;
        registry
            .register_waiter("deci_1", "conv-2", HitlType::Decision, None)
            .await;

        let waiters = registry.get_waiters_by_conversation("conv-1").await;
        assert_eq!(waiters.len(), 2);
    }

    #[tokio::test]
    async fn cleanup_expired_removes_old_waiters_and_counts_them() {
        let registry = HitlRegistry::new();
        registry
            .register_waiter("clar_1", "conv-1", HitlType::Clarification, None)
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let removed = registry.cleanup_expired(0).await;
        assert_eq!(removed, 1);
        assert!(!registry.has_waiter("clar_1").await);
        assert_eq!(registry.stats().await.total_timeouts, 1);
    }

    #[tokio::test]
    async fn unregister_waiter_is_silent_on_unknown_id() {
        let registry = HitlRegistry::new();
        registry.unregister_waiter("no-such-id").await;
    }
}
