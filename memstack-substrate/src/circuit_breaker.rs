//! Circuit breaker state machine, ported 1:1 from
//! `circuit_breaker.py`'s `CircuitBreaker`/`CircuitBreakerRegistry`:
//! CLOSED → OPEN after `failure_threshold` consecutive failures, OPEN →
//! HALF_OPEN after `timeout` elapses, HALF_OPEN → CLOSED after
//! `success_threshold` consecutive successes, any HALF_OPEN failure
//! reopens immediately.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Circuit is open; calls are rejected until `timeout` elapses.
    Open,
    /// Probing whether the dependency has recovered.
    HalfOpen,
}

/// Tuning knobs for one circuit breaker.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `Closed` before transitioning to `Open`.
    pub failure_threshold: u32,
    /// Consecutive successes in `HalfOpen` before transitioning to `Closed`.
    pub success_threshold: u32,
    /// How long the breaker stays `Open` before probing again.
    pub timeout: Duration,
    /// Max calls allowed through while `HalfOpen`.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<DateTime<Utc>>,
    half_open_call_count: u32,
    stats: CircuitBreakerStats,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            half_open_call_count: 0,
            stats: CircuitBreakerStats::default(),
        }
    }
}

/// Lifetime counters for one breaker (spec.md §4.1 "Statistics"),
/// ported from `circuit_breaker.py`'s `CircuitBreakerStats`. Never
/// reset by a `Closed`/`Open`/`HalfOpen` transition — only `reset()`
/// zeroes them, alongside the transient state.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreakerStats {
    /// Calls admitted through the breaker (successful + failed).
    pub total_calls: u64,
    /// Calls that completed without error.
    pub successful_calls: u64,
    /// Calls that completed with an error.
    pub failed_calls: u64,
    /// Calls rejected outright because the breaker was open/saturated.
    pub rejected_calls: u64,
    /// Number of times this breaker has transitioned to `Open`.
    pub open_count: u64,
}

/// Error raised when the breaker rejects a call outright.
#[derive(Debug, thiserror::Error)]
#[error("circuit breaker '{name}' is open, retry after {retry_after_secs}s")]
pub struct CircuitBreakerOpenError {
    /// Breaker name.
    pub name: String,
    /// Seconds remaining before the breaker probes again.
    pub retry_after_secs: u64,
}

/// One named circuit breaker, protecting one logical dependency call
/// site (e.g. `"neo4j"`, `"redis"`).
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new breaker, starting `Closed`.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.state.lock().expect("circuit breaker lock poisoned").state
    }

    /// Current state, alias for [`Self::state`] matching the grounding
    /// source's `get_state()` name.
    pub fn get_state(&self) -> CircuitState {
        self.state()
    }

    /// Lifetime call statistics (spec.md §4.1 "Statistics").
    pub fn stats(&self) -> CircuitBreakerStats {
        self.state.lock().expect("circuit breaker lock poisoned").stats
    }

    /// Run `f` through the breaker. Rejects outright (without running
    /// `f`) if the breaker is `Open` and `timeout` hasn't elapsed, or if
    /// `HalfOpen` and `half_open_max_calls` has been reached.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitBreakerOpenError>,
    {
        self.admit()?;
        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    fn admit<E: From<CircuitBreakerOpenError>>(&self) -> Result<(), E> {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        if state.state == CircuitState::Open {
            if self.should_attempt_reset(&state) {
                self.transition_to_half_open(&mut state);
            } else {
                let retry_after_secs = self.retry_after_secs(&state);
                state.stats.rejected_calls += 1;
                return Err(CircuitBreakerOpenError {
                    name: self.name.clone(),
                    retry_after_secs,
                }
                .into());
            }
        }

        if state.state == CircuitState::HalfOpen
            && state.half_open_call_count >= self.config.half_open_max_calls
        {
            let retry_after_secs = self.retry_after_secs(&state);
            state.stats.rejected_calls += 1;
            return Err(CircuitBreakerOpenError {
                name: self.name.clone(),
                retry_after_secs,
            }
            .into());
        }

        state.stats.total_calls += 1;
        Ok(())
    }

    fn on_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        state.stats.successful_calls += 1;
        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                state.half_open_call_count += 1;
                if state.success_count >= self.config.success_threshold {
                    self.transition_to_closed(&mut state);
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
                state.success_count += 1;
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        state.stats.failed_calls += 1;
        match state.state {
            CircuitState::HalfOpen => self.transition_to_open(&mut state),
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    self.transition_to_open(&mut state);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn should_attempt_reset(&self, state: &BreakerState) -> bool {
        match state.opened_at {
            None => true,
            Some(opened_at) => Utc::now() - opened_at >= chrono::Duration::from_std(self.config.timeout).unwrap_or_default(),
        }
    }

    fn retry_after_secs(&self, state: &BreakerState) -> u64 {
        let opened_at = state.opened_at.unwrap_or_else(Utc::now);
        let elapsed = (Utc::now() - opened_at).num_seconds().max(0) as u64;
        self.config.timeout.as_secs().saturating_sub(elapsed)
    }

    fn transition_to_open(&self, state: &mut BreakerState) {
        state.state = CircuitState::Open;
        state.opened_at = Some(Utc::now());
        state.half_open_call_count = 0;
        state.stats.open_count += 1;
        tracing::warn!(breaker = %self.name, failures = state.failure_count, "circuit breaker opened");
    }

    fn transition_to_half_open(&self, state: &mut BreakerState) {
        state.state = CircuitState::HalfOpen;
        state.failure_count = 0;
        state.success_count = 0;
        state.half_open_call_count = 0;
        tracing::info!(breaker = %self.name, "circuit breaker half-open");
    }

    fn transition_to_closed(&self, state: &mut BreakerState) {
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.half_open_call_count = 0;
        state.opened_at = None;
        tracing::info!(breaker = %self.name, "circuit breaker closed");
    }

    /// Reset to a fresh `Closed` state, discarding all counters.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        *state = BreakerState::default();
    }
}

/// A keyed collection of circuit breakers, one per named dependency.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, std::sync::Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the breaker for `name`, creating it with `config` if absent.
    pub fn get_or_create(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> std::sync::Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("registry lock poisoned");
        breakers
            .entry(name.to_owned())
            .or_insert_with(|| std::sync::Arc::new(CircuitBreaker::new(name, config)))
            .clone()
    }

    /// Fetch the breaker for `name`, if it exists.
    pub fn get(&self, name: &str) -> Option<std::sync::Arc<CircuitBreaker>> {
        self.breakers.lock().expect("registry lock poisoned").get(name).cloned()
    }

    /// Reset every registered breaker to `Closed`.
    pub fn reset_all(&self) {
        for breaker in self.breakers.lock().expect("registry lock poisoned").values() {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("boom")]
        Boom,
        #[error(transparent)]
        Open(#[from] CircuitBreakerOpenError),
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                ..Default::default()
            },
        );
        for _ in 0..2 {
            let result: Result<(), TestError> = breaker.call(|| async { Err(TestError::Boom) }).await;
            assert!(result.is_err());
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn rejects_calls_while_open() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::from_secs(60),
                ..Default::default()
            },
        );
        let _: Result<(), TestError> = breaker.call(|| async { Err(TestError::Boom) }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let result: Result<(), TestError> = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(TestError::Open(_))));
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::from_millis(0),
                ..Default::default()
            },
        );
        let _: Result<(), TestError> = breaker.call(|| async { Err(TestError::Boom) }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let result: Result<(), TestError> = breaker.call(|| async { Err(TestError::Boom) }).await;
        assert!(result.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn closes_after_success_threshold_in_half_open() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 2,
                timeout: Duration::from_millis(0),
                ..Default::default()
            },
        );
        let _: Result<(), TestError> = breaker.call(|| async { Err(TestError::Boom) }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        for _ in 0..2 {
            let result: Result<(), TestError> = breaker.call(|| async { Ok(()) }).await;
            assert!(result.is_ok());
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn stats_track_calls_rejections_and_opens() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                timeout: Duration::from_secs(60),
                ..Default::default()
            },
        );
        let _: Result<(), TestError> = breaker.call(|| async { Err(TestError::Boom) }).await;
        let _: Result<(), TestError> = breaker.call(|| async { Ok(()) }).await;

        let stats = breaker.stats();
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.failed_calls, 1);
        assert_eq!(stats.successful_calls, 0);
        assert_eq!(stats.rejected_calls, 1);
        assert_eq!(stats.open_count, 1);
        assert_eq!(breaker.get_state(), CircuitState::Open);
    }
}
