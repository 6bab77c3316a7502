//! Errors raised by substrate wrappers themselves, as opposed to the
//! underlying call they wrap.

use thiserror::Error;

/// Errors from [`crate::retry::retry_with_backoff`] and
/// [`crate::circuit_breaker::CircuitBreaker::call`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SubstrateExecError<E> {
    /// Every retry attempt was exhausted.
    #[error("max retries ({attempts}) exceeded")]
    MaxRetriesExceeded {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The last error observed.
        #[source]
        last_error: E,
    },
    /// The wrapped call itself failed, and was not retried (non-transient,
    /// or the circuit breaker rejected it outright).
    #[error(transparent)]
    Inner(#[from] E),
    /// The circuit breaker is open and rejected the call without running it.
    #[error("circuit breaker '{name}' is open, retry after {retry_after_secs}s")]
    CircuitOpen {
        /// Name of the circuit breaker.
        name: String,
        /// Seconds remaining until the breaker attempts a half-open probe.
        retry_after_secs: u64,
    },
}
