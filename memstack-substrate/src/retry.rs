//! Exponential backoff retry with jitter, mirroring
//! `retry_with_backoff`/`_calculate_delay` 1:1 (formula:
//! `min(base_delay * 2^attempt, max_delay)`, jitter is +/-25%).

use crate::error::SubstrateExecError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry tuning knobs. Defaults match the original 3-retry/100ms/60s
/// policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Whether to add +/-25% jitter to each computed delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exp = 2f64.powi(attempt as i32);
    let mut delay_secs = config.base_delay.as_secs_f64() * exp;
    delay_secs = delay_secs.min(config.max_delay.as_secs_f64());

    if config.jitter {
        let jitter_amount = delay_secs * 0.25;
        let offset = rand::thread_rng().gen_range(-jitter_amount..=jitter_amount);
        delay_secs = (delay_secs + offset).max(0.0);
    }

    Duration::from_secs_f64(delay_secs)
}

/// Transient-error heuristic over a plain message string. Concrete
/// adapters pattern-match their own error enum first and fall back to
/// this only for opaque driver errors (spec.md ambient "connection
/// resilience").
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    const KEYWORDS: &[&str] = &[
        "connection",
        "timeout",
        "pool",
        "deadlock",
        "temporary",
        "unavailable",
        "overloaded",
        "lock",
    ];
    KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Run `f` with exponential backoff, retrying while `is_transient`
/// returns `true` for the error it produced. Non-transient errors fail
/// immediately without consuming a retry.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut f: F,
    config: RetryConfig,
    is_transient_fn: impl Fn(&E) -> bool,
) -> Result<T, SubstrateExecError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_transient_fn(&err) {
                    return Err(SubstrateExecError::Inner(err));
                }
                if attempt >= config.max_retries {
                    return Err(SubstrateExecError::MaxRetriesExceeded {
                        attempts: attempt + 1,
                        last_error: err,
                    });
                }
                let delay = calculate_delay(attempt, &config);
                tracing::debug!(attempt = attempt + 1, ?delay, "retrying after transient error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn is_transient_matches_connection_keywords() {
        assert!(is_transient("connection reset by peer"));
        assert!(is_transient("deadlock detected"));
        assert!(!is_transient("syntax error near SELECT"));
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        };
        let result: Result<u32, SubstrateExecError<String>> = retry_with_backoff(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("connection reset".to_string())
                    } else {
                        Ok(42)
                    }
                }
            },
            config,
            |e| is_transient(e),
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_error_fails_without_retrying() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        };
        let result: Result<u32, SubstrateExecError<String>> = retry_with_backoff(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("syntax error".to_string()) }
            },
            config,
            |e| is_transient(e),
        )
        .await;
        assert!(matches!(result, Err(SubstrateExecError::Inner(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_reports_attempt_count() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
        };
        let result: Result<u32, SubstrateExecError<String>> = retry_with_backoff(
            || async { Err("connection refused".to_string()) },
            config,
            |e| is_transient(e),
        )
        .await;
        match result {
            Err(SubstrateExecError::MaxRetriesExceeded { attempts, .. }) => {
                assert_eq!(attempts, 3);
            }
            _ => panic!("expected MaxRetriesExceeded"),
        }
    }
}
