//! Shared retry-with-backoff loop.
//!
//! Replaces a tenacity-style decorator with an explicit loop whose
//! parameters (attempts, backoff schedule, jitter, classifier) are passed in
//! a config value — and which, on exhaustion, surfaces the *last* original
//! error rather than a wrapper.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule and attempt budget for a retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: &'static [Duration],
    pub jitter: bool,
}

impl RetryConfig {
    /// 3 attempts total, 4s/8s backoff between them, with jitter — the
    /// shape used by both the LLM client and the extraction router.
    pub const STANDARD: RetryConfig = RetryConfig {
        max_attempts: 3,
        backoff: &[Duration::from_secs(4), Duration::from_secs(8)],
        jitter: true,
    };
}

fn jittered(duration: Duration, jitter: bool) -> Duration {
    if !jitter {
        return duration;
    }
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.8..1.2);
    Duration::from_secs_f64(duration.as_secs_f64() * factor)
}

/// Retries `attempt` up to `config.max_attempts` times. `is_transient`
/// classifies an error as retryable; a fatal error aborts immediately. On
/// exhaustion, returns the last error produced (never a synthetic wrapper).
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: RetryConfig,
    is_transient: impl Fn(&E) -> bool,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    for attempt_index in 0..config.max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let transient = is_transient(&err);
                last_err = Some(err);
                if !transient {
                    break;
                }
                if attempt_index + 1 < config.max_attempts {
                    if let Some(delay) = config.backoff.get(attempt_index as usize) {
                        tokio::time::sleep(jittered(*delay, config.jitter)).await;
                    }
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt always runs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_retrying() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            backoff: &[Duration::from_millis(1), Duration::from_millis(1)],
            jitter: false,
        };
        let result: Result<u32, String> = retry_with_backoff(config, |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_error_aborts_without_retry() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            backoff: &[Duration::from_millis(1), Duration::from_millis(1)],
            jitter: false,
        };
        let result: Result<u32, String> = retry_with_backoff(config, |_| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_all_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            backoff: &[Duration::from_millis(1), Duration::from_millis(1)],
            jitter: false,
        };
        let result: Result<u32, String> = retry_with_backoff(config, |_| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("attempt {n} failed")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err(), "attempt 3 failed");
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            backoff: &[Duration::from_millis(1), Duration::from_millis(1)],
            jitter: false,
        };
        let result: Result<u32, String> = retry_with_backoff(config, |_| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }
}
