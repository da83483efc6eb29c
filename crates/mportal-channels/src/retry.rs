//! Exponential backoff for transient channel API failures.
//!
//! Only 429 responses and network-level errors are retried. Everything else
//! (auth failures, 404s, bad payloads) propagates on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::ChannelError;

/// Upper bound on a single backoff sleep.
const MAX_DELAY_SECS: f64 = 60.0;

fn is_retriable(err: &ChannelError) -> bool {
    matches!(err, ChannelError::RateLimited { .. } | ChannelError::Http(_))
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`, scaled by a
/// random factor in `[0.75, 1.25)` and capped at 60 seconds.
fn backoff_delay(backoff_base_secs: u64, attempt: u32) -> Duration {
    let base = backoff_base_secs.saturating_mul(1u64 << attempt.min(20));
    #[allow(clippy::cast_precision_loss)]
    let jittered = base as f64 * (rand::random::<f64>() * 0.5 + 0.75);
    Duration::from_secs_f64(jittered.min(MAX_DELAY_SECS))
}

/// The backoff delay, raised to the server's `Retry-After` when a 429
/// asked for longer. Still capped at 60 seconds.
fn retry_delay(err: &ChannelError, backoff_base_secs: u64, attempt: u32) -> Duration {
    let backoff = backoff_delay(backoff_base_secs, attempt);
    match err {
        ChannelError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } => {
            #[allow(clippy::cast_precision_loss)]
            let floor = (*secs as f64).min(MAX_DELAY_SECS);
            backoff.max(Duration::from_secs_f64(floor))
        }
        _ => backoff,
    }
}

/// Runs `operation`, retrying transient errors up to `max_retries` extra times.
///
/// With `max_retries = 3` the operation runs at most 4 times. The last error
/// is returned once retries are exhausted.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ChannelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChannelError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay = retry_delay(&err, backoff_base_secs, attempt);
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient channel error, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> ChannelError {
        ChannelError::RateLimited {
            platform: "shopify",
            retry_after_secs: None,
        }
    }

    #[test]
    fn backoff_delay_is_zero_for_zero_base() {
        assert_eq!(backoff_delay(0, 3), Duration::ZERO);
    }

    #[test]
    fn backoff_delay_stays_within_jitter_band() {
        for _ in 0..50 {
            let delay = backoff_delay(2, 1).as_secs_f64();
            assert!((3.0..5.0).contains(&delay), "delay {delay} outside band");
        }
    }

    #[test]
    fn backoff_delay_is_capped() {
        assert!(backoff_delay(30, 10) <= Duration::from_secs(60));
    }

    #[test]
    fn retry_after_sets_the_minimum_delay() {
        let err = ChannelError::RateLimited {
            platform: "shopify",
            retry_after_secs: Some(5),
        };
        assert_eq!(retry_delay(&err, 0, 0), Duration::from_secs(5));

        let delay = retry_delay(&err, 8, 1).as_secs_f64();
        assert!((12.0..20.0).contains(&delay), "longer backoff wins, got {delay}");
    }

    #[test]
    fn retry_after_is_capped() {
        let err = ChannelError::RateLimited {
            platform: "bestbuy",
            retry_after_secs: Some(3600),
        };
        assert_eq!(retry_delay(&err, 0, 0), Duration::from_secs(60));
    }

    #[test]
    fn missing_retry_after_falls_back_to_backoff() {
        assert_eq!(retry_delay(&rate_limited(), 0, 2), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ChannelError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limited_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, ChannelError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ChannelError>(rate_limited())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ChannelError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn zero_retries_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(0, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ChannelError>(rate_limited())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn does_not_retry_unauthorized() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ChannelError>(ChannelError::Unauthorized {
                    platform: "bestbuy",
                    status: 401,
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ChannelError::Unauthorized { .. })));
    }
}
