//! Caller-level bounded retry for idempotent operations.
//!
//! Only `test_connection` and `pull_reservations` should go through here.
//! Pushes are POSTs without idempotency keys and must not be replayed.

use std::future::Future;
use std::time::Duration;

use proto::{ChannelError, ChannelResponse};
use rand::Rng;
use tracing::warn;

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), with up to 25% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter_ms = (capped.as_millis() as u64) / 4;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        capped + Duration::from_millis(jitter)
    }
}

/// Transport failures, 429 and 5xx are worth another attempt.
pub fn is_retryable(response: &ChannelResponse) -> bool {
    if response.success {
        return false;
    }
    if response.exception().is_some() {
        return true;
    }
    matches!(response.status(), Some(429) | Some(500..=599))
}

/// Runs `op` until it succeeds, returns a non-retryable failure, or the
/// attempts run out. Setup errors are returned immediately.
///
/// The final envelope records the number of attempts in `meta.attempts`.
pub async fn retry_idempotent<F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<ChannelResponse, ChannelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ChannelResponse, ChannelError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let response = op().await?;
        if attempt >= max_attempts || !is_retryable(&response) {
            return Ok(response.with_meta("attempts", attempt));
        }
        let delay = policy.delay_for(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Retrying channel call: {}",
            response.message
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::ConfigurationError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn classifies_retryable_failures() {
        assert!(!is_retryable(&ChannelResponse::success("ok", serde_json::json!({}))));
        assert!(is_retryable(
            &ChannelResponse::failure("x").with_meta("exception", "timeout")
        ));
        assert!(is_retryable(&ChannelResponse::failure("x").with_meta("status", 503)));
        assert!(is_retryable(&ChannelResponse::failure("x").with_meta("status", 429)));
        assert!(!is_retryable(&ChannelResponse::failure("x").with_meta("status", 404)));
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let first = policy.delay_for(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
        let third = policy.delay_for(3);
        assert!(third >= Duration::from_millis(300) && third <= Duration::from_millis(375));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let resp = retry_idempotent(&fast(), || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(ChannelResponse::failure("down").with_meta("status", 502))
            } else {
                Ok(ChannelResponse::success("ok", serde_json::json!({})))
            }
        })
        .await
        .unwrap();
        assert!(resp.success);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resp.meta["attempts"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let resp = retry_idempotent(&fast(), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ChannelResponse::failure("down").with_meta("exception", "refused"))
        })
        .await
        .unwrap();
        assert!(!resp.success);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn setup_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_idempotent(&fast(), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ConfigurationError::UnconfiguredEndpoint {
                channel: "airbnb".into(),
                endpoint: "reservations".into(),
            }
            .into())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_failure_returns_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let resp = retry_idempotent(&RetryPolicy::default(), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ChannelResponse::failure("bad request").with_meta("status", 400))
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resp.meta["attempts"], serde_json::json!(1));
    }
}
