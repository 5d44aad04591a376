//! Bounded retry with exponential backoff.

use crate::metrics::with_metrics;
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use teable_core::{IntelligenceConfig, TeableError, TeableResult};

/// Backoff for `config`: `retry_delay(1)`, doubling, with
/// `max_retries - 1` retries after the first attempt.
fn backoff(config: &IntelligenceConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.retry_delay(1))
        .with_factor(2.0)
        .with_max_times(config.max_retries.max(1).saturating_sub(1) as usize)
}

/// Run `operation` up to `config.max_retries` times.
///
/// After failed attempt `n` the helper sleeps `config.retry_delay(n)`
/// (200ms then 400ms with the default settings). Cancellation is returned
/// immediately without retrying. When every attempt fails the last error is
/// returned.
///
/// # Arguments
/// * `config` - Retry count and backoff base
/// * `label` - Name of the operation for logs
/// * `operation` - Factory producing one attempt
pub async fn with_retry<T, F, Fut>(
    config: &IntelligenceConfig,
    label: &str,
    operation: F,
) -> TeableResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TeableResult<T>>,
{
    let mut retries = 0u32;

    let result = operation
        .retry(backoff(config))
        .when(|e: &TeableError| !e.is_cancelled())
        .notify(|e: &TeableError, delay: Duration| {
            retries += 1;
            tracing::warn!(
                operation = label,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "Operation failed, retrying"
            );
            with_metrics(|m| m.batch_retries_total.inc());
        })
        .await;

    if let Err(e) = &result {
        if !e.is_cancelled() {
            tracing::error!(
                operation = label,
                attempts = retries + 1,
                error = %e,
                "Operation failed after all retries"
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use teable_core::{LlmError, TeableError};
    use tokio::time::Instant;

    fn failure() -> TeableError {
        LlmError::GenerationFailed {
            reason: "boom".to_string(),
        }
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_failures_with_backoff() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();

        let result = with_retry(&IntelligenceConfig::default(), "batch", || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(failure())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: TeableResult<()> = with_retry(&IntelligenceConfig::default(), "batch", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(failure())
        })
        .await;

        assert!(matches!(result, Err(TeableError::Llm(LlmError::GenerationFailed { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_matches_retry_delays() {
        let config = IntelligenceConfig::default();
        let delays: Vec<Duration> = backon::BackoffBuilder::build(backoff(&config)).collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );
    }

    #[tokio::test]
    async fn test_cancellation_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: TeableResult<()> = with_retry(&IntelligenceConfig::default(), "batch", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TeableError::Cancelled)
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
