//! Client-side request pacing shared by the HTTP providers.

use std::time::Duration;

use teable_core::TeableResult;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

use super::request_failed;

/// Caps in-flight requests at the per-minute budget and spaces request
/// starts at least `60s / rpm` apart (floored at 10ms).
#[derive(Debug)]
pub(crate) struct RequestThrottle {
    provider: &'static str,
    permits: Semaphore,
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub(crate) fn per_minute(provider: &'static str, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self {
            provider,
            permits: Semaphore::new(rpm as usize),
            min_interval: Duration::from_millis((60_000 / u64::from(rpm)).max(10)),
            last_start: Mutex::new(None),
        }
    }

    pub(crate) fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for a permit and for the spacing window; hold the permit until
    /// the response has been read.
    pub(crate) async fn acquire(&self) -> TeableResult<SemaphorePermit<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| request_failed(self.provider, 0, format!("Rate limiter closed: {}", e)))?;

        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_start = Some(Instant::now());
        Ok(permit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_budget() {
        assert_eq!(
            RequestThrottle::per_minute("openai", 60).min_interval(),
            Duration::from_secs(1)
        );
        assert_eq!(
            RequestThrottle::per_minute("openai", 0).min_interval(),
            Duration::from_secs(60)
        );
        assert_eq!(
            RequestThrottle::per_minute("openai", 100_000).min_interval(),
            Duration::from_millis(10)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_for_interval() {
        let throttle = RequestThrottle::per_minute("openai", 60);
        let started = Instant::now();

        drop(throttle.acquire().await.unwrap());
        drop(throttle.acquire().await.unwrap());

        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
