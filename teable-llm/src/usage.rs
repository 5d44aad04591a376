//! Token usage accounting shared by every provider built from one registry.

use std::sync::atomic::{AtomicI64, Ordering};

/// Running totals of requests and tokens.
pub struct UsageTracker {
    requests: AtomicI64,
    prompt_tokens: AtomicI64,
    completion_tokens: AtomicI64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self {
            requests: AtomicI64::new(0),
            prompt_tokens: AtomicI64::new(0),
            completion_tokens: AtomicI64::new(0),
        }
    }

    /// Record one completed request.
    ///
    /// # Arguments
    /// * `prompt_tokens` - Tokens billed for the prompt
    /// * `completion_tokens` - Tokens billed for the completion
    pub fn record(&self, prompt_tokens: i64, completion_tokens: i64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens.fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(completion_tokens, Ordering::Relaxed);
    }

    pub fn requests(&self) -> i64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn prompt_tokens(&self) -> i64 {
        self.prompt_tokens.load(Ordering::Relaxed)
    }

    pub fn completion_tokens(&self) -> i64 {
        self.completion_tokens.load(Ordering::Relaxed)
    }

    pub fn total_tokens(&self) -> i64 {
        self.prompt_tokens() + self.completion_tokens()
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.prompt_tokens.store(0, Ordering::Relaxed);
        self.completion_tokens.store(0, Ordering::Relaxed);
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("requests", &self.requests())
            .field("prompt_tokens", &self.prompt_tokens())
            .field("completion_tokens", &self.completion_tokens())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reset() {
        let tracker = UsageTracker::new();
        tracker.record(10, 5);
        tracker.record(3, 2);
        assert_eq!(tracker.requests(), 2);
        assert_eq!(tracker.prompt_tokens(), 13);
        assert_eq!(tracker.completion_tokens(), 7);
        assert_eq!(tracker.total_tokens(), 20);

        tracker.reset();
        assert_eq!(tracker.requests(), 0);
        assert_eq!(tracker.total_tokens(), 0);
    }
}
