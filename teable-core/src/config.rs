//! Configuration types
//!
//! Values are loaded from environment variables with defaults that match
//! the production service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder written to a cell while its value is being generated.
pub const DEFAULT_THINKING_MESSAGE: &str = "思考中...";

/// Placeholder written to a cell whose generation failed.
pub const DEFAULT_FAILURE_MESSAGE: &str = "思考失败";

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key).map(Duration::from_millis).unwrap_or(default)
}

// ============================================================================
// THRESHOLD CONFIGURATION
// ============================================================================

/// Sizing thresholds shared with the calculation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Rows fetched per page when walking a whole table.
    pub calc_chunk_size: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            calc_chunk_size: 1000,
        }
    }
}

impl ThresholdConfig {
    /// Environment variables:
    /// - `TEABLE_CALC_CHUNK_SIZE` (default: 1000, minimum 1)
    pub fn from_env() -> Self {
        let calc_chunk_size = env_parse::<usize>("TEABLE_CALC_CHUNK_SIZE")
            .unwrap_or(1000)
            .max(1);
        Self { calc_chunk_size }
    }
}

// ============================================================================
// INTELLIGENCE PIPELINE CONFIGURATION
// ============================================================================

/// Batching, retry and placeholder settings for the generation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelligenceConfig {
    /// Attempts per backfill batch before the run aborts.
    pub max_retries: u32,
    /// Base of the exponential retry backoff (`base * 2^attempt`).
    pub retry_base_delay: Duration,
    /// Records per backfill batch.
    pub small_batch_size: usize,
    /// Pause after every backfill batch.
    pub batch_delay: Duration,
    /// Records per batch on the update and create paths.
    pub record_batch_size: usize,
    /// Pause after every record batch on the update and create paths.
    pub record_batch_delay: Duration,
    pub thinking_message: String,
    pub failure_message: String,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            small_batch_size: 2,
            batch_delay: Duration::from_millis(500),
            record_batch_size: 3,
            record_batch_delay: Duration::from_millis(100),
            thinking_message: DEFAULT_THINKING_MESSAGE.to_string(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl IntelligenceConfig {
    /// Create IntelligenceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TEABLE_INTELLIGENCE_MAX_RETRIES` (default: 3)
    /// - `TEABLE_INTELLIGENCE_RETRY_BASE_MS` (default: 100)
    /// - `TEABLE_INTELLIGENCE_BATCH_SIZE` (default: 2)
    /// - `TEABLE_INTELLIGENCE_BATCH_DELAY_MS` (default: 500)
    /// - `TEABLE_INTELLIGENCE_RECORD_BATCH_SIZE` (default: 3)
    /// - `TEABLE_INTELLIGENCE_RECORD_BATCH_DELAY_MS` (default: 100)
    /// - `TEABLE_INTELLIGENCE_THINKING_MESSAGE`
    /// - `TEABLE_INTELLIGENCE_FAILURE_MESSAGE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_parse::<u32>("TEABLE_INTELLIGENCE_MAX_RETRIES")
                .unwrap_or(defaults.max_retries)
                .max(1),
            retry_base_delay: env_millis(
                "TEABLE_INTELLIGENCE_RETRY_BASE_MS",
                defaults.retry_base_delay,
            ),
            small_batch_size: env_parse::<usize>("TEABLE_INTELLIGENCE_BATCH_SIZE")
                .unwrap_or(defaults.small_batch_size)
                .max(1),
            batch_delay: env_millis("TEABLE_INTELLIGENCE_BATCH_DELAY_MS", defaults.batch_delay),
            record_batch_size: env_parse::<usize>("TEABLE_INTELLIGENCE_RECORD_BATCH_SIZE")
                .unwrap_or(defaults.record_batch_size)
                .max(1),
            record_batch_delay: env_millis(
                "TEABLE_INTELLIGENCE_RECORD_BATCH_DELAY_MS",
                defaults.record_batch_delay,
            ),
            thinking_message: std::env::var("TEABLE_INTELLIGENCE_THINKING_MESSAGE")
                .unwrap_or(defaults.thinking_message),
            failure_message: std::env::var("TEABLE_INTELLIGENCE_FAILURE_MESSAGE")
                .unwrap_or(defaults.failure_message),
        }
    }

    /// Backoff before retry number `attempt` (1-based): `base * 2^attempt`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Same settings with every delay set to zero.
    pub fn without_delays(mut self) -> Self {
        self.retry_base_delay = Duration::ZERO;
        self.batch_delay = Duration::ZERO;
        self.record_batch_delay = Duration::ZERO;
        self
    }
}
