//! Prometheus metrics for the generation pipeline.
//!
//! Registered in the default registry, so the API's `/metrics` endpoint
//! exports them alongside the HTTP metrics.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, IntCounter,
    IntGauge,
};
use teable_core::{ConfigError, TeableError, TeableResult};

/// Global metrics instance - initialized on first use.
pub static INTELLIGENCE_METRICS: Lazy<TeableResult<IntelligenceMetrics>> =
    Lazy::new(IntelligenceMetrics::new);

/// Container for all pipeline metrics.
#[derive(Clone)]
pub struct IntelligenceMetrics {
    /// Cell generations - labels: path (backfill/update/create), outcome (success/failure/skipped)
    pub generations_total: CounterVec,

    /// Finished backfill runs - labels: outcome (completed/cancelled/failed/invalid)
    pub runs_total: CounterVec,

    /// Batch attempts that failed and were retried
    pub batch_retries_total: IntCounter,

    /// Writes dropped because their run was superseded - labels: stage
    pub stale_writes_total: CounterVec,

    /// Backfill runs currently registered
    pub active_runs: IntGauge,
}

fn registration_failed(name: &str, e: prometheus::Error) -> TeableError {
    ConfigError::InvalidValue {
        field: "metrics".to_string(),
        value: name.to_string(),
        reason: e.to_string(),
    }
    .into()
}

impl IntelligenceMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> TeableResult<Self> {
        Ok(Self {
            generations_total: register_counter_vec!(
                "teable_intelligence_generations_total",
                "Total number of AI cell generations",
                &["path", "outcome"]
            )
            .map_err(|e| registration_failed("generations_total", e))?,

            runs_total: register_counter_vec!(
                "teable_intelligence_runs_total",
                "Total number of finished backfill runs",
                &["outcome"]
            )
            .map_err(|e| registration_failed("runs_total", e))?,

            batch_retries_total: register_int_counter!(
                "teable_intelligence_batch_retries_total",
                "Total number of retried backfill batches"
            )
            .map_err(|e| registration_failed("batch_retries_total", e))?,

            stale_writes_total: register_counter_vec!(
                "teable_intelligence_stale_writes_total",
                "Total number of writes discarded for superseded runs",
                &["stage"]
            )
            .map_err(|e| registration_failed("stale_writes_total", e))?,

            active_runs: register_int_gauge!(
                "teable_intelligence_active_runs",
                "Current number of registered backfill runs"
            )
            .map_err(|e| registration_failed("active_runs", e))?,
        })
    }

    /// Record the outcome of one cell generation.
    pub fn record_generation(&self, path: &str, outcome: &str) {
        self.generations_total
            .with_label_values(&[path, outcome])
            .inc();
    }

    pub fn record_run(&self, outcome: &str) {
        self.runs_total.with_label_values(&[outcome]).inc();
    }
}

/// Run `f` against the global metrics when registration succeeded.
pub(crate) fn with_metrics(f: impl FnOnce(&IntelligenceMetrics)) {
    if let Ok(metrics) = INTELLIGENCE_METRICS.as_ref() {
        f(metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let metrics = INTELLIGENCE_METRICS.as_ref().expect("metrics registered");
        let before = metrics
            .generations_total
            .with_label_values(&["update", "success"])
            .get();
        metrics.record_generation("update", "success");
        let after = metrics
            .generations_total
            .with_label_values(&["update", "success"])
            .get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_metrics_are_exported() {
        with_metrics(|m| m.record_run("completed"));
        let mut buffer = Vec::new();
        prometheus::Encoder::encode(
            &prometheus::TextEncoder::new(),
            &prometheus::gather(),
            &mut buffer,
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("teable_intelligence_runs_total"));
    }
}
