//! Teable Intelligence - AI Field Generation Pipeline
//!
//! Change detection, dependency ordering, prompt rendering and the batched
//! generation service behind AI-backed table fields.

pub mod changes;
pub mod dependency;
pub mod listener;
pub mod metrics;
pub mod prompt;
pub mod registry;
pub mod retry;
pub mod service;

pub use changes::{affected_fields, intelligence_fields, record_data_from_changes};
pub use dependency::{topological_order, DependencyNode, DependencyOrder};
pub use listener::{HandledEvent, IntelligenceTriggerListener};
pub use metrics::{IntelligenceMetrics, INTELLIGENCE_METRICS};
pub use prompt::{render_backfill_prompt, render_record_prompt, value_to_prompt_text};
pub use registry::{RunKey, RunRegistry, RunTicket};
pub use retry::with_retry;
pub use service::{GenerationSummary, IntelligenceService, RunOutcome};
