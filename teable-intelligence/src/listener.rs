//! Table event listener that triggers generation.

use crate::service::{GenerationSummary, IntelligenceService, RunOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use teable_core::TeableResult;
use teable_events::{EventBus, OneOrMany, TableEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// What the listener did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandledEvent {
    /// A field-create event started a backfill.
    Backfill(RunOutcome),
    /// Records were generated by the update or create path.
    Generated(GenerationSummary),
    /// Nothing to do for this event.
    Ignored,
}

/// Routes table events to the [`IntelligenceService`].
///
/// Record updates arriving while a field-create backfill is running in this
/// listener are ignored, since they are the backfill's own writes.
#[derive(Debug, Clone)]
pub struct IntelligenceTriggerListener {
    service: IntelligenceService,
    field_creates_in_progress: Arc<AtomicUsize>,
}

/// Marks a field-create backfill as in progress until dropped.
struct FieldCreateGuard<'a>(&'a AtomicUsize);

impl<'a> FieldCreateGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for FieldCreateGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl IntelligenceTriggerListener {
    pub fn new(service: IntelligenceService) -> Self {
        Self {
            service,
            field_creates_in_progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_field_create_in_progress(&self) -> bool {
        self.field_creates_in_progress.load(Ordering::SeqCst) > 0
    }

    /// Handle one event to completion.
    pub async fn handle(&self, event: &TableEvent) -> TeableResult<HandledEvent> {
        match event {
            TableEvent::FieldCreated { table_id, field } => {
                let _guard = FieldCreateGuard::enter(&self.field_creates_in_progress);
                let OneOrMany::One(field) = field else {
                    tracing::debug!(table_id = %table_id, "Ignoring multi-field create event");
                    return Ok(HandledEvent::Ignored);
                };
                let Some(options) = field.intelligence().filter(|i| i.is_enabled()) else {
                    return Ok(HandledEvent::Ignored);
                };
                tracing::info!(
                    table_id = %table_id,
                    field_id = %field.id,
                    "Field created with intelligence enabled"
                );
                self.service
                    .trigger_create(table_id, &field.id, options)
                    .await
                    .map(HandledEvent::Backfill)
            }
            TableEvent::RecordsCreated { table_id, records } => self
                .service
                .trigger_create_records(table_id, records)
                .await
                .map(HandledEvent::Generated),
            TableEvent::RecordsUpdated { table_id, .. } => {
                if self.is_field_create_in_progress() {
                    tracing::debug!(
                        table_id = %table_id,
                        "Ignoring record update during field create"
                    );
                    return Ok(HandledEvent::Ignored);
                }
                let changes = event.cell_changes();
                if changes.is_empty() {
                    return Ok(HandledEvent::Ignored);
                }
                self.service
                    .trigger_update_records(table_id, &changes)
                    .await
                    .map(HandledEvent::Generated)
            }
        }
    }

    /// Consume events until the channel closes.
    ///
    /// Each event is handled on its own task, so a long backfill does not
    /// hold up record events.
    pub async fn run(self, mut rx: broadcast::Receiver<TableEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let listener = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = listener.handle(&event).await {
                            tracing::error!(
                                event_type = event.event_type(),
                                table_id = %event.table_id(),
                                error = %e,
                                "Intelligence trigger failed"
                            );
                        }
                    });
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Intelligence listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, stopping intelligence listener");
                    break;
                }
            }
        }
    }

    /// Subscribe to `bus` and run on a background task.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let rx = bus.subscribe();
        tokio::spawn(self.run(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_nesting() {
        let counter = AtomicUsize::new(0);
        {
            let _a = FieldCreateGuard::enter(&counter);
            let _b = FieldCreateGuard::enter(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
