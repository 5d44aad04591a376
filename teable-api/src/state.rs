//! Shared application state for Axum routers.

use std::sync::Arc;

use teable_events::EventBus;
use teable_intelligence::IntelligenceService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Generation pipeline used by the intelligence routes.
    pub service: IntelligenceService,
    /// Bus feeding table events to the trigger listener.
    pub bus: Arc<EventBus>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(service: IntelligenceService, bus: Arc<EventBus>) -> Self {
        Self {
            service,
            bus,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(IntelligenceService, service);
crate::impl_from_ref!(Arc<EventBus>, bus);
