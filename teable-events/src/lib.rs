//! Teable Events - Table Change Events and Event Bus
//!
//! The record and field services publish [`TableEvent`]s on an
//! [`EventBus`]; listeners subscribe and react (the intelligence trigger
//! listener is the main consumer).
//!
//! ```text
//! record service ──publish──▶ EventBus ──subscribe──▶ listeners
//! ```

mod bus;
mod event;

pub use bus::EventBus;
pub use event::{CreatedRecord, OneOrMany, TableEvent, UpdatedCell, UpdatedRecord};
