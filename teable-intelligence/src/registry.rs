//! Backfill run registry.
//!
//! At most one backfill runs per `(table, field)` key. Starting a run
//! cancels the previous one for the same key. Each run holds a
//! [`RunTicket`] carrying a generation number so a superseded run can tell
//! that its pending writes are stale.

use crate::metrics::with_metrics;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use teable_core::{FieldId, TableId, TeableError, TeableResult};
use tokio_util::sync::CancellationToken;

/// Key of a backfill run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub table_id: TableId,
    pub field_id: FieldId,
}

impl RunKey {
    pub fn new(table_id: TableId, field_id: FieldId) -> Self {
        Self { table_id, field_id }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.field_id)
    }
}

#[derive(Debug)]
struct RunEntry {
    generation: u64,
    token: CancellationToken,
}

/// Process-local registry of active backfill runs.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<RunKey, RunEntry>>,
    next_generation: AtomicU64,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run for `key`, cancelling any run already registered.
    ///
    /// The returned ticket removes the registration when dropped, unless a
    /// newer run has replaced it.
    pub fn start(self: &Arc<Self>, key: RunKey) -> RunTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = runs.insert(
            key.clone(),
            RunEntry {
                generation,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
            tracing::info!(
                run = %key,
                superseded_generation = previous.generation,
                generation = generation,
                "Cancelled previous intelligence run"
            );
        }
        let active = runs.len() as i64;
        drop(runs);
        with_metrics(|m| m.active_runs.set(active));

        RunTicket {
            registry: Arc::clone(self),
            key,
            generation,
            token,
        }
    }

    /// Cancel the run registered for `key`, if any.
    pub fn cancel(&self, key: &RunKey) -> bool {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let removed = runs.remove(key);
        let active = runs.len() as i64;
        drop(runs);
        with_metrics(|m| m.active_runs.set(active));
        match removed {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: &RunKey) -> bool {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.runs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn current_generation(&self, key: &RunKey) -> Option<u64> {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|entry| entry.generation)
    }

    fn release(&self, key: &RunKey, generation: u64) {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        if runs.get(key).is_some_and(|entry| entry.generation == generation) {
            runs.remove(key);
        }
        let active = runs.len() as i64;
        drop(runs);
        with_metrics(|m| m.active_runs.set(active));
    }
}

/// Handle of one registered run.
#[derive(Debug)]
pub struct RunTicket {
    registry: Arc<RunRegistry>,
    key: RunKey,
    generation: u64,
    token: CancellationToken,
}

impl RunTicket {
    pub fn key(&self) -> &RunKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True while this ticket is the registered run for its key.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled()
            && self.registry.current_generation(&self.key) == Some(self.generation)
    }

    /// `Err(Cancelled)` once the run has been cancelled.
    pub fn ensure_active(&self) -> TeableResult<()> {
        if self.token.is_cancelled() {
            Err(TeableError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// `Err(Cancelled)` when the run has been superseded; the pending write
    /// is discarded.
    pub fn ensure_current(&self, stage: &'static str) -> TeableResult<()> {
        if self.is_current() {
            return Ok(());
        }
        with_metrics(|m| m.stale_writes_total.with_label_values(&[stage]).inc());
        tracing::info!(
            run = %self.key,
            generation = self.generation,
            stage = stage,
            "Discarding writes of superseded intelligence run"
        );
        Err(TeableError::Cancelled)
    }
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RunKey {
        RunKey::new("tblA".into(), "fldBio".into())
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key().to_string(), "tblA:fldBio");
    }

    #[test]
    fn test_ticket_drop_releases_key() {
        let registry = Arc::new(RunRegistry::new());
        {
            let ticket = registry.start(key());
            assert!(registry.is_running(&key()));
            assert!(ticket.is_current());
            assert!(ticket.ensure_active().is_ok());
        }
        assert!(!registry.is_running(&key()));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_new_run_supersedes_previous() {
        let registry = Arc::new(RunRegistry::new());
        let first = registry.start(key());
        let second = registry.start(key());

        assert!(first.is_cancelled());
        assert!(!first.is_current());
        assert!(first.ensure_active().unwrap_err().is_cancelled());
        assert!(first.ensure_current("result").is_err());
        assert!(second.is_current());
        assert!(second.generation() > first.generation());

        // The superseded ticket must not release the newer registration.
        drop(first);
        assert!(registry.is_running(&key()));
        assert!(second.is_current());
    }

    #[test]
    fn test_cancel_by_key() {
        let registry = Arc::new(RunRegistry::new());
        let ticket = registry.start(key());
        assert!(registry.cancel(&key()));
        assert!(ticket.is_cancelled());
        assert!(!registry.cancel(&key()));
    }

    #[test]
    fn test_distinct_keys_run_side_by_side() {
        let registry = Arc::new(RunRegistry::new());
        let a = registry.start(key());
        let b = registry.start(RunKey::new("tblA".into(), "fldOther".into()));
        assert!(a.is_current() && b.is_current());
        assert_eq!(registry.active_count(), 2);
    }
}
