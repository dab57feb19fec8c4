//! Bookkeeping for dispatched tasks.
//!
//! Each dispatched request gets a [`TaskId`], a cancellation token, and an
//! optional progress handler. Entries are removed when the task finishes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::request::SessionTier;
use crate::transport::{ProgressHandler, TaskId};

#[derive(Debug)]
struct TaskEntry {
    tag: Option<u64>,
    tier: SessionTier,
    token: CancellationToken,
}

#[derive(Default)]
struct Tables {
    tasks: HashMap<TaskId, TaskEntry>,
    progress: HashMap<TaskId, ProgressHandler>,
}

/// Registry of in-flight tasks across all session tiers.
#[derive(Default)]
pub(crate) struct TaskRegistry {
    next_id: AtomicU64,
    tables: Mutex<Tables>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a task id and records the task.
    pub(crate) fn register(
        &self,
        tag: Option<u64>,
        tier: SessionTier,
        progress: Option<ProgressHandler>,
    ) -> (TaskId, CancellationToken) {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let token = CancellationToken::new();

        let mut tables = self.lock();
        tables.tasks.insert(
            id,
            TaskEntry {
                tag,
                tier,
                token: token.clone(),
            },
        );
        if let Some(progress) = progress {
            tables.progress.insert(id, progress);
        }
        (id, token)
    }

    /// Returns the progress handler for `id` while the task is registered.
    pub(crate) fn progress_handler(&self, id: TaskId) -> Option<ProgressHandler> {
        self.lock().progress.get(&id).cloned()
    }

    /// Removes a finished task.
    pub(crate) fn finish(&self, id: TaskId) {
        let mut tables = self.lock();
        tables.tasks.remove(&id);
        tables.progress.remove(&id);
    }

    /// Cancels every task carrying `tag`, on every tier. Returns how many were cancelled.
    pub(crate) fn cancel_tagged(&self, tag: u64) -> usize {
        let tables = self.lock();
        let mut cancelled = 0;
        for (id, entry) in &tables.tasks {
            if entry.tag == Some(tag) {
                debug!(task_id = %id, tier = %entry.tier, tag, "Cancelling task");
                entry.token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Cancels every task and clears all tables. Returns how many were cancelled.
    pub(crate) fn cancel_all(&self) -> usize {
        let mut tables = self.lock();
        let cancelled = tables.tasks.len();
        for entry in tables.tasks.values() {
            entry.token.cancel();
        }
        tables.tasks.clear();
        tables.progress.clear();
        cancelled
    }

    /// Number of tasks in flight.
    pub(crate) fn in_flight(&self) -> usize {
        self.lock().tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique() {
        let registry = TaskRegistry::new();
        let (a, _) = registry.register(None, SessionTier::Default, None);
        let (b, _) = registry.register(None, SessionTier::Default, None);
        assert_ne!(a, b);
        assert_eq!(registry.in_flight(), 2);

        registry.finish(a);
        assert_eq!(registry.in_flight(), 1);
    }

    #[test]
    fn test_cancel_tagged_spans_tiers() {
        let registry = TaskRegistry::new();
        let (_, default) = registry.register(Some(7), SessionTier::Default, None);
        let (_, background) = registry.register(Some(7), SessionTier::Background, None);
        let (_, other) = registry.register(Some(8), SessionTier::Ephemeral, None);
        let (_, untagged) = registry.register(None, SessionTier::Default, None);

        assert_eq!(registry.cancel_tagged(7), 2);
        assert!(default.is_cancelled());
        assert!(background.is_cancelled());
        assert!(!other.is_cancelled());
        assert!(!untagged.is_cancelled());
    }

    #[test]
    fn test_cancel_all_clears_tables() {
        let registry = TaskRegistry::new();
        let handler: ProgressHandler = Arc::new(|_| {});
        let (id, token) = registry.register(None, SessionTier::Background, Some(handler));

        assert!(registry.progress_handler(id).is_some());
        assert_eq!(registry.cancel_all(), 1);
        assert!(token.is_cancelled());
        assert_eq!(registry.in_flight(), 0);
        assert!(registry.progress_handler(id).is_none());
    }
}
