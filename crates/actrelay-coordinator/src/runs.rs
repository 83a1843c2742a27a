//! Run task registry.
//!
//! Tracks the background task of every run together with its lifecycle
//! status and creation metadata. Entries are kept for the lifetime of the
//! process so finished runs remain pollable.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use actrelay_core::{RunId, RunMetadata, RunRecord, RunStatus};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoordinatorError;

/// Handle to a run's background task.
#[derive(Debug)]
pub struct RunTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl RunTask {
    pub fn new(handle: JoinHandle<()>, cancel: CancellationToken) -> Self {
        Self { handle, cancel }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Debug)]
struct RunEntry {
    record: RunRecord,
    task: RunTask,
}

/// Maps run ids to their task, status and metadata.
#[derive(Debug, Default)]
pub struct RunTaskRegistry {
    runs: RwLock<HashMap<RunId, RunEntry>>,
}

impl RunTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh run id. Nothing is recorded until [`register`].
    ///
    /// [`register`]: RunTaskRegistry::register
    pub fn create(&self) -> RunId {
        RunId::generate()
    }

    /// Record a started task with status `running`.
    ///
    /// An id that is already registered is refused and its entry is left
    /// as it was.
    pub async fn register(
        &self,
        run_id: RunId,
        task: RunTask,
        metadata: RunMetadata,
    ) -> Result<(), CoordinatorError> {
        let mut runs = self.runs.write().await;
        match runs.entry(run_id) {
            Entry::Occupied(existing) => {
                warn!(
                    run_id = %existing.key(),
                    status = %existing.get().record.status,
                    "Run registered twice; keeping existing entry"
                );
                Err(CoordinatorError::DuplicateRun(existing.key().clone()))
            }
            Entry::Vacant(slot) => {
                info!(run_id = %slot.key(), "Run registered");
                let record = RunRecord::running(slot.key().clone(), metadata);
                slot.insert(RunEntry { record, task });
                Ok(())
            }
        }
    }

    /// Record a terminal status.
    ///
    /// Unknown runs and runs already in a terminal state are left untouched.
    pub async fn mark_done(&self, run_id: &RunId, status: RunStatus) -> bool {
        if !status.is_terminal() {
            warn!(run_id = %run_id, status = %status, "mark_done called with non-terminal status");
            return false;
        }

        let mut runs = self.runs.write().await;
        let Some(entry) = runs.get_mut(run_id) else {
            debug!(run_id = %run_id, "mark_done for unknown run");
            return false;
        };

        match entry.record.transition(status) {
            Ok(()) => {
                info!(run_id = %run_id, status = %status, "Run finished");
                true
            }
            Err(e) => {
                debug!(run_id = %run_id, error = %e, "Ignoring status update");
                false
            }
        }
    }

    /// Record a worker failure: status `error` plus its message.
    ///
    /// Nothing is written when the run is unknown or already terminal.
    pub async fn mark_failed(&self, run_id: &RunId, message: impl Into<String>) -> bool {
        let mut runs = self.runs.write().await;
        let Some(entry) = runs.get_mut(run_id) else {
            debug!(run_id = %run_id, "mark_failed for unknown run");
            return false;
        };

        match entry.record.transition(RunStatus::Error) {
            Ok(()) => {
                entry.record.error = Some(message.into());
                info!(run_id = %run_id, "Run failed");
                true
            }
            Err(e) => {
                debug!(run_id = %run_id, error = %e, "Ignoring failure report");
                false
            }
        }
    }

    /// Signal cooperative cancellation and record `cancelled`.
    ///
    /// Returns false if the run is unknown or already terminal.
    pub async fn cancel(&self, run_id: &RunId) -> bool {
        let mut runs = self.runs.write().await;
        let Some(entry) = runs.get_mut(run_id) else {
            debug!(run_id = %run_id, "Cancel for unknown run");
            return false;
        };

        if entry.record.is_terminal() {
            debug!(run_id = %run_id, status = %entry.record.status, "Cancel for finished run");
            return false;
        }

        entry.task.cancel.cancel();
        // Status was checked above, the transition cannot fail.
        let _ = entry.record.transition(RunStatus::Cancelled);
        info!(run_id = %run_id, "Run cancellation requested");
        true
    }

    /// Cancel every active run. Returns the number signalled.
    pub async fn cancel_all(&self) -> usize {
        let mut runs = self.runs.write().await;
        let mut cancelled = 0;
        for entry in runs.values_mut() {
            if entry.record.is_terminal() {
                continue;
            }
            entry.task.cancel.cancel();
            let _ = entry.record.transition(RunStatus::Cancelled);
            cancelled += 1;
        }
        cancelled
    }

    /// Current status, or `None` if the run is unknown.
    pub async fn status(&self, run_id: &RunId) -> Option<RunStatus> {
        self.runs.read().await.get(run_id).map(|e| e.record.status)
    }

    /// Snapshot of a run.
    pub async fn get(&self, run_id: &RunId) -> Option<RunRecord> {
        self.runs.read().await.get(run_id).map(|e| e.record.clone())
    }

    /// Snapshot of every run, oldest first.
    pub async fn list(&self) -> Vec<RunRecord> {
        let mut records: Vec<RunRecord> = self
            .runs
            .read()
            .await
            .values()
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    /// Returns true while the run's task has not returned.
    pub async fn is_running(&self, run_id: &RunId) -> bool {
        self.runs
            .read()
            .await
            .get(run_id)
            .is_some_and(|e| !e.task.is_finished())
    }

    /// Number of runs per status, in [`RunStatus::ALL`] order.
    pub async fn counts_by_status(&self) -> Vec<(RunStatus, usize)> {
        let runs = self.runs.read().await;
        RunStatus::ALL
            .iter()
            .map(|status| {
                let count = runs.values().filter(|e| e.record.status == *status).count();
                (*status, count)
            })
            .collect()
    }
}
