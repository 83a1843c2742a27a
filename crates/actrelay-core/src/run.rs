//! Run record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::{RunId, RunStatus};

/// Free-form creation metadata of a run (target URL, step list, ...).
pub type RunMetadata = Map<String, Value>;

/// Snapshot of a run as tracked by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run identifier.
    pub run_id: RunId,

    /// Current lifecycle status.
    pub status: RunStatus,

    /// Metadata supplied when the run was started.
    pub metadata: RunMetadata,

    /// When the worker was registered.
    pub created_at: DateTime<Utc>,

    /// When the run reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Failure message if the worker errored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    /// Create a record for a freshly registered run.
    pub fn running(run_id: RunId, metadata: RunMetadata) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            metadata,
            created_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    /// Move to `next`, stamping `finished_at` on terminal states.
    pub fn transition(&mut self, next: RunStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Check if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
