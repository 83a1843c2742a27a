//! Worker-side view of a single run.

use std::sync::Arc;
use std::time::Duration;

use actrelay_core::{ApprovalResponse, OutboundMessage, RunId, RunRecord, RunStatus};
use serde_json::Value;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::approval::ChannelApprover;
use crate::coordinator::RunCoordinator;
use crate::error::ExchangeError;

/// Handle given to a run's worker task.
///
/// Bundles the run id, the coordinator and the run's cancellation token so
/// the worker can report progress, ask for approval and observe
/// cancellation at its checkpoints.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: RunId,
    coordinator: Arc<RunCoordinator>,
    cancel: CancellationToken,
}

impl RunContext {
    pub(crate) fn new(
        run_id: RunId,
        coordinator: Arc<RunCoordinator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            coordinator,
            cancel,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Cancellation checkpoint.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run has been cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Send a progress event to the attached client, if any.
    pub async fn emit(&self, message: OutboundMessage) {
        self.coordinator.emit(&self.run_id, message).await;
    }

    /// Ask for approval using the configured default timeout.
    pub async fn request(&self, payload: Value) -> ApprovalResponse {
        let timeout = self.coordinator.config().request_timeout;
        self.coordinator.request(&self.run_id, payload, timeout).await
    }

    /// Like [`RunContext::request`] with an explicit timeout and the raw
    /// outcome.
    pub async fn request_raw(
        &self,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, ExchangeError> {
        self.coordinator
            .request_raw(&self.run_id, payload, timeout)
            .await
    }

    /// An [`ApprovalHandler`](crate::ApprovalHandler) that routes prompts to
    /// this run's client.
    pub fn approver(&self) -> ChannelApprover {
        ChannelApprover::new(
            Arc::clone(&self.coordinator),
            self.run_id.clone(),
            self.coordinator.config().request_timeout,
        )
    }

    /// Record the run's terminal status.
    pub async fn finish(&self, status: RunStatus) -> bool {
        self.coordinator.mark_done(&self.run_id, status).await
    }

    /// Snapshot of this run's record.
    pub async fn record(&self) -> Option<RunRecord> {
        self.coordinator.run_record(&self.run_id).await
    }

    /// Record a worker failure.
    pub async fn fail(&self, message: impl Into<String>) -> bool {
        self.coordinator.mark_failed(&self.run_id, message).await
    }
}
