//! The run coordinator.
//!
//! Composes the run task registry, the channel registry and the
//! correlation table, and implements the Request -> Wait -> Response
//! exchange that lets a worker block on a client's answer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use actrelay_core::{
    ApprovalResponse, ConnectionId, InboundMessage, OutboundMessage, RequestId, RunId,
    RunMetadata, RunRecord, RunStatus,
};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channels::{ChannelHandle, ChannelRegistry};
use crate::config::CoordinatorConfig;
use crate::context::RunContext;
use crate::correlation::CorrelationTable;
use crate::error::{CoordinatorError, ExchangeError};
use crate::runs::{RunTask, RunTaskRegistry};

/// Point-in-time counters for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub runs_by_status: Vec<(RunStatus, usize)>,
    pub attached_channels: usize,
    pub pending_exchanges: usize,
}

/// Coordinates run tasks, their channels and their approval exchanges.
#[derive(Debug)]
pub struct RunCoordinator {
    config: CoordinatorConfig,
    runs: RunTaskRegistry,
    channels: ChannelRegistry,
    correlations: CorrelationTable,
}

impl RunCoordinator {
    /// Create a new coordinator wrapped in Arc.
    pub fn new(config: CoordinatorConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            runs: RunTaskRegistry::new(),
            channels: ChannelRegistry::new(),
            correlations: CorrelationTable::new(),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Run lifecycle
    // ------------------------------------------------------------------

    /// Allocate a new run id.
    pub fn create_run(&self) -> RunId {
        self.runs.create()
    }

    /// Record a started task for `run_id` with status `running`.
    ///
    /// Fails if `run_id` is already registered; the existing run is kept.
    pub async fn register_run(
        &self,
        run_id: RunId,
        task: RunTask,
        metadata: RunMetadata,
    ) -> Result<(), CoordinatorError> {
        self.runs.register(run_id, task, metadata).await
    }

    /// Create a run and spawn `worker` as its task.
    ///
    /// The worker future does not start until the run is registered, so it
    /// can never report a terminal status for an unknown run.
    pub async fn start_run<F, Fut>(self: &Arc<Self>, metadata: RunMetadata, worker: F) -> RunId
    where
        F: FnOnce(RunContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let run_id = self.create_run();
        let cancel = CancellationToken::new();
        let ctx = RunContext::new(run_id.clone(), Arc::clone(self), cancel.clone());
        let work = worker(ctx);

        let (start_tx, start_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            if start_rx.await.is_ok() {
                work.await;
            }
        });

        match self
            .register_run(run_id.clone(), RunTask::new(handle, cancel), metadata)
            .await
        {
            Ok(()) => {
                let _ = start_tx.send(());
            }
            // Dropping the gate ends the spawned task before the worker runs.
            Err(e) => error!(run_id = %run_id, error = %e, "Could not register run"),
        }

        run_id
    }

    /// Record a terminal status for a run.
    pub async fn mark_done(&self, run_id: &RunId, status: RunStatus) -> bool {
        self.runs.mark_done(run_id, status).await
    }

    /// Record a worker failure: terminal `error` status plus its message.
    ///
    /// A run that already reached a terminal status keeps it, error-free.
    pub async fn mark_failed(&self, run_id: &RunId, message: impl Into<String>) -> bool {
        self.runs.mark_failed(run_id, message).await
    }

    /// Cancel a run and force-fail its pending exchanges.
    ///
    /// Returns false if the run is unknown or already terminal.
    pub async fn cancel(&self, run_id: &RunId) -> bool {
        let cancelled = self.runs.cancel(run_id).await;
        let failed = self
            .correlations
            .remove_all_for_run(run_id, ExchangeError::Cancelled)
            .await;
        if failed > 0 {
            info!(run_id = %run_id, failed, "Failed pending exchanges of cancelled run");
        }
        cancelled
    }

    /// Cancel every active run, e.g. on shutdown.
    pub async fn cancel_all(&self) -> usize {
        let records = self.runs.list().await;
        let cancelled = self.runs.cancel_all().await;
        for record in records {
            self.correlations
                .remove_all_for_run(&record.run_id, ExchangeError::Cancelled)
                .await;
        }
        cancelled
    }

    /// Status of a run, `None` if unknown.
    pub async fn status(&self, run_id: &RunId) -> Option<RunStatus> {
        self.runs.status(run_id).await
    }

    pub async fn run_record(&self, run_id: &RunId) -> Option<RunRecord> {
        self.runs.get(run_id).await
    }

    pub async fn list_runs(&self) -> Vec<RunRecord> {
        self.runs.list().await
    }

    pub async fn is_running(&self, run_id: &RunId) -> bool {
        self.runs.is_running(run_id).await
    }

    // ------------------------------------------------------------------
    // Connection handling
    // ------------------------------------------------------------------

    /// Attach a client channel to `run_id` (last attach wins).
    pub async fn connect(&self, run_id: RunId, channel: ChannelHandle) -> Option<ConnectionId> {
        self.channels.attach(run_id, channel).await
    }

    /// Detach `connection_id` from `run_id`.
    ///
    /// If it was the current attachment, every pending exchange of the run
    /// fails with a disconnect. Returns the number of exchanges failed.
    pub async fn disconnect(&self, run_id: &RunId, connection_id: &ConnectionId) -> usize {
        if !self.channels.detach(run_id, connection_id).await {
            return 0;
        }
        let failed = self
            .correlations
            .remove_all_for_run(run_id, ExchangeError::Disconnected)
            .await;
        if failed > 0 {
            warn!(run_id = %run_id, failed, "Client disconnected with pending requests");
        }
        failed
    }

    pub async fn is_attached(&self, run_id: &RunId) -> bool {
        self.channels.is_attached(run_id).await
    }

    // ------------------------------------------------------------------
    // Sending messages
    // ------------------------------------------------------------------

    /// Fire-and-forget progress notification.
    ///
    /// Silently dropped if no channel is attached.
    pub async fn emit(&self, run_id: &RunId, message: OutboundMessage) {
        debug!(run_id = %run_id, kind = message.kind(), "Emitting event");
        self.channels.send(run_id, message).await;
    }

    // ------------------------------------------------------------------
    // Request -> Wait -> Response
    // ------------------------------------------------------------------

    /// Send `payload` as a `request` frame and wait for the correlated
    /// answer.
    pub async fn request_raw(
        &self,
        run_id: &RunId,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, ExchangeError> {
        let request_id = RequestId::for_run(run_id);
        let exchange = self
            .correlations
            .register(request_id.clone())
            .await
            .map_err(|e| {
                error!(run_id = %run_id, error = %e, "Could not open exchange");
                ExchangeError::Rejected(e.to_string())
            })?;

        // A cancel that landed before registration would never see this slot.
        if self.runs.status(run_id).await == Some(RunStatus::Cancelled) {
            self.correlations
                .fail(&request_id, ExchangeError::Cancelled)
                .await;
            return self.correlations.wait(exchange, timeout).await;
        }

        info!(
            run_id = %run_id,
            request_id = %request_id,
            timeout_secs = timeout.as_secs(),
            "Sending approval request"
        );
        let delivered = self
            .channels
            .send(
                run_id,
                OutboundMessage::Request {
                    request_id: request_id.clone(),
                    payload,
                },
            )
            .await;
        if !delivered {
            debug!(request_id = %request_id, "No client attached; request will wait for timeout");
        }

        let outcome = self.correlations.wait(exchange, timeout).await;
        match &outcome {
            Ok(_) => info!(request_id = %request_id, "Approval request answered"),
            Err(e) => warn!(request_id = %request_id, error = %e, "Approval request failed"),
        }
        outcome
    }

    /// Ask the client for approval.
    ///
    /// Never fails: timeouts, disconnects and cancellation resolve to
    /// `approved = false` with the cause in `reason`.
    pub async fn request(
        &self,
        run_id: &RunId,
        payload: Value,
        timeout: Duration,
    ) -> ApprovalResponse {
        match self.request_raw(run_id, payload, timeout).await {
            Ok(answer) => ApprovalResponse::from_payload(&answer),
            Err(e) => ApprovalResponse::deny(e.denial_reason()),
        }
    }

    // ------------------------------------------------------------------
    // Incoming messages
    // ------------------------------------------------------------------

    /// Dispatch one decoded inbound frame for `run_id`.
    pub async fn handle_inbound(&self, run_id: &RunId, message: InboundMessage) {
        match message {
            InboundMessage::Response {
                request_id,
                payload,
            } => {
                if !request_id.belongs_to(run_id) {
                    warn!(
                        run_id = %run_id,
                        request_id = %request_id,
                        "Response for another run's request; ignoring"
                    );
                    return;
                }
                if !self.correlations.fulfill(&request_id, payload).await {
                    debug!(request_id = %request_id, "Response without pending request");
                }
            }
            InboundMessage::Cancel => {
                info!(run_id = %run_id, "Client requested cancellation");
                self.cancel(run_id).await;
                self.emit(run_id, OutboundMessage::cancelled()).await;
            }
            InboundMessage::Unknown => {
                debug!(run_id = %run_id, "Ignoring unknown inbound message type");
            }
        }
    }

    // ------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------

    pub async fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            runs_by_status: self.runs.counts_by_status().await,
            attached_channels: self.channels.len().await,
            pending_exchanges: self.correlations.len().await,
        }
    }

    /// Number of open exchanges for `run_id`.
    pub async fn pending_requests(&self, run_id: &RunId) -> usize {
        self.correlations.pending_for_run(run_id).await
    }
}
