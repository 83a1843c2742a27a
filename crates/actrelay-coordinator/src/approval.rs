//! Approval handlers.
//!
//! An automation engine calls an [`ApprovalHandler`] whenever it needs a
//! human decision before acting. The handler decides how that question is
//! answered: by the run's attached client, or by a fixed policy.

use std::sync::Arc;
use std::time::Duration;

use actrelay_core::{ApprovalResponse, RunId};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::coordinator::RunCoordinator;

/// Answers approval prompts raised by an automation engine.
///
/// Implementations never fail: anything short of an explicit approval is a
/// denial with a reason.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Called when the engine wants permission to proceed.
    async fn approve(&self, message: Value) -> ApprovalResponse;
}

/// Routes prompts over the run's channel and blocks until the client
/// answers, disconnects, or the timeout elapses.
#[derive(Debug, Clone)]
pub struct ChannelApprover {
    coordinator: Arc<RunCoordinator>,
    run_id: RunId,
    timeout: Duration,
}

impl ChannelApprover {
    pub fn new(coordinator: Arc<RunCoordinator>, run_id: RunId, timeout: Duration) -> Self {
        Self {
            coordinator,
            run_id,
            timeout,
        }
    }
}

#[async_trait]
impl ApprovalHandler for ChannelApprover {
    async fn approve(&self, message: Value) -> ApprovalResponse {
        let response = self
            .coordinator
            .request(&self.run_id, message, self.timeout)
            .await;
        info!(
            run_id = %self.run_id,
            approved = response.approved,
            reason = %response.reason,
            "Approval resolved"
        );
        response
    }
}

/// A handler that approves every prompt.
///
/// Useful for unattended runs. Every prompt is forwarded to the returned
/// receiver so callers can still observe what was approved.
pub struct AutoApproveHandler {
    prompt_tx: mpsc::UnboundedSender<Value>,
}

impl AutoApproveHandler {
    /// Create a new auto-approve handler with a prompt receiver.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { prompt_tx: tx }, rx)
    }
}

#[async_trait]
impl ApprovalHandler for AutoApproveHandler {
    async fn approve(&self, message: Value) -> ApprovalResponse {
        trace!("Auto-approving prompt");
        // Receiver might be dropped
        self.prompt_tx.send(message).ok();
        ApprovalResponse::approve()
    }
}

/// A handler that denies every prompt with a fixed reason.
pub struct DenyAllHandler {
    prompt_tx: mpsc::UnboundedSender<Value>,
    deny_message: String,
}

impl DenyAllHandler {
    /// Create a new deny-all handler.
    pub fn new(deny_message: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                prompt_tx: tx,
                deny_message: deny_message.into(),
            },
            rx,
        )
    }
}

#[async_trait]
impl ApprovalHandler for DenyAllHandler {
    async fn approve(&self, message: Value) -> ApprovalResponse {
        trace!("Denying prompt");
        self.prompt_tx.send(message).ok();
        ApprovalResponse::deny(self.deny_message.clone())
    }
}
