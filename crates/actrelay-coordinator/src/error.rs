//! Error types for the run coordinator.

use actrelay_core::{RequestId, RunId};
use thiserror::Error;

/// Errors raised by coordinator bookkeeping.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A request id was registered twice. Ids embed a v4 UUID, so this is
    /// an invariant violation rather than an expected condition.
    #[error("Duplicate request id: {0}")]
    DuplicateRequest(RequestId),

    /// A run id was registered twice.
    #[error("Run already registered: {0}")]
    DuplicateRun(RunId),
}

/// Why a pending exchange ended without an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// No answer before the deadline.
    #[error("Approval request timed out")]
    Timeout,

    /// The run's channel closed while the exchange was open.
    #[error("Client disconnected")]
    Disconnected,

    /// The run was cancelled while the exchange was open.
    #[error("Run cancelled")]
    Cancelled,

    /// The exchange could not be opened.
    #[error("{0}")]
    Rejected(String),
}

impl ExchangeError {
    /// Reason text handed to the worker alongside `approved = false`.
    pub fn denial_reason(&self) -> String {
        match self {
            Self::Timeout => self.to_string(),
            other => format!("Error: {other}"),
        }
    }
}
