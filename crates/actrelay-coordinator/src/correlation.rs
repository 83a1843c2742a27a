//! Correlation table for request/response exchanges.
//!
//! Each outstanding request id owns a one-shot slot. The slot is resolved
//! exactly once: by an answer, by a failure (disconnect or cancel), or by
//! the waiter's deadline. Whichever happens first removes the entry.

use std::collections::HashMap;
use std::time::Duration;

use actrelay_core::{RequestId, RunId};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, trace};

use crate::error::{CoordinatorError, ExchangeError};

type Outcome = Result<Value, ExchangeError>;

/// Waiting half of a registered exchange.
#[derive(Debug)]
pub struct PendingExchange {
    request_id: RequestId,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingExchange {
    /// The correlation key of this exchange.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

/// Maps outstanding request ids to their single-fulfillment slot.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh slot under `request_id`.
    pub async fn register(&self, request_id: RequestId) -> Result<PendingExchange, CoordinatorError> {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(&request_id) {
            return Err(CoordinatorError::DuplicateRequest(request_id));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(request_id.clone(), tx);
        trace!(request_id = %request_id, "Exchange registered");
        Ok(PendingExchange { request_id, rx })
    }

    /// Resolve the slot with an answer.
    ///
    /// Returns false for unknown or already-resolved ids.
    pub async fn fulfill(&self, request_id: &RequestId, value: Value) -> bool {
        self.resolve(request_id, Ok(value)).await
    }

    /// Resolve the slot with a failure.
    pub async fn fail(&self, request_id: &RequestId, error: ExchangeError) -> bool {
        self.resolve(request_id, Err(error)).await
    }

    async fn resolve(&self, request_id: &RequestId, outcome: Outcome) -> bool {
        // Send while holding the lock so a waiter timing out concurrently
        // either sees the value or finds the entry still present.
        let mut pending = self.pending.lock().await;
        match pending.remove(request_id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                debug!(request_id = %request_id, "No pending exchange for request id");
                false
            }
        }
    }

    /// Suspend until the exchange resolves or `timeout` elapses.
    ///
    /// The entry is gone from the table when this returns.
    pub async fn wait(&self, exchange: PendingExchange, timeout: Duration) -> Outcome {
        let PendingExchange { request_id, mut rx } = exchange;

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&request_id);
                Err(ExchangeError::Disconnected)
            }
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&request_id);
                // An answer may have landed between the deadline and the lock.
                rx.try_recv().unwrap_or(Err(ExchangeError::Timeout))
            }
        }
    }

    /// Fail every outstanding exchange minted for `run_id`.
    ///
    /// Returns the number of exchanges failed.
    pub async fn remove_all_for_run(&self, run_id: &RunId, error: ExchangeError) -> usize {
        let mut pending = self.pending.lock().await;
        let keys: Vec<RequestId> = pending
            .keys()
            .filter(|key| key.belongs_to(run_id))
            .cloned()
            .collect();

        for key in &keys {
            if let Some(tx) = pending.remove(key) {
                let _ = tx.send(Err(error.clone()));
            }
        }

        if !keys.is_empty() {
            debug!(run_id = %run_id, failed = keys.len(), error = %error, "Failed pending exchanges");
        }
        keys.len()
    }

    /// Number of open exchanges.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Returns true if no exchange is open.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Number of open exchanges minted for `run_id`.
    pub async fn pending_for_run(&self, run_id: &RunId) -> usize {
        self.pending
            .lock()
            .await
            .keys()
            .filter(|key| key.belongs_to(run_id))
            .count()
    }
}
