//! Per-run channel registry.
//!
//! A run has at most one attached channel. Attaching a new one replaces the
//! old attachment and tells the superseded connection to close.

use std::collections::HashMap;

use actrelay_core::{ConnectionId, OutboundMessage, RunId};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, trace, warn};

/// Sending side of one attached connection.
///
/// The transport endpoint owns the matching receiver and writes frames to
/// the socket in queue order.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    connection_id: ConnectionId,
    tx: mpsc::Sender<OutboundMessage>,
    close: CancellationToken,
}

impl ChannelHandle {
    /// Create a handle and the receiver the endpoint drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        let handle = Self {
            connection_id: ConnectionId::generate(),
            tx,
            close: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Ask the endpoint to close this connection.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Resolves once [`ChannelHandle::close`] has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.close.cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    async fn send(&self, message: OutboundMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }
}

/// Maps run ids to their currently attached channel.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<RunId, ChannelHandle>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `channel` as current for `run_id`.
    ///
    /// Returns the id of the superseded connection, which has been closed.
    pub async fn attach(&self, run_id: RunId, channel: ChannelHandle) -> Option<ConnectionId> {
        let connection_id = channel.connection_id().clone();
        let previous = self.channels.write().await.insert(run_id.clone(), channel);

        match previous {
            Some(old) => {
                warn!(
                    run_id = %run_id,
                    old_connection = %old.connection_id(),
                    new_connection = %connection_id,
                    "Replacing attached channel"
                );
                old.close();
                Some(old.connection_id().clone())
            }
            None => {
                info!(run_id = %run_id, connection_id = %connection_id, "Channel attached");
                None
            }
        }
    }

    /// Remove the attachment if it still belongs to `connection_id`.
    pub async fn detach(&self, run_id: &RunId, connection_id: &ConnectionId) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(run_id) {
            Some(current) if current.connection_id() == connection_id => {
                channels.remove(run_id);
                info!(run_id = %run_id, connection_id = %connection_id, "Channel detached");
                true
            }
            Some(_) => {
                debug!(
                    run_id = %run_id,
                    connection_id = %connection_id,
                    "Superseded connection closed; keeping newer attachment"
                );
                false
            }
            None => false,
        }
    }

    /// Best-effort delivery to the attached channel.
    ///
    /// Returns false when nothing is attached or the connection is gone;
    /// the message is dropped either way.
    pub async fn send(&self, run_id: &RunId, message: OutboundMessage) -> bool {
        let channel = self.channels.read().await.get(run_id).cloned();
        let Some(channel) = channel else {
            trace!(run_id = %run_id, kind = message.kind(), "No channel attached; dropping message");
            return false;
        };

        let kind = message.kind();
        if channel.send(message).await {
            trace!(run_id = %run_id, kind, "Message queued");
            true
        } else {
            debug!(run_id = %run_id, kind, "Channel writer gone; dropping message");
            false
        }
    }

    pub async fn is_attached(&self, run_id: &RunId) -> bool {
        self.channels.read().await.contains_key(run_id)
    }

    /// Number of attached channels.
    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }
}
