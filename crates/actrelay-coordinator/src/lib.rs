//! Run coordinator for ActRelay
//!
//! This crate tracks long-running automation runs and bridges them to a
//! client attached over a duplex channel. A worker task can report
//! progress with fire-and-forget events, or pause mid-execution to ask the
//! client for approval and block until the answer, a disconnect, or a
//! deadline.
//!
//! # Example
//!
//! ```rust,no_run
//! use actrelay_coordinator::{CoordinatorConfig, RunCoordinator};
//! use actrelay_core::{OutboundMessage, RunMetadata, RunStatus, StatusKind};
//! use serde_json::json;
//!
//! async fn start() {
//!     let coordinator = RunCoordinator::new(CoordinatorConfig::default());
//!
//!     let run_id = coordinator
//!         .start_run(RunMetadata::new(), |ctx| async move {
//!             ctx.emit(OutboundMessage::status(StatusKind::Started)).await;
//!             let answer = ctx.request(json!({"message": "Submit the form?"})).await;
//!             let status = if answer.approved {
//!                 RunStatus::Completed
//!             } else {
//!                 RunStatus::Cancelled
//!             };
//!             ctx.finish(status).await;
//!         })
//!         .await;
//!
//!     println!("Run ID: {}", run_id);
//! }
//! ```

mod approval;
mod channels;
mod config;
mod context;
mod coordinator;
mod correlation;
mod error;
mod runs;

pub use approval::{ApprovalHandler, AutoApproveHandler, ChannelApprover, DenyAllHandler};
pub use channels::{ChannelHandle, ChannelRegistry};
pub use config::{CoordinatorConfig, DEFAULT_REQUEST_TIMEOUT};
pub use context::RunContext;
pub use coordinator::{CoordinatorStats, RunCoordinator};
pub use correlation::{CorrelationTable, PendingExchange};
pub use error::{CoordinatorError, ExchangeError};
pub use runs::{RunTask, RunTaskRegistry};
