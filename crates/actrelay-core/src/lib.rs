//! ActRelay Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network transports
//! - The async runtime
//!
//! It defines run identity and lifecycle, plus the JSON frames exchanged
//! with a client over a run's duplex channel.

pub mod error;
pub mod ids;
pub mod protocol;
pub mod run;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{ConnectionId, RequestId, RunId};
pub use protocol::{
    ApprovalResponse, InboundMessage, OutboundMessage, StatusKind, StatusUpdate, StepComplete,
};
pub use run::{RunMetadata, RunRecord};
pub use status::RunStatus;
