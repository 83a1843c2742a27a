//! ActRelay Server Library
//!
//! HTTP API for starting and inspecting browser-automation runs, plus the
//! per-run WebSocket channel that streams progress and carries approval
//! prompts to the client.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod metrics;
pub mod runner;
pub mod state;

pub use config::ServerConfig;
pub use engine::{ApprovalPolicy, AutomationEngine, DryRunEngine, EngineError, EngineSession};
pub use error::ServerError;
pub use state::AppState;
