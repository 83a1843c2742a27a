//! Core domain errors.

use thiserror::Error;

/// Core domain errors for ActRelay.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Identifier not in the expected shape.
    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
