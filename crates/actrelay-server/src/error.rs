//! Server bootstrap errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Invalid CORS origin: {0}")]
    InvalidOrigin(String),
}
