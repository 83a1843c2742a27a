//! Newtype wrappers for identifiers to ensure type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the inner string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id! {
    /// Unique identifier for a Run.
    RunId
}

string_id! {
    /// Correlation key of a pending approval exchange.
    ///
    /// Always shaped `{run_id}:{suffix}` so every exchange of a run can be
    /// found by prefix.
    RequestId
}

string_id! {
    /// Identifies one attached channel connection.
    ConnectionId
}

impl RunId {
    /// Generate a new random RunId.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a RunId supplied by a client, rejecting values that could not
    /// have been minted by [`RunId::generate`].
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.is_empty() || raw.contains(':') {
            return Err(CoreError::InvalidId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Prefix shared by every request id minted for this run.
    pub fn request_prefix(&self) -> String {
        format!("{}:", self.0)
    }
}

impl RequestId {
    /// Mint a fresh request id scoped to `run_id`.
    pub fn for_run(run_id: &RunId) -> Self {
        Self(format!("{}:{}", run_id, Uuid::new_v4()))
    }

    /// Returns true if this request id was minted for `run_id`.
    pub fn belongs_to(&self, run_id: &RunId) -> bool {
        self.0.starts_with(&run_id.request_prefix())
    }
}

impl ConnectionId {
    /// Generate a new random ConnectionId.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
