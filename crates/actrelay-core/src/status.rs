//! Run lifecycle status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a Run.
///
/// `Completed`, `Cancelled` and `Error` are terminal: once reached, no
/// further transition is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run id allocated, worker not yet registered.
    #[default]
    Pending,
    /// Worker task registered and executing.
    Running,
    /// Worker finished every step.
    Completed,
    /// Run was cancelled by a client.
    Cancelled,
    /// Worker failed.
    Error,
}

impl RunStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [RunStatus; 5] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Cancelled,
        Self::Error,
    ];

    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match self {
            Self::Pending => next != Self::Pending,
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::Error.is_terminal());
    }

    #[test]
    fn test_terminal_states_never_transition() {
        for terminal in [RunStatus::Completed, RunStatus::Cancelled, RunStatus::Error] {
            for next in RunStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(RunStatus::Running.can_transition_to(RunStatus::Error));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Pending));
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&RunStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
