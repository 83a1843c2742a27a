//! Shared application state.

use std::sync::Arc;

use actrelay_coordinator::RunCoordinator;

use crate::config::ServerConfig;
use crate::engine::{AutomationEngine, DryRunEngine};

/// Shared application state.
pub struct AppState {
    /// Tracks runs, channels and pending approvals.
    pub coordinator: Arc<RunCoordinator>,

    /// Engine that executes each run's steps.
    pub engine: Arc<dyn AutomationEngine>,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(config: &ServerConfig, engine: Arc<dyn AutomationEngine>) -> Arc<Self> {
        Arc::new(Self {
            coordinator: RunCoordinator::new(config.coordinator.clone()),
            engine,
        })
    }

    /// State backed by the dry-run engine.
    pub fn dry_run(config: &ServerConfig) -> Arc<Self> {
        let engine = Arc::new(DryRunEngine::new(config.step_delay, config.approval_policy));
        Self::new(config, engine)
    }
}
