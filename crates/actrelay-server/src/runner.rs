//! Run worker: drives an automation session through its steps.
//!
//! Every run emits `status: started`, one `step_complete` per step, and
//! exactly one terminal `status` event (`completed`, `cancelled` or
//! `error`) matching the terminal status recorded for the run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use actrelay_coordinator::{ApprovalHandler, RunContext, RunCoordinator};
use actrelay_core::{OutboundMessage, RunId, RunMetadata, RunStatus, StatusKind};
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::engine::{AutomationEngine, EngineError, SessionConfig};

/// What a run is asked to do.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub url: String,
    pub context: String,
    pub steps: Vec<String>,
}

impl RunPlan {
    /// Metadata recorded with the run.
    pub fn metadata(&self) -> RunMetadata {
        let mut metadata = RunMetadata::new();
        metadata.insert("url".to_string(), Value::String(self.url.clone()));
        metadata.insert(
            "steps".to_string(),
            Value::Array(self.steps.iter().cloned().map(Value::String).collect()),
        );
        metadata
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            url: self.url.clone(),
            context: self.context.clone(),
        }
    }
}

/// Start a run for `plan` and return its id.
pub async fn spawn_run(
    coordinator: &Arc<RunCoordinator>,
    engine: Arc<dyn AutomationEngine>,
    plan: RunPlan,
) -> RunId {
    let metadata = plan.metadata();
    let run_id = coordinator
        .start_run(metadata, move |ctx| drive_run(ctx, engine, plan))
        .await;
    info!(run_id = %run_id, "Run started");
    run_id
}

/// Execute a run to its terminal status.
pub async fn drive_run(ctx: RunContext, engine: Arc<dyn AutomationEngine>, plan: RunPlan) {
    let outcome = AssertUnwindSafe(execute(&ctx, engine.as_ref(), &plan))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(EngineError::Panicked(panic_message(panic.as_ref()))));

    match outcome {
        Ok(()) => {
            ctx.finish(RunStatus::Completed).await;
        }
        Err(EngineError::Cancelled) => {
            ctx.finish(RunStatus::Cancelled).await;
        }
        Err(e) => {
            error!(run_id = %ctx.run_id(), error = %e, "Run failed");
            ctx.fail(e.to_string()).await;
        }
    }

    // A status recorded first (e.g. a cancel) wins over the worker's own
    // outcome; the terminal frame reports what the registry kept.
    let frame = match ctx.record().await {
        Some(record) if record.status == RunStatus::Cancelled => {
            info!(run_id = %ctx.run_id(), "Run cancelled");
            OutboundMessage::status(StatusKind::Cancelled)
        }
        Some(record) if record.status == RunStatus::Error => {
            OutboundMessage::error(record.error.unwrap_or_default())
        }
        _ => {
            info!(run_id = %ctx.run_id(), "Run completed");
            OutboundMessage::status(StatusKind::Completed)
        }
    };
    ctx.emit(frame).await;
}

async fn execute(
    ctx: &RunContext,
    engine: &dyn AutomationEngine,
    plan: &RunPlan,
) -> Result<(), EngineError> {
    ctx.emit(OutboundMessage::status(StatusKind::Started)).await;

    let approver: Arc<dyn ApprovalHandler> = Arc::new(ctx.approver());
    let mut session = engine
        .start_session(&plan.session_config(), approver)
        .await?;

    let result = execute_steps(ctx, session.as_mut(), &plan.steps).await;

    if let Err(e) = session.close().await {
        warn!(run_id = %ctx.run_id(), error = %e, "Failed to close session");
    }

    result
}

async fn execute_steps(
    ctx: &RunContext,
    session: &mut dyn crate::engine::EngineSession,
    steps: &[String],
) -> Result<(), EngineError> {
    for step in steps {
        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let meta = session.act(step).await?;
        ctx.emit(OutboundMessage::step_complete(
            meta.prompt,
            meta.num_steps_executed,
        ))
        .await;
    }

    // A cancel that landed during the last step still wins.
    if ctx.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
