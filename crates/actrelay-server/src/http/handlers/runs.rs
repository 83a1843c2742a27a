//! Run API handlers.

use std::sync::Arc;

use actrelay_core::RunId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::http::responses::{
    error_response, CancelRunResponse, RunResponse, StartRunRequest, StartRunResponse,
};
use crate::runner;
use crate::state::AppState;

/// Start a run and its worker.
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRunRequest>,
) -> Response {
    if request.url.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "url must not be empty");
    }

    let steps = request.steps.len();
    let run_id = runner::spawn_run(
        &state.coordinator,
        Arc::clone(&state.engine),
        request.into(),
    )
    .await;
    info!(run_id = %run_id, steps, "Run accepted");

    (StatusCode::CREATED, Json(StartRunResponse { run_id })).into_response()
}

/// List all runs, oldest first.
pub async fn list_runs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = state.coordinator.list_runs().await;
    let mut runs = Vec::with_capacity(records.len());
    for record in records {
        let attached = state.coordinator.is_attached(&record.run_id).await;
        runs.push(RunResponse { record, attached });
    }
    Json(runs)
}

/// Get a single run.
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Response {
    let run_id = RunId::new(run_id);
    match state.coordinator.run_record(&run_id).await {
        Some(record) => {
            let attached = state.coordinator.is_attached(&run_id).await;
            Json(RunResponse { record, attached }).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, format!("Run not found: {run_id}")),
    }
}

/// Request cancellation of a run.
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Response {
    let run_id = RunId::new(run_id);
    let Some(status) = state.coordinator.status(&run_id).await else {
        return error_response(StatusCode::NOT_FOUND, format!("Run not found: {run_id}"));
    };

    if status.is_terminal() {
        return error_response(
            StatusCode::CONFLICT,
            format!("Run {run_id} already finished with status {status}"),
        );
    }

    state.coordinator.cancel(&run_id).await;
    let status = state
        .coordinator
        .status(&run_id)
        .await
        .unwrap_or(status);
    info!(run_id = %run_id, "Run cancelled via API");

    (
        StatusCode::ACCEPTED,
        Json(CancelRunResponse { run_id, status }),
    )
        .into_response()
}
