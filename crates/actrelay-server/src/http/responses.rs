//! HTTP request and response types.

use actrelay_core::{RunId, RunRecord, RunStatus};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::runner::RunPlan;

// ============================================================================
// Run types
// ============================================================================

/// Request body for the start-run endpoint.
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    /// Starting page for the automation session.
    pub url: String,

    /// Free-text instructions for the agent.
    #[serde(default)]
    pub context: String,

    /// Natural-language steps, executed in order.
    #[serde(default)]
    pub steps: Vec<String>,
}

impl From<StartRunRequest> for RunPlan {
    fn from(request: StartRunRequest) -> Self {
        RunPlan {
            url: request.url,
            context: request.context,
            steps: request.steps,
        }
    }
}

/// Response body for the start-run endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartRunResponse {
    pub run_id: RunId,
}

/// Response for a single run.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(flatten)]
    pub record: RunRecord,

    /// Whether a client channel is currently attached.
    pub attached: bool,
}

/// Response body for the cancel endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelRunResponse {
    pub run_id: RunId,
    pub status: RunStatus,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `(status, {"error": message})` response.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}
