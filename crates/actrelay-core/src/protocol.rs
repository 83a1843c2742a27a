//! Wire protocol spoken over a run's duplex channel.
//!
//! Every frame is a JSON object discriminated by its `type` field.
//!
//! Outbound (coordinator to client):
//! - `status`: lifecycle notification, `data: {status, error?}`
//! - `step_complete`: one automation step finished, `data: {prompt, num_steps}`
//! - `request`: approval prompt that expects exactly one matching `response`
//! - `cancelled`: acknowledgement of a processed `cancel`
//!
//! Inbound (client to coordinator):
//! - `response`: answer to a `request`, matched by `request_id`
//! - `cancel`: ask the coordinator to cancel the run

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::ids::RequestId;

/// Frame sent from the coordinator to the attached client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Run lifecycle notification.
    Status { data: StatusUpdate },

    /// One automation step finished.
    StepComplete { data: StepComplete },

    /// Approval prompt awaiting a correlated `response`.
    Request {
        request_id: RequestId,
        payload: Value,
    },

    /// A client `cancel` was processed. `data` is always null.
    Cancelled { data: () },
}

impl OutboundMessage {
    /// `status` frame without an error.
    pub fn status(status: StatusKind) -> Self {
        Self::Status {
            data: StatusUpdate {
                status,
                error: None,
            },
        }
    }

    /// `status: error` frame carrying the failure message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Status {
            data: StatusUpdate {
                status: StatusKind::Error,
                error: Some(message.into()),
            },
        }
    }

    /// `step_complete` frame.
    pub fn step_complete(prompt: impl Into<String>, num_steps: u32) -> Self {
        Self::StepComplete {
            data: StepComplete {
                prompt: prompt.into(),
                num_steps,
            },
        }
    }

    /// `cancelled` acknowledgement frame.
    pub fn cancelled() -> Self {
        Self::Cancelled { data: () }
    }

    /// Value of the `type` field, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::StepComplete { .. } => "step_complete",
            Self::Request { .. } => "request",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Status value carried by a `status` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Started,
    Completed,
    Cancelled,
    Error,
}

/// Payload of a `status` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: StatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload of a `step_complete` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepComplete {
    /// Instruction the step executed.
    pub prompt: String,
    /// Engine actions taken to satisfy the step.
    pub num_steps: u32,
}

/// Frame received from the attached client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Answer to a previously sent `request`.
    Response {
        request_id: RequestId,
        #[serde(default)]
        payload: Value,
    },

    /// Cancel the run.
    Cancel,

    /// Any other `type`. Ignored for forward compatibility.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decode one text frame.
    ///
    /// Frames without a `type`, or a `response` without a `request_id`,
    /// fail to decode; callers drop them.
    pub fn decode(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Outcome of an approval prompt as seen by the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    #[serde(default)]
    pub reason: String,
}

impl ApprovalResponse {
    /// Approval with an empty reason.
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: String::new(),
        }
    }

    /// Denial with the given reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
        }
    }

    /// Interpret a client `response` payload.
    ///
    /// Anything that is not an object, or lacks a boolean `approved`, is a
    /// denial.
    pub fn from_payload(payload: &Value) -> Self {
        let Some(object) = payload.as_object() else {
            return Self::deny("");
        };
        Self {
            approved: object
                .get("approved")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            reason: object
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}
