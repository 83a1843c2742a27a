//! Automation engine boundary.
//!
//! The engine that actually drives a browser is an external collaborator.
//! It is opened once per run with the run's starting URL and an
//! [`ApprovalHandler`], then asked to act on each step in turn.
//!
//! [`DryRunEngine`] stands in for a real engine: it walks the steps without
//! touching a browser, optionally asking for approval before each one.

use std::sync::Arc;
use std::time::Duration;

use actrelay_coordinator::ApprovalHandler;
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by an automation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to start session: {0}")]
    SessionStart(String),

    #[error("Step failed: {0}")]
    StepFailed(String),

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("Engine panicked: {0}")]
    Panicked(String),

    #[error("Run cancelled")]
    Cancelled,
}

/// What a session is opened with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Starting page.
    pub url: String,
    /// Free-text instructions for the agent.
    pub context: String,
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMetadata {
    /// Instruction that was executed.
    pub prompt: String,
    /// Engine actions taken to satisfy it.
    pub num_steps_executed: u32,
}

/// Opens automation sessions.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Open a session for one run.
    ///
    /// The engine calls `approver` whenever it needs a human decision.
    async fn start_session(
        &self,
        config: &SessionConfig,
        approver: Arc<dyn ApprovalHandler>,
    ) -> Result<Box<dyn EngineSession>, EngineError>;
}

/// A live session executing steps in order.
#[async_trait]
pub trait EngineSession: Send {
    /// Execute one natural-language step.
    async fn act(&mut self, prompt: &str) -> Result<StepMetadata, EngineError>;

    /// Release the session's resources.
    async fn close(&mut self) -> Result<(), EngineError>;
}

/// When the dry-run engine asks for approval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ApprovalPolicy {
    /// Before every step.
    #[default]
    Always,
    /// Never.
    Never,
}

/// Engine that simulates steps without a browser.
#[derive(Debug, Clone)]
pub struct DryRunEngine {
    step_delay: Duration,
    policy: ApprovalPolicy,
}

impl DryRunEngine {
    pub fn new(step_delay: Duration, policy: ApprovalPolicy) -> Self {
        Self { step_delay, policy }
    }
}

#[async_trait]
impl AutomationEngine for DryRunEngine {
    async fn start_session(
        &self,
        config: &SessionConfig,
        approver: Arc<dyn ApprovalHandler>,
    ) -> Result<Box<dyn EngineSession>, EngineError> {
        if config.url.trim().is_empty() {
            return Err(EngineError::SessionStart("starting URL is empty".to_string()));
        }
        info!(url = %config.url, policy = ?self.policy, "Dry-run session started");
        Ok(Box::new(DryRunSession {
            url: config.url.clone(),
            approver,
            step_delay: self.step_delay,
            policy: self.policy,
        }))
    }
}

struct DryRunSession {
    url: String,
    approver: Arc<dyn ApprovalHandler>,
    step_delay: Duration,
    policy: ApprovalPolicy,
}

#[async_trait]
impl EngineSession for DryRunSession {
    async fn act(&mut self, prompt: &str) -> Result<StepMetadata, EngineError> {
        if prompt.trim().is_empty() {
            return Err(EngineError::InvalidStep("step is empty".to_string()));
        }

        if self.policy == ApprovalPolicy::Always {
            let answer = self
                .approver
                .approve(json!({
                    "message": format!("Allow step: {prompt}"),
                    "step": prompt,
                    "url": self.url,
                }))
                .await;
            if !answer.approved {
                warn!(step = %prompt, reason = %answer.reason, "Step not approved; skipping");
                return Ok(StepMetadata {
                    prompt: prompt.to_string(),
                    num_steps_executed: 0,
                });
            }
        }

        debug!(step = %prompt, "Simulating step");
        tokio::time::sleep(self.step_delay).await;
        Ok(StepMetadata {
            prompt: prompt.to_string(),
            num_steps_executed: 1,
        })
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        debug!(url = %self.url, "Dry-run session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrelay_coordinator::{AutoApproveHandler, DenyAllHandler};

    fn config(url: &str) -> SessionConfig {
        SessionConfig {
            url: url.to_string(),
            context: String::new(),
        }
    }

    #[tokio::test]
    async fn test_dry_run_asks_before_each_step() {
        let engine = DryRunEngine::new(Duration::ZERO, ApprovalPolicy::Always);
        let (handler, mut prompts) = AutoApproveHandler::new();
        let mut session = engine
            .start_session(&config("https://example.com"), Arc::new(handler))
            .await
            .unwrap();

        let meta = session.act("click login").await.unwrap();
        assert_eq!(meta.num_steps_executed, 1);
        assert_eq!(prompts.try_recv().unwrap()["step"], "click login");
    }

    #[tokio::test]
    async fn test_dry_run_skips_denied_step() {
        let engine = DryRunEngine::new(Duration::ZERO, ApprovalPolicy::Always);
        let (handler, _prompts) = DenyAllHandler::new("no");
        let mut session = engine
            .start_session(&config("https://example.com"), Arc::new(handler))
            .await
            .unwrap();

        let meta = session.act("delete account").await.unwrap();
        assert_eq!(meta.num_steps_executed, 0);
    }

    #[tokio::test]
    async fn test_dry_run_never_policy_skips_approval() {
        let engine = DryRunEngine::new(Duration::ZERO, ApprovalPolicy::Never);
        let (handler, mut prompts) = DenyAllHandler::new("no");
        let mut session = engine
            .start_session(&config("https://example.com"), Arc::new(handler))
            .await
            .unwrap();

        assert_eq!(session.act("scroll").await.unwrap().num_steps_executed, 1);
        assert!(prompts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dry_run_rejects_empty_input() {
        let engine = DryRunEngine::new(Duration::ZERO, ApprovalPolicy::Never);
        let (handler, _prompts) = AutoApproveHandler::new();
        let handler: Arc<dyn ApprovalHandler> = Arc::new(handler);

        assert!(matches!(
            engine.start_session(&config(" "), handler.clone()).await,
            Err(EngineError::SessionStart(_))
        ));

        let mut session = engine
            .start_session(&config("https://example.com"), handler)
            .await
            .unwrap();
        assert!(matches!(
            session.act("").await,
            Err(EngineError::InvalidStep(_))
        ));
    }
}
