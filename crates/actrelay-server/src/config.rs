//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use actrelay_coordinator::CoordinatorConfig;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::engine::ApprovalPolicy;
use crate::error::ServerError;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP and WebSocket bind address.
    pub http_addr: String,

    /// Origin allowed by CORS. Any origin when unset.
    pub allowed_origin: Option<String>,

    /// Simulated duration of one dry-run step.
    pub step_delay: Duration,

    /// When the dry-run engine asks the client for approval.
    pub approval_policy: ApprovalPolicy,

    pub coordinator: CoordinatorConfig,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.http_addr
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.http_addr.clone()))
    }

    /// CORS layer for the configured origin.
    pub fn cors_layer(&self) -> Result<CorsLayer, ServerError> {
        let origin = match &self.allowed_origin {
            Some(origin) => {
                let value = HeaderValue::from_str(origin)
                    .map_err(|_| ServerError::InvalidOrigin(origin.clone()))?;
                AllowOrigin::exact(value)
            }
            None => AllowOrigin::from(Any),
        };

        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8000".to_string(),
            allowed_origin: Some("http://localhost:3000".to_string()),
            step_delay: Duration::from_millis(500),
            approval_policy: ApprovalPolicy::Always,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
        assert!(config.cors_layer().is_ok());
        assert_eq!(config.coordinator.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = ServerConfig {
            http_addr: "not an address".to_string(),
            allowed_origin: Some("bad\norigin".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.socket_addr(),
            Err(ServerError::InvalidAddress(_))
        ));
        assert!(matches!(
            config.cors_layer(),
            Err(ServerError::InvalidOrigin(_))
        ));
    }
}
