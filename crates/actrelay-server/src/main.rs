//! ActRelay Server

use std::time::Duration;

use actrelay_coordinator::CoordinatorConfig;
use actrelay_server::{http, ApprovalPolicy, AppState, ServerConfig};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// ActRelay run coordinator server.
#[derive(Parser, Debug)]
#[command(name = "actrelay-server", about = "ActRelay run coordinator server")]
struct Args {
    /// HTTP and WebSocket address
    #[arg(long, default_value = "127.0.0.1:8000")]
    http_addr: String,

    /// Origin allowed by CORS ("*" for any)
    #[arg(long, default_value = "http://localhost:3000")]
    allowed_origin: String,

    /// Seconds a worker waits for an approval answer
    #[arg(long, default_value = "300")]
    request_timeout_secs: u64,

    /// Outbound queue depth per channel
    #[arg(long, default_value = "32")]
    channel_buffer: usize,

    /// Simulated duration of each dry-run step in milliseconds
    #[arg(long, default_value = "500")]
    step_delay_ms: u64,

    /// When the dry-run engine asks for approval
    #[arg(long, value_enum, default_value_t = ApprovalPolicy::Always)]
    approval_policy: ApprovalPolicy,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let allowed_origin = (args.allowed_origin != "*").then_some(args.allowed_origin);
        Self {
            http_addr: args.http_addr,
            allowed_origin,
            step_delay: Duration::from_millis(args.step_delay_ms),
            approval_policy: args.approval_policy,
            coordinator: CoordinatorConfig {
                request_timeout: Duration::from_secs(args.request_timeout_secs),
                channel_buffer: args.channel_buffer.max(1),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("actrelay=info".parse()?))
        .with_target(true)
        .init();

    let config = ServerConfig::from(args);
    let http_addr = config.socket_addr()?;
    let cors = config.cors_layer()?;

    let state = AppState::dry_run(&config);
    let coordinator = state.coordinator.clone();
    let router = http::create_router(state, cors);

    let listener = TcpListener::bind(http_addr).await?;
    info!(http_addr = %http_addr, "ActRelay server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            let cancelled = coordinator.cancel_all().await;
            info!(cancelled, "Shutting down");
        })
        .await?;

    Ok(())
}
