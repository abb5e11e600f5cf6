//! Strand SPP — Session Push Protocol server
//!
//! A single-process server that keeps one long-lived SSE push channel per
//! client, answers JSON-RPC requests POSTed against that session, and
//! fans out asynchronous notifications (broadcast or addressed).
//!
//! Usage:
//!   strand-spp                         # Default port 9000
//!   strand-spp --port 8080             # Custom port
//!   strand-spp --tick-secs 10          # Periodic tick broadcast
//!   strand-spp --grace-secs 5          # Shutdown drain deadline

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use spp_server::{
    Coordinator, HandlerRegistry, RegistryConfig, ServerConfig, Session, SessionHub,
    SessionObserver, SessionRegistry,
};
use spp_transport::TransportConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "strand-spp", about = "Strand SPP Server — Session Push Protocol")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "9000")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Maximum concurrent sessions
    #[arg(long, default_value = "32")]
    max_sessions: usize,

    /// Shutdown grace period in seconds
    #[arg(long, default_value = "5")]
    grace_secs: u64,

    /// Periodic tick broadcast interval in seconds (0 to disable)
    #[arg(long, default_value = "0")]
    tick_secs: u64,

    /// Enable CORS on the HTTP endpoints
    #[arg(long)]
    cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// Keeps session arrivals and departures visible in the log, the way an
/// external bookkeeping observer would.
struct SessionLog;

impl SessionObserver for SessionLog {
    fn on_register(&self, session: &Session) {
        info!("[sessions] + {}", session.id());
    }

    fn on_unregister(&self, session: &Session) {
        info!("[sessions] - {}", session.id());
    }
}

#[derive(Debug, Deserialize)]
struct PingParams {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AddParams {
    a: f64,
    b: f64,
}

/// Demonstration handlers. Tool logic lives entirely at this layer — the
/// core only routes to it.
fn build_handlers() -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();

    handlers.register_typed("ping", |_ctx, params: PingParams| async move {
        Ok(json!({ "reply": format!("pong: {}", params.message) }))
    });

    handlers.register_typed("add", |_ctx, params: AddParams| async move {
        Ok(json!({ "sum": params.a + params.b }))
    });

    handlers
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut registry = SessionRegistry::new(RegistryConfig {
        max_sessions: Some(cli.max_sessions),
        ..RegistryConfig::default()
    });
    registry.add_observer(Arc::new(SessionLog));

    let hub = SessionHub::new(registry, build_handlers());

    let config = ServerConfig {
        transport: TransportConfig {
            port: cli.port,
            hostname: cli.hostname.clone(),
            enable_cors: cli.cors,
            ..TransportConfig::default()
        },
        grace: Duration::from_secs(cli.grace_secs),
        tick_interval: (cli.tick_secs > 0).then(|| Duration::from_secs(cli.tick_secs)),
    };

    let coordinator = Coordinator::start(config, hub)
        .await
        .context("failed to start server")?;

    println!();
    println!("  Strand SPP server running");
    println!();
    println!("  Push channel:  http://{}:{}/events", cli.hostname, coordinator.port());
    println!("  Requests:      http://{}:{}/rpc?session=<id>", cli.hostname, coordinator.port());
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    println!();
    println!("  Shutting down...");
    let report = coordinator.shutdown().await;
    if report.forced {
        info!("Shutdown deadline exceeded; remaining work was cut off");
    }
    info!("Closed {} sessions", report.sessions_closed);
    println!("  Server stopped.");

    Ok(())
}
