//! toolgated - toolgate gateway daemon
//!
//! Serves the tool-call, fan-out, health, and breaker endpoints over HTTP.
//!
//! Usage:
//!   toolgated [--config toolgate.toml] [--port 18090] [--json-logs]
//!
//! Without a config file the daemon starts with no remote backends and
//! only the built-in in-process services.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use toolgate_api::{create_router, AppState};
use toolgate_client::BackendClient;
use toolgate_core::ServiceRegistry;
use toolgate_gateway::{GatewayConfig, GatewayRouter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "toolgated")]
#[command(about = "Resilient tool-call gateway", long_about = None)]
#[command(version)]
struct Args {
    /// Gateway config file (TOML)
    #[arg(short, long, env = "TOOLGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port from the config file
    #[arg(short, long, env = "TOOLGATE_PORT")]
    port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "toolgated=info,toolgate_gateway=info,toolgate_api=info,toolgate_core=info".into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    tracing::info!("Starting toolgated");

    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading config from: {}", path.display());
            GatewayConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => {
            tracing::info!("No config file provided, serving built-in services only");
            GatewayConfig::default()
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let registry = Arc::new(ServiceRegistry::new());
    if config.services.builtin {
        registry.initialize();
    }

    let client = BackendClient::with_config(config.call_timeout(), config.connect_timeout())
        .context("Failed to build backend HTTP client")?;
    let router = GatewayRouter::from_config(&config, client, Some(registry));
    tracing::info!(
        backends = config.backends.len(),
        servers = ?router.backend_names(),
        "Gateway ready"
    );

    let app = create_router(AppState::new(Arc::new(router)));

    let host = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid listen host '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("toolgated stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
