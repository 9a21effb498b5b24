//! rsmq - visibility-timeout message queue server
//!
//! Serves the queue operations as JSON over HTTP, dispatched on the
//! `X-Rsmq-Target` header.

mod config;
mod router;

use clap::Parser;
use rsmq_queue::{EphemeralStore, Rsmq};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rsmq")]
#[command(about = "Visibility-timeout message queue server", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "RSMQ_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "RSMQ_HOST")]
    host: Option<String>,

    /// Key namespace of all queues
    #[arg(long, env = "RSMQ_NAMESPACE")]
    namespace: Option<String>,

    /// Publish the queue depth after every send
    #[arg(long, env = "RSMQ_REAL_TIME")]
    real_time: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RSMQ_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "rsmq={0},rsmq_queue={0},tower_http=debug",
                    args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = config::Config::load()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(namespace) = args.namespace {
        config.queue.namespace = namespace;
    }
    if let Some(real_time) = args.real_time {
        config.queue.real_time = real_time;
    }

    info!("Starting rsmq...");
    info!("  Namespace: {}", config.queue.namespace);
    info!(
        "  Real-time: {}",
        if config.queue.real_time { "enabled" } else { "disabled" }
    );

    let store = Arc::new(EphemeralStore::new());
    let app = router::create_router(Arc::new(Rsmq::new(store, config.queue)));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
