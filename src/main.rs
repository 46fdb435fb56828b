use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use axum::routing::get;
use axum::{Json, Router};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratekeeper::config::{ServiceConfig, StoreBackend};
use ratekeeper::http::{admin_router, EnvelopeResponder};
use ratekeeper::ratelimit::{ConfigRefresher, LimiterSlot, RateLimitConfig, RateLimiter};
use ratekeeper::store::{MemoryStore, NotFoundMatcher, RedisStore, SharedStore};

/// Distributed sliding-window rate limiter.
#[derive(Debug, Parser)]
#[command(name = "ratekeeper", version, about)]
struct Args {
    /// Service configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rate limit document written to the store if none is stored yet
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP listen address
    #[arg(long)]
    http_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Ratekeeper");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = ServiceConfig::load(args.config.as_deref())
        .context("failed to load service configuration")?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    info!(
        http_addr = %config.server.http_addr,
        store = ?config.store.backend,
        "Configuration loaded"
    );

    // Stops the background tasks once the server has drained.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut purger = None;
    let store: Arc<dyn SharedStore> = match config.store.backend {
        StoreBackend::Memory => {
            let memory = Arc::new(MemoryStore::new());
            let period = Duration::from_secs(config.store.purge_interval_secs);
            purger = Some(memory.clone().spawn_purger(period, wait_for(shutdown_rx.clone())));
            memory
        }
        StoreBackend::Redis => Arc::new(
            RedisStore::connect(&config.store.redis_url)
                .await
                .context("failed to connect to redis")?,
        ),
    };

    let mut builder = RateLimiter::builder(store)
        .responder(Arc::new(EnvelopeResponder))
        .config_key(config.limiter.config_key.clone())
        .not_found(NotFoundMatcher::new(config.limiter.not_found_markers.clone()))
        .unhealthy_after(config.limiter.unhealthy_after);
    if let Some(path) = &args.seed {
        builder = builder.seed(RateLimitConfig::from_file(path)?);
    }
    let limiter = builder.build().await?;

    let slot = LimiterSlot::new();
    slot.install(limiter.clone())
        .map_err(|_| anyhow!("rate limiter already installed"))?;

    let refresher = ConfigRefresher::new(limiter.clone()).spawn(wait_for(shutdown_rx));

    let app = Router::new()
        .route("/v1/ping", get(ping).layer(limiter.check("external", "ping")))
        .route("/live", get(live))
        .nest(&config.limiter.admin_prefix, admin_router(slot));

    let listener = tokio::net::TcpListener::bind(config.server.http_addr).await?;
    info!(
        addr = %config.server.http_addr,
        admin_prefix = %config.limiter.admin_prefix,
        "HTTP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    refresher.await?;
    if let Some(purger) = purger {
        purger.await?;
    }

    info!("Ratekeeper stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

/// Resolves once shutdown has been signalled on `rx`.
async fn wait_for(mut rx: watch::Receiver<bool>) {
    let _ = rx.changed().await;
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

async fn live() -> &'static str {
    "ok"
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
