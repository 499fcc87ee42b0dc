//! Exchange daemon: loads configuration, assembles the pipeline, and
//! serves the REST/WebSocket surface.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use optex_rs::config::ExchangeConfig;
use optex_rs::correlator::ResponseCoordinator;
use optex_rs::instruments::InstrumentRegistry;
use optex_rs::pipeline::Pipeline;
use optex_rs::server::{router, AppState};
use optex_rs::teams::TeamRegistry;

#[derive(Debug, Parser)]
#[command(name = "optexd", about = "Simulated options exchange daemon")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short)]
    config: Option<String>,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8000")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            ExchangeConfig::from_path(path).with_context(|| format!("loading config {path}"))?
        }
        None => ExchangeConfig::default(),
    };

    let teams = Arc::new(TeamRegistry::new());
    let instruments = Arc::new(InstrumentRegistry::from_instruments(
        config.instrument_list().context("building instrument list")?,
    ));
    let correlator = Arc::new(ResponseCoordinator::new(
        config.request_timeout(),
        config.max_pending_requests(),
    ));
    let constraints = Arc::new(config.constraint_sets().context("building constraint sets")?);

    info!(
        "starting exchange with {} instruments",
        instruments.len()
    );
    let pipeline = Arc::new(Pipeline::start(
        config.pipeline_settings().context("building pipeline settings")?,
        Arc::clone(&teams),
        Arc::clone(&instruments),
        Arc::clone(&correlator),
        constraints,
    ));

    let state = AppState::new(
        Arc::clone(&pipeline),
        teams,
        instruments,
        correlator,
        &config,
    );
    let app = router(state);

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!("exchange listening on {}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    pipeline.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
