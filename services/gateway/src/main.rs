//! Gateway binary: wires feed → engine → strategies → gate → sink and
//! serves the HTTP API until interrupted.

use anyhow::Context;
use api_gateway::{config::GatewayConfig, server, strategy, AppState};
use clap::Parser;
use feed_service::CandleFeed;
use indicators::IndicatorEngine;
use risk_engine::{InMemoryGateMetrics, RiskGate, RuleConfigStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gateway", about = "Market candle ingestion and signal gating service")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address override, host:port
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var("GATEWAY_CONFIG_PATH").ok().map(PathBuf::from));
    let config = GatewayConfig::load(config_path.as_deref())?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;

    info!(
        symbols = ?config.feed.symbols,
        timeframes = ?config.feed.timeframes,
        %addr,
        "starting gateway"
    );

    let engine = Arc::new(IndicatorEngine::default());
    let store = Arc::new(RuleConfigStore::new(Some(PathBuf::from(
        &config.risk.rules_audit_path,
    ))));
    let gate_metrics = Arc::new(InMemoryGateMetrics::new());
    let gate = Arc::new(RiskGate::new(
        store.clone(),
        gate_metrics.clone(),
        Some(PathBuf::from(&config.risk.gate_audit_path)),
        config.drawdown_limits(),
    ));

    let (feed, events) = CandleFeed::new(config.feed_config(), engine.clone());
    let feed = Arc::new(feed);
    let feed_metrics = feed.metrics();

    // Strategies are plugged in by downstream builds; the pipeline runs
    // either way so gate counters and sticky gates stay live.
    let strategies: Arc<Vec<Box<dyn strategy::Strategy>>> = Arc::new(Vec::new());
    let pipeline = tokio::spawn(strategy::run_pipeline(
        events,
        store.clone(),
        gate.clone(),
        strategies,
        Arc::new(strategy::LogSignalSink),
    ));

    feed.start().await;

    let state = Arc::new(AppState {
        engine,
        store,
        gate,
        gate_metrics,
        feed_metrics,
        feed: Some(feed.clone()),
    });

    tokio::select! {
        result = server::serve(addr, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    feed.stop().await;
    pipeline.abort();
    info!("gateway stopped");
    Ok(())
}
