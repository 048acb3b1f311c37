//! # API Gateway
//!
//! Wires the candle feed, indicator engine, rule config store and risk
//! gate into one process and exposes them over HTTP:
//!
//! - `/rules/*`: publish/validate/active/history/schema for the
//!   versioned risk configuration
//! - `/api/v1/indicators/*`: candle and snapshot queries, test candle
//!   injection, buffer resets
//! - `/risk/*`: runtime kill switch, drawdown limits and gate status
//! - `/trades/record`: realized PnL ledger feed
//! - `/healthz`, `/metrics`: liveness and Prometheus text exposition
//!
//! The strategy layer is an external component; [`strategy`] defines
//! the contract it must satisfy and the pipeline that routes feed
//! events through registered strategies into the risk gate.

pub mod config;
pub mod server;
pub mod strategy;

pub use config::GatewayConfig;
pub use server::{handle_request, serve, AppState};
pub use strategy::{run_pipeline, LogSignalSink, SignalSink, Strategy};
