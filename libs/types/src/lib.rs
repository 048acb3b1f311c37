//! # Shared Domain Types
//!
//! Common types used across the candle feed, indicator engine, risk gate
//! and HTTP gateway. Everything here is plain data: serde-friendly structs
//! and enums with no I/O and no internal locking, so every service can
//! depend on this crate without pulling in runtime machinery.
//!
//! ## Type Map
//!
//! - [`Candle`]: one OHLCV bar as received from the exchange
//! - [`Timeframe`]: supported candle bucket durations
//! - [`InstrumentKey`]: the (symbol, timeframe) routing key used by the
//!   feed, the indicator buffers and the gate counters
//! - [`IndicatorSnapshot`]: derived indicator values for one buffer
//! - [`Signal`] / [`Side`]: candidate trading signals from the strategy
//!   layer
//! - [`GateDecision`]: outcome of a risk gate evaluation
//! - [`RuleConfig`]: versioned risk configuration published by operators

pub mod candle;
pub mod rule_config;
pub mod signal;
pub mod snapshot;
pub mod timeframe;

pub use candle::{Candle, InstrumentKey};
pub use rule_config::{RiskLimits, RuleConfig};
pub use signal::{GateDecision, Side, Signal};
pub use snapshot::{EmaPair, IndicatorSnapshot, MacdValue};
pub use timeframe::{ParseTimeframeError, Timeframe, DEFAULT_PRECEDENCE};
