//! Derived indicator values for one candle buffer.

use serde::{Deserialize, Serialize};

/// Short and long exponential moving averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmaPair {
    /// Short EMA (default period 50); `None` below the period
    pub short: Option<f64>,
    /// Long EMA (default period 200); `None` below the period
    pub long: Option<f64>,
}

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    /// Fast EMA minus slow EMA over the full buffer
    pub macd: f64,
    /// Signal line (see the indicator engine for the exact, non-standard
    /// averaging used to derive it)
    pub signal: f64,
    /// `macd - signal`
    pub histogram: f64,
}

/// Indicator values computed from the current buffer of one
/// (symbol, timeframe) key.
///
/// Each field is `None` while the buffer holds fewer candles than the
/// indicator needs; callers can distinguish "no value yet" from a fault.
/// Snapshots are recomputed from the buffer on demand and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Relative Strength Index, in `[0, 100]`
    pub rsi: Option<f64>,
    /// Short/long EMA pair
    pub ema: EmaPair,
    /// Average True Range
    pub atr: Option<f64>,
    /// MACD triple
    pub macd: Option<MacdValue>,
}
