//! OHLCV candles and the (symbol, timeframe) routing key.

use crate::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLCV bar for a fixed time bucket.
///
/// `timestamp` is the bucket start time in milliseconds since the Unix
/// epoch, as delivered by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start time (ms since epoch)
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest traded price in the bucket
    pub high: f64,
    /// Lowest traded price in the bucket
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Traded volume in the bucket
    pub volume: f64,
}

/// Routing key for everything that is tracked per symbol and timeframe:
/// feed connections, indicator buffers, and gate counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    /// Exchange symbol, e.g. `BTCUSDT`
    pub symbol: String,
    /// Candle bucket duration
    pub timeframe: Timeframe,
}

impl InstrumentKey {
    /// Create a key from a symbol and timeframe.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.timeframe)
    }
}
