//! Buffer ownership and snapshot computation.

use crate::calc;
use dashmap::DashMap;
use types::{Candle, EmaPair, IndicatorSnapshot, InstrumentKey, Timeframe};

/// Indicator periods and buffer sizing.
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    /// RSI lookback
    pub rsi_period: usize,
    /// Short EMA period
    pub ema_short: usize,
    /// Long EMA period
    pub ema_long: usize,
    /// ATR lookback
    pub atr_period: usize,
    /// MACD fast EMA period
    pub macd_fast: usize,
    /// MACD slow EMA period
    pub macd_slow: usize,
    /// MACD signal period
    pub macd_signal: usize,
    /// Extra candles retained beyond the largest required period
    pub buffer_margin: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_short: 50,
            ema_long: 200,
            atr_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            buffer_margin: 100,
        }
    }
}

impl IndicatorConfig {
    /// Largest lookback any configured indicator needs.
    pub fn max_period(&self) -> usize {
        self.rsi_period
            .max(self.ema_long)
            .max(self.atr_period)
            .max(self.macd_slow + self.macd_signal)
    }

    /// Hard cap on retained candles per key.
    pub fn buffer_cap(&self) -> usize {
        self.max_period() + self.buffer_margin
    }
}

/// In-memory indicator engine.
///
/// Owns one bounded candle buffer per (symbol, timeframe) key. The map
/// uses per-entry locking, so different keys can be updated concurrently
/// while updates to a single key are serialized: matching the feed,
/// which runs one connection per key.
pub struct IndicatorEngine {
    config: IndicatorConfig,
    buffers: DashMap<InstrumentKey, Vec<Candle>>,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorConfig::default())
    }
}

impl IndicatorEngine {
    /// Create an engine with the given periods.
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            buffers: DashMap::new(),
        }
    }

    /// Indicator configuration in use.
    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Append a candle to the buffer for `symbol`/`timeframe` (creating
    /// it if absent), evict from the front past the cap, and return the
    /// snapshot computed from the updated buffer.
    ///
    /// The buffer is append-only: candles are stored in arrival order,
    /// whatever their timestamps. A timestamp regression is logged and
    /// kept.
    pub fn add_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candle: Candle,
    ) -> IndicatorSnapshot {
        let key = InstrumentKey::new(symbol, timeframe);
        let mut buffer = self.buffers.entry(key).or_default();

        if let Some(last) = buffer.last() {
            if candle.timestamp < last.timestamp {
                tracing::debug!(
                    symbol,
                    timeframe = %timeframe,
                    last = last.timestamp,
                    incoming = candle.timestamp,
                    "candle timestamp regression, appending anyway"
                );
            }
        }

        buffer.push(candle);

        let cap = self.config.buffer_cap();
        if buffer.len() > cap {
            let excess = buffer.len() - cap;
            buffer.drain(..excess);
        }

        self.compute(&buffer)
    }

    /// Defensive copy of up to `limit` most recent candles, oldest
    /// first. `None` (or a zero limit) returns the full retained window.
    /// An unknown key returns an empty vector.
    pub fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: Option<usize>,
    ) -> Vec<Candle> {
        let key = InstrumentKey::new(symbol, timeframe);
        match self.buffers.get(&key) {
            Some(buffer) => match limit {
                Some(n) if n > 0 && n < buffer.len() => buffer[buffer.len() - n..].to_vec(),
                _ => buffer.clone(),
            },
            None => Vec::new(),
        }
    }

    /// Recompute the snapshot from the current buffer, or `None` if the
    /// key has never seen a candle.
    pub fn latest(&self, symbol: &str, timeframe: Timeframe) -> Option<IndicatorSnapshot> {
        let key = InstrumentKey::new(symbol, timeframe);
        let buffer = self.buffers.get(&key)?;
        if buffer.is_empty() {
            return None;
        }
        Some(self.compute(&buffer))
    }

    /// Number of candles currently retained for a key.
    pub fn buffer_len(&self, symbol: &str, timeframe: Timeframe) -> usize {
        let key = InstrumentKey::new(symbol, timeframe);
        self.buffers.get(&key).map(|b| b.len()).unwrap_or(0)
    }

    /// Drop the buffer for one key.
    pub fn clear_buffer(&self, symbol: &str, timeframe: Timeframe) {
        let key = InstrumentKey::new(symbol, timeframe);
        self.buffers.remove(&key);
    }

    /// Drop every buffer.
    pub fn clear_all_buffers(&self) {
        self.buffers.clear();
    }

    fn compute(&self, candles: &[Candle]) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: calc::rsi(candles, self.config.rsi_period),
            ema: EmaPair {
                short: calc::ema(candles, self.config.ema_short),
                long: calc::ema(candles, self.config.ema_long),
            },
            atr: calc::atr(candles, self.config.atr_period),
            macd: calc::macd(
                candles,
                self.config.macd_fast,
                self.config.macd_slow,
                self.config.macd_signal,
            ),
        }
    }
}
