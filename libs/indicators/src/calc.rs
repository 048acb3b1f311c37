//! Indicator math over candle slices.
//!
//! Every function returns `None` when the slice is too short, letting
//! callers distinguish "not enough history yet" from a computed value.

use types::{Candle, MacdValue};

/// Relative Strength Index with a Wilder-style seed.
///
/// The first `period` deltas seed the average gain/loss; every later
/// candle is folded in with `avg = (avg * (period - 1) ± delta) / period`.
/// Returns 100 when the average loss is zero. Needs `period + 1` candles.
pub fn rsi(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let change = candles[i].close - candles[i - 1].close;
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;

    let p = period as f64;
    for i in (period + 1)..candles.len() {
        let change = candles[i].close - candles[i - 1].close;
        if change > 0.0 {
            avg_gain = (avg_gain * (p - 1.0) + change) / p;
            avg_loss = (avg_loss * (p - 1.0)) / p;
        } else {
            avg_gain = (avg_gain * (p - 1.0)) / p;
            avg_loss = (avg_loss * (p - 1.0) - change) / p;
        }
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Exponential moving average seeded with the simple average of the
/// first `period` closes, then the standard recurrence with multiplier
/// `2 / (period + 1)` over the remaining closes. Needs `period` candles.
pub fn ema(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period || period == 0 {
        return None;
    }

    let mut sum = 0.0;
    for candle in &candles[..period] {
        sum += candle.close;
    }
    let mut value = sum / period as f64;

    let multiplier = 2.0 / (period as f64 + 1.0);
    for candle in &candles[period..] {
        value = candle.close * multiplier + value * (1.0 - multiplier);
    }

    Some(value)
}

/// Average True Range over the **oldest** `period` bars of the slice.
///
/// This is deliberately not a trailing-window ATR: the production system
/// averages the true range of bars `1..=period` regardless of how much
/// newer history the buffer holds, and consumers depend on that value.
/// Needs `period + 1` candles.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 || period == 0 {
        return None;
    }

    let mut tr_sum = 0.0;
    for i in 1..=period {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        tr_sum += tr;
    }

    Some(tr_sum / period as f64)
}

/// MACD with an approximated signal line.
///
/// The MACD line is `ema(fast) - ema(slow)` over the full slice. The
/// signal line is **not** an EMA of the MACD series: it is the average
/// of the MACD line recomputed over up to `signal` trailing sub-windows
/// of the slice, each one candle shorter than the last. The histogram is
/// `macd - signal`. Preserved as-is for compatibility.
/// Needs `slow + signal` candles.
pub fn macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Option<MacdValue> {
    if candles.len() < slow + signal {
        return None;
    }

    let fast_ema = ema(candles, fast)?;
    let slow_ema = ema(candles, slow)?;
    let macd_line = fast_ema - slow_ema;

    let mut signal_sum = 0.0;
    let mut count = 0u32;
    for i in (1..=signal).rev() {
        if candles.len() > slow + i {
            let sub = &candles[..candles.len() - i];
            if let (Some(sub_fast), Some(sub_slow)) = (ema(sub, fast), ema(sub, slow)) {
                signal_sum += sub_fast - sub_slow;
                count += 1;
            }
        }
    }

    let signal_line = if count > 0 {
        signal_sum / count as f64
    } else {
        macd_line
    };

    Some(MacdValue {
        macd: macd_line,
        signal: signal_line,
        histogram: macd_line - signal_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                timestamp: 60_000 * i as i64,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 1.0,
            })
            .collect()
    }

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: 60_000 * i as i64,
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn rsi_needs_period_plus_one() {
        let candles = flat_candles(14, 100.0);
        assert_eq!(rsi(&candles, 14), None);
        let candles = flat_candles(15, 100.0);
        assert!(rsi(&candles, 14).is_some());
    }

    #[test]
    fn rsi_is_100_when_there_are_no_losses() {
        // 15 strictly increasing closes: avg loss stays exactly zero.
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        assert_eq!(rsi(&candles, 14), Some(100.0));
    }

    #[test]
    fn rsi_is_zero_when_there_are_no_gains() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let candles = candles_from_closes(&closes);
        let value = rsi(&candles, 14).unwrap();
        assert!(value.abs() < 1e-9, "expected 0, got {value}");
    }

    #[test]
    fn rsi_stays_in_bounds_on_mixed_series() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i * 7) % 13) as f64 - 6.0)
            .collect();
        let candles = candles_from_closes(&closes);
        let value = rsi(&candles, 14).unwrap();
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn ema_of_exactly_period_candles_is_their_simple_average() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        let candles = candles_from_closes(&closes);
        assert_eq!(ema(&candles, 5), Some(3.0));
    }

    #[test]
    fn ema_converges_to_constant_price() {
        let candles = flat_candles(250, 42.5);
        let value = ema(&candles, 50).unwrap();
        assert!((value - 42.5).abs() < 1e-9);
    }

    #[test]
    fn ema_undefined_below_period() {
        let candles = flat_candles(49, 10.0);
        assert_eq!(ema(&candles, 50), None);
    }

    #[test]
    fn atr_uses_the_oldest_window() {
        // First 15 bars have range 2.0, everything after has range 10.0.
        // A trailing ATR would see 10.0; this one must keep seeing the
        // oldest window and report 2.0.
        let mut candles = Vec::new();
        for i in 0..15 {
            candles.push(Candle {
                timestamp: 60_000 * i,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            });
        }
        for i in 15..60 {
            candles.push(Candle {
                timestamp: 60_000 * i,
                open: 100.0,
                high: 105.0,
                low: 95.0,
                close: 100.0,
                volume: 1.0,
            });
        }
        let value = atr(&candles, 14).unwrap();
        assert!((value - 2.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn atr_needs_period_plus_one() {
        let candles = flat_candles(14, 100.0);
        assert_eq!(atr(&candles, 14), None);
    }

    #[test]
    fn macd_undefined_below_slow_plus_signal() {
        let candles = flat_candles(34, 100.0);
        assert_eq!(macd(&candles, 12, 26, 9), None);
        let candles = flat_candles(35, 100.0);
        assert!(macd(&candles, 12, 26, 9).is_some());
    }

    #[test]
    fn macd_of_constant_price_is_zero() {
        let candles = flat_candles(100, 100.0);
        let value = macd(&candles, 12, 26, 9).unwrap();
        assert!(value.macd.abs() < 1e-9);
        assert!(value.signal.abs() < 1e-9);
        assert!(value.histogram.abs() < 1e-9);
    }

    #[test]
    fn macd_signal_pins_the_subwindow_approximation() {
        // Pin the non-standard signal line: the mean of the macd line
        // recomputed over the qualifying trailing sub-windows, not an
        // EMA of the macd series.
        let closes: Vec<f64> = (0..48).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();
        let candles = candles_from_closes(&closes);
        let value = macd(&candles, 12, 26, 9).unwrap();

        let mut sum = 0.0;
        let mut count = 0u32;
        for i in (1..=9).rev() {
            if candles.len() > 26 + i {
                let sub = &candles[..candles.len() - i];
                sum += ema(sub, 12).unwrap() - ema(sub, 26).unwrap();
                count += 1;
            }
        }
        assert_eq!(count, 9);
        let expected = sum / count as f64;
        assert!((value.signal - expected).abs() < 1e-12);
        assert!((value.histogram - (value.macd - value.signal)).abs() < 1e-12);
        // With a full buffer the signal differs from the macd line.
        assert!(value.signal != value.macd);
    }
}
