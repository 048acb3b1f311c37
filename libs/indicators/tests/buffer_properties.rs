//! Property tests for buffer bounds and the append-only candle policy.

use indicators::{IndicatorConfig, IndicatorEngine};
use proptest::prelude::*;
use types::{Candle, Timeframe};

fn candle(ts: i64, close: f64) -> Candle {
    Candle {
        timestamp: ts,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1.0,
    }
}

proptest! {
    /// The engine appends whatever it is given: duplicate and
    /// out-of-order timestamps included: without reordering, dropping
    /// or replacing, while the bound still holds.
    #[test]
    fn append_only_policy_preserves_arrival_order(
        timestamps in prop::collection::vec(0i64..10_000, 1..250)
    ) {
        let engine = IndicatorEngine::default();
        for &ts in &timestamps {
            engine.add_candle("BTCUSDT", Timeframe::M1, candle(ts, 100.0));
        }

        let stored = engine.get_candles("BTCUSDT", Timeframe::M1, None);
        let cap = engine.config().buffer_cap();
        prop_assert!(stored.len() <= cap);

        // What remains is exactly the tail of the arrival sequence.
        let expected_tail = &timestamps[timestamps.len() - stored.len()..];
        let stored_ts: Vec<i64> = stored.iter().map(|c| c.timestamp).collect();
        prop_assert_eq!(&stored_ts[..], expected_tail);
    }

    /// No call count ever grows a buffer beyond `max_period + margin`.
    #[test]
    fn buffer_is_bounded_for_any_insertion_count(extra in 0usize..700) {
        let config = IndicatorConfig::default();
        let cap = config.buffer_cap();
        let engine = IndicatorEngine::new(config);
        for i in 0..(cap + extra) {
            engine.add_candle("ETHUSDT", Timeframe::M5, candle(i as i64, 10.0));
        }
        prop_assert_eq!(engine.buffer_len("ETHUSDT", Timeframe::M5), cap);
    }

    /// `get_candles(limit)` returns `min(limit, len)` candles and they
    /// are the most recent ones in stored order.
    #[test]
    fn limited_reads_return_the_recent_tail(
        count in 1usize..120,
        limit in 1usize..200
    ) {
        let engine = IndicatorEngine::default();
        for i in 0..count {
            engine.add_candle("BTCUSDT", Timeframe::M15, candle(i as i64 * 900_000, 1.0));
        }
        let out = engine.get_candles("BTCUSDT", Timeframe::M15, Some(limit));
        prop_assert_eq!(out.len(), limit.min(count));
        let first_expected = (count - out.len()) as i64 * 900_000;
        prop_assert_eq!(out[0].timestamp, first_expected);
    }

    /// RSI stays inside [0, 100] for arbitrary close sequences.
    #[test]
    fn rsi_stays_in_range(closes in prop::collection::vec(0.01f64..10_000.0, 15..120)) {
        let engine = IndicatorEngine::default();
        let mut snapshot = None;
        for (i, close) in closes.iter().enumerate() {
            snapshot = Some(engine.add_candle(
                "BTCUSDT",
                Timeframe::M1,
                candle(i as i64 * 60_000, *close),
            ));
        }
        let rsi = snapshot.unwrap().rsi.expect("enough candles for RSI");
        prop_assert!((0.0..=100.0).contains(&rsi), "rsi out of range: {}", rsi);
    }
}
