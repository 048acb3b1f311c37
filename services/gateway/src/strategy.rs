//! Strategy layer contract and the candle → signal → gate pipeline.
//!
//! Concrete trading strategies are an external, pluggable component.
//! This module defines the contract they must satisfy and runs the
//! pipeline: feed events are filtered by the active rule config (empty
//! symbols means nothing is enabled), handed to every registered
//! strategy, and each produced candidate signal is pushed through the
//! risk gate. Only accepted signals reach the emission sink; rejections
//! are visible through the gate's decision counters.

use feed_service::FeedEvent;
use risk_engine::{RiskGate, RuleConfigStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use types::{Candle, GateDecision, IndicatorSnapshot, InstrumentKey, Signal};

/// A trading strategy consuming indicator snapshots and producing
/// candidate signals. Implementations must be cheap and must not block.
pub trait Strategy: Send + Sync {
    /// Strategy name, carried on every produced signal.
    fn name(&self) -> &str;

    /// Evaluate one closed candle with its snapshot. Return any number
    /// of candidate signals (usually zero or one).
    fn evaluate(
        &self,
        key: &InstrumentKey,
        candle: &Candle,
        snapshot: &IndicatorSnapshot,
    ) -> Vec<Signal>;
}

/// Downstream consumer of accepted signals.
pub trait SignalSink: Send + Sync {
    /// An accepted signal left the gate.
    fn accepted(&self, signal: &Signal);
}

/// Sink that logs accepted signals; the default when no downstream
/// emission target is wired up.
#[derive(Debug, Default)]
pub struct LogSignalSink;

impl SignalSink for LogSignalSink {
    fn accepted(&self, signal: &Signal) {
        tracing::info!(
            symbol = %signal.symbol,
            timeframe = %signal.timeframe,
            side = ?signal.side,
            rr = signal.rr,
            strategy = %signal.strategy_name,
            "signal accepted"
        );
    }
}

/// Drive feed events through the strategies and the risk gate until the
/// feed's event channel closes.
pub async fn run_pipeline(
    mut events: mpsc::Receiver<FeedEvent>,
    store: Arc<RuleConfigStore>,
    gate: Arc<RiskGate>,
    strategies: Arc<Vec<Box<dyn Strategy>>>,
    sink: Arc<dyn SignalSink>,
) {
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Candle {
                key,
                candle,
                snapshot,
            } => {
                let cfg = store.active();
                if !cfg.symbols.iter().any(|s| *s == key.symbol)
                    || !cfg.timeframes.contains(&key.timeframe)
                {
                    continue;
                }
                for strategy in strategies.iter() {
                    for signal in strategy.evaluate(&key, &candle, &snapshot) {
                        let decision = gate.evaluate(&signal);
                        if decision == GateDecision::Ok {
                            sink.accepted(&signal);
                        }
                    }
                }
            }
            FeedEvent::BackfillCompleted { key, count } => {
                tracing::info!(key = %key, count, "backfill completed");
            }
            FeedEvent::Disconnected { key } => {
                tracing::warn!(key = %key, "stream disconnected, reconnect pending");
            }
            FeedEvent::Error(error) => {
                tracing::warn!(%error, "feed error");
            }
        }
    }
    tracing::info!("feed event channel closed, pipeline exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use risk_engine::{DrawdownLimits, NoOpGateMetrics};
    use types::{RiskLimits, RuleConfig, Side, Timeframe};

    struct AlwaysBuy;

    impl Strategy for AlwaysBuy {
        fn name(&self) -> &str {
            "always-buy"
        }

        fn evaluate(
            &self,
            key: &InstrumentKey,
            candle: &Candle,
            _snapshot: &IndicatorSnapshot,
        ) -> Vec<Signal> {
            vec![Signal {
                symbol: key.symbol.clone(),
                timeframe: key.timeframe,
                side: Side::Buy,
                rr: 2.0,
                strategy_name: self.name().to_string(),
                timestamp: candle.timestamp,
            }]
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<Signal>>);

    impl SignalSink for CollectingSink {
        fn accepted(&self, signal: &Signal) {
            self.0.lock().push(signal.clone());
        }
    }

    fn active_config() -> RuleConfig {
        RuleConfig {
            schema_version: 1,
            name: "pipeline-test".to_string(),
            effective_at: "2024-06-01T00:00:00Z".to_string(),
            timeframes: vec![Timeframe::M1],
            symbols: vec!["BTCUSDT".to_string()],
            risk: RiskLimits {
                max_concurrent_signals: 10,
                rr_min: 0.0,
                kill_switch: false,
                cooldown_seconds: None,
                cooldown_candles: None,
                max_signals_per_day: None,
            },
            precedence: Some(vec![Timeframe::M1]),
        }
    }

    fn candle_event(symbol: &str, timeframe: Timeframe, ts: i64) -> FeedEvent {
        FeedEvent::Candle {
            key: InstrumentKey::new(symbol, timeframe),
            candle: Candle {
                timestamp: ts,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 1.0,
            },
            snapshot: IndicatorSnapshot::default(),
        }
    }

    #[tokio::test]
    async fn pipeline_routes_enabled_candles_through_the_gate() {
        let store = Arc::new(RuleConfigStore::new(None));
        store.publish(active_config()).unwrap();
        let gate = Arc::new(RiskGate::new(
            store.clone(),
            Arc::new(NoOpGateMetrics),
            None,
            DrawdownLimits::default(),
        ));
        let sink = Arc::new(CollectingSink::default());
        let strategies: Arc<Vec<Box<dyn Strategy>>> = Arc::new(vec![Box::new(AlwaysBuy)]);

        let (tx, rx) = mpsc::channel(16);
        let pipeline = tokio::spawn(run_pipeline(
            rx,
            store,
            gate,
            strategies,
            sink.clone(),
        ));

        // Enabled key passes; disabled symbol and timeframe are skipped.
        tx.send(candle_event("BTCUSDT", Timeframe::M1, 60_000)).await.unwrap();
        tx.send(candle_event("DOGEUSDT", Timeframe::M1, 60_000)).await.unwrap();
        tx.send(candle_event("BTCUSDT", Timeframe::H1, 60_000)).await.unwrap();
        drop(tx);
        pipeline.await.unwrap();

        let accepted = sink.0.lock();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].symbol, "BTCUSDT");
        assert_eq!(accepted[0].strategy_name, "always-buy");
    }

    #[tokio::test]
    async fn inert_default_config_enables_nothing() {
        let store = Arc::new(RuleConfigStore::new(None));
        let gate = Arc::new(RiskGate::new(
            store.clone(),
            Arc::new(NoOpGateMetrics),
            None,
            DrawdownLimits::default(),
        ));
        let sink = Arc::new(CollectingSink::default());
        let strategies: Arc<Vec<Box<dyn Strategy>>> = Arc::new(vec![Box::new(AlwaysBuy)]);

        let (tx, rx) = mpsc::channel(16);
        let pipeline = tokio::spawn(run_pipeline(rx, store, gate, strategies, sink.clone()));

        tx.send(candle_event("BTCUSDT", Timeframe::M1, 60_000)).await.unwrap();
        drop(tx);
        pipeline.await.unwrap();

        assert!(sink.0.lock().is_empty());
    }
}
