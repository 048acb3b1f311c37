//! The candle feed orchestrator.

use crate::connection::{run_stream, ConnectionState, StreamContext};
use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::protocol::{self, KlineResponse};
use dashmap::DashMap;
use indicators::IndicatorEngine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use types::{Candle, IndicatorSnapshot, InstrumentKey, Timeframe};

/// Events emitted by the feed to its consumer. This doubles as the
/// non-throwing error channel: transport failures arrive as
/// [`FeedEvent::Error`] values while the feed keeps running.
#[derive(Debug)]
pub enum FeedEvent {
    /// A live candle was ingested and the snapshot recomputed
    Candle {
        /// Stream the candle arrived on
        key: InstrumentKey,
        /// The normalized candle
        candle: Candle,
        /// Snapshot computed from the updated buffer
        snapshot: IndicatorSnapshot,
    },
    /// Historical backfill finished for one key
    BackfillCompleted {
        /// Backfilled stream
        key: InstrumentKey,
        /// Candles replayed into the engine
        count: usize,
    },
    /// A subscribed stream dropped; a reconnect is being scheduled
    Disconnected {
        /// The affected stream
        key: InstrumentKey,
    },
    /// A recoverable feed error (connect failure, malformed message,
    /// backfill failure)
    Error(FeedError),
}

/// Feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint for kline streams
    pub ws_url: String,
    /// REST endpoint for historical backfill
    pub rest_url: String,
    /// Symbols to stream
    pub symbols: Vec<String>,
    /// Timeframes to stream per symbol
    pub timeframes: Vec<Timeframe>,
    /// Timeout for one connection attempt
    pub connect_timeout: Duration,
    /// Timeout for one backfill request
    pub request_timeout: Duration,
    /// Fixed delay before reconnecting a dropped stream
    pub reconnect_delay: Duration,
    /// Candles to backfill per key on start; 0 disables backfill
    pub backfill_limit: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::testnet(Vec::new(), Vec::new())
    }
}

impl FeedConfig {
    /// Config against the venue's testnet endpoints.
    pub fn testnet(symbols: Vec<String>, timeframes: Vec<Timeframe>) -> Self {
        Self {
            ws_url: "wss://stream-testnet.bybit.com/v5/public/linear".to_string(),
            rest_url: "https://api-testnet.bybit.com".to_string(),
            symbols,
            timeframes,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            backfill_limit: 200,
        }
    }

    /// Config against the venue's production endpoints.
    pub fn mainnet(symbols: Vec<String>, timeframes: Vec<Timeframe>) -> Self {
        Self {
            ws_url: "wss://stream.bybit.com/v5/public/linear".to_string(),
            rest_url: "https://api.bybit.com".to_string(),
            ..Self::testnet(symbols, timeframes)
        }
    }
}

/// Resilient streaming client: one WebSocket stream per
/// (symbol, timeframe), a shared indicator engine, and an event channel
/// toward the strategy layer.
pub struct CandleFeed {
    config: FeedConfig,
    engine: Arc<IndicatorEngine>,
    events: mpsc::Sender<FeedEvent>,
    metrics: Arc<FeedMetrics>,
    states: Arc<DashMap<InstrumentKey, ConnectionState>>,
    tasks: Mutex<HashMap<InstrumentKey, JoinHandle<()>>>,
    shutdown: Mutex<watch::Sender<bool>>,
    running: AtomicBool,
    http: reqwest::Client,
}

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const STOP_GRACE: Duration = Duration::from_millis(500);

impl CandleFeed {
    /// Create a feed over a shared engine. Returns the feed and the
    /// receiving end of its event channel.
    pub fn new(
        config: FeedConfig,
        engine: Arc<IndicatorEngine>,
    ) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build backfill http client");
        let (shutdown, _) = watch::channel(false);
        let feed = Self {
            config,
            engine,
            events,
            metrics: Arc::new(FeedMetrics::new()),
            states: Arc::new(DashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            shutdown: Mutex::new(shutdown),
            running: AtomicBool::new(false),
            http,
        };
        (feed, receiver)
    }

    /// Feed counters.
    pub fn metrics(&self) -> Arc<FeedMetrics> {
        self.metrics.clone()
    }

    /// Whether `start` has been called without a matching `stop`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of stream tasks currently registered.
    pub fn stream_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Snapshot of every stream's connection state.
    pub fn connection_states(&self) -> Vec<(InstrumentKey, ConnectionState)> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Start one stream per configured symbol × timeframe. Idempotent:
    /// calling `start` on a running feed does nothing. When backfill is
    /// enabled the buffers are warmed before the streams connect;
    /// failures surface on the event channel, never from this call.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("candle feed already running");
            return;
        }

        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock() = tx;

        tracing::info!(
            symbols = ?self.config.symbols,
            timeframes = ?self.config.timeframes,
            "starting candle feed"
        );

        for symbol in self.config.symbols.clone() {
            for timeframe in self.config.timeframes.clone() {
                let key = InstrumentKey::new(&symbol, timeframe);
                if self.tasks.lock().contains_key(&key) {
                    continue;
                }

                if self.config.backfill_limit > 0 {
                    self.fetch_historical_candles(&symbol, timeframe, self.config.backfill_limit)
                        .await;
                }

                let ctx = StreamContext {
                    key: key.clone(),
                    ws_url: self.config.ws_url.clone(),
                    connect_timeout: self.config.connect_timeout,
                    reconnect_delay: self.config.reconnect_delay,
                    engine: self.engine.clone(),
                    events: self.events.clone(),
                    metrics: self.metrics.clone(),
                    states: self.states.clone(),
                    shutdown: rx.clone(),
                };
                self.states.insert(key.clone(), ConnectionState::Disconnected);
                self.tasks.lock().insert(key, tokio::spawn(run_stream(ctx)));
            }
        }
    }

    /// Stop every stream and cancel every pending reconnect timer.
    /// Idempotent and terminal for the registered streams: after this
    /// returns there are zero open sockets and zero pending timers, and
    /// a close event racing with the stop cannot schedule a reconnect.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("candle feed already stopped");
            return;
        }

        let _ = self.shutdown.lock().send(true);

        let handles: Vec<(InstrumentKey, JoinHandle<()>)> =
            self.tasks.lock().drain().collect();
        for (key, mut handle) in handles {
            if timeout(STOP_GRACE, &mut handle).await.is_err() {
                handle.abort();
                let _ = handle.await;
            }
            self.states.insert(key, ConnectionState::Stopped);
        }
        tracing::info!("candle feed stopped");
    }

    /// One-shot backfill: fetch up to `limit` most recently closed
    /// candles, normalize vendor order to chronological, and replay
    /// them through the same ingestion path as live candles. Failures
    /// are reported on the event channel.
    pub async fn fetch_historical_candles(&self, symbol: &str, timeframe: Timeframe, limit: u32) {
        let key = InstrumentKey::new(symbol, timeframe);
        match self.backfill(&key, limit).await {
            Ok(count) => {
                tracing::info!(key = %key, count, "historical candles loaded");
                if self
                    .events
                    .send(FeedEvent::BackfillCompleted { key, count })
                    .await
                    .is_err()
                {
                    tracing::debug!("feed event receiver dropped");
                }
            }
            Err(error) => {
                tracing::warn!(key = %key, %error, "historical backfill failed");
                if self.events.send(FeedEvent::Error(error)).await.is_err() {
                    tracing::debug!("feed event receiver dropped");
                }
            }
        }
    }

    async fn backfill(&self, key: &InstrumentKey, limit: u32) -> Result<usize, FeedError> {
        let url = format!("{}/v5/market/kline", self.config.rest_url);
        let limit_value = limit.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("category", "linear"),
                ("symbol", key.symbol.as_str()),
                ("interval", key.timeframe.as_str()),
                ("limit", limit_value.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: KlineResponse = response.json().await?;
        if body.ret_code != 0 {
            return Err(FeedError::ExchangeApi {
                ret_code: body.ret_code,
                ret_msg: body.ret_msg,
            });
        }

        // The endpoint returns newest-first; replay oldest-first.
        let mut rows = body.result.map(|r| r.list).unwrap_or_default();
        rows.reverse();

        let mut count = 0;
        for row in &rows {
            let candle = protocol::parse_rest_row(row)?;
            ingest(&self.engine, &self.metrics, key, candle, false);
            count += 1;
        }
        Ok(count)
    }
}

/// The single ingestion path shared by live streams and backfill.
pub(crate) fn ingest(
    engine: &IndicatorEngine,
    metrics: &FeedMetrics,
    key: &InstrumentKey,
    candle: Candle,
    live: bool,
) -> IndicatorSnapshot {
    let snapshot = engine.add_candle(&key.symbol, key.timeframe, candle);
    if live {
        metrics.record_candle();
    } else {
        metrics.record_backfilled_candle();
    }
    snapshot
}
