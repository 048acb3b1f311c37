//! Feed-level counters exposed to the external metrics collector.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic feed counters. Cheap to update from every stream task.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    messages_received: AtomicU64,
    parse_errors: AtomicU64,
    candles_ingested: AtomicU64,
    backfilled_candles: AtomicU64,
    reconnects_scheduled: AtomicU64,
    connection_failures: AtomicU64,
    active_connections: AtomicU64,
}

impl FeedMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// One raw message arrived on a stream.
    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A message failed to parse and was dropped.
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// One candle entered the indicator engine from the live stream.
    pub fn record_candle(&self) {
        self.candles_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// One candle entered the engine from historical backfill.
    pub fn record_backfilled_candle(&self) {
        self.backfilled_candles.fetch_add(1, Ordering::Relaxed);
    }

    /// A reconnect timer was armed for a stream.
    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// A connection attempt failed or timed out.
    pub fn record_connection_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A stream reached the subscribed state.
    pub fn record_connected(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// A subscribed stream went away.
    pub fn record_disconnected(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    /// Currently subscribed stream count.
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Parse error count; test helper.
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    /// Candles ingested from the live stream.
    pub fn candles_ingested(&self) -> u64 {
        self.candles_ingested.load(Ordering::Relaxed)
    }

    /// Candles ingested via backfill.
    pub fn backfilled_candles(&self) -> u64 {
        self.backfilled_candles.load(Ordering::Relaxed)
    }

    /// Render the counters in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let series = [
            ("feed_messages_received_total", "Raw stream messages received", self.messages_received.load(Ordering::Relaxed)),
            ("feed_parse_errors_total", "Messages dropped as malformed", self.parse_errors.load(Ordering::Relaxed)),
            ("feed_candles_ingested_total", "Live candles ingested", self.candles_ingested.load(Ordering::Relaxed)),
            ("feed_backfilled_candles_total", "Historical candles replayed", self.backfilled_candles.load(Ordering::Relaxed)),
            ("feed_reconnects_scheduled_total", "Reconnect timers armed", self.reconnects_scheduled.load(Ordering::Relaxed)),
            ("feed_connection_failures_total", "Failed connection attempts", self.connection_failures.load(Ordering::Relaxed)),
        ];
        for (name, help, value) in series {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        let _ = writeln!(out, "# HELP feed_active_connections Streams currently subscribed");
        let _ = writeln!(out, "# TYPE feed_active_connections gauge");
        let _ = writeln!(
            out,
            "feed_active_connections {}",
            self.active_connections.load(Ordering::Relaxed)
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_connections_never_underflow() {
        let metrics = FeedMetrics::new();
        metrics.record_disconnected();
        assert_eq!(metrics.active_connections(), 0);
        metrics.record_connected();
        metrics.record_disconnected();
        assert_eq!(metrics.active_connections(), 0);
    }

    #[test]
    fn prometheus_rendering_lists_every_series() {
        let metrics = FeedMetrics::new();
        metrics.record_message();
        metrics.record_parse_error();
        let text = metrics.render_prometheus();
        assert!(text.contains("feed_messages_received_total 1"));
        assert!(text.contains("feed_parse_errors_total 1"));
        assert!(text.contains("feed_active_connections 0"));
    }
}
