//! # Candle Feed Service
//!
//! Resilient streaming client for exchange kline data. Opens one
//! WebSocket stream per (symbol, timeframe) in the configured cartesian
//! product, normalizes vendor messages into [`types::Candle`]s, and
//! drives the [`indicators::IndicatorEngine`] so every closed candle
//! yields a fresh snapshot for the strategy layer.
//!
//! ## Resilience model
//!
//! Each key runs its own task owning its socket and its reconnect timer:
//!
//! ```text
//! Disconnected → Connecting → (subscribe) → Subscribed
//!        ▲                                      │ close/error
//!        └────────── fixed-delay timer ◄────────┘
//! ```
//!
//! `stop()` flips a shutdown signal that cancels pending reconnect
//! sleeps and tears down every socket; a close event racing with the
//! stop never schedules a new timer. A malformed message is logged,
//! counted and dropped: one bad message never kills a stream. Consumer
//! processing happens on the other side of an event channel, so a slow
//! or failing consumer cannot poison the transport loop.
//!
//! Historical backfill fetches the most recently closed candles over
//! REST, reverses the vendor's newest-first order, and replays them
//! through the same ingestion path as live candles so buffers are warm
//! before live traffic arrives. Backfill failures surface as
//! [`FeedEvent::Error`] values, never as panics.

pub mod connection;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod protocol;

pub use connection::ConnectionState;
pub use error::FeedError;
pub use feed::{CandleFeed, FeedConfig, FeedEvent};
pub use metrics::FeedMetrics;
