//! # Indicator Engine
//!
//! Pure, in-memory technical indicator computation over bounded candle
//! buffers, one buffer per (symbol, timeframe) key.
//!
//! ## Design
//!
//! - The engine exclusively owns its buffer map. Mutation happens
//!   synchronously inside `add_candle`/`clear*`; the map uses per-entry
//!   locking so distinct keys can be fed from different connections in
//!   parallel while a single key is always serialized.
//! - Buffers are append-only and bounded: once a buffer exceeds
//!   `max_period + margin` candles the oldest entries are evicted. The
//!   engine trusts the feed's ordering and appends exactly what it is
//!   given: duplicate or out-of-order timestamps are kept as-is (a
//!   regression is logged at debug level, never rejected).
//! - Snapshots are recomputed from the buffer on every call and never
//!   stored, so there is no incremental state to drift.
//!
//! ## Numeric compatibility
//!
//! The formulas in [`calc`] intentionally reproduce the behavior of the
//! production system this engine feeds, including two documented
//! deviations from textbook definitions (ATR over the oldest window,
//! MACD signal line approximated from trailing sub-windows). Do not
//! "fix" them here; downstream consumers are calibrated against these
//! values.

pub mod calc;
pub mod engine;

pub use engine::{IndicatorConfig, IndicatorEngine};
