//! Error types for the feed service.

use types::InstrumentKey;

/// Result alias for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors surfaced by the candle feed.
///
/// These travel over the feed's event channel; the transport itself
/// recovers (reconnects, drops the bad message) rather than failing.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Connection could not be established
    #[error("connection failed for {key}: {reason}")]
    ConnectionFailed {
        /// The stream that failed to connect
        key: InstrumentKey,
        /// Underlying error message
        reason: String,
    },

    /// Connection attempt exceeded the configured timeout
    #[error("connection timeout for {key} after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The stream that timed out
        key: InstrumentKey,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Socket-level failure on an established stream
    #[error("websocket error for {key}: {reason}")]
    WebSocket {
        /// The stream that errored
        key: InstrumentKey,
        /// Underlying error message
        reason: String,
    },

    /// Subscription was rejected by the venue
    #[error("subscription rejected for {key}: {reason}")]
    SubscriptionRejected {
        /// The stream whose subscribe failed
        key: InstrumentKey,
        /// Venue-provided reason, when present
        reason: String,
    },

    /// A message did not match the expected kline wire format
    #[error("malformed feed message: {0}")]
    Parse(String),

    /// Backfill HTTP request failed
    #[error("backfill request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backfill endpoint answered with a vendor-level error
    #[error("exchange api error {ret_code}: {ret_msg}")]
    ExchangeApi {
        /// Vendor return code
        ret_code: i64,
        /// Vendor message
        ret_msg: String,
    },
}
