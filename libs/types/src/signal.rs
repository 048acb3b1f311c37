//! Candidate signals and risk gate decisions.

use crate::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a candidate signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Long entry
    Buy,
    /// Short entry
    Sell,
}

/// A candidate trading signal produced by the strategy layer.
///
/// The risk gate consumes these; it never constructs them. `timestamp`
/// is the close time of the candle that triggered the signal, in
/// milliseconds since epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    /// Exchange symbol
    pub symbol: String,
    /// Timeframe the signal fired on
    pub timeframe: Timeframe,
    /// Trade direction
    pub side: Side,
    /// Expected risk:reward ratio
    pub rr: f64,
    /// Name of the strategy that produced the signal
    pub strategy_name: String,
    /// Triggering candle close time (ms since epoch)
    pub timestamp: i64,
}

/// Outcome of a risk gate evaluation.
///
/// Rejection is data, not an error: every call to the gate terminates in
/// one of these values, and the variant names double as the `status`
/// label on the decision counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Accepted; the gate's running counters were updated
    Ok,
    /// Global or per-symbol kill switch active
    Killswitch,
    /// Daily drawdown limit breached (sticky until day rollover or reset)
    Drawdown,
    /// A higher-precedence timeframe wins for this symbol, or the
    /// timeframe is not ranked at all
    BlockedPrecedence,
    /// Prior accepted signal for the same key is inside the cooldown
    Cooldown,
    /// `rr` below the configured minimum
    RrMin,
    /// Open signal count at the concurrency limit
    MaxConcurrent,
    /// Daily accepted count at the configured limit
    MaxDaily,
    /// Identical signal already accepted within the dedup window
    Dedup,
}

impl GateDecision {
    /// `true` only for [`GateDecision::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, GateDecision::Ok)
    }

    /// Metric label for this decision.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateDecision::Ok => "ok",
            GateDecision::Killswitch => "killswitch",
            GateDecision::Drawdown => "drawdown",
            GateDecision::BlockedPrecedence => "blocked_precedence",
            GateDecision::Cooldown => "cooldown",
            GateDecision::RrMin => "rr_min",
            GateDecision::MaxConcurrent => "max_concurrent",
            GateDecision::MaxDaily => "max_daily",
            GateDecision::Dedup => "dedup",
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_wire_format_is_camel_case() {
        let signal = Signal {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::M1,
            side: Side::Buy,
            rr: 2.0,
            strategy_name: "rsi-reversal".to_string(),
            timestamp: 1_700_000_060_000,
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["strategyName"], "rsi-reversal");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["timeframe"], "1m");
    }

    #[test]
    fn decision_labels_match_metric_statuses() {
        assert_eq!(GateDecision::BlockedPrecedence.as_str(), "blocked_precedence");
        assert_eq!(GateDecision::RrMin.as_str(), "rr_min");
        assert!(GateDecision::Ok.is_ok());
        assert!(!GateDecision::Dedup.is_ok());
    }
}
