//! Candle bucket durations supported by the exchange feed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported candle timeframes.
///
/// The serialized form matches the exchange topic segments and the
/// RuleConfig wire format (`"1m"`, `"4h"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// One minute
    #[serde(rename = "1m")]
    M1,
    /// Three minutes
    #[serde(rename = "3m")]
    M3,
    /// Five minutes
    #[serde(rename = "5m")]
    M5,
    /// Ten minutes
    #[serde(rename = "10m")]
    M10,
    /// Fifteen minutes
    #[serde(rename = "15m")]
    M15,
    /// One hour
    #[serde(rename = "1h")]
    H1,
    /// Four hours
    #[serde(rename = "4h")]
    H4,
}

/// Default timeframe precedence, highest priority first.
///
/// Used whenever a RuleConfig does not carry an explicit `precedence`
/// list. Note that `10m` is intentionally absent: the observed ranking
/// is `4h > 1h > 15m > 5m > 3m > 1m`, so ten-minute signals are blocked
/// under the default ranking until an operator publishes one that
/// includes them.
pub const DEFAULT_PRECEDENCE: [Timeframe; 6] = [
    Timeframe::H4,
    Timeframe::H1,
    Timeframe::M15,
    Timeframe::M5,
    Timeframe::M3,
    Timeframe::M1,
];

impl Timeframe {
    /// All supported timeframes, shortest first.
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M10,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
    ];

    /// Wire representation (`"1m"`, `"4h"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M10 => "10m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
        }
    }

    /// Bucket duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M3 => 180_000,
            Timeframe::M5 => 300_000,
            Timeframe::M10 => 600_000,
            Timeframe::M15 => 900_000,
            Timeframe::H1 => 3_600_000,
            Timeframe::H4 => 14_400_000,
        }
    }

}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown timeframe string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(pub String);

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "10m" => Ok(Timeframe::M10),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_str() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn serde_uses_wire_form() {
        let json = serde_json::to_string(&Timeframe::M15).unwrap();
        assert_eq!(json, "\"15m\"");
        let tf: Timeframe = serde_json::from_str("\"4h\"").unwrap();
        assert_eq!(tf, Timeframe::H4);
    }

    #[test]
    fn default_precedence_is_longest_first() {
        assert_eq!(DEFAULT_PRECEDENCE[0], Timeframe::H4);
        assert_eq!(DEFAULT_PRECEDENCE[5], Timeframe::M1);
        // 10m is deliberately not ranked by default.
        assert!(!DEFAULT_PRECEDENCE.contains(&Timeframe::M10));
    }

    #[test]
    fn durations_are_increasing() {
        let mut prev = 0;
        for tf in Timeframe::ALL {
            assert!(tf.duration_ms() > prev);
            prev = tf.duration_ms();
        }
    }
}
