//! Versioned risk configuration published by operators.
//!
//! A `RuleConfig` is immutable once published: the store swaps an `Arc`
//! pointer and appends to history, it never edits a config in place.
//! Field names follow the JSON wire format of the publish/validate API.

use crate::Timeframe;
use serde::{Deserialize, Serialize};

/// Risk limits carried by a [`RuleConfig`].
///
/// Optional fields keep their absence observable so the validator can
/// warn about implied defaults instead of silently filling them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RiskLimits {
    /// Maximum signals allowed in flight at once; must be > 0
    pub max_concurrent_signals: u32,
    /// Minimum risk:reward ratio; must be >= 0
    pub rr_min: f64,
    /// Global kill switch: when `true`, every signal is rejected
    pub kill_switch: bool,
    /// Minimum spacing between accepted signals for the same
    /// (symbol, timeframe), in seconds; absent means 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<i64>,
    /// Cooldown expressed in candle counts of the signal's timeframe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_candles: Option<i64>,
    /// Cap on accepted signals per (symbol, timeframe) per UTC day;
    /// absent means unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_signals_per_day: Option<i64>,
}

/// A validated, versioned risk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleConfig {
    /// Wire schema version; currently always 1
    pub schema_version: u32,
    /// Operator-assigned name for this revision
    pub name: String,
    /// RFC 3339 timestamp from which the config is meant to apply
    pub effective_at: String,
    /// Timeframes this config enables
    pub timeframes: Vec<Timeframe>,
    /// Symbols this config enables; empty means nothing is enabled
    pub symbols: Vec<String>,
    /// Risk limits
    pub risk: RiskLimits,
    /// Optional timeframe ranking, highest priority first; must be a
    /// subset of `timeframes`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precedence: Option<Vec<Timeframe>>,
}

impl RuleConfig {
    /// The inert configuration active before any publish: no symbols
    /// enabled, every timeframe allowed, conservative limits, kill
    /// switch off. With no symbols, nothing downstream actually fires
    /// until an operator publishes a real config.
    pub fn inert_default() -> Self {
        Self {
            schema_version: 1,
            name: "default-inert".to_string(),
            effective_at: "1970-01-01T00:00:00Z".to_string(),
            timeframes: Timeframe::ALL.to_vec(),
            symbols: Vec::new(),
            risk: RiskLimits {
                max_concurrent_signals: 1,
                rr_min: 0.0,
                kill_switch: false,
                cooldown_seconds: None,
                cooldown_candles: None,
                max_signals_per_day: None,
            },
            precedence: None,
        }
    }

    /// Effective precedence ranking: the configured list when present
    /// and non-empty, otherwise [`crate::DEFAULT_PRECEDENCE`].
    pub fn effective_precedence(&self) -> &[Timeframe] {
        match &self.precedence {
            Some(list) if !list.is_empty() => list,
            _ => &crate::DEFAULT_PRECEDENCE,
        }
    }
}
