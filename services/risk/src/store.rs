//! Validated, versioned rule configuration store.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use types::RuleConfig;

/// Result of validating a candidate configuration.
///
/// Errors are collected, not fail-fast: a candidate violating several
/// invariants reports all of them in one round trip.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Violated invariants; empty means the candidate is acceptable
    pub errors: Vec<String>,
    /// Non-fatal advisories about implied defaults
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// `true` when no invariant was violated.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Returned by a successful publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// RFC 3339 timestamp at which the config became active
    pub applied_at: String,
    /// Advisories carried over from validation
    pub warnings: Vec<String>,
}

/// Store holding the active [`RuleConfig`] pointer and the append-only
/// publish history.
///
/// Single-writer, multi-reader: concurrent publishes are serialized so
/// the history append and the pointer swap stay consistent, while
/// `active()` is a lock-read and an `Arc` clone. Before the first
/// publish the store answers with an inert default that enables nothing.
pub struct RuleConfigStore {
    active: RwLock<Arc<RuleConfig>>,
    history: RwLock<Vec<Arc<RuleConfig>>>,
    publish_lock: Mutex<()>,
    audit_path: Option<PathBuf>,
}

impl RuleConfigStore {
    /// Create a store. When `audit_path` is set, every accepted publish
    /// is appended there as one JSON line (best-effort).
    pub fn new(audit_path: Option<PathBuf>) -> Self {
        Self {
            active: RwLock::new(Arc::new(RuleConfig::inert_default())),
            history: RwLock::new(Vec::new()),
            publish_lock: Mutex::new(()),
            audit_path,
        }
    }

    /// Check domain invariants and compute advisory warnings.
    ///
    /// Structural shape is already enforced by the serde decode at the
    /// API boundary; this covers everything the type system cannot.
    pub fn validate(&self, cfg: &RuleConfig) -> ValidationOutcome {
        let mut out = ValidationOutcome::default();

        if let Some(precedence) = &cfg.precedence {
            for tf in precedence {
                if !cfg.timeframes.contains(tf) {
                    out.errors.push(format!(
                        "precedence contains timeframe not present in timeframes: {tf}"
                    ));
                }
            }
        }
        if let Some(seconds) = cfg.risk.cooldown_seconds {
            if seconds < 0 {
                out.errors.push("cooldownSeconds must be >= 0".to_string());
            }
        }
        if let Some(candles) = cfg.risk.cooldown_candles {
            if candles < 0 {
                out.errors.push("cooldownCandles must be >= 0".to_string());
            }
        }
        if cfg.risk.max_concurrent_signals == 0 {
            out.errors
                .push("maxConcurrentSignals must be > 0".to_string());
        }
        if !(cfg.risk.rr_min >= 0.0) {
            out.errors.push("rrMin must be >= 0".to_string());
        }
        if let Some(per_day) = cfg.risk.max_signals_per_day {
            if per_day < 0 {
                out.errors.push("maxSignalsPerDay must be >= 0".to_string());
            }
        }
        if cfg.timeframes.is_empty() {
            out.errors.push("timeframes must not be empty".to_string());
        }
        if cfg.symbols.is_empty() {
            out.errors.push("symbols must not be empty".to_string());
        }
        if DateTime::parse_from_rfc3339(&cfg.effective_at).is_err() {
            out.errors
                .push("effectiveAt is not a valid RFC 3339 datetime".to_string());
        }

        out.warnings = compute_warnings(cfg);
        out
    }

    /// Validate and, on success, atomically activate the candidate:
    /// swap the active pointer, append to history, and best-effort
    /// persist an audit record. A persistence failure does not fail the
    /// publish: the in-memory pointer is authoritative.
    pub fn publish(&self, cfg: RuleConfig) -> Result<PublishReceipt, Vec<String>> {
        let outcome = self.validate(&cfg);
        if !outcome.is_ok() {
            tracing::warn!(errors = ?outcome.errors, "rule config rejected");
            return Err(outcome.errors);
        }

        let applied_at = Utc::now().to_rfc3339();
        let accepted = Arc::new(cfg);
        {
            let _publishing = self.publish_lock.lock();
            *self.active.write() = accepted.clone();
            self.history.write().push(accepted.clone());
        }

        self.append_audit(&applied_at, &accepted);
        tracing::info!(name = %accepted.name, %applied_at, "rule config accepted and activated");

        Ok(PublishReceipt {
            applied_at,
            warnings: outcome.warnings,
        })
    }

    /// The active configuration, or the inert default before any publish.
    pub fn active(&self) -> Arc<RuleConfig> {
        self.active.read().clone()
    }

    /// The most recent `limit` accepted configs in publish order, or the
    /// full history when `limit` is absent or zero.
    pub fn history(&self, limit: Option<usize>) -> Vec<Arc<RuleConfig>> {
        let history = self.history.read();
        match limit {
            Some(n) if n > 0 && n < history.len() => history[history.len() - n..].to_vec(),
            _ => history.clone(),
        }
    }

    /// Number of accepted publishes so far.
    pub fn published_count(&self) -> usize {
        self.history.read().len()
    }

    fn append_audit(&self, applied_at: &str, cfg: &RuleConfig) {
        let Some(path) = &self.audit_path else {
            return;
        };
        let line = json!({ "appliedAt": applied_at, "config": cfg });
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(error) = result {
            tracing::warn!(%error, path = %path.display(), "failed to persist rule config audit record (ignored)");
        }
    }
}

fn compute_warnings(cfg: &RuleConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if cfg.precedence.as_ref().map_or(true, |p| p.is_empty()) {
        warnings.push(
            "precedence not set: using default ranking 4h > 1h > 15m > 5m > 3m > 1m".to_string(),
        );
    }
    if cfg.risk.cooldown_seconds.is_none() && cfg.risk.cooldown_candles.is_none() {
        warnings.push("cooldown not set (neither seconds nor candles): applying 0".to_string());
    }
    if cfg.risk.max_signals_per_day.is_none() {
        warnings.push("maxSignalsPerDay not set: no daily signal limit".to_string());
    }
    if cfg.symbols.is_empty() {
        warnings.push("symbols is empty: no target symbols enabled".to_string());
    }
    warnings
}

/// Raw JSON Schema document describing the RuleConfig wire shape,
/// served verbatim by the rules API. Stored inline.
pub static RULE_CONFIG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let timeframes = json!(["1m", "3m", "5m", "10m", "15m", "1h", "4h"]);
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "RuleConfig",
        "type": "object",
        "additionalProperties": false,
        "required": ["schemaVersion", "name", "effectiveAt", "timeframes", "symbols", "risk"],
        "properties": {
            "schemaVersion": { "const": 1 },
            "name": { "type": "string", "minLength": 1 },
            "effectiveAt": { "type": "string", "format": "date-time" },
            "timeframes": {
                "type": "array",
                "items": { "enum": timeframes },
                "minItems": 1
            },
            "symbols": {
                "type": "array",
                "items": { "type": "string" }
            },
            "risk": {
                "type": "object",
                "additionalProperties": false,
                "required": ["maxConcurrentSignals", "rrMin", "killSwitch"],
                "properties": {
                    "maxConcurrentSignals": { "type": "integer", "minimum": 1 },
                    "rrMin": { "type": "number", "minimum": 0 },
                    "killSwitch": { "type": "boolean" },
                    "cooldownSeconds": { "type": "integer", "minimum": 0 },
                    "cooldownCandles": { "type": "integer", "minimum": 0 },
                    "maxSignalsPerDay": { "type": "integer", "minimum": 0 }
                }
            },
            "precedence": {
                "type": "array",
                "items": { "enum": timeframes }
            }
        }
    })
});
