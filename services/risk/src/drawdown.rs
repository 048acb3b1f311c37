//! Daily realized-PnL tracking and sticky drawdown gates.
//!
//! The tracker sums realized PnL per UTC day, globally and per symbol.
//! Once a configured limit is breached the corresponding gate latches
//! and stays blocked for the rest of the day: it is not re-derived per
//! signal, so a recovering PnL does not silently reopen trading. The
//! latch clears on UTC day rollover or an explicit reset.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A closed trade reported to the PnL ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// Exchange symbol
    pub symbol: String,
    /// Realized profit/loss in USD (negative for losses)
    pub realized_pnl_usd: f64,
    /// RFC 3339 close time; determines which UTC day the PnL lands on
    pub closed_at: String,
}

/// Configured drawdown limits, in USD. `None` disables a gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownLimits {
    /// Global daily limit
    pub global_usd: Option<f64>,
    /// Uniform per-symbol daily limit
    pub per_symbol_usd: Option<f64>,
}

/// Snapshot of the drawdown state for the status API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownStatus {
    /// Today's global realized PnL in USD
    pub pnl_today_usd: f64,
    /// Configured global limit, if any
    pub limit_usd: Option<f64>,
    /// Whether the global gate is latched
    pub daily_drawdown_blocked: bool,
    /// Today's PnL per symbol
    pub pnl_today_by_symbol_usd: HashMap<String, f64>,
    /// Symbols whose per-symbol gate is latched
    pub blocked_symbols: Vec<String>,
}

/// Per-day PnL sums and sticky breach latches.
#[derive(Debug, Default)]
pub struct DrawdownTracker {
    day: String,
    pnl_today: f64,
    pnl_today_by_symbol: HashMap<String, f64>,
    limits: DrawdownLimits,
    global_latched: bool,
    latched_symbols: HashSet<String>,
}

impl DrawdownTracker {
    /// Create a tracker with the given limits.
    pub fn new(limits: DrawdownLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Advance to `day`, clearing sums and latches when the day changed.
    pub fn roll_to(&mut self, day: &str) {
        if self.day != day {
            self.day = day.to_string();
            self.pnl_today = 0.0;
            self.pnl_today_by_symbol.clear();
            self.global_latched = false;
            self.latched_symbols.clear();
        }
    }

    /// Fold a realized trade into the day it closed on. Trades from a
    /// day other than the tracker's current one are ignored: only the
    /// current UTC day participates in the gates.
    pub fn record(&mut self, symbol: &str, pnl_usd: f64, day: &str) {
        if self.day != day {
            return;
        }
        self.pnl_today += pnl_usd;
        *self
            .pnl_today_by_symbol
            .entry(symbol.to_string())
            .or_insert(0.0) += pnl_usd;
        self.relatch();
    }

    /// Replace the limits and re-check the latches against today's sums.
    /// Raising a limit does not unlatch: the latch stays sticky until
    /// rollover or reset.
    pub fn set_limits(&mut self, limits: DrawdownLimits) {
        self.limits = limits;
        self.relatch();
    }

    /// Configured limits.
    pub fn limits(&self) -> DrawdownLimits {
        self.limits
    }

    /// Manually clear every latch (operator reset).
    pub fn reset_latches(&mut self) {
        self.global_latched = false;
        self.latched_symbols.clear();
    }

    /// Whether the global drawdown gate is blocking.
    pub fn global_blocked(&self) -> bool {
        self.global_latched
    }

    /// Whether a symbol's drawdown gate is blocking.
    pub fn symbol_blocked(&self, symbol: &str) -> bool {
        self.latched_symbols.contains(symbol)
    }

    /// Today's global realized PnL.
    pub fn pnl_today(&self) -> f64 {
        self.pnl_today
    }

    /// Today's realized PnL per symbol.
    pub fn pnl_by_symbol(&self) -> &HashMap<String, f64> {
        &self.pnl_today_by_symbol
    }

    /// Status snapshot for the API.
    pub fn status(&self) -> DrawdownStatus {
        let mut blocked: Vec<String> = self.latched_symbols.iter().cloned().collect();
        blocked.sort();
        DrawdownStatus {
            pnl_today_usd: self.pnl_today,
            limit_usd: self.limits.global_usd,
            daily_drawdown_blocked: self.global_latched,
            pnl_today_by_symbol_usd: self.pnl_today_by_symbol.clone(),
            blocked_symbols: blocked,
        }
    }

    fn relatch(&mut self) {
        if let Some(limit) = self.limits.global_usd {
            if limit > 0.0 && self.pnl_today <= -limit {
                self.global_latched = true;
            }
        }
        if let Some(limit) = self.limits.per_symbol_usd {
            if limit > 0.0 {
                for (symbol, pnl) in &self.pnl_today_by_symbol {
                    if *pnl <= -limit {
                        self.latched_symbols.insert(symbol.clone());
                    }
                }
            }
        }
    }
}
