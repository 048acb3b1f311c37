//! Metrics seam between the risk gate and the external collector.
//!
//! The gate emits counter and gauge updates through [`GateMetrics`]; it
//! does not own the collector. [`InMemoryGateMetrics`] is the default
//! recorder, keeping labeled series in memory and rendering Prometheus
//! text exposition for the gateway's `/metrics` endpoint.
//! [`NoOpGateMetrics`] exists for tests and embedded use.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use types::{GateDecision, Timeframe};

/// Sticky gates tracked for transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    /// Operator-controlled runtime kill switch
    ManualKillswitch,
    /// Global daily drawdown breach
    DailyDrawdown,
    /// Per-symbol daily drawdown breach
    SymbolDrawdown,
}

impl GateKind {
    /// Metric label for this gate.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::ManualKillswitch => "manual_killswitch",
            GateKind::DailyDrawdown => "daily_drawdown",
            GateKind::SymbolDrawdown => "symbol_drawdown",
        }
    }
}

/// Direction of a sticky-gate flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateEvent {
    /// Gate started blocking
    Activated,
    /// Gate stopped blocking
    Deactivated,
}

impl GateEvent {
    /// Metric label for this event.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateEvent::Activated => "activated",
            GateEvent::Deactivated => "deactivated",
        }
    }
}

/// Counter/gauge updates emitted by the risk gate.
///
/// Implementations must be cheap and infallible: they are called on
/// the signal hot path and on every sticky-gate state change.
pub trait GateMetrics: Send + Sync {
    /// One decision was made (accepted or rejected).
    fn record_decision(&self, timeframe: Timeframe, status: GateDecision);

    /// Today's realized PnL, globally.
    fn set_daily_drawdown(&self, pnl_usd: f64);

    /// The configured global drawdown limit (0 when unset).
    fn set_daily_drawdown_limit(&self, limit_usd: f64);

    /// Today's realized PnL for one symbol.
    fn set_symbol_drawdown(&self, symbol: &str, pnl_usd: f64);

    /// Displayed blocked state (0/1) of a global gate.
    fn set_gate_blocked(&self, gate: GateKind, blocked: bool);

    /// Displayed blocked state (0/1) of a symbol's drawdown gate.
    fn set_symbol_gate_blocked(&self, symbol: &str, blocked: bool);

    /// A sticky gate's displayed state flipped.
    fn record_gate_transition(&self, gate: GateKind, symbol: &str, event: GateEvent);

    /// Combined kill state (manual switch or global drawdown breach).
    fn set_kill_switch(&self, active: bool);
}

/// Recorder that ignores everything.
#[derive(Debug, Default)]
pub struct NoOpGateMetrics;

impl GateMetrics for NoOpGateMetrics {
    fn record_decision(&self, _timeframe: Timeframe, _status: GateDecision) {}
    fn set_daily_drawdown(&self, _pnl_usd: f64) {}
    fn set_daily_drawdown_limit(&self, _limit_usd: f64) {}
    fn set_symbol_drawdown(&self, _symbol: &str, _pnl_usd: f64) {}
    fn set_gate_blocked(&self, _gate: GateKind, _blocked: bool) {}
    fn set_symbol_gate_blocked(&self, _symbol: &str, _blocked: bool) {}
    fn record_gate_transition(&self, _gate: GateKind, _symbol: &str, _event: GateEvent) {}
    fn set_kill_switch(&self, _active: bool) {}
}

/// Default in-memory recorder with Prometheus text export.
#[derive(Debug, Default)]
pub struct InMemoryGateMetrics {
    decisions: Mutex<HashMap<(Timeframe, &'static str), u64>>,
    transitions: Mutex<HashMap<(&'static str, String, &'static str), u64>>,
    daily_drawdown: Mutex<f64>,
    daily_drawdown_limit: Mutex<f64>,
    symbol_drawdown: Mutex<HashMap<String, f64>>,
    gate_blocked: Mutex<HashMap<&'static str, bool>>,
    symbol_gate_blocked: Mutex<HashMap<String, bool>>,
    kill_switch: AtomicBool,
}

impl InMemoryGateMetrics {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter value for one (timeframe, status) pair; test helper.
    pub fn decision_count(&self, timeframe: Timeframe, status: GateDecision) -> u64 {
        self.decisions
            .lock()
            .get(&(timeframe, status.as_str()))
            .copied()
            .unwrap_or(0)
    }

    /// Transition counter for one (gate, symbol, event) triple.
    pub fn transition_count(&self, gate: GateKind, symbol: &str, event: GateEvent) -> u64 {
        self.transitions
            .lock()
            .get(&(gate.as_str(), symbol.to_string(), event.as_str()))
            .copied()
            .unwrap_or(0)
    }

    /// Render every series in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP signals_processed_total Gate decisions by timeframe and status\n");
        out.push_str("# TYPE signals_processed_total counter\n");
        let mut decisions: Vec<_> = self
            .decisions
            .lock()
            .iter()
            .map(|((tf, status), count)| (tf.as_str(), *status, *count))
            .collect();
        decisions.sort();
        for (tf, status, count) in decisions {
            let _ = writeln!(
                out,
                "signals_processed_total{{timeframe=\"{tf}\",status=\"{status}\"}} {count}"
            );
        }

        out.push_str("# HELP risk_daily_drawdown_usd Realized PnL today (UTC)\n");
        out.push_str("# TYPE risk_daily_drawdown_usd gauge\n");
        let _ = writeln!(out, "risk_daily_drawdown_usd {}", *self.daily_drawdown.lock());
        let mut by_symbol: Vec<_> = self
            .symbol_drawdown
            .lock()
            .iter()
            .map(|(s, v)| (s.clone(), *v))
            .collect();
        by_symbol.sort_by(|a, b| a.0.cmp(&b.0));
        for (symbol, value) in by_symbol {
            let _ = writeln!(out, "risk_daily_drawdown_usd{{symbol=\"{symbol}\"}} {value}");
        }

        out.push_str("# HELP risk_daily_drawdown_limit_usd Configured daily drawdown limit\n");
        out.push_str("# TYPE risk_daily_drawdown_limit_usd gauge\n");
        let _ = writeln!(
            out,
            "risk_daily_drawdown_limit_usd {}",
            *self.daily_drawdown_limit.lock()
        );

        out.push_str("# HELP risk_gate_blocked Displayed gate state (1 = blocking)\n");
        out.push_str("# TYPE risk_gate_blocked gauge\n");
        let mut gates: Vec<_> = self
            .gate_blocked
            .lock()
            .iter()
            .map(|(g, b)| (*g, *b))
            .collect();
        gates.sort();
        for (gate, blocked) in gates {
            let _ = writeln!(
                out,
                "risk_gate_blocked{{type=\"{gate}\"}} {}",
                blocked as u8
            );
        }
        let mut symbol_gates: Vec<_> = self
            .symbol_gate_blocked
            .lock()
            .iter()
            .map(|(s, b)| (s.clone(), *b))
            .collect();
        symbol_gates.sort_by(|a, b| a.0.cmp(&b.0));
        for (symbol, blocked) in symbol_gates {
            let _ = writeln!(
                out,
                "risk_gate_blocked_by_symbol{{symbol=\"{symbol}\"}} {}",
                blocked as u8
            );
        }

        out.push_str("# HELP risk_gate_transitions_total Sticky gate state flips\n");
        out.push_str("# TYPE risk_gate_transitions_total counter\n");
        let mut transitions: Vec<_> = self
            .transitions
            .lock()
            .iter()
            .map(|((gate, symbol, event), count)| (*gate, symbol.clone(), *event, *count))
            .collect();
        transitions.sort();
        for (gate, symbol, event, count) in transitions {
            let _ = writeln!(
                out,
                "risk_gate_transitions_total{{gate=\"{gate}\",symbol=\"{symbol}\",event=\"{event}\"}} {count}"
            );
        }

        out.push_str("# HELP risk_kill_switch Combined kill state (manual or drawdown)\n");
        out.push_str("# TYPE risk_kill_switch gauge\n");
        let _ = writeln!(
            out,
            "risk_kill_switch {}",
            self.kill_switch.load(Ordering::Relaxed) as u8
        );

        out
    }
}

impl GateMetrics for InMemoryGateMetrics {
    fn record_decision(&self, timeframe: Timeframe, status: GateDecision) {
        *self
            .decisions
            .lock()
            .entry((timeframe, status.as_str()))
            .or_insert(0) += 1;
    }

    fn set_daily_drawdown(&self, pnl_usd: f64) {
        *self.daily_drawdown.lock() = pnl_usd;
    }

    fn set_daily_drawdown_limit(&self, limit_usd: f64) {
        *self.daily_drawdown_limit.lock() = limit_usd;
    }

    fn set_symbol_drawdown(&self, symbol: &str, pnl_usd: f64) {
        self.symbol_drawdown
            .lock()
            .insert(symbol.to_string(), pnl_usd);
    }

    fn set_gate_blocked(&self, gate: GateKind, blocked: bool) {
        self.gate_blocked.lock().insert(gate.as_str(), blocked);
    }

    fn set_symbol_gate_blocked(&self, symbol: &str, blocked: bool) {
        self.symbol_gate_blocked
            .lock()
            .insert(symbol.to_string(), blocked);
    }

    fn record_gate_transition(&self, gate: GateKind, symbol: &str, event: GateEvent) {
        *self
            .transitions
            .lock()
            .entry((gate.as_str(), symbol.to_string(), event.as_str()))
            .or_insert(0) += 1;
    }

    fn set_kill_switch(&self, active: bool) {
        self.kill_switch.store(active, Ordering::Relaxed);
    }
}
