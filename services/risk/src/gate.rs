//! The stateful risk gate.
//!
//! `evaluate` combines the store's active [`types::RuleConfig`] with the
//! gate's own running counters. Checks run in a fixed order and the
//! first failing check is the decision: the order encodes the priority
//! policy, so a signal violating several limits always reports the
//! highest-priority reason:
//!
//! 1. killswitch (config flag or runtime manual switch)
//! 2. drawdown (sticky daily latch, global or per-symbol)
//! 3. blocked_precedence
//! 4. cooldown (seconds or candles)
//! 5. rr_min
//! 6. max_concurrent
//! 7. max_daily
//! 8. dedup
//!
//! Accepting a signal mutates the per-key last-accepted time, the
//! concurrency window, the daily counter and the dedup registry. The
//! gate never returns an error from `evaluate`: rejection is data.

use crate::audit::{AuditLog, GateAuditEvent};
use crate::drawdown::{DrawdownLimits, DrawdownStatus, DrawdownTracker, TradeRecord};
use crate::metrics::{GateEvent, GateKind, GateMetrics};
use crate::store::RuleConfigStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use types::{GateDecision, InstrumentKey, RuleConfig, Signal, Timeframe};

/// Errors from the gate's auxiliary inputs. `evaluate` itself never
/// fails.
#[derive(Debug, thiserror::Error)]
pub enum RiskGateError {
    /// A trade record carried an unparseable close time
    #[error("invalid trade close time: {0}")]
    InvalidCloseTime(String),
}

#[derive(Default)]
struct DisplayedGates {
    manual: bool,
    daily: bool,
    symbols: HashMap<String, bool>,
}

#[derive(Default)]
struct GateState {
    manual_kill_switch: bool,
    drawdown: DrawdownTracker,
    /// Last accepted time per (symbol, timeframe), ms since epoch
    last_accepted: HashMap<InstrumentKey, i64>,
    /// Accepted timestamps per timeframe, purged to the concurrency window
    accepted_window: HashMap<Timeframe, Vec<i64>>,
    /// Accepted count per "symbol:tf:YYYY-MM-DD"
    daily_counts: HashMap<String, i64>,
    /// Identity key -> (accepted at, window ms)
    dedup: HashMap<String, (i64, i64)>,
    displayed: DisplayedGates,
}

/// Stateful decision function gating candidate signals.
pub struct RiskGate {
    store: Arc<RuleConfigStore>,
    metrics: Arc<dyn GateMetrics>,
    audit: AuditLog,
    state: Mutex<GateState>,
}

impl RiskGate {
    /// Create a gate reading its active config from `store`, driving
    /// `metrics`, persisting gate transitions to `audit_path` (best
    /// effort) and starting with the given drawdown limits.
    pub fn new(
        store: Arc<RuleConfigStore>,
        metrics: Arc<dyn GateMetrics>,
        audit_path: Option<PathBuf>,
        limits: DrawdownLimits,
    ) -> Self {
        Self {
            store,
            metrics,
            audit: AuditLog::new(audit_path),
            state: Mutex::new(GateState {
                drawdown: DrawdownTracker::new(limits),
                ..GateState::default()
            }),
        }
    }

    /// Evaluate a candidate signal against the active config, now.
    pub fn evaluate(&self, signal: &Signal) -> GateDecision {
        self.evaluate_at(signal, Utc::now().timestamp_millis())
    }

    /// Deterministic evaluation with an explicit clock, used for replay
    /// and tests. `now_ms` is milliseconds since the Unix epoch.
    pub fn evaluate_at(&self, signal: &Signal, now_ms: i64) -> GateDecision {
        let cfg = self.store.active();
        let day = utc_day_key(now_ms);

        let mut state = self.state.lock();
        state.drawdown.roll_to(&day);
        state.dedup.retain(|_, (accepted, window)| now_ms - *accepted < *window);
        state.daily_counts.retain(|key, _| key.ends_with(&day));

        let decision = decide(&cfg, &mut state, signal, now_ms);
        if decision.is_ok() {
            mark_accepted(&cfg, &mut state, signal, now_ms);
            tracing::debug!(
                symbol = %signal.symbol,
                timeframe = %signal.timeframe,
                strategy = %signal.strategy_name,
                "signal accepted"
            );
        } else {
            tracing::debug!(
                symbol = %signal.symbol,
                timeframe = %signal.timeframe,
                reason = %decision,
                "signal rejected"
            );
        }

        self.metrics.record_decision(signal.timeframe, decision);
        self.refresh_gates(&mut state);
        decision
    }

    /// Flip the runtime manual kill switch.
    pub fn set_manual_kill_switch(&self, active: bool) {
        let mut state = self.state.lock();
        state.manual_kill_switch = active;
        self.refresh_gates(&mut state);
    }

    /// Current manual kill switch state.
    pub fn manual_kill_switch(&self) -> bool {
        self.state.lock().manual_kill_switch
    }

    /// Fold a closed trade into the PnL ledger. The trade lands on the
    /// UTC day of its close time; breaching a limit latches the
    /// corresponding sticky gate.
    pub fn record_trade(&self, trade: &TradeRecord) -> Result<(), RiskGateError> {
        let closed = DateTime::parse_from_rfc3339(&trade.closed_at)
            .map_err(|_| RiskGateError::InvalidCloseTime(trade.closed_at.clone()))?;
        let trade_day = closed.with_timezone(&Utc).format("%Y-%m-%d").to_string();
        let today = utc_day_key(Utc::now().timestamp_millis());

        let mut state = self.state.lock();
        state.drawdown.roll_to(&today);
        state
            .drawdown
            .record(&trade.symbol, trade.realized_pnl_usd, &trade_day);
        self.refresh_gates(&mut state);
        Ok(())
    }

    /// Replace the drawdown limits at runtime.
    pub fn set_drawdown_limits(&self, limits: DrawdownLimits) {
        let mut state = self.state.lock();
        state.drawdown.set_limits(limits);
        self.refresh_gates(&mut state);
    }

    /// Configured drawdown limits.
    pub fn drawdown_limits(&self) -> DrawdownLimits {
        self.state.lock().drawdown.limits()
    }

    /// Drawdown status snapshot for the API, rolled to today.
    pub fn drawdown_status(&self) -> DrawdownStatus {
        let today = utc_day_key(Utc::now().timestamp_millis());
        let mut state = self.state.lock();
        state.drawdown.roll_to(&today);
        self.refresh_gates(&mut state);
        state.drawdown.status()
    }

    /// Operator reset of every sticky drawdown latch.
    pub fn reset_drawdown(&self) {
        let mut state = self.state.lock();
        state.drawdown.reset_latches();
        self.refresh_gates(&mut state);
    }

    /// Most recent gate transitions, oldest first.
    pub fn recent_transitions(&self, limit: usize) -> Vec<GateAuditEvent> {
        self.audit.recent(limit)
    }

    /// Update gauges and emit transition events for any displayed-state
    /// flip. Gauges track displayed (sticky) state, not per-call
    /// outcomes, so dashboards see latches rather than flapping.
    fn refresh_gates(&self, state: &mut GateState) {
        let GateState {
            manual_kill_switch,
            drawdown,
            displayed,
            ..
        } = state;

        let manual = *manual_kill_switch;
        let daily = drawdown.global_blocked();

        self.metrics.set_gate_blocked(GateKind::ManualKillswitch, manual);
        self.metrics.set_gate_blocked(GateKind::DailyDrawdown, daily);
        self.metrics.set_kill_switch(manual || daily);
        self.metrics.set_daily_drawdown(drawdown.pnl_today());
        self.metrics
            .set_daily_drawdown_limit(drawdown.limits().global_usd.unwrap_or(0.0));

        if manual != displayed.manual {
            let event = flip_event(manual);
            self.metrics
                .record_gate_transition(GateKind::ManualKillswitch, "", event);
            self.audit
                .record(GateKind::ManualKillswitch, event, None, None);
            displayed.manual = manual;
        }

        if daily != displayed.daily {
            let event = flip_event(daily);
            let meta = json!({
                "pnl_today_usd": drawdown.pnl_today(),
                "limit_usd": drawdown.limits().global_usd.unwrap_or(0.0),
            });
            self.metrics
                .record_gate_transition(GateKind::DailyDrawdown, "", event);
            self.audit
                .record(GateKind::DailyDrawdown, event, None, Some(meta));
            displayed.daily = daily;
        }

        let mut symbols: Vec<String> = drawdown.pnl_by_symbol().keys().cloned().collect();
        symbols.extend(displayed.symbols.keys().cloned());
        symbols.sort();
        symbols.dedup();
        for symbol in symbols {
            let blocked = drawdown.symbol_blocked(&symbol);
            self.metrics.set_symbol_drawdown(
                &symbol,
                drawdown.pnl_by_symbol().get(&symbol).copied().unwrap_or(0.0),
            );
            self.metrics.set_symbol_gate_blocked(&symbol, blocked);
            let prev = displayed.symbols.get(&symbol).copied().unwrap_or(false);
            if blocked != prev {
                let event = flip_event(blocked);
                let meta = json!({
                    "pnl_today_usd": drawdown.pnl_by_symbol().get(&symbol).copied().unwrap_or(0.0),
                    "limit_usd": drawdown.limits().per_symbol_usd.unwrap_or(0.0),
                });
                self.metrics
                    .record_gate_transition(GateKind::SymbolDrawdown, &symbol, event);
                self.audit
                    .record(GateKind::SymbolDrawdown, event, Some(&symbol), Some(meta));
                displayed.symbols.insert(symbol, blocked);
            }
        }
    }
}

fn flip_event(active: bool) -> GateEvent {
    if active {
        GateEvent::Activated
    } else {
        GateEvent::Deactivated
    }
}

fn decide(cfg: &RuleConfig, state: &mut GateState, signal: &Signal, now_ms: i64) -> GateDecision {
    // 1. kill switch: config flag or runtime manual switch
    if cfg.risk.kill_switch || state.manual_kill_switch {
        return GateDecision::Killswitch;
    }

    // 2. sticky drawdown latches
    if state.drawdown.global_blocked() || state.drawdown.symbol_blocked(&signal.symbol) {
        return GateDecision::Drawdown;
    }

    // 3. precedence: the timeframe must be ranked, and no higher-ranked
    // timeframe may have fired for this symbol within one candle of the
    // incoming timeframe
    let precedence = cfg.effective_precedence();
    let Some(rank) = precedence.iter().position(|tf| *tf == signal.timeframe) else {
        return GateDecision::BlockedPrecedence;
    };
    let window_ms = signal.timeframe.duration_ms();
    for higher in &precedence[..rank] {
        let key = InstrumentKey::new(&signal.symbol, *higher);
        if let Some(&accepted_at) = state.last_accepted.get(&key) {
            if now_ms - accepted_at < window_ms {
                return GateDecision::BlockedPrecedence;
            }
        }
    }

    // 4. cooldown per (symbol, timeframe)
    let key = InstrumentKey::new(&signal.symbol, signal.timeframe);
    let last = state.last_accepted.get(&key).copied();
    let cooldown_seconds = cfg.risk.cooldown_seconds.unwrap_or(0);
    if cooldown_seconds > 0 {
        if let Some(last) = last {
            if now_ms - last < cooldown_seconds * 1000 {
                return GateDecision::Cooldown;
            }
        }
    }
    let cooldown_candles = cfg.risk.cooldown_candles.unwrap_or(0);
    if cooldown_candles > 0 {
        if let Some(last) = last {
            if now_ms - last < cooldown_candles * signal.timeframe.duration_ms() {
                return GateDecision::Cooldown;
            }
        }
    }

    // 5. minimum risk:reward, only enforced when configured above zero
    if cfg.risk.rr_min > 0.0 && signal.rr < cfg.risk.rr_min {
        return GateDecision::RrMin;
    }

    // 6. concurrency: accepted signals per timeframe inside a sliding
    // window of max(1, cooldownSeconds) seconds
    let concurrency_window_ms = cooldown_seconds.max(1) * 1000;
    let window = state.accepted_window.entry(signal.timeframe).or_default();
    window.retain(|&t| now_ms - t < concurrency_window_ms);
    if window.len() as u32 >= cfg.risk.max_concurrent_signals {
        return GateDecision::MaxConcurrent;
    }

    // 7. daily cap per (symbol, timeframe), keyed by the signal's own
    // UTC day
    if let Some(max_per_day) = cfg.risk.max_signals_per_day {
        if max_per_day > 0 {
            let day_key = daily_count_key(signal);
            let current = state.daily_counts.get(&day_key).copied().unwrap_or(0);
            if current >= max_per_day {
                return GateDecision::MaxDaily;
            }
        }
    }

    // 8. identical signal already accepted within the dedup window
    if state.dedup.contains_key(&dedup_key(signal)) {
        return GateDecision::Dedup;
    }

    GateDecision::Ok
}

fn mark_accepted(cfg: &RuleConfig, state: &mut GateState, signal: &Signal, now_ms: i64) {
    state.dedup.insert(
        dedup_key(signal),
        (now_ms, signal.timeframe.duration_ms()),
    );
    state
        .last_accepted
        .insert(InstrumentKey::new(&signal.symbol, signal.timeframe), now_ms);
    state
        .accepted_window
        .entry(signal.timeframe)
        .or_default()
        .push(now_ms);
    if cfg.risk.max_signals_per_day.unwrap_or(0) > 0 {
        *state.daily_counts.entry(daily_count_key(signal)).or_insert(0) += 1;
    }
}

fn dedup_key(signal: &Signal) -> String {
    format!("{}:{}:{}", signal.symbol, signal.timeframe, signal.timestamp)
}

fn daily_count_key(signal: &Signal) -> String {
    format!(
        "{}:{}:{}",
        signal.symbol,
        signal.timeframe,
        utc_day_key(signal.timestamp)
    )
}

fn utc_day_key(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryGateMetrics;
    use types::{RiskLimits, Side};

    // 2024-06-01T00:00:00Z
    const T0: i64 = 1_717_200_000_000;
    const DAY_MS: i64 = 86_400_000;

    fn config(risk: RiskLimits) -> RuleConfig {
        RuleConfig {
            schema_version: 1,
            name: "test".to_string(),
            effective_at: "2024-06-01T00:00:00Z".to_string(),
            timeframes: vec![Timeframe::M1, Timeframe::M5, Timeframe::H1],
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            risk,
            precedence: Some(vec![Timeframe::H1, Timeframe::M5, Timeframe::M1]),
        }
    }

    fn limits(
        max_concurrent: u32,
        rr_min: f64,
        cooldown_seconds: Option<i64>,
        max_per_day: Option<i64>,
    ) -> RiskLimits {
        RiskLimits {
            max_concurrent_signals: max_concurrent,
            rr_min,
            kill_switch: false,
            cooldown_seconds,
            cooldown_candles: None,
            max_signals_per_day: max_per_day,
        }
    }

    fn gate_with(cfg: RuleConfig) -> (RiskGate, Arc<InMemoryGateMetrics>) {
        let store = Arc::new(RuleConfigStore::new(None));
        store.publish(cfg).expect("test config must validate");
        let metrics = Arc::new(InMemoryGateMetrics::new());
        let gate = RiskGate::new(
            store,
            metrics.clone(),
            None,
            DrawdownLimits::default(),
        );
        (gate, metrics)
    }

    fn signal(symbol: &str, timeframe: Timeframe, rr: f64, ts: i64) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            timeframe,
            side: Side::Buy,
            rr,
            strategy_name: "test-strategy".to_string(),
            timestamp: ts,
        }
    }

    #[test]
    fn kill_switch_rejects_everything() {
        let mut risk = limits(10, 0.0, None, None);
        risk.kill_switch = true;
        let (gate, metrics) = gate_with(config(risk));

        for (i, tf) in [Timeframe::M1, Timeframe::M5, Timeframe::H1].iter().enumerate() {
            let s = signal("BTCUSDT", *tf, 5.0, T0 + i as i64 * 60_000);
            assert_eq!(gate.evaluate_at(&s, T0 + i as i64 * 1000), GateDecision::Killswitch);
        }
        assert_eq!(
            metrics.decision_count(Timeframe::M1, GateDecision::Killswitch),
            1
        );
    }

    #[test]
    fn manual_kill_switch_blocks_and_clears() {
        let (gate, metrics) = gate_with(config(limits(10, 0.0, None, None)));
        gate.set_manual_kill_switch(true);
        let s = signal("BTCUSDT", Timeframe::M1, 2.0, T0);
        assert_eq!(gate.evaluate_at(&s, T0), GateDecision::Killswitch);
        assert_eq!(
            metrics.transition_count(GateKind::ManualKillswitch, "", GateEvent::Activated),
            1
        );

        gate.set_manual_kill_switch(false);
        assert_eq!(gate.evaluate_at(&s, T0 + 1000), GateDecision::Ok);
        assert_eq!(
            metrics.transition_count(GateKind::ManualKillswitch, "", GateEvent::Deactivated),
            1
        );
    }

    #[test]
    fn cooldown_seconds_then_ok_after_window() {
        let (gate, _) = gate_with(config(limits(10, 0.0, Some(300), None)));

        let first = signal("BTCUSDT", Timeframe::M5, 2.0, T0);
        assert_eq!(gate.evaluate_at(&first, T0), GateDecision::Ok);

        let second = signal("BTCUSDT", Timeframe::M5, 2.0, T0 + 60_000);
        assert_eq!(gate.evaluate_at(&second, T0 + 60_000), GateDecision::Cooldown);

        // After the 300s window the otherwise-identical signal passes.
        let third = signal("BTCUSDT", Timeframe::M5, 2.0, T0 + 301_000);
        assert_eq!(gate.evaluate_at(&third, T0 + 301_000), GateDecision::Ok);
    }

    #[test]
    fn cooldown_candles_uses_timeframe_duration() {
        let mut risk = limits(10, 0.0, None, None);
        risk.cooldown_candles = Some(2);
        let (gate, _) = gate_with(config(risk));

        let first = signal("BTCUSDT", Timeframe::M1, 2.0, T0);
        assert_eq!(gate.evaluate_at(&first, T0), GateDecision::Ok);

        // 2 candles of 1m = 120s.
        let blocked = signal("BTCUSDT", Timeframe::M1, 2.0, T0 + 60_000);
        assert_eq!(gate.evaluate_at(&blocked, T0 + 90_000), GateDecision::Cooldown);

        let passed = signal("BTCUSDT", Timeframe::M1, 2.0, T0 + 180_000);
        assert_eq!(gate.evaluate_at(&passed, T0 + 121_000), GateDecision::Ok);
    }

    #[test]
    fn cooldown_is_per_key_not_global() {
        let (gate, _) = gate_with(config(limits(10, 0.0, Some(300), None)));
        assert_eq!(
            gate.evaluate_at(&signal("BTCUSDT", Timeframe::M5, 2.0, T0), T0),
            GateDecision::Ok
        );
        // Same timeframe, other symbol: not in cooldown.
        assert_eq!(
            gate.evaluate_at(&signal("ETHUSDT", Timeframe::M5, 2.0, T0 + 1000), T0 + 1000),
            GateDecision::Ok
        );
    }

    #[test]
    fn rr_below_minimum_is_rejected() {
        let (gate, _) = gate_with(config(limits(10, 1.5, None, None)));
        let s = signal("BTCUSDT", Timeframe::M1, 1.0, T0);
        assert_eq!(gate.evaluate_at(&s, T0), GateDecision::RrMin);

        let s = signal("BTCUSDT", Timeframe::M1, 1.5, T0 + 60_000);
        assert_eq!(gate.evaluate_at(&s, T0 + 60_000), GateDecision::Ok);
    }

    #[test]
    fn rr_gate_is_disabled_when_rr_min_is_zero() {
        // Observed behavior: rrMin = 0 disables the check entirely, so
        // even a negative rr passes.
        let (gate, _) = gate_with(config(limits(10, 0.0, None, None)));
        let s = signal("BTCUSDT", Timeframe::M1, -1.0, T0);
        assert_eq!(gate.evaluate_at(&s, T0), GateDecision::Ok);
    }

    #[test]
    fn max_concurrent_limits_the_sliding_window() {
        let (gate, _) = gate_with(config(limits(2, 0.0, None, None)));

        // Window is max(1, 0) = 1 second; all three land inside it.
        assert_eq!(
            gate.evaluate_at(&signal("BTCUSDT", Timeframe::M1, 2.0, T0), T0),
            GateDecision::Ok
        );
        assert_eq!(
            gate.evaluate_at(&signal("ETHUSDT", Timeframe::M1, 2.0, T0 + 60_000), T0 + 200),
            GateDecision::Ok
        );
        assert_eq!(
            gate.evaluate_at(&signal("BTCUSDT", Timeframe::M1, 2.0, T0 + 120_000), T0 + 400),
            GateDecision::MaxConcurrent
        );

        // Window drains with time.
        assert_eq!(
            gate.evaluate_at(&signal("BTCUSDT", Timeframe::M1, 2.0, T0 + 180_000), T0 + 2000),
            GateDecision::Ok
        );
    }

    #[test]
    fn max_daily_counts_per_symbol_timeframe_and_day() {
        let (gate, _) = gate_with(config(limits(10, 0.0, None, Some(2))));

        for i in 0..2 {
            let s = signal("BTCUSDT", Timeframe::M1, 2.0, T0 + i * 60_000);
            assert_eq!(gate.evaluate_at(&s, T0 + i * 2000), GateDecision::Ok);
        }
        let third = signal("BTCUSDT", Timeframe::M1, 2.0, T0 + 180_000);
        assert_eq!(gate.evaluate_at(&third, T0 + 6000), GateDecision::MaxDaily);

        // Another symbol is unaffected.
        let eth = signal("ETHUSDT", Timeframe::M1, 2.0, T0 + 180_000);
        assert_eq!(gate.evaluate_at(&eth, T0 + 8000), GateDecision::Ok);

        // Next UTC day the counter starts fresh.
        let tomorrow = signal("BTCUSDT", Timeframe::M1, 2.0, T0 + DAY_MS);
        assert_eq!(gate.evaluate_at(&tomorrow, T0 + DAY_MS), GateDecision::Ok);
    }

    #[test]
    fn identical_signal_within_window_is_dedup() {
        let (gate, _) = gate_with(config(limits(10, 0.0, None, None)));

        let s = signal("BTCUSDT", Timeframe::M1, 2.0, T0);
        assert_eq!(gate.evaluate_at(&s, T0), GateDecision::Ok);
        // Same candle timestamp again, shortly after.
        assert_eq!(gate.evaluate_at(&s, T0 + 1500), GateDecision::Dedup);
        // After one candle duration the identity key has expired.
        assert_eq!(gate.evaluate_at(&s, T0 + 61_000), GateDecision::Ok);
    }

    #[test]
    fn unranked_timeframe_is_blocked_by_precedence() {
        let mut cfg = config(limits(10, 0.0, None, None));
        cfg.timeframes.push(Timeframe::M10);
        // Precedence stays H1 > M5 > M1, so 10m is unranked.
        let (gate, _) = gate_with(cfg);

        let s = signal("BTCUSDT", Timeframe::M10, 2.0, T0);
        assert_eq!(gate.evaluate_at(&s, T0), GateDecision::BlockedPrecedence);
    }

    #[test]
    fn higher_timeframe_wins_within_the_window() {
        let (gate, _) = gate_with(config(limits(10, 0.0, None, None)));

        let hourly = signal("BTCUSDT", Timeframe::H1, 2.0, T0);
        assert_eq!(gate.evaluate_at(&hourly, T0), GateDecision::Ok);

        // A 5m signal for the same symbol inside its own candle window
        // is suppressed by the fresher hourly acceptance.
        let five = signal("BTCUSDT", Timeframe::M5, 2.0, T0 + 60_000);
        assert_eq!(
            gate.evaluate_at(&five, T0 + 60_000),
            GateDecision::BlockedPrecedence
        );

        // Other symbols are unaffected.
        let eth = signal("ETHUSDT", Timeframe::M5, 2.0, T0 + 60_000);
        assert_eq!(gate.evaluate_at(&eth, T0 + 61_000), GateDecision::Ok);

        // Once the 5m window has passed, the lower timeframe fires again.
        let later = signal("BTCUSDT", Timeframe::M5, 2.0, T0 + 400_000);
        assert_eq!(gate.evaluate_at(&later, T0 + 400_000), GateDecision::Ok);
    }

    #[test]
    fn check_order_reports_highest_priority_reason() {
        // Signal violates cooldown, rr and dedup at once; with the kill
        // switch on it must still report killswitch.
        let mut risk = limits(1, 5.0, Some(600), Some(1));
        risk.kill_switch = true;
        let (gate, _) = gate_with(config(risk));
        let s = signal("BTCUSDT", Timeframe::M1, 0.1, T0);
        assert_eq!(gate.evaluate_at(&s, T0), GateDecision::Killswitch);
    }

    #[test]
    fn drawdown_breach_is_sticky_until_rollover() {
        let (gate, metrics) = gate_with(config(limits(10, 0.0, None, None)));
        gate.set_drawdown_limits(DrawdownLimits {
            global_usd: Some(100.0),
            per_symbol_usd: None,
        });

        gate.record_trade(&TradeRecord {
            symbol: "BTCUSDT".to_string(),
            realized_pnl_usd: -150.0,
            closed_at: Utc::now().to_rfc3339(),
        })
        .unwrap();

        let now = Utc::now().timestamp_millis();
        let s = signal("BTCUSDT", Timeframe::M1, 2.0, now);
        assert_eq!(gate.evaluate_at(&s, now), GateDecision::Drawdown);
        assert_eq!(
            metrics.transition_count(GateKind::DailyDrawdown, "", GateEvent::Activated),
            1
        );

        // Recovering PnL within the same day does not reopen the gate.
        gate.record_trade(&TradeRecord {
            symbol: "BTCUSDT".to_string(),
            realized_pnl_usd: 500.0,
            closed_at: Utc::now().to_rfc3339(),
        })
        .unwrap();
        assert_eq!(gate.evaluate_at(&s, now + 1000), GateDecision::Drawdown);

        // Day rollover clears the latch and emits the deactivation.
        let tomorrow = now + DAY_MS;
        let s2 = signal("BTCUSDT", Timeframe::M1, 2.0, tomorrow);
        assert_eq!(gate.evaluate_at(&s2, tomorrow), GateDecision::Ok);
        assert_eq!(
            metrics.transition_count(GateKind::DailyDrawdown, "", GateEvent::Deactivated),
            1
        );
    }

    #[test]
    fn symbol_drawdown_blocks_only_that_symbol() {
        let (gate, metrics) = gate_with(config(limits(10, 0.0, None, None)));
        gate.set_drawdown_limits(DrawdownLimits {
            global_usd: None,
            per_symbol_usd: Some(50.0),
        });
        gate.record_trade(&TradeRecord {
            symbol: "BTCUSDT".to_string(),
            realized_pnl_usd: -60.0,
            closed_at: Utc::now().to_rfc3339(),
        })
        .unwrap();

        let now = Utc::now().timestamp_millis();
        assert_eq!(
            gate.evaluate_at(&signal("BTCUSDT", Timeframe::M1, 2.0, now), now),
            GateDecision::Drawdown
        );
        assert_eq!(
            gate.evaluate_at(&signal("ETHUSDT", Timeframe::M1, 2.0, now), now + 1000),
            GateDecision::Ok
        );
        assert_eq!(
            metrics.transition_count(GateKind::SymbolDrawdown, "BTCUSDT", GateEvent::Activated),
            1
        );

        // Manual reset reopens the symbol.
        gate.reset_drawdown();
        assert_eq!(
            gate.evaluate_at(&signal("BTCUSDT", Timeframe::M1, 2.0, now + 120_000), now + 120_000),
            GateDecision::Ok
        );
        assert_eq!(
            metrics.transition_count(GateKind::SymbolDrawdown, "BTCUSDT", GateEvent::Deactivated),
            1
        );
    }

    #[test]
    fn invalid_trade_close_time_is_an_error() {
        let (gate, _) = gate_with(config(limits(10, 0.0, None, None)));
        let result = gate.record_trade(&TradeRecord {
            symbol: "BTCUSDT".to_string(),
            realized_pnl_usd: -1.0,
            closed_at: "yesterday-ish".to_string(),
        });
        assert!(matches!(result, Err(RiskGateError::InvalidCloseTime(_))));
    }

    #[test]
    fn every_decision_is_counted() {
        let (gate, metrics) = gate_with(config(limits(10, 0.0, Some(300), None)));
        let s = signal("BTCUSDT", Timeframe::M5, 2.0, T0);
        gate.evaluate_at(&s, T0);
        let s2 = signal("BTCUSDT", Timeframe::M5, 2.0, T0 + 60_000);
        gate.evaluate_at(&s2, T0 + 60_000);

        assert_eq!(metrics.decision_count(Timeframe::M5, GateDecision::Ok), 1);
        assert_eq!(
            metrics.decision_count(Timeframe::M5, GateDecision::Cooldown),
            1
        );
    }
}
