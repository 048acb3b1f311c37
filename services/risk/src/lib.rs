//! # Risk Engine
//!
//! Two tightly coupled pieces sit in this crate:
//!
//! - [`RuleConfigStore`]: validated, versioned risk configuration with
//!   publish/history/default-fallback semantics. Publishes are serialized
//!   through one mutation path; reads are a cheap `Arc` clone and never
//!   block behind a publish.
//! - [`RiskGate`]: the stateful decision function that combines the
//!   store's active configuration with its own running counters to
//!   accept or reject candidate signals. The gate never fails: every
//!   call terminates in a [`types::GateDecision`] value.
//!
//! The gate drives an external metrics collector through the
//! [`metrics::GateMetrics`] seam and records sticky-gate transitions in
//! a bounded audit trail with best-effort JSONL persistence. The
//! in-memory state is authoritative throughout; persistence failures are
//! logged and swallowed.

pub mod audit;
pub mod drawdown;
pub mod gate;
pub mod metrics;
pub mod store;

pub use audit::{AuditLog, GateAuditEvent};
pub use drawdown::{DrawdownLimits, DrawdownStatus, TradeRecord};
pub use gate::{RiskGate, RiskGateError};
pub use metrics::{GateEvent, GateKind, GateMetrics, InMemoryGateMetrics, NoOpGateMetrics};
pub use store::{PublishReceipt, RuleConfigStore, ValidationOutcome};
