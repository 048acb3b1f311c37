//! Bounded audit trail for sticky-gate transitions.

use crate::metrics::{GateEvent, GateKind};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Write as _;
use std::path::PathBuf;

const MAX_AUDIT_BUFFER: usize = 500;

/// One gate transition: a sticky gate's displayed state flipped.
#[derive(Debug, Clone, Serialize)]
pub struct GateAuditEvent {
    /// RFC 3339 timestamp of the flip
    pub ts: String,
    /// Which gate flipped
    pub gate: String,
    /// `activated` or `deactivated`
    pub event: String,
    /// Symbol, for per-symbol gates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Context captured at flip time (PnL, limit, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// In-memory ring buffer of recent transitions with best-effort JSONL
/// persistence. The buffer is authoritative for the status API; the
/// file is an operator convenience and write failures are swallowed.
pub struct AuditLog {
    buffer: Mutex<VecDeque<GateAuditEvent>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Create a log, optionally persisting to `path` as JSON lines.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(MAX_AUDIT_BUFFER)),
            path,
        }
    }

    /// Record one transition.
    pub fn record(&self, gate: GateKind, event: GateEvent, symbol: Option<&str>, meta: Option<Value>) {
        let evt = GateAuditEvent {
            ts: chrono::Utc::now().to_rfc3339(),
            gate: gate.as_str().to_string(),
            event: event.as_str().to_string(),
            symbol: symbol.filter(|s| !s.is_empty()).map(str::to_string),
            meta,
        };

        {
            let mut buffer = self.buffer.lock();
            if buffer.len() >= MAX_AUDIT_BUFFER {
                buffer.pop_front();
            }
            buffer.push_back(evt.clone());
        }

        if let Some(path) = &self.path {
            let result = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| match serde_json::to_string(&evt) {
                    Ok(line) => writeln!(file, "{line}"),
                    Err(e) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
                });
            if let Err(error) = result {
                tracing::warn!(%error, path = %path.display(), "failed to persist gate audit event (ignored)");
            }
        }
    }

    /// Most recent `limit` transitions, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<GateAuditEvent> {
        let buffer = self.buffer.lock();
        let skip = buffer.len().saturating_sub(limit);
        buffer.iter().skip(skip).cloned().collect()
    }
}
