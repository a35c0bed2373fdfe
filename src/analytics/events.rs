//! Event records written to `~/.safedash/events.jsonl`.
//!
//! One line per refresh cycle and one per finished streaming session.
//! Outcomes are stored as strings so that older logs keep parsing when the
//! set of outcomes grows.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::dashboard::CycleReport;
use crate::stream::SessionKind;
use crate::stream::session::SessionState;

/// A single line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    Cycle(CycleEvent),
    Session(SessionEvent),
}

impl Event {
    /// RFC 3339 timestamp of the event.
    pub fn timestamp(&self) -> &str {
        match self {
            Self::Cycle(e) => &e.timestamp,
            Self::Session(e) => &e.timestamp,
        }
    }
}

/// Result of one dashboard refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEvent {
    pub timestamp: String,
    pub generation: u64,
    /// `"succeeded"`, `"partial"`, `"failed"` or `"stale"`.
    pub outcome: String,
    pub resources: usize,
    pub failures: usize,
    pub duration_ms: u64,
    /// First failure message, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl CycleEvent {
    pub fn from_report(report: &CycleReport) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            generation: report.generation,
            outcome: report.outcome.to_string(),
            resources: report.resources,
            failures: report.failures.len(),
            duration_ms: report.duration_ms,
            error: report.failures.first().map(|f| f.message.clone()),
        }
    }
}

/// Result of one finished streaming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub timestamp: String,
    /// `"chat"` or `"insights"`.
    pub kind: String,
    /// `"done"`, `"cancelled"` or `"failed"`.
    pub outcome: String,
    /// Characters of accumulated text, error suffix included.
    pub chars: usize,
    pub duration_ms: u64,
}

impl SessionEvent {
    pub fn new(kind: SessionKind, state: &SessionState, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: kind.to_string(),
            outcome: state.outcome().to_string(),
            chars: state.accumulated_text.chars().count(),
            duration_ms,
        }
    }
}
