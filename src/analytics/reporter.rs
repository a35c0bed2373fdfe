//! Analytics reporter: aggregation of the event log for `safedash stats`.
//!
//! Reads the JSONL event log and summarizes refresh reliability, streaming
//! session outcomes and the most frequent failure messages.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::analytics::events::{CycleEvent, Event, SessionEvent};
use crate::analytics::logger;

/// How many distinct failure messages the report keeps.
const TOP_ERRORS: usize = 5;

// ---------------------------------------------------------------------------
// Aggregated stats
// ---------------------------------------------------------------------------

/// Summary statistics for `safedash stats`.
#[derive(Debug, Default, Serialize)]
pub struct Stats {
    pub cycles: CycleStats,
    pub sessions: Vec<SessionStat>,
    pub top_errors: Vec<ErrorStat>,
    pub daily: Vec<DailyEntry>,
}

impl Stats {
    pub fn is_empty(&self) -> bool {
        self.cycles.total == 0 && self.sessions.is_empty()
    }
}

/// Refresh cycles by outcome.
#[derive(Debug, Default, Serialize)]
pub struct CycleStats {
    pub total: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub stale: usize,
    pub avg_duration_ms: f64,
}

impl CycleStats {
    /// Share of committed (non-stale) cycles that fully succeeded.
    pub fn success_pct(&self) -> f64 {
        let committed = self.total - self.stale;
        if committed == 0 {
            0.0
        } else {
            (self.succeeded as f64 / committed as f64) * 100.0
        }
    }
}

/// Streaming sessions of one kind.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStat {
    pub kind: String,
    pub count: usize,
    pub done: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub avg_duration_ms: f64,
    pub avg_chars: f64,
}

/// A recurring cycle failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStat {
    pub message: String,
    pub count: usize,
}

/// Cycles per calendar day (UTC).
#[derive(Debug, Clone, Serialize)]
pub struct DailyEntry {
    pub date: String,
    pub cycles: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Stats computation
// ---------------------------------------------------------------------------

/// Compute stats from the event log, optionally limited to the last `days`.
pub fn compute_stats(days: Option<u32>) -> Stats {
    let events = logger::read_events_since_days(days);
    build_stats(&events)
}

pub fn build_stats(events: &[Event]) -> Stats {
    let mut cycles = Vec::new();
    let mut sessions = Vec::new();
    for event in events {
        match event {
            Event::Cycle(e) => cycles.push(e),
            Event::Session(e) => sessions.push(e),
        }
    }

    Stats {
        cycles: compute_cycle_stats(&cycles),
        sessions: compute_session_stats(&sessions),
        top_errors: compute_top_errors(&cycles),
        daily: compute_daily(&cycles),
    }
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

fn compute_cycle_stats(cycles: &[&CycleEvent]) -> CycleStats {
    let mut stats = CycleStats {
        total: cycles.len(),
        ..Default::default()
    };
    for cycle in cycles {
        match cycle.outcome.as_str() {
            "succeeded" => stats.succeeded += 1,
            "partial" => stats.partial += 1,
            "stale" => stats.stale += 1,
            _ => stats.failed += 1,
        }
    }
    let total_ms: u64 = cycles.iter().map(|c| c.duration_ms).sum();
    stats.avg_duration_ms = mean(total_ms as f64, cycles.len());
    stats
}

/// Group sessions by kind, sorted by count (descending).
fn compute_session_stats(sessions: &[&SessionEvent]) -> Vec<SessionStat> {
    let mut groups: HashMap<&str, Vec<&SessionEvent>> = HashMap::new();
    for session in sessions {
        groups.entry(session.kind.as_str()).or_default().push(session);
    }

    let mut stats: Vec<SessionStat> = groups
        .into_iter()
        .map(|(kind, group)| {
            let count = group.len();
            let by_outcome = |name: &str| group.iter().filter(|s| s.outcome == name).count();
            let total_ms: u64 = group.iter().map(|s| s.duration_ms).sum();
            let total_chars: usize = group.iter().map(|s| s.chars).sum();
            SessionStat {
                kind: kind.to_string(),
                count,
                done: by_outcome("done"),
                cancelled: by_outcome("cancelled"),
                failed: by_outcome("failed"),
                avg_duration_ms: mean(total_ms as f64, count),
                avg_chars: mean(total_chars as f64, count),
            }
        })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));
    stats
}

fn compute_top_errors(cycles: &[&CycleEvent]) -> Vec<ErrorStat> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for message in cycles.iter().filter_map(|c| c.error.as_deref()) {
        *counts.entry(message).or_default() += 1;
    }

    let mut errors: Vec<ErrorStat> = counts
        .into_iter()
        .map(|(message, count)| ErrorStat {
            message: message.to_string(),
            count,
        })
        .collect();
    errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
    errors.truncate(TOP_ERRORS);
    errors
}

fn compute_daily(cycles: &[&CycleEvent]) -> Vec<DailyEntry> {
    let mut days: BTreeMap<&str, DailyEntry> = BTreeMap::new();
    for cycle in cycles {
        let date = cycle.timestamp.get(..10).unwrap_or("unknown");
        let entry = days.entry(date).or_insert_with(|| DailyEntry {
            date: date.to_string(),
            cycles: 0,
            failed: 0,
        });
        entry.cycles += 1;
        if cycle.outcome == "failed" {
            entry.failed += 1;
        }
    }
    days.into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
