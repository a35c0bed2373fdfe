use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;

use super::events::{CycleEvent, Event, SessionEvent};
use crate::dashboard::CycleReport;
use crate::stream::SessionKind;
use crate::stream::session::SessionState;

// ---------------------------------------------------------------------------
// Logging functions
// ---------------------------------------------------------------------------

/// Log a finished refresh cycle. Best-effort.
pub fn log_cycle(report: &CycleReport) {
    log_event(&Event::Cycle(CycleEvent::from_report(report)));
}

/// Log a finished streaming session. Best-effort.
pub fn log_session(kind: SessionKind, state: &SessionState, duration_ms: u64) {
    log_event(&Event::Session(SessionEvent::new(kind, state, duration_ms)));
}

/// Append an event to `~/.safedash/events.jsonl`, ignoring failures.
pub fn log_event(event: &Event) {
    if let Some(path) = events_log_path() {
        let _ = append_event(&path, event);
    }
}

// ---------------------------------------------------------------------------
// Reading events
// ---------------------------------------------------------------------------

/// Read every event from the default log.
///
/// Silently skips malformed lines. Returns an empty vec if the file does not
/// exist or cannot be read.
pub fn read_all_events() -> Vec<Event> {
    events_log_path()
        .map(|path| read_events_from(&path))
        .unwrap_or_default()
}

/// Read every event from `path`.
pub fn read_events_from(path: &Path) -> Vec<Event> {
    let Ok(file) = fs::File::open(path) else {
        return Vec::new();
    };

    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str::<Event>(&line).ok())
        .collect()
}

/// Keep only events from the last `days` days. `None` keeps everything.
pub fn since_days(events: Vec<Event>, days: Option<u32>) -> Vec<Event> {
    let Some(days) = days else {
        return events;
    };

    let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();
    events
        .into_iter()
        .filter(|e| e.timestamp() >= cutoff.as_str())
        .collect()
}

/// Read events from the default log filtered to the last `days` days.
pub fn read_events_since_days(days: Option<u32>) -> Vec<Event> {
    since_days(read_all_events(), days)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Append one event as a JSON line to `path`, creating parent directories.
pub fn append_event(path: &Path, event: &Event) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(event)?;
    writeln!(file, "{json}")?;

    Ok(())
}

/// Return the path to the event log file.
pub fn events_log_path() -> Option<PathBuf> {
    crate::config::state_dir().map(|dir| dir.join("events.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_log(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("safedash-logger-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir.join("nested").join("events.jsonl")
    }

    fn session(outcome_done: bool) -> Event {
        let state = SessionState {
            done: outcome_done,
            cancelled: !outcome_done,
            ..Default::default()
        };
        Event::Session(SessionEvent::new(SessionKind::Insights, &state, 5))
    }

    #[test]
    fn append_then_read_skips_garbage() {
        let path = temp_log("roundtrip");
        append_event(&path, &session(true)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "not json"))
            .unwrap();
        append_event(&path, &session(false)).unwrap();

        let events = read_events_from(&path);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Event::Session(e) if e.outcome == "cancelled"));
    }

    #[test]
    fn missing_file_reads_empty() {
        assert!(read_events_from(Path::new("/nonexistent/safedash/events.jsonl")).is_empty());
    }

    #[test]
    fn since_days_drops_old_events() {
        let mut old = session(true);
        if let Event::Session(e) = &mut old {
            e.timestamp = "2001-01-01T00:00:00+00:00".into();
        }
        let kept = since_days(vec![old, session(true)], Some(7));
        assert_eq!(kept.len(), 1);
    }
}
