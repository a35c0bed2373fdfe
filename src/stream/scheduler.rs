//! Frame-rate limited delivery of the latest value.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::session::SessionObserver;

/// Counters for one scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: usize,
    pub committed: usize,
}

impl SchedulerStats {
    /// Values replaced before they were ever committed.
    pub fn dropped(&self) -> usize {
        self.submitted.saturating_sub(self.committed)
    }
}

#[derive(Debug)]
struct Inner<T> {
    pending: Option<T>,
    last_commit: Option<Instant>,
    stats: SchedulerStats,
}

/// Coalesces rapid updates so at most one value is committed per interval.
///
/// Producers call [`submit`](Self::submit) as often as they like; the
/// consumer calls [`poll`](Self::poll) on its own clock. Only the newest
/// pending value is ever delivered.
#[derive(Debug)]
pub struct RenderScheduler<T> {
    interval: Duration,
    inner: Mutex<Inner<T>>,
}

impl<T> RenderScheduler<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            inner: Mutex::new(Inner {
                pending: None,
                last_commit: None,
                stats: SchedulerStats::default(),
            }),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replace the pending value.
    pub fn submit(&self, value: T) {
        let mut inner = self.lock();
        inner.pending = Some(value);
        inner.stats.submitted += 1;
    }

    /// Commit the pending value if a full interval has passed since the
    /// previous commit. The first commit is immediate.
    pub fn poll(&self, now: Instant) -> Option<T> {
        let mut inner = self.lock();
        let due = inner
            .last_commit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return None;
        }
        let value = inner.pending.take()?;
        inner.last_commit = Some(now);
        inner.stats.committed += 1;
        Some(value)
    }

    /// Commit whatever is pending, regardless of timing.
    pub fn flush(&self) -> Option<T> {
        let mut inner = self.lock();
        let value = inner.pending.take()?;
        inner.last_commit = Some(Instant::now());
        inner.stats.committed += 1;
        Some(value)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionObserver for RenderScheduler<String> {
    fn on_text(&self, text: &str) {
        self.submit(text.to_string());
    }
}
