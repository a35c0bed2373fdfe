//! Multi-resource dashboard synchronizer.
//!
//! A [`Dashboard`] owns one [`ResourceSlot`] per analytical resource and
//! keeps them in step with the backend through refresh cycles:
//!
//! 1. every slot is marked loading (one batch, under the write lock);
//! 2. every resource request is issued concurrently, one scoped thread per
//!    resource, all spawned before any is joined;
//! 3. once all requests settle, payloads are normalized and committed to
//!    the slots as one batch, KPIs are derived and the timestamp recorded.
//!
//! How failures settle is governed by [`Settlement`]. With
//! [`Settlement::AllOrNothing`] a single failing request fails the whole
//! cycle: every slot carries the first failure's message and no data. With
//! [`Settlement::PerResource`] each slot settles on its own outcome.
//!
//! Overlapping `refresh()` calls are allowed. Each cycle takes a generation
//! number when it starts; a cycle that finishes after a newer one has
//! already committed discards its results ([`CycleOutcome::Stale`]).
//!
//! Readers never see slot internals mutably: [`Dashboard::snapshot`] hands
//! out a clone.

pub mod resources;
pub mod slot;
pub mod upload;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::analytics::logger;
use crate::charts::ChartModel;
use crate::charts::kpi::{Kpi, derive_kpis};
use crate::charts::normalize::normalize;
use crate::config::{SafedashConfig, Settlement};

use resources::{KPI_SOURCE, Resource};
use slot::ResourceSlot;
use upload::Uploader;

/// Message used when a failed request carries no usable description.
pub const GENERIC_FAILURE: &str = "Failed to load dashboard data";

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Fetches the raw JSON document of one resource.
///
/// Called concurrently from several threads within one cycle. Network
/// failures, non-2xx statuses and non-JSON bodies are all errors.
pub trait ResourceSource: Sync {
    fn fetch(&self, resource: &Resource) -> Result<Value>;

    /// Cheap liveness probe used by health checks.
    fn is_reachable(&self) -> bool {
        true
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient, user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Surfaces notices to the user (toast, stderr, …).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, notice: &Notice) {
        (**self).notify(notice)
    }
}

/// Drops every notice. The default until a real notifier is attached.
#[derive(Debug, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _notice: &Notice) {}
}

// ---------------------------------------------------------------------------
// State and reports
// ---------------------------------------------------------------------------

/// A resource and its slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotEntry {
    pub resource: &'static Resource,
    pub slot: ResourceSlot<ChartModel>,
}

/// Read-only copy of the dashboard state.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub slots: Vec<SlotEntry>,
    pub kpis: Vec<Kpi>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Generation of the most recently committed cycle (0 = none yet).
    pub generation: u64,
    /// Set once a workbook has been uploaded in this process.
    pub data_present: bool,
    pub last_notice: Option<Notice>,
}

impl DashboardSnapshot {
    fn initial(resources: &[&'static Resource]) -> Self {
        Self {
            slots: resources
                .iter()
                .map(|&resource| SlotEntry {
                    resource,
                    slot: ResourceSlot::new(),
                })
                .collect(),
            kpis: Vec::new(),
            last_updated: None,
            generation: 0,
            data_present: false,
            last_notice: None,
        }
    }

    /// The slot of the resource with `key`.
    pub fn slot(&self, key: &str) -> Option<&ResourceSlot<ChartModel>> {
        self.slots
            .iter()
            .find(|e| e.resource.key == key)
            .map(|e| &e.slot)
    }

    /// Whether every slot has settled.
    pub fn is_settled(&self) -> bool {
        self.slots.iter().all(|e| e.slot.is_settled())
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleOutcome {
    /// Every request succeeded and was committed.
    Succeeded,
    /// Some requests failed; successful slots were committed (per-resource only).
    Partial,
    /// The cycle's visible state is an error.
    Failed,
    /// A newer cycle committed first; this cycle's results were discarded.
    Stale,
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// One failed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceFailure {
    pub key: &'static str,
    pub message: String,
}

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub generation: u64,
    pub outcome: CycleOutcome,
    pub resources: usize,
    /// Every request that failed, in catalogue order.
    pub failures: Vec<ResourceFailure>,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// The synchronizer. Share it behind an `Arc` to refresh from several
/// threads.
pub struct Dashboard<S> {
    source: S,
    notifier: Box<dyn Notifier>,
    resources: Vec<&'static Resource>,
    settlement: Settlement,
    event_log: bool,
    state: RwLock<DashboardSnapshot>,
    next_generation: AtomicU64,
}

impl<S: ResourceSource> Dashboard<S> {
    /// A dashboard over the full catalogue with all-or-nothing settlement.
    pub fn new(source: S) -> Self {
        let resources: Vec<&'static Resource> = resources::RESOURCES.iter().collect();
        Self {
            source,
            notifier: Box::new(SilentNotifier),
            state: RwLock::new(DashboardSnapshot::initial(&resources)),
            resources,
            settlement: Settlement::default(),
            event_log: false,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Apply `[dashboard]` and `[logging]` settings.
    pub fn from_config(source: S, config: &SafedashConfig) -> Self {
        Self::new(source)
            .with_resources(resources::select(config.dashboard.resource_set))
            .with_settlement(config.dashboard.settlement)
            .with_event_log(config.logging.enabled)
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.settlement = settlement;
        self
    }

    /// Replace the polled resources. Resets every slot.
    pub fn with_resources(mut self, resources: Vec<&'static Resource>) -> Self {
        self.state = RwLock::new(DashboardSnapshot::initial(&resources));
        self.resources = resources;
        self
    }

    /// Append every cycle to the event log.
    pub fn with_event_log(mut self, enabled: bool) -> Self {
        self.event_log = enabled;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn resources(&self) -> &[&'static Resource] {
        &self.resources
    }

    pub fn settlement(&self) -> Settlement {
        self.settlement
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one refresh cycle and return its report.
    pub fn refresh(&self) -> CycleReport {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        {
            let mut state = self.write_state();
            // A newer cycle already committed: leave its slots alone.
            if generation > state.generation {
                for entry in &mut state.slots {
                    entry.slot.mark_loading();
                }
            }
        }

        let results = fetch_all(&self.source, &self.resources);
        let report = self.commit(generation, &results, started);

        if self.event_log {
            logger::log_cycle(&report);
        }
        report
    }

    fn commit(&self, generation: u64, results: &[Result<Value>], started: Instant) -> CycleReport {
        let failures: Vec<ResourceFailure> = self
            .resources
            .iter()
            .zip(results)
            .filter_map(|(resource, result)| {
                result.as_ref().err().map(|err| ResourceFailure {
                    key: resource.key,
                    message: failure_message(err),
                })
            })
            .collect();

        let mut report = CycleReport {
            generation,
            outcome: CycleOutcome::Succeeded,
            resources: self.resources.len(),
            failures,
            duration_ms: 0,
        };

        let notice = {
            let mut state = self.write_state();
            if generation < state.generation {
                report.outcome = CycleOutcome::Stale;
                None
            } else {
                let notice = match self.settlement {
                    Settlement::AllOrNothing => settle_batch(&mut state, results, &report.failures),
                    Settlement::PerResource => settle_each(&mut state, results, &report.failures),
                };
                report.outcome = outcome_for(self.settlement, report.failures.len(), report.resources);
                state.generation = generation;
                if notice.is_some() {
                    state.last_notice.clone_from(&notice);
                }
                notice
            }
        };

        report.duration_ms = started.elapsed().as_millis() as u64;

        if let Some(notice) = notice {
            self.notifier.notify(&notice);
        }
        report
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DashboardSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: ResourceSource + Uploader> Dashboard<S> {
    /// Validate and upload a workbook, then run exactly one refresh cycle.
    ///
    /// A file that is not `.xlsx`/`.xls` is rejected before any I/O and
    /// leaves the dashboard untouched, as does a failed upload.
    pub fn ingest_file(&self, path: &Path) -> Result<CycleReport> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !upload::is_spreadsheet(&file_name) {
            let message = format!("'{file_name}' is not an Excel workbook (.xlsx or .xls)");
            self.notifier.notify(&Notice::error(message.clone()));
            anyhow::bail!(message);
        }

        let uploaded = fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|bytes| self.source.upload(&file_name, bytes));
        if let Err(err) = uploaded {
            self.notifier
                .notify(&Notice::error(format!("Upload failed: {err:#}")));
            return Err(err);
        }

        self.write_state().data_present = true;
        self.notifier
            .notify(&Notice::info(format!("Uploaded {file_name}")));

        Ok(self.refresh())
    }
}

// ---------------------------------------------------------------------------
// Cycle helpers
// ---------------------------------------------------------------------------

/// Issue every request before joining any of them.
fn fetch_all<S: ResourceSource>(source: &S, resources: &[&'static Resource]) -> Vec<Result<Value>> {
    thread::scope(|scope| {
        let handles: Vec<_> = resources
            .iter()
            .map(|&resource| scope.spawn(move || source.fetch(resource)))
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("resource request panicked")))
            })
            .collect()
    })
}

fn failure_message(err: &anyhow::Error) -> String {
    let message = format!("{err:#}");
    if message.trim().is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        message
    }
}

fn outcome_for(settlement: Settlement, failed: usize, total: usize) -> CycleOutcome {
    match (settlement, failed) {
        (_, 0) => CycleOutcome::Succeeded,
        (Settlement::AllOrNothing, _) => CycleOutcome::Failed,
        (Settlement::PerResource, n) if n >= total => CycleOutcome::Failed,
        (Settlement::PerResource, _) => CycleOutcome::Partial,
    }
}

/// All-or-nothing: one failure fails every slot with the first message.
fn settle_batch(
    state: &mut DashboardSnapshot,
    results: &[Result<Value>],
    failures: &[ResourceFailure],
) -> Option<Notice> {
    if let Some(first) = failures.first() {
        for entry in &mut state.slots {
            entry.slot.settle_err(first.message.clone());
        }
        state.kpis.clear();
        return Some(Notice::error(format!(
            "Dashboard refresh failed: {}",
            first.message
        )));
    }

    for (entry, result) in state.slots.iter_mut().zip(results) {
        if let Ok(doc) = result {
            entry.slot.settle_ok(normalize(entry.resource.kind, Some(doc)));
        }
    }
    state.kpis = kpis_from(&state.slots);
    state.last_updated = Some(Utc::now());
    None
}

/// Per-resource: every slot settles on its own request.
fn settle_each(
    state: &mut DashboardSnapshot,
    results: &[Result<Value>],
    failures: &[ResourceFailure],
) -> Option<Notice> {
    for (entry, result) in state.slots.iter_mut().zip(results) {
        match result {
            Ok(doc) => entry.slot.settle_ok(normalize(entry.resource.kind, Some(doc))),
            Err(err) => entry.slot.settle_err(failure_message(err)),
        }
    }
    state.kpis = kpis_from(&state.slots);
    if failures.len() < state.slots.len() {
        state.last_updated = Some(Utc::now());
    }

    failures.first().map(|first| {
        Notice::error(format!(
            "{} of {} dashboard resources failed to load: {}",
            failures.len(),
            state.slots.len(),
            first.message
        ))
    })
}

fn kpis_from(slots: &[SlotEntry]) -> Vec<Kpi> {
    slots
        .iter()
        .find(|e| e.resource.key == KPI_SOURCE)
        .and_then(|e| e.slot.data())
        .and_then(ChartModel::as_category)
        .map(|series| derive_kpis(series))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
