/// Integration tests for the dashboard synchronizer and file ingestion.
///
/// All sources here are in-memory so cycles are deterministic; HTTP-backed
/// cycles are covered in `http_tests.rs`.
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use safedash::charts::ChartModel;
use safedash::config::Settlement;
use safedash::dashboard::resources::{self, KPI_SOURCE, RESOURCES, Resource};
use safedash::dashboard::upload::Uploader;
use safedash::dashboard::{
    CycleOutcome, Dashboard, GENERIC_FAILURE, Notice, NoticeLevel, Notifier, ResourceSource,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn category_doc() -> Value {
    json!({
        "labels": ["Incidents", "Hazards", "Audits", "Inspections", "Near Miss"],
        "datasets": [{"label": "Entries", "data": [42, 17, 5, 9, 3]}]
    })
}

fn doc_for(resource: &Resource) -> Value {
    use safedash::charts::ChartKind::*;
    match resource.kind {
        Category => category_doc(),
        Grouped => json!({"labels": ["Plant A"], "datasets": [{"label": "Open", "data": [1]}]}),
        Trend => json!({"labels": ["2024-01", "2024-02"], "datasets": [{"data": [1, 2]}]}),
        Heat => json!({"x_labels": ["a"], "y_labels": ["b"], "values": [[3]]}),
    }
}

/// Serves canned documents; keys in `failures` fail with the mapped message.
#[derive(Default)]
struct MapSource {
    failures: HashMap<&'static str, String>,
    overrides: HashMap<&'static str, Value>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    upload_error: Option<String>,
}

impl MapSource {
    fn failing(key: &'static str, message: &str) -> Self {
        let mut source = Self::default();
        source.failures.insert(key, message.to_string());
        source
    }
}

impl ResourceSource for MapSource {
    fn fetch(&self, resource: &Resource) -> Result<Value> {
        if let Some(message) = self.failures.get(resource.key) {
            return Err(anyhow!("{message}"));
        }
        Ok(self
            .overrides
            .get(resource.key)
            .cloned()
            .unwrap_or_else(|| doc_for(resource)))
    }
}

impl Uploader for MapSource {
    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes));
        match &self.upload_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("safedash-dash-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

// ===========================================================================
// 1. Successful cycles
// ===========================================================================

#[test]
fn successful_cycle_fills_every_slot_and_kpis() {
    let notifier = Arc::new(RecordingNotifier::default());
    let dash = Dashboard::new(MapSource::default()).with_notifier(Arc::clone(&notifier));

    let report = dash.refresh();
    assert_eq!(report.outcome, CycleOutcome::Succeeded);
    assert_eq!(report.generation, 1);
    assert_eq!(report.resources, RESOURCES.len());
    assert!(report.failures.is_empty());

    let snap = dash.snapshot();
    assert!(snap.is_settled());
    for entry in &snap.slots {
        let model = entry.slot.data().expect("data committed");
        assert_eq!(model.kind(), entry.resource.kind);
        assert!(entry.slot.error().is_none());
    }

    let kpis: Vec<(String, f64)> = snap.kpis.iter().map(|k| (k.label.clone(), k.value)).collect();
    assert_eq!(
        kpis,
        [
            ("Incidents".to_string(), 42.0),
            ("Hazards".to_string(), 17.0),
            ("Audits".to_string(), 5.0),
            ("Inspections".to_string(), 9.0)
        ]
    );
    assert!(snap.last_updated.is_some());
    assert!(snap.last_notice.is_none());
    assert!(notifier.errors().is_empty());
}

#[test]
fn error_body_counts_as_success_with_empty_model() {
    let mut source = MapSource::default();
    source
        .overrides
        .insert("heatmap", json!({"error": "No data uploaded"}));
    let dash = Dashboard::new(source);

    let report = dash.refresh();
    assert_eq!(report.outcome, CycleOutcome::Succeeded);
    let snap = dash.snapshot();
    let heat = snap.slot("heatmap").unwrap().data().unwrap();
    assert!(matches!(heat, ChartModel::Heat(_)));
    assert!(heat.is_empty());
}

#[test]
fn refresh_again_replaces_previous_data() {
    let dash = Dashboard::new(MapSource::default());
    dash.refresh();
    let report = dash.refresh();
    assert_eq!(report.generation, 2);
    assert_eq!(dash.snapshot().generation, 2);
}

// ===========================================================================
// 2. All-or-nothing settlement
// ===========================================================================

#[test]
fn any_single_failure_fails_every_slot() {
    for failing in RESOURCES {
        let notifier = Arc::new(RecordingNotifier::default());
        let message = format!("GET {} returned HTTP 500", failing.path);
        let dash = Dashboard::new(MapSource::failing(failing.key, &message))
            .with_notifier(Arc::clone(&notifier));

        let report = dash.refresh();
        assert_eq!(report.outcome, CycleOutcome::Failed, "{}", failing.key);
        assert_eq!(report.failures.len(), 1);

        let snap = dash.snapshot();
        for entry in &snap.slots {
            assert!(!entry.slot.is_loading());
            assert!(entry.slot.data().is_none());
            assert_eq!(entry.slot.error(), Some(message.as_str()));
        }
        assert!(snap.kpis.is_empty());
        assert!(snap.last_updated.is_none());
        assert_eq!(notifier.errors().len(), 1, "one notice per failed cycle");
        assert!(snap.last_notice.is_some());
    }
}

#[test]
fn first_failure_in_catalogue_order_wins() {
    let mut source = MapSource::failing("hazards_heatmap", "later failure");
    source
        .failures
        .insert("monthly_trends", "earlier failure".to_string());
    let dash = Dashboard::new(source);

    let report = dash.refresh();
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].key, "monthly_trends");
    let snap = dash.snapshot();
    assert!(snap.slots.iter().all(|e| e.slot.error() == Some("earlier failure")));
}

#[test]
fn blank_error_uses_generic_message() {
    let dash = Dashboard::new(MapSource::failing("heatmap", ""));
    dash.refresh();
    let snap = dash.snapshot();
    assert_eq!(snap.slot(KPI_SOURCE).unwrap().error(), Some(GENERIC_FAILURE));
}

#[test]
fn failure_after_success_clears_previous_data() {
    // Succeeds for the first cycle, then the heatmap request fails.
    struct FlipSource(AtomicUsize);
    impl ResourceSource for FlipSource {
        fn fetch(&self, resource: &Resource) -> Result<Value> {
            let call = self.0.fetch_add(1, Ordering::SeqCst);
            if call >= RESOURCES.len() && resource.key == "heatmap" {
                anyhow::bail!("timeout");
            }
            Ok(doc_for(resource))
        }
    }

    let dash = Dashboard::new(FlipSource(AtomicUsize::new(0)));
    assert_eq!(dash.refresh().outcome, CycleOutcome::Succeeded);
    assert!(dash.snapshot().slot("heatmap").unwrap().data().is_some());
    assert_eq!(dash.refresh().outcome, CycleOutcome::Failed);
    let snap = dash.snapshot();
    assert!(snap.slots.iter().all(|e| e.slot.data().is_none()));
    assert!(snap.kpis.is_empty());
    // the earlier success timestamp survives
    assert!(snap.last_updated.is_some());
}

// ===========================================================================
// 3. Per-resource settlement
// ===========================================================================

#[test]
fn per_resource_isolates_failures() {
    let notifier = Arc::new(RecordingNotifier::default());
    let dash = Dashboard::new(MapSource::failing("hazards_by_area", "GET /hazards/by-area returned HTTP 404"))
        .with_settlement(Settlement::PerResource)
        .with_notifier(Arc::clone(&notifier));

    let report = dash.refresh();
    assert_eq!(report.outcome, CycleOutcome::Partial);

    let snap = dash.snapshot();
    for entry in &snap.slots {
        if entry.resource.key == "hazards_by_area" {
            assert!(entry.slot.error().unwrap().contains("404"));
            assert!(entry.slot.data().is_none());
        } else {
            assert!(entry.slot.data().is_some(), "{}", entry.resource.key);
        }
    }
    assert_eq!(snap.kpis.len(), 4);
    assert!(snap.last_updated.is_some());

    let errors = notifier.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("1 of 17"));
}

#[test]
fn per_resource_without_kpi_source_clears_kpis() {
    let dash = Dashboard::new(MapSource::failing(KPI_SOURCE, "down"))
        .with_settlement(Settlement::PerResource);
    dash.refresh();
    assert!(dash.snapshot().kpis.is_empty());
}

#[test]
fn per_resource_total_failure_is_failed() {
    let subset = vec![resources::find("heatmap").unwrap()];
    let dash = Dashboard::new(MapSource::failing("heatmap", "down"))
        .with_resources(subset)
        .with_settlement(Settlement::PerResource);
    let report = dash.refresh();
    assert_eq!(report.outcome, CycleOutcome::Failed);
    assert!(dash.snapshot().last_updated.is_none());
}

// ===========================================================================
// 4. Concurrency
// ===========================================================================

/// Every fetch waits until all resources of the cycle are in flight.
struct RendezvousSource {
    expected: usize,
    arrived: Mutex<usize>,
    all_in: Condvar,
}

impl ResourceSource for RendezvousSource {
    fn fetch(&self, resource: &Resource) -> Result<Value> {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        self.all_in.notify_all();
        let (arrived, timeout) = self
            .all_in
            .wait_timeout_while(arrived, Duration::from_secs(5), |n| *n < self.expected)
            .unwrap();
        if timeout.timed_out() {
            anyhow::bail!("only {} requests in flight", *arrived);
        }
        Ok(doc_for(resource))
    }
}

#[test]
fn all_requests_are_in_flight_together() {
    let dash = Dashboard::new(RendezvousSource {
        expected: RESOURCES.len(),
        arrived: Mutex::new(0),
        all_in: Condvar::new(),
    });
    let report = dash.refresh();
    assert_eq!(report.outcome, CycleOutcome::Succeeded, "{:?}", report.failures);
}

/// The first call blocks until released; later calls answer at once.
struct GatedSource {
    calls: AtomicUsize,
    released: Mutex<bool>,
    gate: Condvar,
}

impl ResourceSource for GatedSource {
    fn fetch(&self, _resource: &Resource) -> Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            let guard = self.released.lock().unwrap();
            let _ = self
                .gate
                .wait_timeout_while(guard, Duration::from_secs(5), |released| !*released)
                .unwrap();
            return Ok(json!({"labels": ["old"], "datasets": [{"data": [1]}]}));
        }
        Ok(json!({"labels": ["new"], "datasets": [{"data": [2]}]}))
    }
}

#[test]
fn older_cycle_finishing_last_is_discarded() {
    let dash = Arc::new(
        Dashboard::new(GatedSource {
            calls: AtomicUsize::new(0),
            released: Mutex::new(false),
            gate: Condvar::new(),
        })
        .with_resources(vec![resources::find(KPI_SOURCE).unwrap()]),
    );

    let older = {
        let dash = Arc::clone(&dash);
        thread::spawn(move || dash.refresh())
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while dash.source().calls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }

    let newer = dash.refresh();
    assert_eq!(newer.generation, 2);
    assert_eq!(newer.outcome, CycleOutcome::Succeeded);

    *dash.source().released.lock().unwrap() = true;
    dash.source().gate.notify_all();
    let older = older.join().unwrap();
    assert_eq!(older.generation, 1);
    assert_eq!(older.outcome, CycleOutcome::Stale);

    let snap = dash.snapshot();
    assert_eq!(snap.generation, 2);
    let series = snap.slot(KPI_SOURCE).unwrap().data().unwrap().as_category().unwrap().clone();
    assert_eq!(series[0].name, "new");
}

// ===========================================================================
// 5. File ingestion
// ===========================================================================

#[test]
fn non_spreadsheet_is_rejected_without_io() {
    let notifier = Arc::new(RecordingNotifier::default());
    let dash = Dashboard::new(MapSource::default()).with_notifier(Arc::clone(&notifier));

    let err = dash
        .ingest_file(&PathBuf::from("/definitely/missing/report.csv"))
        .unwrap_err();
    assert!(err.to_string().contains("report.csv"));
    assert!(dash.source().uploads.lock().unwrap().is_empty());

    let snap = dash.snapshot();
    assert_eq!(snap.generation, 0);
    assert!(!snap.data_present);
    assert!(snap.last_notice.is_none());
    assert_eq!(notifier.errors().len(), 1);
}

#[test]
fn accepted_workbook_is_uploaded_then_refreshed_once() {
    let path = temp_file("VEHS.XLSX", b"PK\x03\x04workbook");
    let dash = Dashboard::new(MapSource::default());

    let report = dash.ingest_file(&path).unwrap();
    assert_eq!(report.generation, 1);
    assert_eq!(report.outcome, CycleOutcome::Succeeded);

    let uploads = dash.source().uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "VEHS.XLSX");
    assert_eq!(uploads[0].1, b"PK\x03\x04workbook");

    let snap = dash.snapshot();
    assert!(snap.data_present);
    assert_eq!(snap.generation, 1);
}

#[test]
fn failed_upload_leaves_state_untouched() {
    let path = temp_file("data.xls", b"bytes");
    let notifier = Arc::new(RecordingNotifier::default());
    let source = MapSource {
        upload_error: Some("Invalid Excel file".into()),
        ..Default::default()
    };
    let dash = Dashboard::new(source).with_notifier(Arc::clone(&notifier));

    let err = dash.ingest_file(&path).unwrap_err();
    assert_eq!(err.to_string(), "Invalid Excel file");

    let snap = dash.snapshot();
    assert_eq!(snap.generation, 0);
    assert!(!snap.data_present);
    assert!(snap.slots.iter().all(|e| e.slot.is_loading()));
    assert_eq!(notifier.errors(), ["Upload failed: Invalid Excel file"]);
}

#[test]
fn unreadable_workbook_is_reported() {
    let dash = Dashboard::new(MapSource::default());
    let err = dash
        .ingest_file(&PathBuf::from("/definitely/missing/data.xlsx"))
        .unwrap_err();
    assert!(format!("{err:#}").contains("failed to read"));
    assert!(dash.source().uploads.lock().unwrap().is_empty());
}
