//! CLI command implementations for safedash.
//!
//! Provides subcommand handlers for:
//! - `safedash refresh`: run one refresh cycle and print every slot
//! - `safedash upload FILE`: upload a workbook, then refresh
//! - `safedash chat` / `safedash insights`: stream an answer to stdout
//! - `safedash resources`: list the resource catalogue
//! - `safedash serve`: embedded web dashboard
//! - `safedash stats`: event log summary
//! - `safedash health`: check config, backend and log
//! - `safedash config show|init|set|reset`: configuration management

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::analytics::logger;
use crate::analytics::reporter::{self, Stats};
use crate::backend::{HttpBackend, HttpStreamClient};
use crate::charts::ChartModel;
use crate::config::schema::BackendConfig;
use crate::config::{self, SafedashConfig};
use crate::dashboard::resources::{self, RESOURCES};
use crate::dashboard::{
    CycleOutcome, CycleReport, Dashboard, DashboardSnapshot, Notice, NoticeLevel, Notifier,
    ResourceSource,
};
use crate::stream::meta::{self, META_MARKER, TableData};
use crate::stream::scheduler::RenderScheduler;
use crate::stream::session::ConversationSlot;
use crate::stream::{StreamRequest, StreamTransport};
use crate::web;

/// Output format for report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Prints notices to stderr.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => eprintln!("{} {}", "✗".red().bold(), notice.message.red()),
            NoticeLevel::Info => eprintln!("{} {}", "✓".green().bold(), notice.message),
        }
    }
}

fn build_dashboard(cfg: &SafedashConfig) -> Dashboard<HttpBackend> {
    Dashboard::from_config(HttpBackend::from_config(&cfg.backend), cfg).with_notifier(ConsoleNotifier)
}

// ---------------------------------------------------------------------------
// safedash refresh
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RefreshOutput<'a> {
    report: &'a CycleReport,
    dashboard: &'a DashboardSnapshot,
}

/// Run one cycle against the configured backend and print the result.
pub fn run_refresh(format: OutputFormat) -> Result<()> {
    let cfg = config::load();
    let dashboard = build_dashboard(&cfg);
    let report = dashboard.refresh();
    print_cycle(&report, &dashboard.snapshot(), format)
}

fn print_cycle(report: &CycleReport, snapshot: &DashboardSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = RefreshOutput {
                report,
                dashboard: snapshot,
            };
            let json = serde_json::to_string_pretty(&output).context("failed to serialize refresh")?;
            println!("{json}");
        }
        OutputFormat::Table => print_snapshot_table(report, snapshot),
    }
    Ok(())
}

fn print_snapshot_table(report: &CycleReport, snapshot: &DashboardSnapshot) {
    println!("{}", "Safety Dashboard".bold().cyan());
    println!("{}", "=".repeat(72));

    if !snapshot.kpis.is_empty() {
        let line: Vec<String> = snapshot
            .kpis
            .iter()
            .map(|k| format!("{} {}", k.label.bold(), format_value(k.value)))
            .collect();
        println!("  {}", line.join("   "));
        println!();
    }

    for entry in &snapshot.slots {
        let (status, detail) = if entry.slot.is_loading() {
            ("…".yellow(), "loading".to_string())
        } else if let Some(err) = entry.slot.error() {
            ("✗".red().bold(), err.to_string())
        } else {
            (
                "✓".green().bold(),
                entry.slot.data().map(describe).unwrap_or_default(),
            )
        };
        println!(
            "  {} {:<36} {:<9} {}",
            status,
            truncate(entry.resource.title, 36),
            entry.resource.kind.to_string().dimmed(),
            detail.dimmed()
        );
    }

    println!();
    let outcome = match report.outcome {
        CycleOutcome::Succeeded => report.outcome.to_string().green(),
        CycleOutcome::Partial | CycleOutcome::Stale => report.outcome.to_string().yellow(),
        CycleOutcome::Failed => report.outcome.to_string().red(),
    };
    println!(
        "  {} cycle {} {} in {} ms ({} of {} requests failed)",
        "Result:".bold(),
        report.generation,
        outcome,
        report.duration_ms,
        report.failures.len(),
        report.resources
    );
    if let Some(at) = snapshot.last_updated {
        println!("  {} {}", "Last updated:".bold(), at.to_rfc3339());
    }
}

/// One-line shape summary of a chart.
fn describe(model: &ChartModel) -> String {
    match model {
        _ if model.is_empty() => "no data".to_string(),
        ChartModel::Category(points) => format!("{} categories", points.len()),
        ChartModel::Trend(points) => format!("{} periods", points.len()),
        ChartModel::Grouped(g) => format!("{} rows × {} series", g.rows.len(), g.series.len()),
        ChartModel::Heat(h) => format!(
            "{}×{} cells, {}–{}",
            h.y_labels.len(),
            h.x_labels.len(),
            format_value(h.min),
            format_value(h.max)
        ),
    }
}

// ---------------------------------------------------------------------------
// safedash upload
// ---------------------------------------------------------------------------

/// Upload a workbook and refresh the dashboard.
pub fn run_upload(path: &Path, format: OutputFormat) -> Result<()> {
    let cfg = config::load();
    let dashboard = build_dashboard(&cfg);
    let report = dashboard.ingest_file(path)?;
    print_cycle(&report, &dashboard.snapshot(), format)
}

// ---------------------------------------------------------------------------
// safedash chat | insights
// ---------------------------------------------------------------------------

/// Stream the answer to a free-form question.
pub fn run_chat(question: &str, model: Option<String>) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }
    stream_to_stdout(StreamRequest::Chat {
        question: question.to_string(),
        model,
    })
}

/// Stream insights for one chart.
pub fn run_insights(chart_key: &str, brief: bool) -> Result<()> {
    if resources::find(chart_key).is_none() {
        anyhow::bail!("unknown chart key '{chart_key}' (see `safedash resources`)");
    }
    stream_to_stdout(StreamRequest::Insights {
        chart_key: chart_key.to_string(),
        verbose: !brief,
    })
}

fn stream_to_stdout(request: StreamRequest) -> Result<()> {
    let cfg = config::load();
    let transport: Arc<dyn StreamTransport> = Arc::new(HttpStreamClient::from_config(&cfg.chat));
    let scheduler = Arc::new(RenderScheduler::<String>::from_millis(
        cfg.render.frame_interval_ms,
    ));
    let tick = scheduler.interval().max(Duration::from_millis(1));

    let mut slot = ConversationSlot::new(transport).with_event_log(cfg.logging.enabled);
    let mut printed = 0;
    let handle = slot.start(request, scheduler.clone());
    while !handle.is_finished() {
        thread::sleep(tick);
        if let Some(text) = scheduler.poll(Instant::now()) {
            printed = print_new_text(meta::visible_prefix(&text), printed)?;
        }
    }

    let state = slot.wait().unwrap_or_default();
    scheduler.flush();
    let (visible, trailer) = meta::split(&state.accumulated_text);
    print_new_text(visible, printed)?;
    println!();

    if let Some(err) = &state.error
        && state.accumulated_text.contains(META_MARKER)
    {
        eprintln!("{} {}", "✗".red().bold(), err.red());
    }

    if let Some(trailer) = trailer {
        if let Some(note) = &trailer.note {
            println!("\n{}", note.dimmed());
        }
        for table in trailer.tables() {
            println!();
            print_table(table);
        }
    }
    Ok(())
}

/// Print the part of `visible` beyond the first `printed` bytes.
fn print_new_text(visible: &str, printed: usize) -> Result<usize> {
    if visible.len() <= printed || !visible.is_char_boundary(printed) {
        return Ok(printed);
    }
    let mut out = io::stdout().lock();
    out.write_all(visible[printed..].as_bytes())?;
    out.flush()?;
    Ok(visible.len())
}

fn print_table(table: &TableData) {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect()
        })
        .collect();

    let columns = table
        .headers
        .len()
        .max(cells.iter().map(Vec::len).max().unwrap_or(0));
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            let header = table.headers.get(i).map_or(0, |h| h.chars().count());
            cells
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
                .max(header)
        })
        .collect();

    let header: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{:<w$}", table.headers.get(i).map_or("", String::as_str)))
        .collect();
    println!("  {}", header.join("  ").bold());
    println!("  {}", "-".repeat(widths.iter().sum::<usize>() + 2 * columns.saturating_sub(1)));
    for row in &cells {
        let line: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:<w$}", row.get(i).map_or("", String::as_str)))
            .collect();
        println!("  {}", line.join("  "));
    }
}

// ---------------------------------------------------------------------------
// safedash resources
// ---------------------------------------------------------------------------

pub fn run_resources() -> Result<()> {
    let cfg = config::load();
    let selected = resources::select(cfg.dashboard.resource_set);

    println!("{}", "Dashboard Resources".bold().cyan());
    println!("{}", "=".repeat(72));
    println!(
        "  {:<2}{:<28} {:<9} {:<9} {}",
        "",
        "Key".bold(),
        "Set".bold(),
        "Kind".bold(),
        "Path".bold()
    );
    for r in RESOURCES {
        let marker = if selected.iter().any(|s| s.key == r.key) {
            "●".green()
        } else {
            "○".dimmed()
        };
        println!(
            "  {} {:<28} {:<9} {:<9} {}",
            marker,
            r.key,
            r.set.to_string(),
            r.kind.to_string(),
            r.path.dimmed()
        );
    }
    println!();
    println!(
        "  {} {} of {} polled (dashboard.resource_set)",
        "Selected:".bold(),
        selected.len(),
        RESOURCES.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// safedash serve
// ---------------------------------------------------------------------------

pub fn run_serve(addr: &str, open: bool) -> Result<()> {
    let cfg = config::load();
    web::serve(addr, Arc::new(build_dashboard(&cfg)), open)
}

// ---------------------------------------------------------------------------
// safedash stats
// ---------------------------------------------------------------------------

/// Summarize the event log.
pub fn run_stats(format: OutputFormat, days: Option<u32>) -> Result<()> {
    let stats = reporter::compute_stats(days);

    if stats.is_empty() {
        println!(
            "{}",
            "No data yet. Run `safedash refresh` or `safedash chat` to record events.".yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&stats).context("failed to serialize stats")?;
            println!("{json}");
        }
        OutputFormat::Table => print_stats_table(&stats),
    }
    Ok(())
}

fn print_stats_table(stats: &Stats) {
    println!("{}", "safedash Activity Report".bold().cyan());
    println!("{}", "=".repeat(60));
    println!();

    let c = &stats.cycles;
    println!("  {} {}", "Refresh cycles:".bold(), format_number(c.total));
    println!(
        "  {} {} succeeded, {} partial, {} failed, {} stale",
        "Outcomes:      ".bold(),
        c.succeeded.to_string().green(),
        c.partial.to_string().yellow(),
        c.failed.to_string().red(),
        c.stale
    );
    println!("  {} {:.1}%", "Success rate:  ".bold(), c.success_pct());
    println!("  {} {:.0} ms", "Avg duration:  ".bold(), c.avg_duration_ms);

    if !stats.sessions.is_empty() {
        println!();
        println!("{}", "Streaming sessions".bold());
        println!(
            "  {:<10} {:>6} {:>6} {:>10} {:>7} {:>10}",
            "Kind", "Count", "Done", "Cancelled", "Failed", "Avg ms"
        );
        for s in &stats.sessions {
            println!(
                "  {:<10} {:>6} {:>6} {:>10} {:>7} {:>10.0}",
                s.kind, s.count, s.done, s.cancelled, s.failed, s.avg_duration_ms
            );
        }
    }

    if !stats.top_errors.is_empty() {
        println!();
        println!("{}", "Most frequent failures".bold());
        for e in &stats.top_errors {
            println!("  {:>4}×  {}", e.count, truncate(&e.message, 70).red());
        }
    }

    if !stats.daily.is_empty() {
        println!();
        println!("{}", "Daily".bold());
        for d in &stats.daily {
            println!("  {}  {:>4} cycles  {:>4} failed", d.date, d.cycles, d.failed);
        }
    }
}

// ---------------------------------------------------------------------------
// safedash health
// ---------------------------------------------------------------------------

pub fn run_health() -> Result<()> {
    println!("{}", "safedash Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let cfg = config::load();
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.safedash/config.toml found"
        } else {
            "not found (run `safedash config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".safedash.toml found"
        } else {
            "none (optional)"
        },
    );
    print_health_item(
        "Settlement / resources",
        true,
        &format!(
            "{} / {} polled",
            cfg.dashboard.settlement,
            resources::select(cfg.dashboard.resource_set).len()
        ),
    );

    let backend = HttpBackend::from_config(&cfg.backend);
    let backend_ok = backend.is_reachable();
    print_health_item(
        "Backend",
        backend_ok,
        &if backend_ok {
            format!("reachable at {}", cfg.backend.api_url)
        } else {
            format!("not reachable at {}", cfg.backend.api_url)
        },
    );

    if cfg.chat.url.trim_end_matches('/') != cfg.backend.api_url.trim_end_matches('/') {
        let chat_ok = HttpBackend::from_config(&BackendConfig {
            api_url: cfg.chat.url.clone(),
            timeout_ms: cfg.backend.timeout_ms,
        })
        .is_reachable();
        print_health_item(
            "Chat service",
            chat_ok,
            &format!(
                "{} at {}",
                if chat_ok { "reachable" } else { "not reachable" },
                cfg.chat.url
            ),
        );
    }
    print_health_item("Chat model", true, &cfg.chat.model);

    let log_exists = logger::events_log_path()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Event log",
        log_exists || !cfg.logging.enabled,
        &if !cfg.logging.enabled {
            "disabled".to_string()
        } else if log_exists {
            format!("{} events", logger::read_all_events().len())
        } else {
            "no log file yet".to_string()
        },
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// safedash config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective safedash Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    for (exists, name) in [
        (global_exists, "~/.safedash/config.toml"),
        (project_exists, ".safedash.toml"),
    ] {
        if exists {
            println!("  {} {}", "✓".green(), name.dimmed());
        } else {
            println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
        }
    }
    println!(
        "  {} {}",
        "·".dimmed(),
        "SAFEDASH_* environment variables".dimmed()
    );

    Ok(())
}

/// Initialize a default config file at `~/.safedash/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Integers without a fraction, everything else with one decimal.
fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{CategoryPoint, HeatMatrix};

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn format_value_drops_integral_fraction() {
        assert_eq!(format_value(12.0), "12");
        assert_eq!(format_value(2.34), "2.3");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("Sécurité", 20), "Sécurité");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }

    #[test]
    fn describe_summarizes_shape() {
        let cat = ChartModel::Category(vec![CategoryPoint::new("A", 1.0)]);
        assert_eq!(describe(&cat), "1 categories");
        assert_eq!(describe(&ChartModel::Heat(HeatMatrix::default())), "no data");
    }

    #[test]
    fn new_text_is_printed_once() {
        assert_eq!(print_new_text("", 0).unwrap(), 0);
        assert_eq!(print_new_text("ab", 2).unwrap(), 2);
        // split inside a multi-byte character: wait for more text
        assert_eq!(print_new_text("é", 1).unwrap(), 1);
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
    }
}
