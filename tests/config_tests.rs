/// Integration tests for configuration loading and its effect on the
/// dashboard and clients.
///
/// # Safety
///
/// The environment test uses `std::env::set_var` / `remove_var`, which are
/// `unsafe` in Rust 2024 edition. It is the only test in this binary that
/// touches the environment or calls `config::load()`, so no other thread
/// reads these variables concurrently.
use safedash::backend::HttpBackend;
use safedash::config::schema::ChatConfig;
use safedash::config::{self, ResourceSelection, SafedashConfig, Settlement};
use safedash::dashboard::Dashboard;
use safedash::dashboard::resources::{self, ResourceSet};

/// Helper: set an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn set_env(key: &str, val: &str) {
    unsafe { std::env::set_var(key, val) }
}

/// Helper: remove an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) }
}

// ---------------------------------------------------------------------------
// Environment overrides
//
// Combined into one #[test] so the env mutations never race.
// ---------------------------------------------------------------------------

#[test]
fn env_vars_override_every_file_layer() {
    unsafe { set_env("SAFEDASH_API_URL", "http://analytics.internal:9000") };
    unsafe { set_env("SAFEDASH_TIMEOUT_MS", "2500") };
    unsafe { set_env("SAFEDASH_CHAT_URL", "http://llm.internal") };
    unsafe { set_env("SAFEDASH_CHAT_MODEL", "llama3") };
    unsafe { set_env("SAFEDASH_SETTLEMENT", "per-resource") };
    unsafe { set_env("SAFEDASH_RESOURCE_SET", "modular") };
    unsafe { set_env("SAFEDASH_LOG", "0") };

    let cfg = config::load();
    assert_eq!(cfg.backend.api_url, "http://analytics.internal:9000");
    assert_eq!(cfg.backend.timeout_ms, 2500);
    assert_eq!(cfg.chat.url, "http://llm.internal");
    assert_eq!(cfg.chat.model, "llama3");
    assert_eq!(cfg.dashboard.settlement, Settlement::PerResource);
    assert_eq!(cfg.dashboard.resource_set, ResourceSelection::Modular);
    assert!(!cfg.logging.enabled);

    // --- invalid values leave the file/default layer in place ---
    unsafe { set_env("SAFEDASH_TIMEOUT_MS", "soon") };
    unsafe { set_env("SAFEDASH_SETTLEMENT", "eventually") };
    unsafe { set_env("SAFEDASH_API_URL", "") };
    let cfg = config::load();
    assert_ne!(cfg.backend.timeout_ms, 0);
    assert_ne!(cfg.backend.api_url, "");
    assert_ne!(cfg.backend.api_url, "http://analytics.internal:9000");

    // --- "yes" enables the event log ---
    unsafe { set_env("SAFEDASH_LOG", "yes") };
    assert!(config::load().logging.enabled);

    for key in [
        "SAFEDASH_API_URL",
        "SAFEDASH_TIMEOUT_MS",
        "SAFEDASH_CHAT_URL",
        "SAFEDASH_CHAT_MODEL",
        "SAFEDASH_SETTLEMENT",
        "SAFEDASH_RESOURCE_SET",
        "SAFEDASH_LOG",
    ] {
        unsafe { remove_env(key) };
    }
}

// ---------------------------------------------------------------------------
// Config → components
// ---------------------------------------------------------------------------

#[test]
fn dashboard_from_config_applies_selection_and_settlement() {
    let mut cfg = SafedashConfig::default();
    cfg.dashboard.resource_set = ResourceSelection::Unified;
    cfg.dashboard.settlement = Settlement::PerResource;
    cfg.logging.enabled = false;

    let backend = HttpBackend::from_config(&cfg.backend);
    let dash = Dashboard::from_config(backend, &cfg);
    assert_eq!(dash.settlement(), Settlement::PerResource);
    assert_eq!(dash.resources().len(), 9);
    assert!(dash.resources().iter().all(|r| r.set == ResourceSet::Unified));

    let snap = dash.snapshot();
    assert_eq!(snap.slots.len(), 9);
    assert!(snap.slots.iter().all(|e| e.slot.is_loading()));
    assert_eq!(snap.generation, 0);
}

#[test]
fn resource_selections_partition_the_catalogue() {
    let unified = resources::select(ResourceSelection::Unified);
    let modular = resources::select(ResourceSelection::Modular);
    let all = resources::select(ResourceSelection::All);
    assert_eq!(unified.len() + modular.len(), all.len());
    assert_eq!(all.len(), resources::RESOURCES.len());
    assert_eq!(all[0].key, resources::KPI_SOURCE);
}

#[test]
fn annotated_default_file_matches_builtin_defaults() {
    let parsed: SafedashConfig = toml::from_str(&SafedashConfig::default_toml()).unwrap();
    let builtin = SafedashConfig::default();
    assert_eq!(parsed.backend.api_url, builtin.backend.api_url);
    assert_eq!(parsed.backend.timeout_ms, builtin.backend.timeout_ms);
    assert_eq!(parsed.chat.model, builtin.chat.model);
    assert_eq!(parsed.chat.chat_path, ChatConfig::default().chat_path);
    assert_eq!(parsed.chat.timeout_ms, builtin.chat.timeout_ms);
    assert_eq!(parsed.dashboard.settlement, builtin.dashboard.settlement);
    assert_eq!(parsed.dashboard.resource_set, builtin.dashboard.resource_set);
    assert_eq!(parsed.render.frame_interval_ms, builtin.render.frame_interval_ms);
    assert_eq!(parsed.logging.enabled, builtin.logging.enabled);
}
