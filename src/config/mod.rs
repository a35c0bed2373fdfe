/// Configuration system for safedash.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::SafedashConfig::default()`]
/// 2. **User global config**: `~/.safedash/config.toml`
/// 3. **Project local config**: `.safedash.toml` in the current working directory
/// 4. **Environment variables**: `SAFEDASH_*` overrides (highest precedence)
///
/// Later layers override earlier ones key by key. Keys no layer sets keep
/// their built-in defaults.
///
/// # Usage
///
/// ```rust,ignore
/// let cfg = safedash::config::load();
/// let backend = safedash::backend::HttpBackend::from_config(&cfg.backend);
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::{ResourceSelection, SafedashConfig, Settlement};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars. File layers merge key by key, so a project file that only sets
/// `[chat] model` keeps the global `[backend]` settings.
pub fn load() -> SafedashConfig {
    let mut merged = toml::Value::Table(toml::map::Map::new());
    for path in [global_config_path(), project_config_path()] {
        if let Some(layer) = load_toml_file(path) {
            merge_values(&mut merged, layer);
        }
    }

    let mut config: SafedashConfig = merged.try_into().unwrap_or_default();
    apply_env_overrides(&mut config);
    config
}

/// Load a TOML config file from the given path (if it exists).
///
/// Returns `None` if the path is `None`, the file doesn't exist, or the
/// content does not match the schema. A broken config file never prevents
/// the dashboard from starting; it falls back to the previous layer.
fn load_toml_file(path: Option<PathBuf>) -> Option<toml::Value> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    toml::from_str::<SafedashConfig>(&content).ok()?;
    toml::from_str(&content).ok()
}

/// Merge `overlay` into `base`: tables recursively, everything else replaced.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Directory holding the global config and the event log: `~/.safedash/`.
pub fn state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".safedash"))
}

fn global_config_path() -> Option<PathBuf> {
    state_dir().map(|dir| dir.join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".safedash.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `SAFEDASH_API_URL`: analytics backend base URL
/// - `SAFEDASH_TIMEOUT_MS`: resource request timeout
/// - `SAFEDASH_CHAT_URL`: streaming service base URL
/// - `SAFEDASH_CHAT_MODEL`: chat model identifier
/// - `SAFEDASH_SETTLEMENT`: `all-or-nothing` | `per-resource`
/// - `SAFEDASH_RESOURCE_SET`: `all` | `unified` | `modular`
/// - `SAFEDASH_LOG`: event log on/off (`1`/`true`/`yes`/`on`)
fn apply_env_overrides(config: &mut SafedashConfig) {
    if let Ok(val) = std::env::var("SAFEDASH_API_URL")
        && !val.is_empty()
    {
        config.backend.api_url = val;
    }
    if let Ok(val) = std::env::var("SAFEDASH_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("SAFEDASH_CHAT_URL")
        && !val.is_empty()
    {
        config.chat.url = val;
    }
    if let Ok(val) = std::env::var("SAFEDASH_CHAT_MODEL")
        && !val.is_empty()
    {
        config.chat.model = val;
    }
    if let Ok(val) = std::env::var("SAFEDASH_SETTLEMENT")
        && let Some(settlement) = parse_settlement(&val)
    {
        config.dashboard.settlement = settlement;
    }
    if let Ok(val) = std::env::var("SAFEDASH_RESOURCE_SET")
        && let Some(selection) = parse_resource_selection(&val)
    {
        config.dashboard.resource_set = selection;
    }
    if let Ok(val) = std::env::var("SAFEDASH_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_settlement(val: &str) -> Option<Settlement> {
    match val.to_ascii_lowercase().as_str() {
        "all-or-nothing" | "all_or_nothing" | "batch" => Some(Settlement::AllOrNothing),
        "per-resource" | "per_resource" | "settled" => Some(Settlement::PerResource),
        _ => None,
    }
}

fn parse_resource_selection(val: &str) -> Option<ResourceSelection> {
    match val.to_ascii_lowercase().as_str() {
        "all" => Some(ResourceSelection::All),
        "unified" => Some(ResourceSelection::Unified),
        "modular" => Some(ResourceSelection::Modular),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.safedash/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.safedash/ directory")?;
    }

    fs::write(&path, SafedashConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key (dotted, e.g. `chat.model`) in the global config
/// file, creating it from defaults when missing.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let source = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&SafedashConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&source).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    // Reject values the schema cannot load (e.g. an unknown settlement).
    let updated = toml::to_string_pretty(&root).context("failed to serialize config")?;
    toml::from_str::<SafedashConfig>(&updated)
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, updated).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
        None => anyhow::bail!("unknown config key '{key}'"),
    };

    table.insert((*leaf).to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_truthy_accepts_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("yes"));
        assert!(is_truthy("On"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn parse_settlement_handles_variants() {
        assert_eq!(parse_settlement("all-or-nothing"), Some(Settlement::AllOrNothing));
        assert_eq!(parse_settlement("PER_RESOURCE"), Some(Settlement::PerResource));
        assert_eq!(parse_settlement("settled"), Some(Settlement::PerResource));
        assert_eq!(parse_settlement("sometimes"), None);
    }

    #[test]
    fn parse_resource_selection_handles_variants() {
        assert_eq!(parse_resource_selection("Unified"), Some(ResourceSelection::Unified));
        assert_eq!(parse_resource_selection("modular"), Some(ResourceSelection::Modular));
        assert_eq!(parse_resource_selection("some"), None);
    }

    #[test]
    fn set_toml_value_updates_string() {
        let mut root: toml::Value = toml::from_str("[chat]\nmodel = \"a\"\n").unwrap();
        set_toml_value(&mut root, "chat.model", "gpt-4o").unwrap();
        assert_eq!(root["chat"]["model"].as_str(), Some("gpt-4o"));
    }

    #[test]
    fn set_toml_value_updates_integer_and_bool() {
        let mut root: toml::Value =
            toml::from_str("[render]\nframe_interval_ms = 16\n[logging]\nenabled = true\n")
                .unwrap();
        set_toml_value(&mut root, "render.frame_interval_ms", "33").unwrap();
        set_toml_value(&mut root, "logging.enabled", "off").unwrap();
        assert_eq!(root["render"]["frame_interval_ms"].as_integer(), Some(33));
        assert_eq!(root["logging"]["enabled"].as_bool(), Some(false));
    }

    #[test]
    fn set_toml_value_rejects_bad_integer() {
        let mut root: toml::Value = toml::from_str("[backend]\ntimeout_ms = 5\n").unwrap();
        assert!(set_toml_value(&mut root, "backend.timeout_ms", "soon").is_err());
    }

    #[test]
    fn set_toml_value_rejects_unknown_keys() {
        let mut root: toml::Value = toml::from_str("[chat]\nmodel = \"a\"\n").unwrap();
        assert!(set_toml_value(&mut root, "nonexistent.key", "v").is_err());
        assert!(set_toml_value(&mut root, "chat.temperature", "0.2").is_err());
    }

    #[test]
    fn merge_values_keeps_keys_the_overlay_does_not_set() {
        let mut base: toml::Value =
            toml::from_str("[backend]\napi_url = \"http://global:1\"\n[chat]\nmodel = \"a\"\n")
                .unwrap();
        let overlay: toml::Value = toml::from_str("[chat]\nmodel = \"b\"\n").unwrap();
        merge_values(&mut base, overlay);

        let config: SafedashConfig = base.try_into().unwrap();
        assert_eq!(config.backend.api_url, "http://global:1");
        assert_eq!(config.chat.model, "b");
        assert_eq!(config.chat.chat_path, "/qa/stream");
    }

    #[test]
    fn show_effective_config_round_trips() {
        let toml_str = show_effective_config().unwrap();
        let _: SafedashConfig = toml::from_str(&toml_str).unwrap();
    }
}
