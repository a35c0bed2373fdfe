/// Configuration schema and defaults for safedash.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[backend]`, `[chat]`, `[dashboard]`, `[render]` and `[logging]`.
///
/// Every field has a built-in default pointing at a backend running on the
/// local machine, so an empty config file (or none at all) is valid.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level safedash configuration.
///
/// Maps directly to the `~/.safedash/config.toml` and `.safedash.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafedashConfig {
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub dashboard: DashboardConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Analytics backend (chart resources and uploads).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the analytics API.
    pub api_url: String,
    /// Per-request timeout for resource fetches and uploads (milliseconds).
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [chat]
// ---------------------------------------------------------------------------

/// Streaming chat and insights service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the streaming service.
    pub url: String,
    /// Model identifier sent with every chat question.
    pub model: String,
    /// Path of the chat stream endpoint.
    pub chat_path: String,
    /// Path of the chart insights stream endpoint.
    pub insights_path: String,
    /// Longest silence tolerated between stream chunks (milliseconds).
    pub timeout_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            model: "gpt-4o-mini".to_string(),
            chat_path: "/qa/stream".to_string(),
            insights_path: "/chart/insights/stream".to_string(),
            timeout_ms: 120_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

/// How a refresh cycle settles when some requests fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Settlement {
    /// One failing request fails every slot with the same message.
    #[default]
    AllOrNothing,
    /// Each slot settles with its own request's outcome.
    PerResource,
}

impl std::fmt::Display for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllOrNothing => write!(f, "all-or-nothing"),
            Self::PerResource => write!(f, "per-resource"),
        }
    }
}

/// Which resource groups a refresh cycle pulls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceSelection {
    /// Unified and modular resources.
    #[default]
    All,
    /// Cross-category overview charts only.
    Unified,
    /// Incident/hazard specific charts only.
    Modular,
}

impl std::fmt::Display for ResourceSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Unified => write!(f, "unified"),
            Self::Modular => write!(f, "modular"),
        }
    }
}

/// Dashboard synchronizer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// `all-or-nothing` | `per-resource`.
    pub settlement: Settlement,
    /// `all` | `unified` | `modular`.
    pub resource_set: ResourceSelection,
}

// ---------------------------------------------------------------------------
// [render]
// ---------------------------------------------------------------------------

/// Incremental rendering of streamed text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Minimum time between two visible updates (milliseconds).
    pub frame_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Event log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether refresh cycles and stream sessions are appended to
    /// `~/.safedash/events.jsonl`.
    pub enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl SafedashConfig {
    /// Generate the annotated default TOML config file content.
    pub fn default_toml() -> String {
        r#"# safedash configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (SAFEDASH_*)
#   2. Project config (.safedash.toml in current directory)
#   3. User global config (~/.safedash/config.toml)
#   4. Built-in defaults

[backend]
api_url = "http://localhost:8000"   # SAFEDASH_API_URL
timeout_ms = 30000                  # SAFEDASH_TIMEOUT_MS

[chat]
url = "http://localhost:8000"       # SAFEDASH_CHAT_URL
model = "gpt-4o-mini"               # SAFEDASH_CHAT_MODEL
chat_path = "/qa/stream"
insights_path = "/chart/insights/stream"
timeout_ms = 120000

[dashboard]
settlement = "all-or-nothing"       # all-or-nothing | per-resource
resource_set = "all"                # all | unified | modular

[render]
frame_interval_ms = 16

[logging]
enabled = true                      # SAFEDASH_LOG=0 to disable
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
