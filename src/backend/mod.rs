/// HTTP clients for the analytics backend.
///
/// Two clients share the same conventions (synchronous `ureq`, base URL
/// trimmed of trailing slashes, `localhost` pinned to `127.0.0.1`):
///
/// - [`HttpBackend`]: chart resources (`GET`, JSON) and workbook uploads.
/// - [`HttpStreamClient`]: the chat and insights streams (`POST`, returns
///   the raw body reader for the frame decoder).
///
/// Error messages name the method and path so that a failed dashboard
/// cycle tells the user which request broke.
use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use ureq::{Agent, AgentBuilder};

use crate::config::schema::{BackendConfig, ChatConfig};
use crate::dashboard::ResourceSource;
use crate::dashboard::resources::Resource;
use crate::dashboard::upload::{self, Uploader};
use crate::stream::{StreamRequest, StreamTransport};

/// Workbook upload route.
pub const UPLOAD_PATH: &str = "/upload-excel";

/// Timeout for reachability probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect timeout for streaming requests. Reads use the configured timeout.
const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalize a configured base URL.
///
/// On Windows, "localhost" may resolve to IPv6 (::1) first and stall when
/// the backend only binds IPv4.
fn base_url(raw: &str) -> String {
    raw.trim_end_matches('/')
        .replace("://localhost", "://127.0.0.1")
}

/// Best-effort body text of an error response.
fn error_body(resp: ureq::Response) -> String {
    resp.into_string()
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Resources and uploads
// ---------------------------------------------------------------------------

/// Synchronous client for chart resources and uploads.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    agent: Agent,
}

impl HttpBackend {
    pub fn from_config(config: &BackendConfig) -> Self {
        let agent = AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build();
        Self {
            base_url: base_url(&config.api_url),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl ResourceSource for HttpBackend {
    fn fetch(&self, resource: &Resource) -> Result<Value> {
        let path = resource.path;
        let resp = match self.agent.get(&self.url(path)).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, _)) => {
                anyhow::bail!("GET {path} returned HTTP {code}")
            }
            Err(err) => return Err(err).with_context(|| format!("GET {path} failed")),
        };

        resp.into_json::<Value>()
            .with_context(|| format!("GET {path} returned a body that is not JSON"))
    }

    /// Whether anything answers at the base URL. Any HTTP status counts.
    fn is_reachable(&self) -> bool {
        match self.agent.get(&self.url("/")).timeout(PROBE_TIMEOUT).call() {
            Ok(_) | Err(ureq::Error::Status(..)) => true,
            Err(_) => false,
        }
    }
}

impl Uploader for HttpBackend {
    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let boundary = upload::new_boundary();
        let body = upload::multipart_body(&boundary, file_name, &bytes);

        let result = self
            .agent
            .post(&self.url(UPLOAD_PATH))
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body);

        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => {
                let text = error_body(resp);
                if text.is_empty() {
                    anyhow::bail!("upload failed with status {code}");
                }
                anyhow::bail!(text)
            }
            Err(err) => Err(err).context("upload request failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Opens chat and insights streams.
#[derive(Debug, Clone)]
pub struct HttpStreamClient {
    base_url: String,
    model: String,
    chat_path: String,
    insights_path: String,
    agent: Agent,
}

impl HttpStreamClient {
    pub fn from_config(config: &ChatConfig) -> Self {
        // No overall deadline: answers may stream for minutes.
        let agent = AgentBuilder::new()
            .timeout_connect(STREAM_CONNECT_TIMEOUT)
            .timeout_read(Duration::from_millis(config.timeout_ms))
            .build();
        Self {
            base_url: base_url(&config.url),
            model: config.model.clone(),
            chat_path: config.chat_path.clone(),
            insights_path: config.insights_path.clone(),
            agent,
        }
    }

    /// Model requested when a chat request names none.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn path_for(&self, request: &StreamRequest) -> &str {
        match request {
            StreamRequest::Chat { .. } => &self.chat_path,
            StreamRequest::Insights { .. } => &self.insights_path,
        }
    }
}

impl StreamTransport for HttpStreamClient {
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn Read + Send>> {
        let path = self.path_for(request);
        let url = format!("{}{path}", self.base_url);

        let result = self
            .agent
            .post(&url)
            .set("Accept", "text/event-stream")
            .send_json(request.body(&self.model));

        match result {
            Ok(resp) => Ok(Box::new(resp.into_reader())),
            Err(ureq::Error::Status(code, resp)) => {
                let text = error_body(resp);
                if text.is_empty() {
                    anyhow::bail!("POST {path} returned HTTP {code}");
                }
                anyhow::bail!("POST {path} returned HTTP {code}: {text}")
            }
            Err(err) => Err(err).with_context(|| format!("POST {path} failed")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_from_default_config() {
        let backend = HttpBackend::from_config(&BackendConfig::default());
        assert_eq!(backend.base_url(), "http://127.0.0.1:8000");
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        assert_eq!(base_url("http://example.test/api/"), "http://example.test/api");
        assert_eq!(base_url("http://localhost:8000/"), "http://127.0.0.1:8000");
    }

    #[test]
    fn stream_client_routes_by_request_kind() {
        let client = HttpStreamClient::from_config(&ChatConfig::default());
        assert_eq!(client.model_name(), "gpt-4o-mini");

        let chat = StreamRequest::Chat {
            question: "q".into(),
            model: None,
        };
        let insights = StreamRequest::Insights {
            chart_key: "heatmap".into(),
            verbose: true,
        };
        assert_eq!(client.path_for(&chat), "/qa/stream");
        assert_eq!(client.path_for(&insights), "/chart/insights/stream");
    }
}
