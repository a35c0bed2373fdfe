//! Incremental text streaming for chat answers and chart insights.
//!
//! The backend replies with newline-delimited `data: {json}` frames. The
//! pieces here are layered bottom-up:
//!
//! - [`frame`]: turns arbitrary transport chunks into decoded frames.
//! - [`session`]: drives one stream on a worker thread and accumulates text.
//! - [`scheduler`]: coalesces text updates to at most one per frame interval.
//! - [`meta`]: strips the `[[META]]` trailer that carries tabular data.

pub mod frame;
pub mod meta;
pub mod scheduler;
pub mod session;

use std::io::Read;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// What a streaming session asks the backend for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    /// Free-form question answered by the QA endpoint.
    Chat {
        question: String,
        model: Option<String>,
    },
    /// Narrative explanation of one chart.
    Insights { chart_key: String, verbose: bool },
}

impl StreamRequest {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Chat { .. } => SessionKind::Chat,
            Self::Insights { .. } => SessionKind::Insights,
        }
    }

    /// JSON request body. `default_model` fills in a chat request without one.
    pub fn body(&self, default_model: &str) -> Value {
        match self {
            Self::Chat { question, model } => json!({
                "question": question,
                "model": model.as_deref().unwrap_or(default_model),
            }),
            Self::Insights { chart_key, verbose } => json!({
                "chart_key": chart_key,
                "verbose": verbose,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Chat,
    Insights,
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Insights => write!(f, "insights"),
        }
    }
}

/// Opens the raw byte stream for a request.
///
/// Dropping the returned reader closes the underlying connection.
pub trait StreamTransport: Send + Sync {
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn Read + Send>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_falls_back_to_default_model() {
        let req = StreamRequest::Chat {
            question: "How many incidents?".into(),
            model: None,
        };
        assert_eq!(req.kind(), SessionKind::Chat);
        assert_eq!(
            req.body("gpt-4o-mini"),
            json!({"question": "How many incidents?", "model": "gpt-4o-mini"})
        );
    }

    #[test]
    fn insights_body_carries_chart_key() {
        let req = StreamRequest::Insights {
            chart_key: "heatmap".into(),
            verbose: false,
        };
        assert_eq!(req.kind(), SessionKind::Insights);
        assert_eq!(
            req.body("ignored"),
            json!({"chart_key": "heatmap", "verbose": false})
        );
    }
}
