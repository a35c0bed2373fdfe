//! JSON API handlers for the web dashboard.
//!
//! Each handler corresponds to an API endpoint and returns a
//! `Response<Cursor<Vec<u8>>>` with JSON content.

use anyhow::{Context, Result};
use serde::Serialize;
use tiny_http::{Response, StatusCode};

use crate::config;
use crate::dashboard::resources::Resource;
use crate::dashboard::{Dashboard, ResourceSource};

use super::{HttpResponse, with_content_type};

// ---------------------------------------------------------------------------
// JSON response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ResourcesResponse<'a> {
    settlement: String,
    resources: &'a [&'static Resource],
}

#[derive(Serialize)]
struct HealthResponse {
    backend_url: String,
    backend_reachable: bool,
    settlement: String,
    resources: usize,
    generation: u64,
    config_exists: bool,
    log_exists: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON success response.
fn json_response<T: Serialize>(data: &T) -> Result<HttpResponse> {
    let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
    Ok(with_content_type(
        Response::from_data(body.into_bytes()),
        "application/json; charset=utf-8",
    )
    .with_status_code(StatusCode(200)))
}

// ---------------------------------------------------------------------------
// API Handlers
// ---------------------------------------------------------------------------

/// `GET /api/dashboard`: current snapshot of every slot.
pub fn get_dashboard<S: ResourceSource>(dashboard: &Dashboard<S>) -> Result<HttpResponse> {
    json_response(&dashboard.snapshot())
}

/// `POST /api/refresh`: run one cycle and return its report.
pub fn post_refresh<S: ResourceSource>(dashboard: &Dashboard<S>) -> Result<HttpResponse> {
    json_response(&dashboard.refresh())
}

/// `GET /api/resources`: the polled catalogue.
pub fn get_resources<S: ResourceSource>(dashboard: &Dashboard<S>) -> Result<HttpResponse> {
    json_response(&ResourcesResponse {
        settlement: dashboard.settlement().to_string(),
        resources: dashboard.resources(),
    })
}

/// `GET /api/health`: backend reachability and local state.
pub fn get_health<S: ResourceSource>(dashboard: &Dashboard<S>) -> Result<HttpResponse> {
    let cfg = config::load();
    let config_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let log_exists = crate::analytics::logger::events_log_path()
        .map(|p| p.exists())
        .unwrap_or(false);

    let resp = HealthResponse {
        backend_url: cfg.backend.api_url,
        backend_reachable: dashboard.source().is_reachable(),
        settlement: dashboard.settlement().to_string(),
        resources: dashboard.resources().len(),
        generation: dashboard.snapshot().generation,
        config_exists,
        log_exists,
    };

    json_response(&resp)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
