//! Embedded web dashboard for safedash.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page dashboard rendering every resource slot
//! - JSON API endpoints for the dashboard snapshot, refreshes and health
//!
//! Launched via `safedash serve` (default: `http://127.0.0.1:9747`).

mod api;
mod frontend;

use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::dashboard::{Dashboard, ResourceSource};

pub const DEFAULT_ADDR: &str = "127.0.0.1:9747";

type HttpResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the web dashboard server on the given address.
///
/// Blocks the current thread. Kicks off one refresh cycle in the background
/// so the first page load already has data.
pub fn serve<S>(addr: &str, dashboard: Arc<Dashboard<S>>, open: bool) -> Result<()>
where
    S: ResourceSource + Send + 'static,
{
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    println!("safedash dashboard running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    let initial = Arc::clone(&dashboard);
    thread::spawn(move || initial.refresh());

    if open {
        let _ = open_browser(&format!("http://{addr}"));
    }

    run(&server, dashboard);
    Ok(())
}

/// Handle requests until the server shuts down.
///
/// Each request gets its own thread so a slow refresh never blocks snapshot
/// reads.
pub fn run<S>(server: &Server, dashboard: Arc<Dashboard<S>>)
where
    S: ResourceSource + Send + 'static,
{
    for request in server.incoming_requests() {
        let dashboard = Arc::clone(&dashboard);
        thread::spawn(move || handle(request, &dashboard));
    }
}

fn handle<S: ResourceSource>(request: Request, dashboard: &Dashboard<S>) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let response = dispatch(dashboard, &method, &url).unwrap_or_else(|e| {
        let body = serde_json::json!({ "error": format!("{e:#}") }).to_string();
        with_content_type(Response::from_data(body.into_bytes()), "application/json; charset=utf-8")
            .with_status_code(StatusCode(500))
    });
    let _ = request.respond(response);

    // Brief access log
    println!(
        "{} {} {}",
        method,
        url,
        chrono::Local::now().format("%H:%M:%S")
    );
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Dispatch an incoming request to the appropriate handler.
fn dispatch<S: ResourceSource>(
    dashboard: &Dashboard<S>,
    method: &Method,
    url: &str,
) -> Result<HttpResponse> {
    // Strip query string for path matching
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(serve_frontend()),

        (&Method::Get, "/api/dashboard") => api::get_dashboard(dashboard),
        (&Method::Post, "/api/refresh") => api::post_refresh(dashboard),
        (&Method::Get, "/api/resources") => api::get_resources(dashboard),
        (&Method::Get, "/api/health") => api::get_health(dashboard),

        _ => Ok(not_found()),
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn serve_frontend() -> HttpResponse {
    with_content_type(
        Response::from_data(frontend::INDEX_HTML.as_bytes().to_vec()),
        "text/html; charset=utf-8",
    )
    .with_status_code(StatusCode(200))
}

fn not_found() -> HttpResponse {
    let body = r#"{"error": "not found"}"#;
    with_content_type(Response::from_data(body.as_bytes().to_vec()), "application/json; charset=utf-8")
        .with_status_code(StatusCode(404))
}

/// Attach a `Content-Type` header.
fn with_content_type(response: HttpResponse, value: &str) -> HttpResponse {
    match Header::from_bytes("Content-Type", value) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}
