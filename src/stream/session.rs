//! One streaming turn, driven on a worker thread.
//!
//! A [`SessionHandle`] is the only way to reach a running session: it can
//! cancel it, take a snapshot of the accumulated text, or wait for it. A
//! [`ConversationSlot`] owns the active handle of one conversation and
//! cancels it before starting the next turn, so at most one session per
//! slot is ever live.
//!
//! Cancellation is cooperative. The worker checks the flag at every chunk
//! boundary, and appends happen under the same lock that `cancel()` takes,
//! so no text decoded after cancellation becomes visible.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use super::frame::{Frame, FrameDecoder};
use super::{SessionKind, StreamRequest, StreamTransport};
use crate::analytics::logger;

const READ_CHUNK: usize = 4096;

/// Observable state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub accumulated_text: String,
    pub cancelled: bool,
    pub done: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Running,
    Done,
    Cancelled,
    Failed,
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl SessionState {
    pub fn outcome(&self) -> SessionOutcome {
        if self.error.is_some() {
            SessionOutcome::Failed
        } else if self.cancelled {
            SessionOutcome::Cancelled
        } else if self.done {
            SessionOutcome::Done
        } else {
            SessionOutcome::Running
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome() != SessionOutcome::Running
    }
}

/// Receives progress from the worker thread.
pub trait SessionObserver: Send + Sync {
    /// Called after new text was appended, with the full text so far.
    fn on_text(&self, _text: &str) {}

    /// Called once with the final state.
    fn on_finish(&self, _state: &SessionState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

struct Shared {
    state: Mutex<SessionState>,
    cancel: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Append frame contents unless cancelled. Returns `false` once cancelled.
    fn append(&self, frames: &[Frame], observer: &dyn SessionObserver) -> bool {
        let text = {
            let mut state = self.lock();
            if self.is_cancelled() {
                state.cancelled = true;
                return false;
            }
            let mut changed = false;
            for content in frames.iter().filter_map(|f| f.content.as_deref()) {
                state.accumulated_text.push_str(content);
                changed |= !content.is_empty();
            }
            changed.then(|| state.accumulated_text.clone())
        };
        if let Some(text) = text {
            observer.on_text(&text);
        }
        true
    }
}

enum Ending {
    Done,
    Cancelled,
}

/// Handle to a running (or finished) session.
///
/// Dropping the handle cancels the session.
pub struct SessionHandle {
    kind: SessionKind,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Open `request` on a new worker thread.
    pub fn spawn(
        transport: Arc<dyn StreamTransport>,
        request: StreamRequest,
        observer: Arc<dyn SessionObserver>,
        log_events: bool,
    ) -> Self {
        let kind = request.kind();
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::default()),
            cancel: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || {
            let started = Instant::now();
            let ending = pump(transport.as_ref(), &request, &worker_shared, observer.as_ref());
            let final_state = {
                let mut state = worker_shared.lock();
                match ending {
                    Ok(Ending::Done) => state.done = !state.cancelled,
                    Ok(Ending::Cancelled) => state.cancelled = true,
                    Err(_) if worker_shared.is_cancelled() => state.cancelled = true,
                    Err(err) => {
                        let message = format!("{err:#}");
                        state
                            .accumulated_text
                            .push_str(&format!("\n\n[stream error: {message}]"));
                        state.error = Some(message);
                    }
                }
                state.clone()
            };
            observer.on_finish(&final_state);
            if log_events {
                logger::log_session(kind, &final_state, started.elapsed().as_millis() as u64);
            }
        });

        Self {
            kind,
            shared,
            worker: Some(worker),
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Stop the session at the next chunk boundary.
    ///
    /// No-op once the session has finished.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        if state.is_terminal() {
            return;
        }
        self.shared.cancel.store(true, Ordering::SeqCst);
        state.cancelled = true;
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.lock().clone()
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the worker exits and return the final state.
    pub fn wait(mut self) -> SessionState {
        self.join();
        self.snapshot()
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            // The worker never panics on stream errors; a panic leaves the
            // state as it was.
            let _ = worker.join();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("kind", &self.kind)
            .field("state", &self.snapshot())
            .finish()
    }
}

fn pump(
    transport: &dyn StreamTransport,
    request: &StreamRequest,
    shared: &Shared,
    observer: &dyn SessionObserver,
) -> Result<Ending> {
    let mut reader = transport.open(request)?;
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        if shared.is_cancelled() {
            return Ok(Ending::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("stream interrupted"),
        };

        let frames = if n == 0 {
            decoder.finish()
        } else {
            decoder.feed_bytes(&buf[..n])
        };
        if !shared.append(&frames, observer) {
            return Ok(Ending::Cancelled);
        }
        if n == 0 || decoder.is_done() {
            return Ok(Ending::Done);
        }
    }
}

/// Owner of a conversation's active session.
pub struct ConversationSlot {
    transport: Arc<dyn StreamTransport>,
    active: Option<SessionHandle>,
    log_events: bool,
}

impl ConversationSlot {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            active: None,
            log_events: false,
        }
    }

    /// Log every finished session to the event log.
    pub fn with_event_log(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Cancel the current session, if any, and start `request`.
    pub fn start(
        &mut self,
        request: StreamRequest,
        observer: Arc<dyn SessionObserver>,
    ) -> &SessionHandle {
        self.cancel();
        let handle = SessionHandle::spawn(
            Arc::clone(&self.transport),
            request,
            observer,
            self.log_events,
        );
        self.active.insert(handle)
    }

    pub fn active(&self) -> Option<&SessionHandle> {
        self.active.as_ref()
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.active {
            handle.cancel();
        }
    }

    /// Wait for the active session and release it.
    pub fn wait(&mut self) -> Option<SessionState> {
        self.active.take().map(SessionHandle::wait)
    }
}
