//! Loading/error/data container for one resource.

use serde::Serialize;

/// Tracks the latest fetch outcome of exactly one resource.
///
/// A slot starts out loading. Once a cycle settles it holds either data or
/// an error, never both. Only the synchronizer mutates slots; views receive
/// cloned snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSlot<T> {
    loading: bool,
    error: Option<String>,
    data: Option<T>,
}

impl<T> Default for ResourceSlot<T> {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            data: None,
        }
    }
}

impl<T> ResourceSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Settled with exactly one of data/error.
    pub fn is_settled(&self) -> bool {
        !self.loading && (self.data.is_some() != self.error.is_some())
    }

    pub(crate) fn mark_loading(&mut self) {
        self.loading = true;
        self.error = None;
        self.data = None;
    }

    pub(crate) fn settle_ok(&mut self, data: T) {
        self.loading = false;
        self.error = None;
        self.data = Some(data);
    }

    pub(crate) fn settle_err(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
        self.data = None;
    }
}
