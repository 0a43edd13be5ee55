//! Per-document debouncing of diagnostics runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Url;

/// Holds at most one pending task per document. Scheduling a new one aborts
/// the previous, so only the latest change is linted.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    pending: Arc<Mutex<HashMap<Url, JoinHandle<()>>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, cancelling whatever was pending for `uri`.
    pub fn schedule<F>(&self, uri: Url, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.insert(uri, handle) {
            previous.abort();
        }
    }

    /// Abort anything pending for `uri`.
    pub fn cancel(&self, uri: &Url) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = pending.remove(uri) {
            handle.abort();
        }
    }

    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in pending.drain() {
            handle.abort();
        }
    }
}
