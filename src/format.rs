//! Format orchestration: haml-lint auto-correct followed by the in-process
//! rewrites, delivered either as an edit for a format request or applied and
//! saved in the background after the user saves.
//!
//! Background formatting takes no locks on the document. It captures the
//! version, runs the checker, and throws the result away if the version has
//! moved in the meantime. The [`InFlight`] set keeps at most one background
//! format per document running.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::{MessageType, Position, Range, TextEdit, Url};

use crate::autocorrect::{self, AutocorrectConfig};
use crate::config::{CheckerContext, Settings};
use crate::diagnostics::utf16_len;
use crate::runner::{Checker, FailureKind, RunnerError};

/// Whether a format was asked for explicitly or triggered by a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    Foreground,
    Background,
}

/// A snapshot of one document to format.
#[derive(Debug, Clone)]
pub struct FormatRequest {
    pub uri: Url,
    /// Document version the snapshot was taken at
    pub version: i32,
    pub text: String,
    pub mode: FormatMode,
}

impl FormatRequest {
    /// Name used to seed the temp file.
    pub fn file_name(&self) -> String {
        document_file_name(&self.uri)
    }
}

/// Last path segment of a document URI.
pub fn document_file_name(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .unwrap_or_default()
}

/// Editor operations the background formatter depends on.
#[tower_lsp::async_trait]
pub trait EditorHost: Send + Sync {
    /// Current text and version of an open document.
    async fn snapshot(&self, uri: &Url) -> Option<(String, i32)>;

    /// Current version of an open document.
    async fn version(&self, uri: &Url) -> Option<i32>;

    /// Version updates for an open document.
    async fn subscribe(&self, uri: &Url) -> Option<watch::Receiver<i32>>;

    /// Replace the whole of `original` (at `version`) with `new_text`.
    /// Returns whether the editor accepted the edit.
    async fn apply_full_replacement(&self, uri: &Url, version: i32, original: &str, new_text: &str) -> Result<bool>;

    /// Persist the document with `text` as its content.
    async fn save(&self, uri: &Url, text: &str) -> Result<()>;

    async fn show_message(&self, typ: MessageType, message: String);
}

/// Documents with a background format running.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<Url>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `uri` as in flight, or return `None` if it already is.
    ///
    /// The mark is removed when the returned guard is dropped.
    pub fn try_begin(&self, uri: &Url) -> Option<InFlightGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(uri.clone()) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            uri: uri.clone(),
        })
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).contains(uri)
    }

    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all entries, used at shutdown.
    pub fn clear(&self) {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Removes its document from the [`InFlight`] set on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Url>>>,
    uri: Url,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.uri);
    }
}

/// The shared checker-then-rewrite pipeline.
#[derive(Clone)]
pub struct FormatPipeline {
    checker: Arc<dyn Checker>,
}

impl FormatPipeline {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Formatted text, or `None` when formatting changes nothing.
    pub async fn format_text(
        &self,
        text: &str,
        file_name: &str,
        settings: &Settings,
        ctx: &CheckerContext,
    ) -> Result<Option<String>, RunnerError> {
        let result = self.checker.run(text, file_name, &ctx.format_options(settings)).await?;
        let mut formatted = result.rewritten.unwrap_or_else(|| text.to_string());

        if settings.enable_autocorrections {
            let config = match &ctx.config_path {
                Some(path) => AutocorrectConfig::load(path).await,
                None => AutocorrectConfig::default(),
            };
            formatted = autocorrect::apply(&formatted, &config);
        }

        Ok((formatted != text).then_some(formatted))
    }

    /// Format for an explicit request: one full-document edit, or none.
    pub async fn foreground(
        &self,
        request: &FormatRequest,
        settings: &Settings,
        ctx: &CheckerContext,
    ) -> Result<Option<Vec<TextEdit>>, RunnerError> {
        let formatted = self
            .format_text(&request.text, &request.file_name(), settings, ctx)
            .await?;
        Ok(formatted.map(|new_text| {
            vec![TextEdit {
                range: full_document_range(&request.text),
                new_text,
            }]
        }))
    }
}

/// How a background format ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundOutcome {
    /// Edit applied and document saved
    Applied,
    /// Formatting produced no change, or the document was not open
    Unchanged,
    /// The document changed while haml-lint was running
    Superseded,
    Failed,
}

/// Format-on-save.
#[derive(Clone)]
pub struct BackgroundFormatter {
    pipeline: FormatPipeline,
    in_flight: InFlight,
    host: Arc<dyn EditorHost>,
}

impl BackgroundFormatter {
    pub fn new(pipeline: FormatPipeline, in_flight: InFlight, host: Arc<dyn EditorHost>) -> Self {
        Self {
            pipeline,
            in_flight,
            host,
        }
    }

    /// Start a background format for `uri`.
    ///
    /// Returns `None` without doing anything if one is already running for it.
    pub fn spawn(&self, uri: Url, settings: Settings, ctx: CheckerContext) -> Option<JoinHandle<BackgroundOutcome>> {
        let Some(guard) = self.in_flight.try_begin(&uri) else {
            log::debug!("Background format already running for {uri}");
            return None;
        };

        let this = self.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            this.run(uri, settings, ctx).await
        }))
    }

    async fn run(&self, uri: Url, settings: Settings, ctx: CheckerContext) -> BackgroundOutcome {
        let Some((text, version)) = self.host.snapshot(&uri).await else {
            return BackgroundOutcome::Unchanged;
        };
        let Some(mut versions) = self.host.subscribe(&uri).await else {
            return BackgroundOutcome::Unchanged;
        };
        let request = FormatRequest {
            uri,
            version,
            text,
            mode: FormatMode::Background,
        };

        let file_name = request.file_name();
        let result = tokio::select! {
            result = self.pipeline.format_text(&request.text, &file_name, &settings, &ctx) => result,
            _ = superseded(&mut versions, version) => {
                log::debug!("{} changed during background format, discarding", request.uri);
                return BackgroundOutcome::Superseded;
            }
        };

        let formatted = match result {
            Ok(Some(formatted)) => formatted,
            Ok(None) => return BackgroundOutcome::Unchanged,
            Err(e) => {
                if e.kind() == FailureKind::ExecutableNotFound {
                    self.host.show_message(MessageType::ERROR, e.user_message()).await;
                } else {
                    log::warn!("Background format of {} failed: {e}", request.uri);
                }
                return BackgroundOutcome::Failed;
            }
        };

        self.apply(&request, &formatted).await
    }

    async fn apply(&self, request: &FormatRequest, formatted: &str) -> BackgroundOutcome {
        if self.host.version(&request.uri).await != Some(request.version) {
            log::debug!("{} changed before the format could be applied", request.uri);
            return BackgroundOutcome::Superseded;
        }

        match self
            .host
            .apply_full_replacement(&request.uri, request.version, &request.text, formatted)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Editor rejected background format of {}", request.uri);
                return BackgroundOutcome::Superseded;
            }
            Err(e) => {
                log::warn!("Failed to apply background format of {}: {e}", request.uri);
                return BackgroundOutcome::Failed;
            }
        }

        if let Err(e) = self.host.save(&request.uri, formatted).await {
            log::warn!("Failed to save {} after formatting: {e}", request.uri);
            return BackgroundOutcome::Failed;
        }
        BackgroundOutcome::Applied
    }
}

/// Resolves once the watched version differs from `version` or the document closes.
async fn superseded(versions: &mut watch::Receiver<i32>, version: i32) {
    loop {
        if *versions.borrow_and_update() != version {
            return;
        }
        if versions.changed().await.is_err() {
            return;
        }
    }
}

/// Range covering all of `text`.
pub fn full_document_range(text: &str) -> Range {
    let mut line = 0u32;
    let mut last_line_start = 0usize;
    for (i, c) in text.char_indices() {
        if c == '\n' {
            line += 1;
            last_line_start = i + 1;
        }
    }
    Range {
        start: Position::new(0, 0),
        end: Position::new(line, utf16_len(&text[last_line_start..])),
    }
}

/// File path of a `file://` document URI.
pub fn document_path(uri: &Url) -> Option<std::path::PathBuf> {
    uri.to_file_path().ok()
}

/// Convenience for callers that resolve context from a URI.
pub fn context_for(settings: &Settings, uri: &Url, workspace_root: Option<&Path>) -> CheckerContext {
    let path = document_path(uri);
    CheckerContext::resolve(settings, path.as_deref(), workspace_root)
}
