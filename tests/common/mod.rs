//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::{Notify, watch};
use tower_lsp::lsp_types::{MessageType, Url};

use haml_lint_lsp::format::EditorHost;
use haml_lint_lsp::runner::{Checker, ProcessResult, RunOptions, RunnerError};

pub const CLEAN_REPORT: &str = r#"{"files":[]}"#;

pub fn report_with_offense(line: usize, linter: &str, severity: &str, message: &str) -> String {
    serde_json::json!({
        "files": [{
            "path": "doc.haml",
            "offenses": [{
                "linter_name": linter,
                "location": { "line": line },
                "message": message,
                "severity": severity
            }]
        }]
    })
    .to_string()
}

/// Checker that behaves like haml-lint with nothing to auto-correct.
///
/// Lint runs print `report`; auto-correct runs hand the content back unchanged.
pub struct IdentityChecker {
    pub report: String,
    pub calls: AtomicUsize,
    pub last_options: Mutex<Option<RunOptions>>,
}

impl IdentityChecker {
    pub fn new(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }
}

#[tower_lsp::async_trait]
impl Checker for IdentityChecker {
    async fn run(&self, content: &str, _file_name: &str, options: &RunOptions) -> Result<ProcessResult, RunnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        Ok(ProcessResult {
            success: true,
            stdout: self.report.clone(),
            rewritten: options.auto_correct.map(|_| content.to_string()),
            exit_code: Some(0),
        })
    }
}

/// Checker whose auto-correct run returns fixed text.
pub struct RewritingChecker {
    pub rewritten: Option<String>,
}

#[tower_lsp::async_trait]
impl Checker for RewritingChecker {
    async fn run(&self, _content: &str, _file_name: &str, _options: &RunOptions) -> Result<ProcessResult, RunnerError> {
        Ok(ProcessResult {
            success: false,
            stdout: CLEAN_REPORT.to_string(),
            rewritten: self.rewritten.clone(),
            exit_code: Some(1),
        })
    }
}

/// Checker that always fails with an error built by `make`.
pub struct FailingChecker {
    pub make: fn() -> RunnerError,
}

#[tower_lsp::async_trait]
impl Checker for FailingChecker {
    async fn run(&self, _content: &str, _file_name: &str, _options: &RunOptions) -> Result<ProcessResult, RunnerError> {
        Err((self.make)())
    }
}

/// Checker that blocks until released, to hold a format in flight.
pub struct GatedChecker {
    pub gate: Arc<Notify>,
    pub calls: AtomicUsize,
}

impl GatedChecker {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[tower_lsp::async_trait]
impl Checker for GatedChecker {
    async fn run(&self, content: &str, _file_name: &str, _options: &RunOptions) -> Result<ProcessResult, RunnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(ProcessResult {
            success: true,
            stdout: CLEAN_REPORT.to_string(),
            rewritten: Some(content.to_string()),
            exit_code: Some(0),
        })
    }
}

/// Checker that simulates the user typing while haml-lint runs.
pub struct ConcurrentEditChecker {
    pub host: Arc<FakeHost>,
    pub uri: Url,
    pub typed: String,
}

#[tower_lsp::async_trait]
impl Checker for ConcurrentEditChecker {
    async fn run(&self, content: &str, _file_name: &str, _options: &RunOptions) -> Result<ProcessResult, RunnerError> {
        self.host.edit(&self.uri, &self.typed);
        tokio::task::yield_now().await;
        Ok(ProcessResult {
            success: true,
            stdout: CLEAN_REPORT.to_string(),
            rewritten: Some(content.to_string()),
            exit_code: Some(0),
        })
    }
}

/// Checker that panics, to exercise cleanup on abnormal exits.
pub struct PanickingChecker;

#[tower_lsp::async_trait]
impl Checker for PanickingChecker {
    async fn run(&self, _content: &str, _file_name: &str, _options: &RunOptions) -> Result<ProcessResult, RunnerError> {
        panic!("checker blew up");
    }
}

struct HostDocument {
    text: String,
    version: i32,
    versions: watch::Sender<i32>,
}

/// In-memory editor.
#[derive(Default)]
pub struct FakeHost {
    documents: Mutex<HashMap<Url, HostDocument>>,
    pub saved: Mutex<Vec<(Url, String)>>,
    pub messages: Mutex<Vec<(MessageType, String)>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self, uri: &Url, text: &str, version: i32) {
        let (versions, _) = watch::channel(version);
        self.documents.lock().unwrap().insert(
            uri.clone(),
            HostDocument {
                text: text.to_string(),
                version,
                versions,
            },
        );
    }

    /// A user edit: new text, next version.
    pub fn edit(&self, uri: &Url, text: &str) {
        let mut documents = self.documents.lock().unwrap();
        let doc = documents.get_mut(uri).expect("document open");
        doc.text = text.to_string();
        doc.version += 1;
        doc.versions.send_replace(doc.version);
    }

    pub fn text(&self, uri: &Url) -> String {
        self.documents.lock().unwrap()[uri].text.clone()
    }

    pub fn saved_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[tower_lsp::async_trait]
impl EditorHost for FakeHost {
    async fn snapshot(&self, uri: &Url) -> Option<(String, i32)> {
        self.documents
            .lock()
            .unwrap()
            .get(uri)
            .map(|doc| (doc.text.clone(), doc.version))
    }

    async fn version(&self, uri: &Url) -> Option<i32> {
        self.documents.lock().unwrap().get(uri).map(|doc| doc.version)
    }

    async fn subscribe(&self, uri: &Url) -> Option<watch::Receiver<i32>> {
        self.documents.lock().unwrap().get(uri).map(|doc| doc.versions.subscribe())
    }

    async fn apply_full_replacement(&self, uri: &Url, version: i32, _original: &str, new_text: &str) -> Result<bool> {
        let mut documents = self.documents.lock().unwrap();
        let Some(doc) = documents.get_mut(uri) else {
            return Ok(false);
        };
        if doc.version != version {
            return Ok(false);
        }
        doc.text = new_text.to_string();
        doc.version += 1;
        doc.versions.send_replace(doc.version);
        Ok(true)
    }

    async fn save(&self, uri: &Url, text: &str) -> Result<()> {
        self.saved.lock().unwrap().push((uri.clone(), text.to_string()));
        Ok(())
    }

    async fn show_message(&self, typ: MessageType, message: String) {
        self.messages.lock().unwrap().push((typ, message));
    }
}

/// Write a shell script standing in for haml-lint and return the command to run it.
///
/// Run through `sh` rather than executed directly, which avoids ETXTBSY
/// races between writing the file and spawning it.
pub fn fake_haml_lint(dir: &Path, name: &str, body: &str) -> String {
    let path: PathBuf = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    format!("sh {}", path.display())
}
