//! Process runner for the external haml-lint checker.
//!
//! Buffers are handed to haml-lint through a private temp file so that the
//! user's file on disk is never touched, even in auto-correct mode. The temp
//! file is owned by a drop guard and removed on every exit path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;

/// Fallback basename when the document URI carries no usable file name.
const DEFAULT_BASENAME: &str = "document.haml";

/// Auto-correct flavour passed to haml-lint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionMode {
    /// Only corrections haml-lint considers safe (`--auto-correct`)
    #[default]
    Safe,
    /// Every available correction (`--auto-correct-all`)
    All,
}

impl CorrectionMode {
    pub fn flag(self) -> &'static str {
        match self {
            Self::Safe => "--auto-correct",
            Self::All => "--auto-correct-all",
        }
    }
}

/// Options for a single checker invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Command prefix, possibly several words (`bundle exec haml-lint`)
    pub executable: String,
    /// `Some` runs in auto-correct mode and reads the rewritten temp file back
    pub auto_correct: Option<CorrectionMode>,
    pub working_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    /// Linters excluded for this run (`--exclude-linter A,B`)
    pub excluded_linters: Vec<String>,
    /// Opaque user arguments, passed through verbatim
    pub extra_args: String,
    /// `None` waits for the process indefinitely
    pub timeout: Option<Duration>,
}

/// What a finished invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Whether the process exited zero
    pub success: bool,
    /// Raw stdout (the JSON report)
    pub stdout: String,
    /// Temp file content after the run, only in auto-correct mode
    pub rewritten: Option<String>,
    pub exit_code: Option<i32>,
}

/// Coarse classification of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ExecutableNotFound,
    RubyVersionUnset,
    BundleMissing,
    Other,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("haml-lint executable '{executable}' was not found")]
    ExecutableNotFound { executable: String },

    #[error("no Ruby version is configured for this project: {message}")]
    RubyVersionUnset { message: String },

    #[error("the bundle is missing gems required by haml-lint: {message}")]
    BundleMissing { message: String },

    #[error("haml-lint failed (exit code {code:?}): {message}")]
    InvocationFailed { code: Option<i32>, message: String },

    #[error("haml-lint timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("I/O error while running haml-lint: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ExecutableNotFound { .. } => FailureKind::ExecutableNotFound,
            Self::RubyVersionUnset { .. } => FailureKind::RubyVersionUnset,
            Self::BundleMissing { .. } => FailureKind::BundleMissing,
            _ => FailureKind::Other,
        }
    }

    /// Message shown to the user in the editor.
    pub fn user_message(&self) -> String {
        match self {
            Self::ExecutableNotFound { executable } => format!(
                "haml-lint: '{executable}' could not be run. Install haml-lint or set `executablePath` in the settings."
            ),
            Self::RubyVersionUnset { message } => {
                format!("haml-lint: no Ruby version is set for this project ({message}).")
            }
            Self::BundleMissing { message } => {
                format!("haml-lint: gems are missing, run `bundle install` in the project ({message}).")
            }
            other => format!("haml-lint: {other}"),
        }
    }
}

/// Classify a failed run from its exit code and stderr.
///
/// Goes through the shell, so the platform gives no structured error; the
/// text patterns below are what rbenv/rvm/bundler and the shells print.
pub fn classify_failure(exit_code: Option<i32>, stderr: &str) -> FailureKind {
    let lower = stderr.to_ascii_lowercase();

    if lower.contains("rbenv: version")
        || lower.contains("no ruby version")
        || lower.contains("required ruby-")
        || lower.contains("ruby-version")
    {
        return FailureKind::RubyVersionUnset;
    }

    if lower.contains("could not find gem")
        || lower.contains("bundler::gemnotfound")
        || lower.contains("run `bundle install`")
        || lower.contains("bundle install")
    {
        return FailureKind::BundleMissing;
    }

    if exit_code == Some(127)
        || lower.contains("command not found")
        || lower.contains("is not recognized as an internal or external command")
        || (lower.contains("no such file or directory") && lower.contains("haml-lint"))
    {
        return FailureKind::ExecutableNotFound;
    }

    FailureKind::Other
}

/// The seam between orchestration and process execution.
#[tower_lsp::async_trait]
pub trait Checker: Send + Sync {
    /// Run the checker over `content`. `file_name` only seeds the temp file name.
    async fn run(&self, content: &str, file_name: &str, options: &RunOptions) -> Result<ProcessResult, RunnerError>;
}

/// Runs the real haml-lint binary through the platform shell.
#[derive(Debug, Default, Clone)]
pub struct HamlLintRunner;

impl HamlLintRunner {
    pub fn new() -> Self {
        Self
    }
}

#[tower_lsp::async_trait]
impl Checker for HamlLintRunner {
    async fn run(&self, content: &str, file_name: &str, options: &RunOptions) -> Result<ProcessResult, RunnerError> {
        let temp = TempDocument::create(content, file_name).await?;
        let command_line = build_command_line(options, temp.path());
        log::debug!("Running haml-lint: {command_line}");

        let mut cmd = shell_command(&command_line);
        if let Some(dir) = &options.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        let output = match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| RunnerError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })??,
            None => child.wait_with_output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        let success = output.status.success();

        // A run that got as far as reporting printed JSON on stdout; anything on
        // stderr then is noise (bundler or version manager warnings).
        let produced_report = !stdout.trim().is_empty();
        if !success {
            log::debug!("haml-lint exited with {exit_code:?}: {}", stderr.trim());
            if !produced_report && let Some(err) = setup_failure(exit_code, &stderr, options) {
                return Err(err);
            }
        }

        // Auto-correct signals "offenses found" with a non-zero exit even after
        // rewriting the file, so the temp file is read back either way.
        if options.auto_correct.is_some() {
            let rewritten = temp.read().await?;
            return Ok(ProcessResult {
                success,
                stdout,
                rewritten: Some(rewritten),
                exit_code,
            });
        }

        if !success && !produced_report {
            let message = if stderr.trim().is_empty() {
                "no output produced".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(RunnerError::InvocationFailed { code: exit_code, message });
        }

        Ok(ProcessResult {
            success,
            stdout,
            rewritten: None,
            exit_code,
        })
    }
}

/// The setup error behind a failed run that produced no report, if any.
fn setup_failure(exit_code: Option<i32>, stderr: &str, options: &RunOptions) -> Option<RunnerError> {
    match classify_failure(exit_code, stderr) {
        FailureKind::ExecutableNotFound => Some(RunnerError::ExecutableNotFound {
            executable: options.executable.clone(),
        }),
        FailureKind::RubyVersionUnset => Some(RunnerError::RubyVersionUnset {
            message: stderr.trim().to_string(),
        }),
        FailureKind::BundleMissing => Some(RunnerError::BundleMissing {
            message: stderr.trim().to_string(),
        }),
        FailureKind::Other => None,
    }
}

/// Build the single shell command line for one invocation.
pub fn build_command_line(options: &RunOptions, temp_path: &Path) -> String {
    let mut parts: Vec<String> = vec![options.executable.trim().to_string()];

    if let Some(mode) = options.auto_correct {
        parts.push(mode.flag().to_string());
        parts.push("--auto-correct-only".to_string());
    }

    parts.push("--reporter".to_string());
    parts.push("json".to_string());

    if let Some(config) = &options.config_path {
        parts.push("--config".to_string());
        parts.push(shell_quote(&config.to_string_lossy()));
    }

    if !options.excluded_linters.is_empty() {
        parts.push("--exclude-linter".to_string());
        parts.push(shell_quote(&options.excluded_linters.join(",")));
    }

    let extra = options.extra_args.trim();
    if !extra.is_empty() {
        parts.push(extra.to_string());
    }

    parts.push(shell_quote(&temp_path.to_string_lossy()));
    parts.join(" ")
}

/// Quote a value for the platform shell.
#[cfg(not(windows))]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote a value for the platform shell.
#[cfg(windows)]
pub fn shell_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

#[cfg(not(windows))]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command_line);
    cmd
}

/// A uniquely named temp file holding a buffer snapshot.
///
/// Created exclusively in the system temp dir as
/// `haml-lint-<millis>-<random>-<basename>` and removed when dropped.
#[derive(Debug)]
pub struct TempDocument {
    file: NamedTempFile,
}

impl TempDocument {
    pub async fn create(content: &str, file_name: &str) -> std::io::Result<Self> {
        let basename = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_BASENAME);

        let file = tempfile::Builder::new()
            .prefix(&format!("haml-lint-{}-", chrono::Utc::now().timestamp_millis()))
            .suffix(&format!("-{basename}"))
            .tempfile_in(std::env::temp_dir())?;
        tokio::fs::write(file.path(), content).await?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.path()).await
    }
}
