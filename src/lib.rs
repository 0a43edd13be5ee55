//! Bridge between editors and the external haml-lint checker.
//!
//! The crate runs haml-lint on in-memory buffers through private temp files,
//! maps its JSON report to diagnostics, formats documents with haml-lint's
//! auto-correct plus a few in-process rewrites, and patches rule
//! configuration files for "disable this rule" quick fixes.

pub mod autocorrect;
pub mod config;
pub mod config_patch;
pub mod diagnostics;
pub mod exit_codes;
pub mod format;
pub mod lsp;
pub mod runner;

pub use autocorrect::{AutocorrectConfig, HashSpacing};
pub use config::{CheckerContext, Settings};
pub use diagnostics::{Finding, FindingSeverity, parse_report};
pub use format::{BackgroundFormatter, BackgroundOutcome, EditorHost, FormatPipeline, InFlight};
pub use runner::{Checker, HamlLintRunner, ProcessResult, RunOptions, RunnerError};
