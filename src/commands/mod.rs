//! Command handlers for the haml-lint-lsp CLI.
//!
//! Each subcommand has its own module with a public handler function
//! that `main()` dispatches to.

pub mod check;
pub mod disable;
pub mod fmt;
pub mod server;

use std::path::{Path, PathBuf};

use colored::*;
use haml_lint_lsp::config::{CheckerContext, Settings};
use haml_lint_lsp::exit_codes::exit;

use crate::CheckerArgs;

/// Build a Tokio runtime or exit with a tool error.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("{}: Failed to create Tokio runtime: {}", "Error".red().bold(), e);
        exit::tool_error();
    })
}

/// Read a file to lint or format, exiting on failure.
pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("{}: Failed to read {}: {}", "Error".red().bold(), path.display(), e);
        exit::tool_error();
    })
}

/// Settings and checker context for a CLI run on `file`.
pub fn checker_setup(file: &Path, args: &CheckerArgs) -> (Settings, CheckerContext) {
    let settings = Settings {
        executable_path: args.executable.clone(),
        config_path: args.config.clone(),
        disabled_rules: args.exclude_linter.clone(),
        lint_args: args.extra_args.clone(),
        format_args: args.extra_args.clone(),
        timeout_ms: args.timeout_ms,
        ..Default::default()
    };
    let root: Option<PathBuf> = std::env::current_dir().ok();
    let ctx = CheckerContext::resolve(&settings, Some(file), root.as_deref());
    (settings, ctx)
}
