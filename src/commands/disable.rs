//! Handler for the `disable` command.

use std::path::PathBuf;

use colored::*;

use haml_lint_lsp::config_patch::{self, ConfigDialect, PatchOutcome};
use haml_lint_lsp::exit_codes::exit;

/// Handle the disable command: switch a rule off in the project config.
pub fn handle_disable(rule: &str, rubocop: bool, config: Option<&str>) {
    let dialect = if rubocop {
        ConfigDialect::Rubocop
    } else {
        ConfigDialect::HamlLint
    };
    let path = config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(dialect.default_file_name()));

    let result = super::runtime().block_on(config_patch::disable_rule(&path, rule, dialect));

    match result {
        Ok(PatchOutcome::Disabled) => {
            println!("{} Disabled {} in {}", "Success:".green().bold(), rule, path.display());
        }
        Ok(PatchOutcome::AlreadyDisabled) => {
            println!("{} is already disabled in {}", rule, path.display());
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            exit::tool_error();
        }
    }
}
