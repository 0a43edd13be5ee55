//! Handler for the `check` command.

use std::path::Path;

use colored::*;

use haml_lint_lsp::diagnostics::{FindingSeverity, parse_report};
use haml_lint_lsp::exit_codes::exit;
use haml_lint_lsp::runner::{Checker, HamlLintRunner};

use crate::CheckerArgs;

/// Handle the check command: lint one file and print what haml-lint found.
pub fn handle_check(file: &str, args: &CheckerArgs) {
    let path = Path::new(file);
    let content = super::read_file(path);
    let (settings, ctx) = super::checker_setup(path, args);

    let result = super::runtime().block_on(async {
        HamlLintRunner::new()
            .run(&content, file, &ctx.lint_options(&settings))
            .await
    });

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            exit::tool_error();
        }
    };

    let findings = parse_report(&output.stdout);
    for finding in &findings {
        let severity = match finding.severity {
            FindingSeverity::Error => "error".red().bold(),
            FindingSeverity::Warning => "warning".yellow().bold(),
            FindingSeverity::Info => "info".blue().bold(),
        };
        println!(
            "{}:{}: {} [{}] {}",
            file.blue().underline(),
            finding.line + 1,
            severity,
            finding.rule.dimmed(),
            finding.message
        );
    }

    if findings.is_empty() {
        println!("{} No issues found in {}", "Success:".green().bold(), file);
        exit::success();
    }
    println!("\n{} Found {} issues in {}", "Issues:".yellow(), findings.len(), file);
    exit::violations_found();
}
