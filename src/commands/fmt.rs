//! Handler for the `fmt` command.

use std::path::Path;
use std::sync::Arc;

use colored::*;

use haml_lint_lsp::exit_codes::exit;
use haml_lint_lsp::format::FormatPipeline;
use haml_lint_lsp::runner::{CorrectionMode, HamlLintRunner};

use crate::CheckerArgs;

/// Handle the fmt command: run the format pipeline over one file.
pub fn handle_fmt(file: &str, check: bool, mode: CorrectionMode, autocorrections: bool, args: &CheckerArgs) {
    let path = Path::new(file);
    let content = super::read_file(path);
    let (mut settings, ctx) = super::checker_setup(path, args);
    settings.formatter_mode = mode;
    settings.enable_autocorrections = autocorrections;

    let pipeline = FormatPipeline::new(Arc::new(HamlLintRunner::new()));
    let result = super::runtime().block_on(pipeline.format_text(&content, file, &settings, &ctx));

    let formatted = match result {
        Ok(formatted) => formatted,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            exit::tool_error();
        }
    };

    let Some(formatted) = formatted else {
        println!("{} {} is already formatted", "Success:".green().bold(), file);
        exit::success();
    };

    if check {
        println!("{} {} would be reformatted", "Would fix:".yellow().bold(), file);
        exit::violations_found();
    }

    if let Err(e) = std::fs::write(path, formatted) {
        eprintln!("{}: Failed to write {}: {}", "Error".red().bold(), file, e);
        exit::tool_error();
    }
    println!("{} {}", "Formatted:".green().bold(), file);
}
