//! Handler for the `server` command.

use colored::*;

use haml_lint_lsp::exit_codes::exit;

/// Handle the server command: serve LSP over stdio, or over TCP with `--port`.
pub fn handle_server(port: Option<u16>, config: Option<String>) {
    // Validate config file exists if provided
    if let Some(config_path) = &config
        && !std::path::Path::new(config_path).exists()
    {
        eprintln!(
            "{}: Configuration file not found: {}",
            "Error".red().bold(),
            config_path
        );
        exit::tool_error();
    }

    let result = super::runtime().block_on(async {
        match port {
            Some(port) => haml_lint_lsp::lsp::start_tcp_server(port, config.as_deref()).await,
            None => haml_lint_lsp::lsp::start_server(config.as_deref()).await,
        }
    });

    if let Err(e) = result {
        match port {
            Some(port) => eprintln!("{}: LSP server on port {port} failed: {e}", "Error".red().bold()),
            None => eprintln!("{}: LSP server failed: {e}", "Error".red().bold()),
        }
        exit::tool_error();
    }
}
