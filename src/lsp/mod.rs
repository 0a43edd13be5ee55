//! Language Server Protocol implementation for haml-lint
//!
//! This module exposes haml-lint to editors: diagnostics for unsaved
//! buffers, document formatting, format-on-save and "disable rule" quick fixes.
//!
//! It is started with `haml-lint-lsp server`.

pub mod debounce;
pub mod documents;
pub mod host;
pub mod server;
pub mod types;

pub use server::HamlLintLanguageServer;
pub use types::{DISABLE_RULE_COMMAND, DisableRuleArgs};

use anyhow::Result;
use tokio::net::TcpListener;
use tower_lsp::{LspService, Server};

/// Start the Language Server Protocol server over stdio
pub async fn start_server(config_path: Option<&str>) -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let config_path = config_path.map(str::to_string);
    let (service, socket) = LspService::new(|client| HamlLintLanguageServer::new(client, config_path));

    log::info!("Starting haml-lint Language Server Protocol server");

    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}

/// Start the LSP server over TCP (useful for debugging)
pub async fn start_tcp_server(port: u16, config_path: Option<&str>) -> Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    log::info!("haml-lint LSP server listening on 127.0.0.1:{port}");

    loop {
        let (stream, _) = listener.accept().await?;
        let config_path = config_path.map(str::to_string);
        let (service, socket) = LspService::new(|client| HamlLintLanguageServer::new(client, config_path));

        tokio::spawn(async move {
            let (read, write) = tokio::io::split(stream);
            Server::new(read, write, socket).serve(service).await;
        });
    }
}
