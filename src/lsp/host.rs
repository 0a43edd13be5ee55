//! [`EditorHost`] backed by an LSP client.

use anyhow::{Context, Result, anyhow};
use tokio::sync::watch;
use tower_lsp::Client;
use tower_lsp::lsp_types::*;

use crate::format::{EditorHost, full_document_range};
use crate::lsp::documents::DocumentStore;

pub struct LspHost {
    client: Client,
    documents: DocumentStore,
}

impl LspHost {
    pub fn new(client: Client, documents: DocumentStore) -> Self {
        Self { client, documents }
    }
}

#[tower_lsp::async_trait]
impl EditorHost for LspHost {
    async fn snapshot(&self, uri: &Url) -> Option<(String, i32)> {
        self.documents.snapshot(uri).await
    }

    async fn version(&self, uri: &Url) -> Option<i32> {
        self.documents.version(uri).await
    }

    async fn subscribe(&self, uri: &Url) -> Option<watch::Receiver<i32>> {
        self.documents.subscribe(uri).await
    }

    async fn apply_full_replacement(&self, uri: &Url, version: i32, original: &str, new_text: &str) -> Result<bool> {
        // Versioned so the client refuses the edit if the buffer moved on.
        let edit = TextDocumentEdit {
            text_document: OptionalVersionedTextDocumentIdentifier {
                uri: uri.clone(),
                version: Some(version),
            },
            edits: vec![OneOf::Left(TextEdit {
                range: full_document_range(original),
                new_text: new_text.to_string(),
            })],
        };
        let workspace_edit = WorkspaceEdit {
            changes: None,
            document_changes: Some(DocumentChanges::Edits(vec![edit])),
            change_annotations: None,
        };

        let response = self
            .client
            .apply_edit(workspace_edit)
            .await
            .map_err(|e| anyhow!("workspace/applyEdit failed: {e}"))?;
        if let Some(reason) = &response.failure_reason {
            log::debug!("Client rejected edit for {uri}: {reason}");
        }
        Ok(response.applied)
    }

    async fn save(&self, uri: &Url, text: &str) -> Result<()> {
        let path = uri
            .to_file_path()
            .map_err(|_| anyhow!("{uri} is not a file URI"))?;
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    async fn show_message(&self, typ: MessageType, message: String) {
        self.client.show_message(typ, message).await;
    }
}
