//! Open-document store.
//!
//! Every version change is also published on a watch channel so background
//! work can notice that its snapshot went stale.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tower_lsp::lsp_types::Url;

#[derive(Debug)]
struct DocumentEntry {
    text: String,
    version: i32,
    versions: watch::Sender<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Arc<RwLock<HashMap<Url, DocumentEntry>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document's content.
    pub async fn upsert(&self, uri: Url, text: String, version: i32) {
        let mut documents = self.documents.write().await;
        match documents.get_mut(&uri) {
            Some(entry) => {
                entry.text = text;
                entry.version = version;
                entry.versions.send_replace(version);
            }
            None => {
                let (versions, _) = watch::channel(version);
                documents.insert(uri, DocumentEntry { text, version, versions });
            }
        }
    }

    /// Drop a document. Watchers see their channel close.
    pub async fn remove(&self, uri: &Url) {
        self.documents.write().await.remove(uri);
    }

    pub async fn snapshot(&self, uri: &Url) -> Option<(String, i32)> {
        self.documents
            .read()
            .await
            .get(uri)
            .map(|entry| (entry.text.clone(), entry.version))
    }

    pub async fn version(&self, uri: &Url) -> Option<i32> {
        self.documents.read().await.get(uri).map(|entry| entry.version)
    }

    pub async fn subscribe(&self, uri: &Url) -> Option<watch::Receiver<i32>> {
        self.documents.read().await.get(uri).map(|entry| entry.versions.subscribe())
    }

    pub async fn uris(&self) -> Vec<Url> {
        self.documents.read().await.keys().cloned().collect()
    }

    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}
