//! Session working set of fetched documents.
//!
//! [`DocumentStore`] wraps one call to a [`FavoritesSource`] and keeps the
//! result, in source order, for the rest of the session. The last fetch is
//! also written to `favorites.json` so a later process can reuse it while the
//! throttle window is still open.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::Document;
use crate::persist;
use crate::source::FavoritesSource;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Fetch all documents from `source`. No re-sorting and no size limit.
    pub async fn load(source: &dyn FavoritesSource) -> Result<Self> {
        let documents = source
            .fetch_favorites()
            .await
            .with_context(|| format!("Failed to fetch favorites from {}", source.name()))?;
        tracing::info!(source = source.name(), count = documents.len(), "fetched favorites");
        Ok(Self { documents })
    }

    /// Read a snapshot written by [`save_snapshot`](Self::save_snapshot).
    /// Missing or unparsable snapshots yield `None`.
    pub fn load_snapshot(path: &Path) -> Option<Self> {
        let raw = persist::read_optional(path)?;
        match serde_json::from_str(&raw) {
            Ok(documents) => Some(Self { documents }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unparsable snapshot, ignoring");
                None
            }
        }
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(&self.documents)?;
        persist::write_atomic(path, &json)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
