//! Keyword tag cache.
//!
//! Persists the keyword phrase derived for each document and decides when it
//! must be regenerated. The cache is valid only while it holds exactly one
//! entry per current document; any count drift triggers a full regeneration.
//!
//! Entries are keyed by document id, so a reordered fetch still pairs each
//! document with its own phrase. The cache does not look at content: if the
//! set of documents changes but the count does not, stale phrases are served
//! until the next explicit regeneration.
//!
//! # File format
//!
//! `tags.json`:
//!
//! ```json
//! {
//!   "generated_at": "2024-03-01T09:15:02.123456789Z",
//!   "entries": [{ "document_id": "1764", "phrase": "rust tokio async" }]
//! }
//! ```

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{Document, TagEntry, TagSet};
use crate::persist;
use crate::topics::KeywordExtractor;

#[derive(Debug, Clone)]
pub struct TagCache {
    path: PathBuf,
}

impl TagCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted tag set. Missing or unparsable files yield `None`.
    pub fn load(&self) -> Option<TagSet> {
        let raw = persist::read_optional(&self.path)?;
        match serde_json::from_str(&raw) {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "unparsable tag cache, treating as absent"
                );
                None
            }
        }
    }

    /// Return one phrase per document, regenerating when required.
    ///
    /// Regenerates when `force` is set, when no tag set is persisted, or
    /// when the persisted set's length differs from `documents.len()`.
    /// Otherwise the persisted set is returned unchanged and the generator
    /// is not called.
    pub fn get_or_generate(
        &self,
        documents: &[Document],
        generator: &dyn KeywordExtractor,
        force: bool,
    ) -> Result<Vec<String>> {
        if !force {
            if let Some(set) = self.load() {
                if set.len() == documents.len() {
                    return Ok(set.aligned_phrases(documents));
                }
                tracing::info!(
                    cached = set.len(),
                    documents = documents.len(),
                    "tag cache out of date, regenerating"
                );
            }
        }

        let set = self.generate(documents, generator)?;
        Ok(set.aligned_phrases(documents))
    }

    fn generate(&self, documents: &[Document], generator: &dyn KeywordExtractor) -> Result<TagSet> {
        let texts: Vec<String> = documents.iter().map(|d| d.body.clone()).collect();
        let phrases = generator.extract_keywords(&texts)?;

        if phrases.len() != documents.len() {
            bail!(
                "keyword extractor returned {} phrases for {} documents",
                phrases.len(),
                documents.len()
            );
        }

        let set = TagSet {
            generated_at: Utc::now(),
            entries: documents
                .iter()
                .zip(phrases)
                .map(|(doc, phrase)| TagEntry {
                    document_id: doc.id.clone(),
                    phrase,
                })
                .collect(),
        };

        let json = serde_json::to_vec_pretty(&set)?;
        persist::write_atomic(&self.path, &json).with_context(|| "Failed to persist tag cache")?;
        tracing::info!(entries = set.len(), "generated keyword tags");

        Ok(set)
    }
}

/// Distinct keyword tokens across all phrases, most frequent first.
///
/// Phrases are split on whitespace. Ties keep first-seen order. With
/// `Some(n)` only the first `n` tokens are returned.
pub fn top_keywords<S: AsRef<str>>(phrases: &[S], limit: Option<usize>) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for token in phrases.iter().flat_map(|p| p.as_ref().split_whitespace()) {
        let count = counts.entry(token).or_insert(0);
        if *count == 0 {
            order.push(token);
        }
        *count += 1;
    }

    // stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    if let Some(n) = limit {
        order.truncate(n);
    }
    order.into_iter().map(str::to_string).collect()
}
