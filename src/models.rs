//! Core data models used throughout fav-filter.
//!
//! These types represent the fetched posts, the persisted fetch timestamp, and
//! the derived keyword annotations that flow through a session pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One liked post as returned by a [`FavoritesSource`](crate::source::FavoritesSource).
///
/// Immutable once fetched. The `id` is the remote post id and is stable
/// across fetches, which is what keyword annotations are keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub author: String,
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Plain-text form used for searching: `@author - body`.
    pub fn display_text(&self) -> String {
        format!("@{} - {}", self.author, self.body)
    }
}

/// Persisted singleton recording when remote data was last fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchState {
    pub last_fetch_time: DateTime<Utc>,
}

/// A keyword phrase derived for a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub document_id: String,
    pub phrase: String,
}

/// The full set of keyword annotations produced by one generation run.
///
/// Holds one entry per document that existed at generation time. Never
/// partially updated: a regeneration replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<TagEntry>,
}

impl TagSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Phrases aligned to `documents` by id. Documents without an entry get
    /// the empty phrase, so the result always has `documents.len()` items.
    pub fn aligned_phrases(&self, documents: &[Document]) -> Vec<String> {
        let by_id: std::collections::HashMap<&str, &str> = self
            .entries
            .iter()
            .map(|e| (e.document_id.as_str(), e.phrase.as_str()))
            .collect();

        documents
            .iter()
            .map(|doc| by_id.get(doc.id.as_str()).copied().unwrap_or("").to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            author: "someone".to_string(),
            body: format!("body of {}", id),
            url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_aligned_phrases_follow_document_order() {
        let tags = TagSet {
            generated_at: Utc::now(),
            entries: vec![
                TagEntry {
                    document_id: "a".into(),
                    phrase: "apple banana".into(),
                },
                TagEntry {
                    document_id: "b".into(),
                    phrase: "banana cherry".into(),
                },
            ],
        };

        let phrases = tags.aligned_phrases(&[doc("b"), doc("a")]);
        assert_eq!(phrases, vec!["banana cherry", "apple banana"]);
    }

    #[test]
    fn test_aligned_phrases_missing_entry_is_empty() {
        let tags = TagSet {
            generated_at: Utc::now(),
            entries: vec![TagEntry {
                document_id: "a".into(),
                phrase: "apple".into(),
            }],
        };

        let phrases = tags.aligned_phrases(&[doc("a"), doc("z")]);
        assert_eq!(phrases, vec!["apple".to_string(), String::new()]);
    }

    #[test]
    fn test_display_text_includes_author() {
        let d = doc("1");
        assert_eq!(d.display_text(), "@someone - body of 1");
    }
}
