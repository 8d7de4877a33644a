//! One pass of the fetch → tag → filter pipeline.
//!
//! A [`Session`] owns the throttle gate, the tag cache, the document store,
//! and the two collaborators. Every user interaction runs one synchronous
//! pass through [`Session::view`]:
//!
//! ```text
//! FreshnessGate ──▶ DocumentStore ──▶ TagCache ──▶ filter::apply ──▶ View
//!  (fetch due?)      (memory/snapshot)  (valid?)     (query > tags)
//! ```
//!
//! There is no cancellation: a slow fetch or tag generation simply delays
//! the pass.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::filter::{self, FilterState};
use crate::freshness::FreshnessGate;
use crate::models::Document;
use crate::render;
use crate::source::FavoritesSource;
use crate::store::DocumentStore;
use crate::tags::{top_keywords, TagCache};
use crate::topics::KeywordExtractor;

/// User input for one pass.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub filter: FilterState,
    pub regenerate_tags: bool,
}

/// A document ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct ViewRow {
    pub id: String,
    pub author: String,
    pub body: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Display HTML with hyperlinks and line breaks.
    pub html: String,
    pub tags: Option<String>,
}

/// Result of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub rows: Vec<ViewRow>,
    /// Number of documents before filtering.
    pub total: usize,
    /// Keywords offered for selection; empty until tags exist.
    pub top_keywords: Vec<String>,
    pub last_fetch_time: Option<DateTime<Utc>>,
}

/// Snapshot of cache state for `favf status`.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub source: String,
    pub window_minutes: u64,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub refetch_due: bool,
    pub next_fetch_time: Option<DateTime<Utc>>,
    pub cached_documents: Option<usize>,
    pub cached_tags: Option<usize>,
}

pub struct Session {
    gate: FreshnessGate,
    tags: TagCache,
    snapshot_path: PathBuf,
    keyword_limit: Option<usize>,
    source: Arc<dyn FavoritesSource>,
    extractor: Arc<dyn KeywordExtractor>,
    store: Option<DocumentStore>,
}

impl Session {
    pub fn new(
        config: &Config,
        source: Arc<dyn FavoritesSource>,
        extractor: Arc<dyn KeywordExtractor>,
    ) -> Self {
        Self {
            gate: FreshnessGate::from_config(&config.cache),
            tags: TagCache::new(config.cache.tags_path()),
            snapshot_path: config.cache.snapshot_path(),
            keyword_limit: config.tags.keyword_limit(),
            source,
            extractor,
            store: None,
        }
    }

    /// Make sure a document set is loaded, fetching if the gate allows.
    ///
    /// A due gate always fetches. Otherwise the in-memory store is reused,
    /// then the on-disk snapshot; with neither available, a fetch happens
    /// as on first run.
    pub async fn ensure_documents(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.gate.should_refetch(now) {
            return self.refetch(now).await;
        }
        if self.store.is_some() {
            return Ok(());
        }
        match DocumentStore::load_snapshot(&self.snapshot_path) {
            Some(store) => {
                tracing::debug!(count = store.len(), "reusing cached favorites");
                self.store = Some(store);
                Ok(())
            }
            None => {
                tracing::info!("no cached favorites, fetching");
                self.refetch(now).await
            }
        }
    }

    async fn refetch(&mut self, now: DateTime<Utc>) -> Result<()> {
        // recorded before fetching so a slow fetch cannot cause a storm
        self.gate.record(now)?;
        let store = DocumentStore::load(self.source.as_ref()).await?;
        if let Err(e) = store.save_snapshot(&self.snapshot_path) {
            tracing::warn!(error = %e, "failed to write favorites snapshot");
        }
        self.store = Some(store);
        Ok(())
    }

    pub fn documents(&self) -> &[Document] {
        self.store
            .as_ref()
            .map(DocumentStore::documents)
            .unwrap_or_default()
    }

    /// Tags aligned to `documents`, or `None` when no readable tag set exists
    /// and `regenerate` is not set. Only an explicit request creates tags.
    fn tags_for(&self, documents: &[Document], regenerate: bool) -> Result<Option<Vec<String>>> {
        if !regenerate && self.tags.load().is_none() {
            return Ok(None);
        }
        let tags = self
            .tags
            .get_or_generate(documents, self.extractor.as_ref(), regenerate)?;
        Ok(Some(tags))
    }

    /// Run one full pass and build the rows to display.
    pub async fn view(&mut self, request: &ViewRequest, now: DateTime<Utc>) -> Result<View> {
        self.ensure_documents(now).await?;

        let documents = self.documents();
        let tags = self.tags_for(documents, request.regenerate_tags)?;

        let top_keywords = tags
            .as_deref()
            .map(|t| top_keywords(t, self.keyword_limit))
            .unwrap_or_default();

        let rows = filter::apply(documents, tags.as_deref(), &request.filter)
            .into_iter()
            .map(|row| ViewRow {
                id: row.document.id.clone(),
                author: row.document.author.clone(),
                body: row.document.body.clone(),
                url: row.document.url.clone(),
                created_at: row.document.created_at,
                html: render::display_html(row.document),
                tags: row.tags.map(str::to_string),
            })
            .collect();

        Ok(View {
            rows,
            total: documents.len(),
            top_keywords,
            last_fetch_time: self.gate.load().map(|s| s.last_fetch_time),
        })
    }

    /// Report cache state without fetching anything.
    pub fn status(&self, now: DateTime<Utc>) -> Status {
        let last_fetch_time = self.gate.load().map(|s| s.last_fetch_time);
        let window = TimeDelta::from_std(self.gate.window()).unwrap_or(TimeDelta::MAX);

        Status {
            source: self.source.name().to_string(),
            window_minutes: self.gate.window().as_secs() / 60,
            last_fetch_time,
            refetch_due: self.gate.should_refetch(now),
            next_fetch_time: last_fetch_time.and_then(|t| t.checked_add_signed(window)),
            cached_documents: DocumentStore::load_snapshot(&self.snapshot_path).map(|s| s.len()),
            cached_tags: self.tags.load().map(|t| t.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Source whose content can be swapped between fetches.
    struct ScriptedSource {
        docs: Mutex<Vec<Document>>,
        fetches: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(docs: Vec<Document>) -> Arc<Self> {
            Arc::new(Self {
                docs: Mutex::new(docs),
                fetches: AtomicUsize::new(0),
            })
        }

        fn set(&self, docs: Vec<Document>) {
            *self.docs.lock().unwrap() = docs;
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FavoritesSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_favorites(&self) -> Result<Vec<Document>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.docs.lock().unwrap().clone())
        }
    }

    struct FirstWordExtractor {
        calls: AtomicUsize,
    }

    impl KeywordExtractor for FirstWordExtractor {
        fn extract_keywords(&self, texts: &[String]) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| t.split_whitespace().take(2).collect::<Vec<_>>().join(" "))
                .collect())
        }
    }

    fn doc(id: &str, body: &str) -> Document {
        Document {
            id: id.to_string(),
            author: "ada".to_string(),
            body: body.to_string(),
            url: None,
            created_at: Utc::now(),
        }
    }

    fn config(tmp: &TempDir) -> Config {
        Config {
            cache: CacheConfig {
                dir: tmp.path().to_path_buf(),
                request_time_limit_minutes: 60,
            },
            ..Config::default()
        }
    }

    fn session(
        tmp: &TempDir,
        source: Arc<ScriptedSource>,
    ) -> (Session, Arc<FirstWordExtractor>) {
        let extractor = Arc::new(FirstWordExtractor {
            calls: AtomicUsize::new(0),
        });
        (
            Session::new(&config(tmp), source, extractor.clone()),
            extractor,
        )
    }

    #[tokio::test]
    async fn test_first_pass_fetches_and_records() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![doc("1", "hello world")]);
        let (mut s, _) = session(&tmp, source.clone());
        let now = Utc::now();

        let view = s.view(&ViewRequest::default(), now).await.unwrap();

        assert_eq!(source.fetches(), 1);
        assert_eq!(view.total, 1);
        assert_eq!(view.last_fetch_time, Some(now));
        assert!(view.top_keywords.is_empty());
        assert!(view.rows[0].tags.is_none());
    }

    #[tokio::test]
    async fn test_within_window_reuses_documents() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![doc("1", "a")]);
        let (mut s, _) = session(&tmp, source.clone());
        let now = Utc::now();

        s.view(&ViewRequest::default(), now).await.unwrap();
        source.set(vec![doc("1", "a"), doc("2", "b")]);
        let view = s
            .view(&ViewRequest::default(), now + TimeDelta::minutes(10))
            .await
            .unwrap();

        assert_eq!(source.fetches(), 1);
        assert_eq!(view.total, 1);
    }

    #[tokio::test]
    async fn test_new_session_reuses_snapshot() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![doc("1", "a"), doc("2", "b")]);
        let now = Utc::now();

        let (mut first, _) = session(&tmp, source.clone());
        first.view(&ViewRequest::default(), now).await.unwrap();

        let (mut second, _) = session(&tmp, source.clone());
        let view = second
            .view(&ViewRequest::default(), now + TimeDelta::minutes(1))
            .await
            .unwrap();

        assert_eq!(source.fetches(), 1);
        assert_eq!(view.total, 2);
    }

    #[tokio::test]
    async fn test_window_expiry_refetches() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![doc("1", "a")]);
        let (mut s, _) = session(&tmp, source.clone());
        let now = Utc::now();

        s.view(&ViewRequest::default(), now).await.unwrap();
        source.set(vec![doc("1", "a"), doc("2", "b")]);
        let later = now + TimeDelta::minutes(60);
        let view = s.view(&ViewRequest::default(), later).await.unwrap();

        assert_eq!(source.fetches(), 2);
        assert_eq!(view.total, 2);
        assert_eq!(view.last_fetch_time, Some(later));
    }

    #[tokio::test]
    async fn test_tags_only_after_explicit_request() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![
            doc("1", "apple banana pie"),
            doc("2", "banana cherry tart"),
        ]);
        let (mut s, extractor) = session(&tmp, source);
        let now = Utc::now();

        s.view(&ViewRequest::default(), now).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);

        let regen = ViewRequest {
            regenerate_tags: true,
            ..ViewRequest::default()
        };
        let view = s.view(&regen, now).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.top_keywords, vec!["banana", "apple", "cherry"]);

        let pick_apple = ViewRequest {
            filter: FilterState {
                query: None,
                selected_tags: vec!["apple".to_string()],
            },
            regenerate_tags: false,
        };
        let view = s.view(&pick_apple, now).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].id, "1");
        assert_eq!(view.rows[0].tags.as_deref(), Some("apple banana"));
    }

    #[tokio::test]
    async fn test_corrupt_tag_file_treated_as_absent() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![doc("1", "apple pie"), doc("2", "cherry tart")]);
        let (mut s, extractor) = session(&tmp, source);
        std::fs::write(tmp.path().join("tags.json"), "garbage").unwrap();
        let now = Utc::now();

        let view = s.view(&ViewRequest::default(), now).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert!(view.top_keywords.is_empty());
        assert!(view.rows.iter().all(|r| r.tags.is_none()));

        let regen = ViewRequest {
            regenerate_tags: true,
            ..ViewRequest::default()
        };
        let view = s.view(&regen, now).await.unwrap();
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(view.rows[0].tags.as_deref(), Some("apple pie"));
    }

    #[tokio::test]
    async fn test_tags_heal_after_count_change() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![doc("1", "a b"), doc("2", "c d"), doc("3", "e f")]);
        let (mut s, extractor) = session(&tmp, source.clone());
        let now = Utc::now();

        let regen = ViewRequest {
            regenerate_tags: true,
            ..ViewRequest::default()
        };
        s.view(&regen, now).await.unwrap();

        source.set((1..=5).map(|i| doc(&i.to_string(), "x y")).collect());
        let view = s
            .view(&ViewRequest::default(), now + TimeDelta::hours(2))
            .await
            .unwrap();

        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(view.rows.len(), 5);
        assert!(view.rows.iter().all(|r| r.tags.as_deref() == Some("x y")));
    }

    #[tokio::test]
    async fn test_status_reports_cache_state() {
        let tmp = TempDir::new().unwrap();
        let source = ScriptedSource::new(vec![doc("1", "a")]);
        let (mut s, _) = session(&tmp, source);
        let now = Utc::now();

        let before = s.status(now);
        assert!(before.refetch_due);
        assert!(before.last_fetch_time.is_none());

        s.view(&ViewRequest::default(), now).await.unwrap();
        let after = s.status(now);
        assert!(!after.refetch_due);
        assert_eq!(after.cached_documents, Some(1));
        assert_eq!(after.cached_tags, None);
        assert_eq!(after.next_fetch_time, Some(now + TimeDelta::minutes(60)));
        assert_eq!(after.window_minutes, 60);
    }
}
