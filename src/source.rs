//! Fetch collaborators.
//!
//! A [`FavoritesSource`] produces the user's liked posts in the order the
//! remote service returns them. Two implementations are provided:
//!
//! - **[`TwitterSource`]**: pages the v2 liked-posts endpoint with an
//!   app-only bearer token, backing off on rate limits.
//! - **[`FileSource`]**: reads a JSON array of [`Document`]s from disk.
//!
//! # Retry Strategy
//!
//! The Twitter source handles its own rate limiting:
//! - HTTP 429 → wait until `x-rate-limit-reset` (capped at 15 minutes),
//!   falling back to exponential backoff when the header is missing
//! - HTTP 5xx and network errors → exponential backoff: 1s, 2s, 4s, ... 32s
//! - other HTTP 4xx → fail immediately

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SourceConfig, SourceKind};
use crate::credentials::Credentials;
use crate::models::Document;

const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);

/// A remote (or local) supplier of liked posts.
#[async_trait]
pub trait FavoritesSource: Send + Sync {
    /// Short label used in logs and `favf status`.
    fn name(&self) -> &str;

    /// Fetch every liked post. May fail on auth or rate-limit problems.
    async fn fetch_favorites(&self) -> Result<Vec<Document>>;
}

/// Build the source selected by `[source].kind`.
///
/// For the Twitter source this reads credentials from the environment, so a
/// missing credential set fails here, before anything is rendered.
pub fn create_source(config: &Config) -> Result<Arc<dyn FavoritesSource>> {
    match config.source.kind {
        SourceKind::Twitter => {
            let creds = Credentials::from_env()?;
            Ok(Arc::new(TwitterSource::new(&config.source, creds)?))
        }
        SourceKind::File => {
            let path = config
                .source
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("source.path required for file source"))?;
            Ok(Arc::new(FileSource::new(path)))
        }
    }
}

// ============ File source ============

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FavoritesSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_favorites(&self) -> Result<Vec<Document>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read favorites file: {}", self.path.display()))?;
        let docs: Vec<Document> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid favorites file: {}", self.path.display()))?;
        Ok(docs)
    }
}

// ============ Twitter source ============

pub struct TwitterSource {
    api_base: String,
    user_id: String,
    page_size: u32,
    max_retries: u32,
    client: reqwest::Client,
    credentials: Credentials,
}

impl TwitterSource {
    pub fn new(config: &SourceConfig, credentials: Credentials) -> Result<Self> {
        let user_id = config
            .user_id
            .clone()
            .or_else(|| credentials.account_id().map(str::to_string))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "source.user_id not set and ACCESS_TOKEN does not start with an account id"
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            user_id,
            page_size: config.page_size,
            max_retries: config.max_retries,
            client,
            credentials,
        })
    }

    async fn bearer_token(&self) -> Result<String> {
        let key = self
            .credentials
            .consumer_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("CONSUMER_KEY not set"))?;
        let secret = self
            .credentials
            .consumer_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("CONSUMER_SECRET not set"))?;
        let basic = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", key, secret));

        let url = format!("{}/oauth2/token", self.api_base);
        let resp = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .header("Authorization", format!("Basic {}", basic))
                    .form(&[("grant_type", "client_credentials")])
            })
            .await?;

        let token: TokenResponse = resp.json().await?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            bail!("Unexpected token type from API: {}", token.token_type);
        }
        Ok(token.access_token)
    }

    /// Send a request, retrying on 429, 5xx, and network errors.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;
        let mut wait = Duration::ZERO;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::info!(attempt, wait_secs = wait.as_secs(), "retrying API request");
                tokio::time::sleep(wait).await;
            }
            let backoff = Duration::from_secs(1 << attempt.min(5));

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() == 429 {
                        wait = rate_limit_wait(response.headers(), Utc::now()).unwrap_or(backoff);
                        last_err = Some(anyhow::anyhow!("API rate limited ({})", status));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.is_server_error() {
                        wait = backoff;
                        last_err = Some(anyhow::anyhow!("API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("API error {}: {}", status, body_text);
                }
                Err(e) => {
                    wait = backoff;
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("API request failed after retries")))
    }
}

#[async_trait]
impl FavoritesSource for TwitterSource {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn fetch_favorites(&self) -> Result<Vec<Document>> {
        let token = self.bearer_token().await?;
        let url = format!("{}/2/users/{}/liked_tweets", self.api_base, self.user_id);
        let page_size = self.page_size.to_string();

        let mut docs = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let resp = self
                .send_with_retry(|| {
                    let mut query = vec![
                        ("max_results", page_size.as_str()),
                        ("expansions", "author_id"),
                        ("tweet.fields", "created_at,author_id"),
                        ("user.fields", "name,username"),
                    ];
                    if let Some(ref t) = next_token {
                        query.push(("pagination_token", t.as_str()));
                    }
                    self.client.get(&url).bearer_auth(&token).query(&query)
                })
                .await?;

            let page: LikedPage = resp.json().await.context("Invalid liked posts response")?;
            let before = docs.len();
            next_token = page.meta.as_ref().and_then(|m| m.next_token.clone());
            docs.extend(page.into_documents());
            tracing::debug!(page = docs.len() - before, total = docs.len(), "fetched page");

            if next_token.is_none() {
                break;
            }
        }

        Ok(docs)
    }
}

/// How long to wait before retrying a 429, from the reset header.
fn rate_limit_wait(headers: &reqwest::header::HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let reset: i64 = headers
        .get("x-rate-limit-reset")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    let secs = (reset - now.timestamp()).max(1) as u64;
    Some(Duration::from_secs(secs).min(MAX_RATE_LIMIT_WAIT))
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct LikedPage {
    #[serde(default)]
    data: Vec<Post>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    name: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    next_token: Option<String>,
}

impl LikedPage {
    fn into_documents(self) -> Vec<Document> {
        let users: HashMap<String, User> = self
            .includes
            .map(|i| i.users.into_iter().map(|u| (u.id.clone(), u)).collect())
            .unwrap_or_default();

        self.data
            .into_iter()
            .map(|post| {
                let user = post.author_id.as_ref().and_then(|id| users.get(id));
                let author = user
                    .map(|u| u.name.clone())
                    .or_else(|| post.author_id.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                let url = user.map(|u| format!("https://twitter.com/{}/status/{}", u.username, post.id));

                Document {
                    id: post.id,
                    author,
                    body: post.text,
                    url,
                    created_at: post.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                }
            })
            .collect()
    }
}
