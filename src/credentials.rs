//! Remote API credentials.
//!
//! Four opaque secrets read from the environment at startup. They are never
//! validated beyond presence and never printed.

use anyhow::{bail, Result};
use std::fmt;

pub const CONSUMER_KEY: &str = "CONSUMER_KEY";
pub const CONSUMER_SECRET: &str = "CONSUMER_SECRET";
pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const ACCESS_TOKEN_SECRET: &str = "ACCESS_TOKEN_SECRET";

#[derive(Clone, Default)]
pub struct Credentials {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("consumer_key", &mask(&self.consumer_key))
            .field("consumer_secret", &mask(&self.consumer_secret))
            .field("access_token", &mask(&self.access_token))
            .field("access_token_secret", &mask(&self.access_token_secret))
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary secret lookup.
    ///
    /// Fails only when all four secrets are absent. A partial set is logged
    /// and returned; the remote call reports the real problem later.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let creds = Self {
            consumer_key: read(CONSUMER_KEY),
            consumer_secret: read(CONSUMER_SECRET),
            access_token: read(ACCESS_TOKEN),
            access_token_secret: read(ACCESS_TOKEN_SECRET),
        };

        let present = creds.present_count();
        if present == 0 {
            bail!(
                "Consumer and access keys and secrets must be set as environment variables \
                 ({}, {}, {}, {})",
                CONSUMER_KEY,
                CONSUMER_SECRET,
                ACCESS_TOKEN,
                ACCESS_TOKEN_SECRET
            );
        }
        if present < 4 {
            tracing::warn!(present, "only some API credentials are set");
        }

        Ok(creds)
    }

    fn present_count(&self) -> usize {
        [
            &self.consumer_key,
            &self.consumer_secret,
            &self.access_token,
            &self.access_token_secret,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }

    /// The numeric account id that prefixes an access token (`<id>-<rest>`).
    pub fn account_id(&self) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        let (id, _) = token.split_once('-')?;
        (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then_some(id)
    }
}
