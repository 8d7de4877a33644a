//! # fav-filter
//!
//! Fetch your liked posts, cache them locally to respect rate limits, derive
//! topic keywords from their text, and browse them in a filterable table.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ FreshnessGate│──▶│ DocumentStore │──▶│   TagCache   │
//! │ request.lock │   │ favorites.json│   │  tags.json   │
//! └──────────────┘   └───────┬───────┘   └──────┬───────┘
//!                            │                  │
//!                            ▼                  ▼
//!                      ┌───────────────────────────┐
//!                      │  filter (query > tags)    │
//!                      └─────────────┬─────────────┘
//!                          ┌─────────┴─────────┐
//!                          ▼                   ▼
//!                    ┌──────────┐        ┌──────────┐
//!                    │   CLI    │        │   HTTP   │
//!                    │  (favf)  │        │ browser  │
//!                    └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export CONSUMER_KEY=... CONSUMER_SECRET=... ACCESS_TOKEN=... ACCESS_TOKEN_SECRET=...
//! favf list --search rust        # fetch (at most once per window) and filter
//! favf tags --regenerate         # build keyword tags with the topic model
//! favf list --tag tokio          # filter by keyword
//! favf serve                     # browser UI on http://127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and env overrides |
//! | [`credentials`] | API secrets from the environment |
//! | [`models`] | Core data types |
//! | [`freshness`] | Request throttling |
//! | [`source`] | Fetch collaborators (Twitter, JSON file) |
//! | [`store`] | Session working set and snapshot |
//! | [`topics`] | Keyword extraction (LDA) |
//! | [`tags`] | Keyword tag cache |
//! | [`filter`] | Search and keyword filtering |
//! | [`render`] | HTML and text output |
//! | [`session`] | One fetch → tag → filter pass |
//! | [`server`] | Browser UI and JSON API |

pub mod config;
pub mod credentials;
pub mod filter;
pub mod freshness;
pub mod models;
pub mod persist;
pub mod render;
pub mod server;
pub mod session;
pub mod source;
pub mod store;
pub mod tags;
pub mod topics;
