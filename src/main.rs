//! # fav-filter CLI (`favf`)
//!
//! ## Usage
//!
//! ```bash
//! favf [--config ./favf.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `favf list` | Print liked posts, optionally filtered |
//! | `favf tags` | Show top keywords; `--regenerate` rebuilds tags |
//! | `favf status` | Show throttle and cache state |
//! | `favf serve` | Start the browser UI |
//!
//! ## Examples
//!
//! ```bash
//! # Everything, fetching only if the throttle window has passed
//! favf list
//!
//! # Search text wins over keyword selection
//! favf list --search "borrow checker"
//!
//! # Any of the selected keywords
//! favf list --tag rust --tag tokio
//!
//! # Rebuild keyword tags from the current favorites
//! favf tags --regenerate
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fav_filter::config::{self, Config};
use fav_filter::filter::FilterState;
use fav_filter::render;
use fav_filter::server;
use fav_filter::session::{Session, ViewRequest};
use fav_filter::source::create_source;
use fav_filter::topics::LdaExtractor;

/// fav-filter: search and tag your liked posts locally.
#[derive(Parser)]
#[command(
    name = "favf",
    about = "fav-filter: search and tag your liked posts locally",
    version,
    long_about = "fav-filter fetches your liked posts at most once per throttle window, \
    caches them locally, derives topic keywords with a seeded LDA model, and lets you \
    filter them by free text or keyword from the CLI or a browser UI."
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print liked posts.
    ///
    /// `--search` is matched case-insensitively against author and text
    /// (as a regex when valid). When it is given, `--tag` is ignored.
    List {
        /// Search text or pattern.
        #[arg(long, short)]
        search: Option<String>,

        /// Keep posts whose tags contain any of these keywords. Repeatable.
        #[arg(long = "tag", short)]
        tags: Vec<String>,

        /// Print the rows as HTML fragments.
        #[arg(long, conflicts_with = "json")]
        html: bool,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the top keywords from the tag cache.
    Tags {
        /// Regenerate tags from the current favorites before listing.
        #[arg(long)]
        regenerate: bool,
    },

    /// Show throttle window and cache state without fetching.
    Status,

    /// Start the browser UI.
    ///
    /// Binds to `[server].bind` (default `127.0.0.1:8501`).
    Serve,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_session(cfg: &Config) -> Result<Session> {
    let source = create_source(cfg)?;
    let extractor = Arc::new(LdaExtractor::from_config(&cfg.topics)?);
    Ok(Session::new(cfg, source, extractor))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List {
            search,
            tags,
            html,
            json,
        } => {
            let mut session = open_session(&cfg)?;
            let request = ViewRequest {
                filter: FilterState {
                    query: search,
                    selected_tags: tags,
                },
                regenerate_tags: false,
            };
            let view = session.view(&request, Utc::now()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else if html {
                for row in &view.rows {
                    println!("{}", row.html);
                }
            } else {
                print!("{}", render::text_listing(&view));
            }
        }
        Commands::Tags { regenerate } => {
            let mut session = open_session(&cfg)?;
            let request = ViewRequest {
                filter: FilterState::default(),
                regenerate_tags: regenerate,
            };
            let view = session.view(&request, Utc::now()).await?;

            if view.top_keywords.is_empty() {
                println!("No tags yet. Run `favf tags --regenerate` to generate them.");
            } else {
                println!("Top keywords ({} favorites):", view.total);
                for keyword in &view.top_keywords {
                    println!("  {}", keyword);
                }
            }
        }
        Commands::Status => {
            let session = open_session(&cfg)?;
            let status = session.status(Utc::now());
            let fmt_ts = |ts: Option<chrono::DateTime<Utc>>| {
                ts.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string())
            };
            let fmt_count = |n: Option<usize>| {
                n.map(|n| n.to_string())
                    .unwrap_or_else(|| "none".to_string())
            };

            println!("source:          {}", status.source);
            println!("window:          {} min", status.window_minutes);
            println!("last fetch:      {}", fmt_ts(status.last_fetch_time));
            println!("next fetch:      {}", fmt_ts(status.next_fetch_time));
            println!("refetch due:     {}", status.refetch_due);
            println!("cached posts:    {}", fmt_count(status.cached_documents));
            println!("cached tags:     {}", fmt_count(status.cached_tags));
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
