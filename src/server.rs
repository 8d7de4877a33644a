//! Browser UI and JSON API.
//!
//! Serves the filterable table of liked posts. Every request runs one full
//! session pass (gate → store → tags → filter) while holding the session
//! lock, so interactions are processed one at a time.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | HTML page; `?q=<text>&tag=<kw>&tag=<kw>` |
//! | `POST` | `/tags/regenerate` | Regenerate tags, then redirect to `/` |
//! | `GET`  | `/api/favorites` | Same filters as `/`, returns JSON |
//! | `POST` | `/api/tags/regenerate` | Regenerate tags, returns JSON |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "internal", "message": "Failed to fetch favorites from twitter: ..." } }
//! ```
//!
//! A failed fetch or tag generation fails only the current request; the
//! next request runs a fresh pass.

use anyhow::Result;
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::filter::FilterState;
use crate::render;
use crate::session::{Session, View, ViewRequest};
use crate::source::{create_source, FavoritesSource};
use crate::topics::{KeywordExtractor, LdaExtractor};

/// Shared state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
}

/// Start the server with the collaborators selected by `config`.
pub async fn run_server(config: &Config) -> Result<()> {
    let source = create_source(config)?;
    let extractor = Arc::new(LdaExtractor::from_config(&config.topics)?);
    run_server_with(config, source, extractor).await
}

/// Start the server with explicit collaborators.
pub async fn run_server_with(
    config: &Config,
    source: Arc<dyn FavoritesSource>,
    extractor: Arc<dyn KeywordExtractor>,
) -> Result<()> {
    let state = AppState {
        session: Arc::new(Mutex::new(Session::new(config, source, extractor))),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Serving favorites on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_page))
        .route("/tags/regenerate", post(handle_regenerate_form))
        .route("/api/favorites", get(handle_favorites))
        .route("/api/tags/regenerate", post(handle_regenerate))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: format!("{:#}", err),
        }
    }
}

// ============ Query parsing ============

/// Parse `q` and repeated `tag` parameters. Unknown keys are ignored.
fn parse_filter(raw: Option<&str>) -> FilterState {
    let mut filter = FilterState::default();
    let Some(raw) = raw else {
        return filter;
    };
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "q" => filter.query = Some(value.into_owned()),
            "tag" => filter.selected_tags.push(value.into_owned()),
            _ => {}
        }
    }
    filter
}

async fn run_pass(state: &AppState, request: &ViewRequest) -> Result<View, AppError> {
    let mut session = state.session.lock().await;
    Ok(session.view(request, Utc::now()).await?)
}

// ============ Handlers ============

async fn handle_page(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Html<String>, AppError> {
    let request = ViewRequest {
        filter: parse_filter(raw.as_deref()),
        regenerate_tags: false,
    };
    let view = run_pass(&state, &request).await?;
    Ok(Html(render::page(&view, &request.filter)?))
}

async fn handle_regenerate_form(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let request = ViewRequest {
        filter: FilterState::default(),
        regenerate_tags: true,
    };
    run_pass(&state, &request).await?;
    Ok(Redirect::to("/"))
}

async fn handle_favorites(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<View>, AppError> {
    let request = ViewRequest {
        filter: parse_filter(raw.as_deref()),
        regenerate_tags: false,
    };
    Ok(Json(run_pass(&state, &request).await?))
}

async fn handle_regenerate(State(state): State<AppState>) -> Result<Json<View>, AppError> {
    let request = ViewRequest {
        filter: FilterState::default(),
        regenerate_tags: true,
    };
    Ok(Json(run_pass(&state, &request).await?))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
