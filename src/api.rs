//! HTTP API for the reader.
//!
//! `GET /fetch_book/{book_id}` returns `{ text }`, `POST /get_definition`
//! returns a [`Definition`]. Failures use the `{ error }` body produced by
//! [`ApiError`]. Static assets are served from `server.static_dir` when set.

use std::path::Path;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as UrlPath, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::definition::{Definition, Dictionary};
use crate::error::ApiError;
use crate::gutenberg::BookSource;

#[derive(Clone)]
pub struct AppState {
    pub books: Arc<dyn BookSource>,
    /// `None` when no Gemini key is configured.
    pub dictionary: Option<Arc<dyn Dictionary>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DefineRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Build the axum router.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/fetch_book/{book_id}", get(handle_fetch_book))
        .route("/get_definition", post(handle_get_definition))
        .route("/health", get(|| async { "OK" }))
        .with_state(state);

    match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    }
}

/// Bind the configured address and serve until Ctrl+C.
pub async fn serve(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let static_dir = (!config.static_dir.is_empty()).then(|| Path::new(&config.static_dir));
    let app = router(state, static_dir);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Reader server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {e}");
            }
            info!("Shutting down reader server");
        })
        .await
}

async fn handle_fetch_book(
    State(state): State<AppState>,
    UrlPath(book_id): UrlPath<String>,
) -> Result<Json<BookResponse>, ApiError> {
    info!("GET /fetch_book/{book_id}");

    match state.books.fetch_book(&book_id).await {
        Ok(text) => {
            info!("Sending {} chars for book {book_id}", text.len());
            Ok(Json(BookResponse { text }))
        }
        Err(e) => {
            warn!("Fetching book {book_id} failed: {e}");
            Err(e.into())
        }
    }
}

async fn handle_get_definition(
    State(state): State<AppState>,
    body: Result<Json<DefineRequest>, JsonRejection>,
) -> Result<Json<Definition>, ApiError> {
    let Some(dictionary) = state.dictionary else {
        error!("/get_definition called but no Gemini API key is configured");
        return Err(ApiError::NotConfigured(
            "Gemini API key not configured on server.".into(),
        ));
    };

    let Json(req) = body?;
    let text = req.text.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("No text provided for definition".into()));
    }
    info!("POST /get_definition for '{text}'");

    match dictionary.define(text).await {
        Ok(definition) => Ok(Json(definition)),
        Err(e) => {
            error!("Definition lookup for '{text}' failed: {e}");
            Err(e.into())
        }
    }
}
