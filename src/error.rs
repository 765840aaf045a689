//! Error type returned by the HTTP handlers.
//!
//! Every failure renders as `{ "error": message }` with a matching status,
//! which is the shape the reader client expects.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::definition::DefinitionError;
use crate::gutenberg::FetchError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("An unexpected error occurred with the AI service. Details: {0}")]
    Definition(#[from] DefinitionError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Fetch(FetchError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured(_) | ApiError::Fetch(_) | ApiError::Definition(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
