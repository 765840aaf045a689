//! Client for the reader server, used by the CLI.
//!
//! Server errors are unwrapped from the `{ error }` body so callers can show
//! the message as-is.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::api::BookResponse;
use crate::config::ClientConfig;
use crate::definition::Definition;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not reach the reader server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Server { status: StatusCode, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct ReaderClient {
    base_url: String,
    client: Client,
}

impl ReaderClient {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_book(&self, book_id: &str) -> Result<String, ClientError> {
        let url = format!("{}/fetch_book/{book_id}", self.base_url);
        debug!("GET {url}");

        let resp = self.client.get(&url).send().await?;
        let resp = check(resp, "HTTP error! status").await?;
        let book: BookResponse = resp.json().await?;
        Ok(book.text)
    }

    pub async fn define(&self, text: &str) -> Result<Definition, ClientError> {
        let url = format!("{}/get_definition", self.base_url);
        debug!("POST {url} for '{text}'");

        let resp = self
            .client
            .post(&url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let resp = check(resp, "Definition fetch error").await?;
        Ok(resp.json().await?)
    }

    /// Raw GET of a server path. Any status is returned, not just success.
    pub async fn get_raw(&self, path: &str) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

/// Turn a non-success response into `ClientError::Server`.
async fn check(resp: Response, fallback: &str) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = match resp.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(msg) }) if !msg.is_empty() => msg,
        Ok(_) => format!("{fallback}: {}", status.as_u16()),
        Err(_) => "Unknown error structure from backend".to_string(),
    };
    Err(ClientError::Server { status, message })
}
