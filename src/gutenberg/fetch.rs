//! Downloads book text from Project Gutenberg.
//!
//! Tries the known plain-text URL layouts in order. A 404 or a transport
//! error moves on to the next candidate; any other HTTP error stops the
//! search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clean::clean_gutenberg_text;
use crate::config::GutenbergConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid book id: '{0}'")]
    InvalidId(String),

    #[error("Could not fetch book from {url}. HTTP Error: {status}")]
    Http { url: String, status: StatusCode },

    #[error("Could not fetch book. Please check ID. Tried URLs: {}", .tried.join(", "))]
    Exhausted { tried: Vec<String> },
}

/// Where the server gets book text from.
#[async_trait]
pub trait BookSource: Send + Sync {
    /// Cleaned, readable text of the book.
    async fn fetch_book(&self, book_id: &str) -> Result<String, FetchError>;
}

pub struct GutenbergFetcher {
    base_url: String,
    client: Client,
    max_fallback_chars: usize,
}

fn valid_book_id(book_id: &str) -> bool {
    !book_id.is_empty() && book_id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// UTF-8 if possible, otherwise Latin-1 (every byte maps to a char).
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("UTF-8 decoding failed, falling back to Latin-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

impl GutenbergFetcher {
    pub fn new(config: &GutenbergConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            max_fallback_chars: config.max_fallback_chars,
        })
    }

    pub fn candidate_urls(&self, book_id: &str) -> Vec<String> {
        let base = &self.base_url;
        let primary = if book_id.chars().all(|c| c.is_ascii_digit()) {
            format!("{base}/files/{book_id}/{book_id}-0.txt")
        } else {
            format!("{base}/ebooks/{book_id}.txt.utf-8")
        };
        vec![primary, format!("{base}/cache/epub/{book_id}/pg{book_id}.txt")]
    }

    /// Raw text and the URL it came from.
    pub async fn download(&self, book_id: &str) -> Result<(String, String), FetchError> {
        let urls = self.candidate_urls(book_id);

        for (i, url) in urls.iter().enumerate() {
            info!("Fetching book from URL ({}/{}): {url}", i + 1, urls.len());

            let resp = match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("Request to {url} failed: {e}");
                    continue;
                }
            };

            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                debug!("Book not found at {url} (404)");
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Http {
                    url: url.clone(),
                    status,
                });
            }

            match resp.bytes().await {
                Ok(bytes) => return Ok((decode_text(&bytes), url.clone())),
                Err(e) => {
                    warn!("Reading body from {url} failed: {e}");
                    continue;
                }
            }
        }

        Err(FetchError::Exhausted { tried: urls })
    }
}

#[async_trait]
impl BookSource for GutenbergFetcher {
    async fn fetch_book(&self, book_id: &str) -> Result<String, FetchError> {
        if !valid_book_id(book_id) {
            return Err(FetchError::InvalidId(book_id.to_string()));
        }

        let (raw, url) = self.download(book_id).await?;
        info!("Fetched book {book_id} from {url} ({} bytes)", raw.len());

        let cleaned = clean_gutenberg_text(&raw);
        if cleaned.trim().is_empty() {
            warn!("Cleaning book {book_id} produced nothing, sending original text");
            return Ok(raw.chars().take(self.max_fallback_chars).collect());
        }
        Ok(cleaned)
    }
}
