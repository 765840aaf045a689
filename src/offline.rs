//! Disk cache for the reader's static assets.
//!
//! Static paths are served cache-first. The book and definition API paths and
//! all non-GET requests always go to the network. Each cache is a directory
//! named after its version under the cache root; activating a version removes
//! the others.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::{Method, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ReaderClient};
use crate::config::CacheConfig;

const NETWORK_ONLY_PATHS: &[&str] = &["/fetch_book/", "/get_definition"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    CacheFirst,
    NetworkOnly,
}

pub fn policy_for(method: &Method, path: &str) -> FetchPolicy {
    if *method != Method::GET || NETWORK_ONLY_PATHS.iter().any(|p| path.contains(p)) {
        FetchPolicy::NetworkOnly
    } else {
        FetchPolicy::CacheFirst
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Network(#[from] ClientError),

    #[error("Failed to cache {path}: server returned {status}")]
    Install { path: String, status: StatusCode },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Flat, traversal-safe file name for a request path.
fn entry_name(request_path: &str) -> String {
    let name = urlencoding::encode(request_path);
    // Encoded names never hold a bare `%`, so the prefix cannot collide.
    match name.as_ref() {
        "" | "." | ".." => format!("%{name}"),
        _ => name.into_owned(),
    }
}

pub struct AssetCache {
    root: PathBuf,
    name: String,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.root(), config.name.clone())
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    pub fn lookup(&self, request_path: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let file = self.dir().join(entry_name(request_path));
        match fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&file)(e)),
        }
    }

    pub fn store(&self, request_path: &str, body: &[u8]) -> Result<(), CacheError> {
        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let file = dir.join(entry_name(request_path));
        fs::write(&file, body).map_err(io_err(&file))?;
        debug!("Cached {request_path} ({} bytes) in {}", body.len(), self.name);
        Ok(())
    }

    /// GET a path, applying the fetch policy. Only 200 responses are stored.
    pub async fn fetch(
        &self,
        client: &ReaderClient,
        request_path: &str,
    ) -> Result<(StatusCode, Vec<u8>), CacheError> {
        let cacheable = policy_for(&Method::GET, request_path) == FetchPolicy::CacheFirst;
        if cacheable {
            if let Some(body) = self.lookup(request_path)? {
                debug!("Serving {request_path} from cache {}", self.name);
                return Ok((StatusCode::OK, body));
            }
        }

        let (status, body) = client.get_raw(request_path).await?;
        if cacheable && status == StatusCode::OK {
            self.store(request_path, &body)?;
        }
        Ok((status, body))
    }

    /// Fetch every manifest path into this cache. Nothing is written unless
    /// all of them succeed.
    pub async fn install(&self, client: &ReaderClient, assets: &[String]) -> Result<usize, CacheError> {
        info!("Installing {} assets into cache {}", assets.len(), self.name);

        let mut fetched = Vec::with_capacity(assets.len());
        for path in assets {
            let (status, body) = client.get_raw(path).await?;
            if status != StatusCode::OK {
                return Err(CacheError::Install {
                    path: path.clone(),
                    status,
                });
            }
            fetched.push((path, body));
        }

        for (path, body) in &fetched {
            self.store(path, body)?;
        }
        Ok(fetched.len())
    }

    /// Delete every cache under the root except this one. Returns the removed names.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.root)(e)),
        };

        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err(&self.root))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name == self.name || !entry.path().is_dir() {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    info!("Removed old cache {name}");
                    removed.push(name);
                }
                Err(e) => warn!("Failed to remove old cache {name}: {e}"),
            }
        }
        Ok(removed)
    }
}
