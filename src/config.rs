//! Configuration management for gutenberg-reader-rs.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a partial (or missing) file is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory of static assets to serve at `/`. Empty disables it.
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            static_dir: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GutenbergConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_fallback_chars: usize,
}

impl Default for GutenbergConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.gutenberg.org".into(),
            timeout_secs: 20,
            max_fallback_chars: 50_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub host: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            host: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-1.5-flash-latest".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

impl GeminiConfig {
    /// Resolve the API key from the environment. Blank values count as missing.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Speech engine: `terminal` or `kokoro`.
    pub engine: String,
    pub max_chunk_len: usize,
    /// Language-tag prefix used for voice selection, e.g. `en-`.
    pub language: String,
    /// Pace of the terminal engine.
    pub words_per_minute: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            engine: "terminal".into(),
            max_chunk_len: crate::reader::chunker::DEFAULT_MAX_CHUNK_LEN,
            language: "en-".into(),
            words_per_minute: 180,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KokoroConfig {
    pub voice: String,
    pub speed: f32,
    pub model_path: String,
    pub voices_path: String,
    pub tokenizer_path: String,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        Self {
            voice: "af_heart".into(),
            speed: 1.0,
            model_path: String::new(),
            voices_path: String::new(),
            tokenizer_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bump the version suffix when the asset manifest changes.
    pub name: String,
    /// Root directory for caches. Empty means `~/.cache/gutenberg-reader`.
    pub dir: String,
    pub assets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "gutenberg-reader-cache-v1".into(),
            dir: String::new(),
            assets: vec![
                "/".into(),
                "/static/css/style.css".into(),
                "/static/js/script.js".into(),
                "/static/manifest.json".into(),
                "/static/icons/icon-192x192.png".into(),
                "/static/icons/icon-512x512.png".into(),
            ],
        }
    }
}

impl CacheConfig {
    pub fn root(&self) -> PathBuf {
        if self.dir.is_empty() {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gutenberg-reader")
        } else {
            PathBuf::from(&self.dir)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub notifications: bool,
    /// How long a transient message stays up.
    pub timeout_ms: u32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            notifications: true,
            timeout_ms: 7000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WordsConfig {
    /// Word list file. Empty means `~/.config/gutenberg-reader/my-words.json`.
    pub path: String,
}

impl Default for WordsConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
        }
    }
}

impl WordsConfig {
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.is_empty() {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gutenberg-reader/my-words.json")
        } else {
            PathBuf::from(&self.path)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gutenberg: GutenbergConfig,
    pub gemini: GeminiConfig,
    pub reader: ReaderConfig,
    pub kokoro: KokoroConfig,
    pub client: ClientConfig,
    pub cache: CacheConfig,
    pub feedback: FeedbackConfig,
    pub words: WordsConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/gutenberg-reader/config.yaml
    /// 3. /etc/gutenberg-reader/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/gutenberg-reader/config.yaml")),
                Some(PathBuf::from("/etc/gutenberg-reader/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}
