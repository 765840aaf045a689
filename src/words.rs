//! The personal "My Words" list, kept sorted in a JSON array file.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Entries must be shorter than this many characters.
pub const MAX_WORD_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("No text selected to add to 'My Words'.")]
    Empty,

    #[error("Selected text is too long for 'My Words'. Keep it under 50 characters.")]
    TooLong,

    #[error("Failed to save word list to {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to serialize word list: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct WordList {
    path: PathBuf,
    words: Vec<String>,
}

impl WordList {
    /// Load from `path`. A missing, corrupt or non-array file gives an empty list.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let words = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<String>>(&contents) {
                Ok(mut words) => {
                    words.sort();
                    words.dedup();
                    words
                }
                Err(e) => {
                    warn!("Ignoring unreadable word list {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Failed to read word list {}: {e}", path.display());
                Vec::new()
            }
        };
        debug!("Loaded {} saved words from {}", words.len(), path.display());
        Self { path, words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Add a word. Returns `false` if it was already saved.
    pub fn add(&mut self, text: &str) -> Result<bool, WordListError> {
        let word = text.trim();
        if word.is_empty() {
            return Err(WordListError::Empty);
        }
        if word.chars().count() >= MAX_WORD_CHARS {
            return Err(WordListError::TooLong);
        }

        match self.words.binary_search_by(|w| w.as_str().cmp(word)) {
            Ok(_) => {
                info!("\"{word}\" is already in My Words");
                Ok(false)
            }
            Err(pos) => {
                self.words.insert(pos, word.to_string());
                self.save()?;
                Ok(true)
            }
        }
    }

    /// Remove a word. Returns `false` if it was not saved.
    pub fn remove(&mut self, text: &str) -> Result<bool, WordListError> {
        let word = text.trim();
        match self.words.binary_search_by(|w| w.as_str().cmp(word)) {
            Ok(pos) => {
                self.words.remove(pos);
                self.save()?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    pub fn save(&self) -> Result<(), WordListError> {
        let io_err = |source| WordListError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.words)?;
        fs::write(&self.path, json).map_err(io_err)?;
        debug!("Saved {} words to {}", self.words.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_keeps_list_sorted_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/my-words.json");

        let mut list = WordList::load(&path);
        assert!(list.is_empty());
        assert!(list.add("  whale ").unwrap());
        assert!(list.add("albatross").unwrap());
        assert!(list.add("kraken").unwrap());
        assert_eq!(list.words(), ["albatross", "kraken", "whale"]);

        let reloaded = WordList::load(&path);
        assert_eq!(reloaded.words(), list.words());
    }

    #[test]
    fn duplicates_are_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let mut list = WordList::load(tmp.path().join("w.json"));
        assert!(list.add("whale").unwrap());
        assert!(!list.add("whale ").unwrap());
        assert_eq!(list.words().len(), 1);
    }

    #[test]
    fn rejects_empty_and_long_text() {
        let tmp = tempfile::tempdir().unwrap();
        let mut list = WordList::load(tmp.path().join("w.json"));

        assert!(matches!(list.add("   "), Err(WordListError::Empty)));
        assert!(list.add(&"a".repeat(49)).unwrap());

        let err = list.add(&"b".repeat(50)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Selected text is too long for 'My Words'. Keep it under 50 characters."
        );
        assert_eq!(list.words().len(), 1);
    }

    #[test]
    fn remove() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("w.json");
        let mut list = WordList::load(&path);
        list.add("whale").unwrap();
        list.add("kraken").unwrap();

        assert!(list.remove("whale").unwrap());
        assert!(!list.remove("whale").unwrap());
        assert_eq!(WordList::load(&path).words(), ["kraken"]);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("w.json");

        fs::write(&path, "{not json").unwrap();
        assert!(WordList::load(&path).is_empty());

        fs::write(&path, r#"{"whale": true}"#).unwrap();
        assert!(WordList::load(&path).is_empty());
    }
}
