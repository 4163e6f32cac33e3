//! File-backed JSON key/value store.
//!
//! Persists one JSON document per store name under the data directory.
//! Callers derive store names through [`sanitize_name`] so that untrusted
//! input (usernames, roles) can never influence the resulting filename.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Strip every character that is not alphanumeric, `_` or `-`.
///
/// Store names are built from user-controlled strings; anything else
/// (separators, dots, control characters) is dropped outright.
pub fn sanitize_name(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Directory-backed store of named JSON documents.
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_name(name)))
    }

    /// Load the document stored under `name`, or `None` if absent.
    ///
    /// A document that exists but fails to parse is treated as absent;
    /// the parse failure is logged.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Save `value` under `name`, replacing any existing document.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.file_path(name);
        let content = serde_json::to_string_pretty(value).context("Failed to serialize value")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Delete the document stored under `name`.
    ///
    /// Returns `true` if a document was removed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        Ok(true)
    }
}
