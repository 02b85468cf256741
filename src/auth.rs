//! Persisted bearer credential
//!
//! The credential is the only state kept beyond the process. It lives under the
//! fixed key [`AUTH_TOKEN_KEY`] in a small JSON key-value file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};

pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Read/write/erase access to the single persisted credential slot
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;

    fn store(&self, token: &str) -> Result<()>;

    fn erase(&self) -> Result<()>;
}

/// Credential slot backed by a JSON file on disk.
///
/// Other keys in the file are left as they are, whatever their JSON type.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Malformed credential file {}", self.path.display()))
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        // A non-string value under the key is not a usable credential
        Ok(self
            .read_entries()?
            .remove(AUTH_TOKEN_KEY)
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    fn store(&self, token: &str) -> Result<()> {
        // Never overwrite a file we could not parse
        let mut entries = self
            .read_entries()
            .context("Refusing to overwrite unreadable credential file")?;
        entries.insert(AUTH_TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_entries(&entries)?;
        tracing::debug!(path = %self.path.display(), "Saved credential to disk");
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(AUTH_TOKEN_KEY).is_some() {
            self.write_entries(&entries)?;
            tracing::debug!(path = %self.path.display(), "Erased credential from disk");
        }
        Ok(())
    }
}

/// In-memory credential slot
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let token = self.token.read().map_err(|_| anyhow!("credential slot poisoned"))?;
        Ok(token.clone())
    }

    fn store(&self, token: &str) -> Result<()> {
        let mut slot = self.token.write().map_err(|_| anyhow!("credential slot poisoned"))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        let mut slot = self.token.write().map_err(|_| anyhow!("credential slot poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/credentials.json"));

        assert_eq!(store.load().unwrap(), None);
        store.store("mock_token_123456").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("mock_token_123456"));

        // A fresh handle on the same file sees the persisted value
        let reopened = FileCredentialStore::new(store.path());
        assert_eq!(reopened.load().unwrap().as_deref(), Some("mock_token_123456"));

        store.erase().unwrap();
        assert_eq!(reopened.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = FileCredentialStore::new(&path);
        store.store("abc").unwrap();
        store.erase().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let entries: Map<String, Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(entries.get("theme").and_then(Value::as_str), Some("dark"));
        assert!(!entries.contains_key(AUTH_TOKEN_KEY));
    }

    #[test]
    fn test_file_store_keeps_non_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"theme":"dark","n":1}"#).unwrap();

        let store = FileCredentialStore::new(&path);
        store.store("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));

        let entries: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(entries, serde_json::json!({"theme": "dark", "n": 1, "auth_token": "abc"}));
    }

    #[test]
    fn test_store_leaves_malformed_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(store.store("abc").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }

    #[test]
    fn test_non_string_token_is_no_credential() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"auth_token":42}"#).unwrap();

        assert_eq!(FileCredentialStore::new(&path).load().unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();

        assert!(FileCredentialStore::new(&path).load().is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::with_token("t");
        assert_eq!(store.load().unwrap().as_deref(), Some("t"));
        store.erase().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.store("u").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("u"));
    }
}
