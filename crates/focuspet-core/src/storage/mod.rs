mod config;
pub mod database;

pub use config::Config;
pub use database::Database;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{ConfigError, DatabaseError};
use crate::ledger::ClaimRecord;

/// Durable string store the core persists user snapshots into.
///
/// Values are opaque JSON strings. Implementations must be safe to share
/// across threads; the core serializes writers per key itself.
pub trait KvStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError>;

    /// # Errors
    /// Returns an error if the backing store cannot be written.
    fn put(&self, key: &str, value: &str) -> Result<(), DatabaseError>;

    /// Keys starting with `prefix`, in ascending order.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, DatabaseError>;

    /// Write `value` under `key` together with the claims it newly
    /// accepted, all or nothing. Stores without an audit trail only write
    /// the value; stores that keep one override this with a transaction.
    ///
    /// # Errors
    /// Returns an error if the commit fails; nothing is written then.
    fn commit(&self, key: &str, value: &str, _claims: &[ClaimRecord]) -> Result<(), DatabaseError> {
        self.put(key, value)
    }
}

/// In-process store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let entries = self.entries.lock().map_err(|_| DatabaseError::Locked)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let mut entries = self.entries.lock().map_err(|_| DatabaseError::Locked)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let entries = self.entries.lock().map_err(|_| DatabaseError::Locked)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Returns `~/.config/focuspet[-dev]/` based on FOCUSPET_ENV.
///
/// Set FOCUSPET_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir().ok_or(ConfigError::NoDataDir)?.join(".config");

    let env = std::env::var("FOCUSPET_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focuspet-dev")
    } else {
        base_dir.join("focuspet")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::SaveFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_put() {
        let store = MemoryStore::new();
        assert!(store.get("user:a").unwrap().is_none());
        store.put("user:a", "{}").unwrap();
        store.put("user:a", "{\"v\":1}").unwrap();
        assert_eq!(store.get("user:a").unwrap().as_deref(), Some("{\"v\":1}"));
    }

    #[test]
    fn memory_store_commit_writes_value() {
        let store = MemoryStore::new();
        store.commit("user:a", "{}", &[]).unwrap();
        assert_eq!(store.get("user:a").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn memory_store_lists_by_prefix() {
        let store = MemoryStore::new();
        store.put("user:b", "1").unwrap();
        store.put("user:a", "1").unwrap();
        store.put("meta:version", "1").unwrap();
        assert_eq!(store.keys("user:").unwrap(), vec!["user:a", "user:b"]);
    }
}
