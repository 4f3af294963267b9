//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for cache storage backends.
///
/// A flat text key-value store. Reads and writes are atomic per key.
pub trait CacheStorage: Send + Sync {
  /// Get the stored text for a key.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Store text under a key, replacing any previous value.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// List stored keys starting with `prefix`, sorted.
  fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

impl CacheStorage for Box<dyn CacheStorage> {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    (**self).get_item(key)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    (**self).set_item(key, value)
  }

  fn keys(&self, prefix: &str) -> Result<Vec<String>> {
    (**self).keys(prefix)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get_item(&self, _key: &str) -> Result<Option<String>> {
    Ok(None) // Always miss
  }

  fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
    Ok(()) // Discard
  }

  fn keys(&self, _prefix: &str) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the SQLite storage at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("matchday").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Namespaced text values, one row per key
CREATE TABLE IF NOT EXISTS local_store (
    item_key TEXT PRIMARY KEY,
    item_value TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT item_value FROM local_store WHERE item_key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache item {}: {}", key, e))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO local_store (item_key, item_value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store cache item {}: {}", key, e))?;

    Ok(())
  }

  fn keys(&self, prefix: &str) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT item_key FROM local_store WHERE substr(item_key, 1, ?) = ? ORDER BY item_key")
      .map_err(|e| eyre!("Failed to prepare key listing: {}", e))?;

    let keys = stmt
      .query_map(params![prefix.chars().count() as i64, prefix], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache keys: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_then_get() {
    let storage = SqliteStorage::in_memory().unwrap();
    storage.set_item("matchday:cache:tours", "one").unwrap();
    storage.set_item("matchday:cache:tours", "two").unwrap();

    assert_eq!(
      storage.get_item("matchday:cache:tours").unwrap(),
      Some("two".to_string())
    );
    assert_eq!(storage.get_item("matchday:cache:missing").unwrap(), None);
  }

  #[test]
  fn test_keys_by_prefix() {
    let storage = SqliteStorage::in_memory().unwrap();
    storage.set_item("matchday:cache:tours", "{}").unwrap();
    storage.set_item("matchday:cache:my-bets", "{}").unwrap();
    storage.set_item("other:cache:tours", "{}").unwrap();

    let keys = storage.keys("matchday:cache:").unwrap();
    assert_eq!(
      keys,
      vec![
        "matchday:cache:my-bets".to_string(),
        "matchday:cache:tours".to_string()
      ]
    );
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.set_item("k", "v").unwrap();
    assert_eq!(storage.get_item("k").unwrap(), None);
    assert!(storage.keys("").unwrap().is_empty());
  }
}
