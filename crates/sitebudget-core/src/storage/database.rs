//! SQLite-backed key-value storage.
//!
//! Holds the two JSON records (`domainTimers`, `timeTracking`) in a single
//! `kv` table, by default `sitebudget.db` in the data directory.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::KeyValueStore;
use crate::error::{CoreError, StorageError};

/// SQLite database for the key-value records.
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;
        migrate(&conn).map_err(StorageError::from)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("database mutex poisoned".into()))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set several values in one transaction.
    pub fn kv_set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let db = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || db.kv_get(&key))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }

    async fn set(&self, entries: Vec<(String, String)>) -> Result<(), StorageError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.kv_set_many(&entries))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("kv.db")).unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set_many(&[("test".into(), "hello".into())]).unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");

        db.kv_set_many(&[("test".into(), "again".into())]).unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "again");
    }

    #[tokio::test]
    async fn async_store_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.db");

        let db = Database::open_at(&path).unwrap();
        db.set(vec![("domainTimers".into(), "{}".into())])
            .await
            .unwrap();
        drop(db);

        let reopened = Database::open_at(&path).unwrap();
        assert_eq!(
            reopened.get("domainTimers").await.unwrap().as_deref(),
            Some("{}")
        );
    }
}
