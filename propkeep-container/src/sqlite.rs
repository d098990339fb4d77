//! SQLite-backed container.
//!
//! One table keyed by `(namespace, key)`; each value is stored as its
//! serde_json encoding, which carries the value's type tag.

use crate::{check_type, Container, ContainerError, ContainerResult};
use propkeep_types::{NamespacedKey, Value, ValueType};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Persistent container backed by SQLite.
pub struct SqliteContainer {
    conn: Mutex<Connection>,
}

impl SqliteContainer {
    /// Opens (or creates) a container at the given path.
    pub fn open(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening sqlite container");
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory container (for testing).
    pub fn open_in_memory() -> ContainerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ContainerResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS container_values (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ContainerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ContainerError::Backend("sqlite connection lock poisoned".into()))
    }
}

impl Container for SqliteContainer {
    fn try_get(&self, key: &NamespacedKey, ty: &ValueType) -> ContainerResult<Option<Value>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM container_values WHERE namespace = ?1 AND key = ?2",
                params![key.namespace(), key.key()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => {
                let value: Value = serde_json::from_str(&raw)?;
                check_type(key, ty, &value)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &NamespacedKey, ty: &ValueType, value: Value) -> ContainerResult<()> {
        check_type(key, ty, &value)?;
        // JSON has no NaN or infinity; serde_json would write `null`.
        if !value.is_finite() {
            return Err(ContainerError::Backend(format!(
                "cannot store non-finite {} under {key}",
                value.type_name()
            )));
        }
        let raw = serde_json::to_string(&value)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO container_values (namespace, key, value) VALUES (?1, ?2, ?3)",
            params![key.namespace(), key.key(), raw],
        )?;
        Ok(())
    }

    fn remove(&self, key: &NamespacedKey) -> ContainerResult<()> {
        self.conn()?.execute(
            "DELETE FROM container_values WHERE namespace = ?1 AND key = ?2",
            params![key.namespace(), key.key()],
        )?;
        Ok(())
    }

    fn keys(&self) -> ContainerResult<Vec<NamespacedKey>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT namespace, key FROM container_values")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut keys = Vec::new();
        for row in rows {
            let (namespace, key) = row?;
            keys.push(NamespacedKey::new(namespace, key)?);
        }
        Ok(keys)
    }
}
