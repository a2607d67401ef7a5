//! SQLite-backed persistent store.

use crate::domain::error::SwingtraderError;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::PersistentStore;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SwingtraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SwingtraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| SwingtraderError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SwingtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| SwingtraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), SwingtraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS list_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                value TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_list_items_key ON list_items(key);",
        )
        .map_err(|e: rusqlite::Error| SwingtraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SwingtraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| SwingtraderError::Database {
                reason: e.to_string(),
            })
    }
}

fn query_err(e: rusqlite::Error) -> SwingtraderError {
    SwingtraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl PersistentStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, SwingtraderError> {
        let conn = self.conn()?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(query_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SwingtraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SwingtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(query_err)?;
        tx.execute("DELETE FROM list_items WHERE key = ?1", params![key])
            .map_err(query_err)?;
        tx.commit().map_err(query_err)
    }

    fn list(&self, key: &str) -> Result<Vec<String>, SwingtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT value FROM list_items WHERE key = ?1 ORDER BY id ASC")
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![key], |row| row.get(0))
            .map_err(query_err)?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row.map_err(query_err)?);
        }
        Ok(values)
    }

    fn append(&self, key: &str, value: &str) -> Result<(), SwingtraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO list_items (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn remove_value(&self, key: &str, value: &str) -> Result<usize, SwingtraderError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM list_items WHERE key = ?1 AND value = ?2",
            params![key, value],
        )
        .map_err(query_err)
    }
}
