//! Warehouse database connection.
//!
//! A single rusqlite Connection behind a Mutex. The local SQLite file stands
//! in for the cloud warehouse; migrations create the schema on open.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use crate::error::WarehouseError;
use crate::migrations;

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and run pending
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, WarehouseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| WarehouseError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| WarehouseError::Database(format!("Failed to set pragmas: {}", e)))?;

        info!(path = %path.display(), "Warehouse database opened");
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests and demos).
    pub fn in_memory() -> Result<Self, WarehouseError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            WarehouseError::Database(format!("Failed to open in-memory db: {}", e))
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, WarehouseError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with the underlying connection. The mutex is held
    /// for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, WarehouseError>
    where
        F: FnOnce(&Connection) -> Result<T, WarehouseError>,
    {
        let conn = self.conn.lock().map_err(|_| WarehouseError::LockPoisoned)?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
