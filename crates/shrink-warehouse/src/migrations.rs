//! Warehouse schema migrations.
//!
//! Version 1 creates the reference tables (stores, departments) and the two
//! fact tables the dashboard reads: markdown transactions and weekly
//! book/SKU inventory positions.

use rusqlite::Connection;
use tracing::info;

use crate::error::WarehouseError;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), WarehouseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| {
        WarehouseError::Database(format!("Failed to create migrations table: {}", e))
    })?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            WarehouseError::Database(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!(version = 1, "Applied warehouse migration: initial_schema");
    }

    Ok(())
}

fn apply_v1(conn: &Connection) -> Result<(), WarehouseError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS stores (
            store_nbr   INTEGER PRIMARY KEY NOT NULL,
            store_name  TEXT NOT NULL,
            region      TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS departments (
            dept_nbr    INTEGER PRIMARY KEY NOT NULL,
            dept_name   TEXT NOT NULL
        );

        -- One row per markdown event on an item.
        CREATE TABLE IF NOT EXISTS markdowns (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            store_nbr       INTEGER NOT NULL REFERENCES stores (store_nbr),
            dept_nbr        INTEGER NOT NULL REFERENCES departments (dept_nbr),
            item_nbr        INTEGER NOT NULL,
            markdown_date   TEXT NOT NULL,
            fiscal_week     INTEGER NOT NULL,
            markdown_qty    INTEGER NOT NULL DEFAULT 0,
            markdown_amt    REAL NOT NULL DEFAULT 0,
            reason          TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_markdowns_store_date
            ON markdowns (store_nbr, markdown_date);

        CREATE INDEX IF NOT EXISTS idx_markdowns_dept
            ON markdowns (dept_nbr, markdown_date);

        -- Weekly book (financial) versus SKU (system on-hand) valuation.
        CREATE TABLE IF NOT EXISTS inventory_positions (
            store_nbr   INTEGER NOT NULL REFERENCES stores (store_nbr),
            dept_nbr    INTEGER NOT NULL REFERENCES departments (dept_nbr),
            fiscal_week INTEGER NOT NULL,
            week_ending TEXT NOT NULL,
            book_value  REAL NOT NULL,
            sku_value   REAL NOT NULL,
            PRIMARY KEY (store_nbr, dept_nbr, fiscal_week)
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| WarehouseError::Database(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
