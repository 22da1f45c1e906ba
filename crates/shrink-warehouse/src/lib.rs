//! Shrink warehouse crate - SQLite-backed data access for the dashboard.
//!
//! Provides the `Warehouse` trait (reference lists and transactional fact
//! tables), a SQLite implementation with migrations, and deterministic
//! sample data for local runs.

pub mod db;
pub mod error;
pub mod migrations;
pub mod seed;
pub mod warehouse;

pub use db::Database;
pub use error::WarehouseError;
pub use seed::{seed_sample_data, SeedSummary};
pub use warehouse::{
    Dataset, ReferenceKind, SortDirection, SortSpec, SqliteWarehouse, Warehouse,
};
