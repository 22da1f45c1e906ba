//! Error types for warehouse access.

use shrink_core::ShrinkError;

/// Errors from the warehouse shim.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("database error: {0}")]
    Database(String),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("unknown reference kind: {0}")]
    UnknownReferenceKind(String),
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),
    #[error("column {column} cannot be used to sort {dataset}")]
    InvalidSortColumn { dataset: String, column: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for WarehouseError {
    fn from(err: rusqlite::Error) -> Self {
        WarehouseError::Database(err.to_string())
    }
}

impl From<WarehouseError> for ShrinkError {
    fn from(err: WarehouseError) -> Self {
        ShrinkError::Warehouse(err.to_string())
    }
}
