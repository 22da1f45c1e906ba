use std::path::PathBuf;

use shrink_core::ShrinkError;
use thiserror::Error;

/// Errors that can occur while loading or searching the knowledge base.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("document directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("invalid chunking: overlap {overlap} must be smaller than chunk size {size}")]
    InvalidChunking { size: usize, overlap: usize },
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KnowledgeError> for ShrinkError {
    fn from(err: KnowledgeError) -> Self {
        ShrinkError::Knowledge(err.to_string())
    }
}
