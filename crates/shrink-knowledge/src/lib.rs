//! Shrink knowledge crate - markdown knowledge base for the assistant.
//!
//! Loads training documents from a directory, splits them into overlapping
//! chunks and answers keyword searches with relevance-scored hits.

pub mod chunker;
pub mod error;
pub mod index;

pub use chunker::split_text;
pub use error::KnowledgeError;
pub use index::{short_source, tokenize, KnowledgeBase, KnowledgeHit, KnowledgeIndex, KnowledgeStats};
