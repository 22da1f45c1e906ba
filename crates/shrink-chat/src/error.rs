//! Error types for the assistant.

use shrink_core::ShrinkError;
use shrink_knowledge::KnowledgeError;

use crate::model::RemoteCallError;

/// Errors from the chat orchestrator. Validation variants are returned to
/// the caller; the others become a system message in the transcript.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),
    #[error("model error: {0}")]
    Model(#[from] RemoteCallError),
}

impl ChatError {
    /// Whether the error is a rejected request rather than a failed answer.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChatError::Disabled | ChatError::EmptyMessage | ChatError::MessageTooLong(_)
        )
    }
}

impl From<ChatError> for ShrinkError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Knowledge(e) => e.into(),
            ChatError::Model(e) => ShrinkError::Model(e.to_string()),
            other => ShrinkError::Api(other.to_string()),
        }
    }
}

/// The router could not analyse the query. Callers treat this as a
/// zero-confidence knowledge route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("query is empty")]
    EmptyQuery,
}
