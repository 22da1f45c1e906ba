//! Application state shared by all route handlers.

use std::sync::Arc;
use std::time::Instant;

use shrink_chat::{ChatOrchestrator, RemoteModel, RetryPolicy};
use shrink_core::config::ShrinkConfig;
use shrink_dashboard::{SessionRegistry, SharedSession};
use shrink_knowledge::KnowledgeBase;
use shrink_warehouse::Warehouse;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state. Cloned into every handler; all fields are
/// reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ShrinkConfig>,
    pub sessions: Arc<SessionRegistry>,
    pub warehouse: Arc<dyn Warehouse>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub chat: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: ShrinkConfig,
        warehouse: Arc<dyn Warehouse>,
        knowledge: Arc<dyn KnowledgeBase>,
        model: Option<Arc<dyn RemoteModel>>,
    ) -> Self {
        let mut chat = ChatOrchestrator::new(config.chat.clone(), Arc::clone(&knowledge));
        if let Some(model) = model {
            chat = chat.with_model(model, RetryPolicy::from_config(&config.model));
        }

        Self {
            sessions: Arc::new(SessionRegistry::new(config.chat.session_timeout_minutes)),
            config: Arc::new(config),
            warehouse,
            knowledge,
            chat: Arc::new(chat),
            start_time: Instant::now(),
        }
    }

    /// Live session by id, or 404.
    pub fn session(&self, id: Uuid) -> Result<SharedSession, ApiError> {
        self.sessions
            .get(id)
            .ok_or_else(|| ApiError::NotFound(format!("session not found: {}", id)))
    }
}
