//! Chat orchestrator: routes a question, produces the answer and appends
//! the exchange to the session transcript.

use std::sync::Arc;

use tracing::{info, warn};

use shrink_core::config::ChatConfig;
use shrink_core::ConversationMessage;
use shrink_dashboard::SessionContext;
use shrink_knowledge::{KnowledgeBase, KnowledgeHit};

use crate::error::ChatError;
use crate::model::{ModelRequest, RemoteModel};
use crate::response::{build_model_input, explain_failure, format_knowledge, format_report};
use crate::retry::{invoke_with_retry, RetryPolicy};
use crate::router::{QueryRouter, RouteDecision};

/// Central coordinator for assistant messages.
pub struct ChatOrchestrator {
    router: QueryRouter,
    knowledge: Arc<dyn KnowledgeBase>,
    model: Option<Arc<dyn RemoteModel>>,
    policy: RetryPolicy,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(config: ChatConfig, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            router: QueryRouter::new(),
            knowledge,
            model: None,
            policy: RetryPolicy::default(),
            config,
        }
    }

    /// Answer knowledge questions through `model` instead of returning raw
    /// search hits.
    pub fn with_model(mut self, model: Arc<dyn RemoteModel>, policy: RetryPolicy) -> Self {
        self.model = Some(model);
        self.policy = policy;
        self
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Handle one user message for `session`.
    ///
    /// Returns the messages appended to the transcript by this call: the
    /// user message followed by one assistant or system message. Rejected
    /// messages return an error and append nothing.
    pub async fn handle_message(
        &self,
        session: &mut SessionContext,
        message: &str,
    ) -> Result<Vec<ConversationMessage>, ChatError> {
        self.validate(message)?;

        let start = session.log.len();
        let history = session.log.recent(self.config.context_turns).to_vec();
        session.log.push(ConversationMessage::user(message));

        let decision = self.router.route_or_fallback(message);
        let reply = match self.answer(message, &decision, history).await {
            Ok(text) => ConversationMessage::assistant(text),
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Assistant answer failed");
                ConversationMessage::system(explain_failure(&e))
            }
        };
        session.log.push(reply);

        info!(
            session_id = %session.id,
            route = ?decision.kind,
            confidence = decision.confidence,
            "Chat message handled"
        );
        Ok(session.log.since(start).to_vec())
    }

    fn validate(&self, message: &str) -> Result<(), ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }
        Ok(())
    }

    async fn answer(
        &self,
        message: &str,
        decision: &RouteDecision,
        history: Vec<ConversationMessage>,
    ) -> Result<String, ChatError> {
        if decision.confidence > self.config.report_confidence_threshold {
            let report = decision
                .report
                .as_deref()
                .and_then(|name| self.router.recommender().find(name));
            if let Some(report) = report {
                return Ok(format_report(report, &decision.extracted_parameters));
            }
        }

        let hits = self.knowledge.search(message)?;
        match &self.model {
            Some(model) => self.ask_model(model.as_ref(), message, &hits, history).await,
            None => Ok(format_knowledge(&hits)),
        }
    }

    async fn ask_model(
        &self,
        model: &dyn RemoteModel,
        message: &str,
        hits: &[KnowledgeHit],
        history: Vec<ConversationMessage>,
    ) -> Result<String, ChatError> {
        let request = ModelRequest::new(build_model_input(message, hits)).with_history(history);
        let response = invoke_with_retry(model, &request, &self.policy).await?;
        Ok(response.output)
    }
}
