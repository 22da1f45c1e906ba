//! Conversational assistant for the shrink dashboard.
//!
//! Routes questions between report recommendations and knowledge-base
//! answers, optionally through a remote language model with classified
//! retries, and records every exchange in the session transcript.

pub mod error;
pub mod model;
pub mod orchestrator;
pub mod recommender;
pub mod response;
pub mod retry;
pub mod router;

pub use error::{ChatError, RouterError};
pub use model::{ErrorClass, HttpModel, ModelRequest, ModelResponse, RemoteCallError, RemoteModel};
pub use orchestrator::ChatOrchestrator;
pub use recommender::{ReportDefinition, ReportMatch, ReportRecommender, REPORT_CATALOG};
pub use response::{format_knowledge, format_report, NO_KNOWLEDGE_RESULTS};
pub use retry::{invoke_with_retry, rewrite_request, RetryPhase, RetryPolicy, RetryState};
pub use router::{extract_parameters, QueryRouter, RouteDecision, RouteKind, REPORT_THRESHOLD};
