//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path, query or body parameters, works against the
//! shared [`AppState`] and returns JSON.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shrink_core::{ConversationMessage, Table};
use shrink_dashboard::{DashboardEvent, SessionSummary, ViewData, ViewId};
use shrink_knowledge::{KnowledgeHit, KnowledgeStats};
use shrink_warehouse::ReferenceKind;

use crate::error::ApiError;
use crate::state::AppState;

const MAX_SEARCH_RESULTS: usize = 20;

// =============================================================================
// Request / query types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct EventsRequest {
    pub events: Vec<DashboardEvent>,
}

#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeSearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub knowledge_documents: usize,
    pub model_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    /// Messages appended by this request, in order.
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreatedResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferenceResponse {
    pub kind: String,
    pub table: Table,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub changed: bool,
    pub data: ViewData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeSearchResponse {
    pub query: String,
    pub results: Vec<KnowledgeHit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.active_count(),
        knowledge_documents: state.knowledge.statistics().total_documents,
        model_configured: state.chat.has_model(),
    })
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat - answer one message. Unknown or expired session ids start a
/// new session.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (session_id, session) = state.sessions.get_or_create(req.session_id);
    let created = req.session_id != Some(session_id);

    let result = {
        let mut ctx = session.lock().await;
        let result = state.chat.handle_message(&mut ctx, &req.message).await;
        state.sessions.record_message_count(session_id, ctx.log.len());
        result
    };

    match result {
        Ok(messages) => Ok(Json(ChatResponse {
            session_id,
            messages,
        })),
        Err(e) => {
            if created {
                state.sessions.remove(session_id);
            }
            Err(e.into())
        }
    }
}

/// GET /chat/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.sessions.list(),
    })
}

/// GET /chat/sessions/{id}/history
pub async fn session_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = state.session(id)?;
    let ctx = session.lock().await;
    Ok(Json(HistoryResponse {
        session_id: id,
        messages: ctx.log.messages().to_vec(),
    }))
}

/// DELETE /chat/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session not found: {}", id)))
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// POST /sessions - open a dashboard session without chatting first.
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionCreatedResponse>) {
    let (session_id, _) = state.sessions.get_or_create(None);
    (StatusCode::CREATED, Json(SessionCreatedResponse { session_id }))
}

/// GET /sessions/{id}/reference/{kind} - reference list through the
/// session cache.
pub async fn reference_data(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, String)>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let kind: ReferenceKind = kind.parse()?;
    let session = state.session(id)?;
    let mut ctx = session.lock().await;
    let table = ctx.reference_data(
        kind,
        state.warehouse.as_ref(),
        state.config.cache.reference_ttl_secs,
    )?;
    Ok(Json(ReferenceResponse {
        kind: kind.to_string(),
        table,
    }))
}

/// POST /sessions/{id}/events - apply a batch of view/filter events and
/// return the active view's tables.
pub async fn apply_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EventsRequest>,
) -> Result<Json<EventsResponse>, ApiError> {
    let session = state.session(id)?;
    let mut ctx = session.lock().await;
    let changed = ctx.apply_events(&req.events);
    let data = ctx.active_view_data(state.warehouse.as_ref(), None)?;
    Ok(Json(EventsResponse { changed, data }))
}

/// GET /sessions/{id}/views/{view} - gated view tables; empty when the
/// view is not active.
pub async fn view_data(
    State(state): State<AppState>,
    Path((id, view)): Path<(Uuid, String)>,
    Query(params): Query<ViewParams>,
) -> Result<Json<ViewData>, ApiError> {
    let view: ViewId = view.parse()?;
    let session = state.session(id)?;
    let mut ctx = session.lock().await;
    let data = ctx.view_data(view, state.warehouse.as_ref(), params.limit)?;
    Ok(Json(data))
}

// =============================================================================
// Knowledge
// =============================================================================

/// GET /knowledge/search
pub async fn knowledge_search(
    State(state): State<AppState>,
    Query(params): Query<KnowledgeSearchParams>,
) -> Result<Json<KnowledgeSearchResponse>, ApiError> {
    let q = params
        .q
        .ok_or_else(|| ApiError::BadRequest("Parameter 'q' is required".to_string()))?;
    if q.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Parameter 'q' must not be empty".to_string(),
        ));
    }

    let limit = params.limit.map(|l| l.clamp(1, MAX_SEARCH_RESULTS));
    let results = state
        .knowledge
        .search_filtered(&q, params.category.as_deref(), limit)?;
    Ok(Json(KnowledgeSearchResponse { query: q, results }))
}

/// GET /knowledge/stats
pub async fn knowledge_stats(State(state): State<AppState>) -> Json<KnowledgeStats> {
    Json(state.knowledge.statistics())
}

/// GET /knowledge/categories
pub async fn knowledge_categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: state.knowledge.categories(),
    })
}
