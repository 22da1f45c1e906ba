//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use shrink_core::ShrinkError;

use crate::handlers;
use crate::state::AppState;

/// Build the axum Router with every endpoint and the CORS, compression and
/// tracing layers.
pub fn create_router(state: AppState) -> Router {
    // Dashboard origins: the server port itself and port+1 for a dev server.
    let port = state.config.general.port;
    let origins: Vec<HeaderValue> = [port, port.saturating_add(1)]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let chat_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/chat/sessions", get(handlers::list_sessions))
        .route("/chat/sessions/{id}/history", get(handlers::session_history))
        .route("/chat/sessions/{id}", delete(handlers::delete_session));

    let dashboard_routes = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}/reference/{kind}",
            get(handlers::reference_data),
        )
        .route("/sessions/{id}/events", post(handlers::apply_events))
        .route("/sessions/{id}/views/{view}", get(handlers::view_data));

    let knowledge_routes = Router::new()
        .route("/knowledge/search", get(handlers::knowledge_search))
        .route("/knowledge/stats", get(handlers::knowledge_stats))
        .route("/knowledge/categories", get(handlers::knowledge_categories));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(chat_routes)
        .merge(dashboard_routes)
        .merge(knowledge_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind 127.0.0.1 on the configured port and serve until shutdown.
pub async fn start_server(state: AppState) -> Result<(), ShrinkError> {
    let addr = format!("127.0.0.1:{}", state.config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ShrinkError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| ShrinkError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
