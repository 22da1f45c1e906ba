//! Shrink API crate - axum HTTP server for the dashboard and assistant.
//!
//! Exposes chat, session transcripts, gated dashboard views, cached
//! reference lists and knowledge-base search.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
