//! Shrink dashboard crate - per-session state behind the dashboard views.
//!
//! Provides the reference-data TTL cache, explicit view/filter events,
//! tab-gated computations over the warehouse, and the session context that
//! ties them to a conversation transcript.

pub mod cache;
pub mod error;
pub mod gating;
pub mod registry;
pub mod session;
pub mod signals;

pub use cache::{CacheEntry, SessionCache};
pub use error::DashboardError;
pub use gating::{computations_for, ComputationMemo, GatedComputation, COMPUTATIONS};
pub use registry::{SessionRegistry, SessionSummary, SharedSession};
pub use session::{SessionContext, ViewData};
pub use signals::{DashboardEvent, DashboardSignals, ViewId};
