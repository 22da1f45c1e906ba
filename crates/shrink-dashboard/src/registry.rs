//! Session registry.
//!
//! Maps session ids to their contexts. Each context sits behind its own
//! async mutex; holding it for a whole request serializes requests from the
//! same session while other sessions proceed. The map lock itself is only
//! held for lookups and never waits on a session lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::SessionContext;

pub type SharedSession = Arc<tokio::sync::Mutex<SessionContext>>;

#[derive(Debug, Clone)]
struct SessionHandle {
    context: SharedSession,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    /// Transcript length as of the last time the context was observed idle.
    message_count: usize,
}

/// Listing entry for one live session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: String,
    pub last_seen: String,
    pub message_count: usize,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
    timeout: Duration,
}

impl SessionRegistry {
    pub fn new(timeout_minutes: u32) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout: Duration::minutes(i64::from(timeout_minutes)),
        }
    }

    /// Return the requested live session, or create a new one when no id
    /// is given or the id is unknown or expired.
    pub fn get_or_create(&self, requested: Option<Uuid>) -> (Uuid, SharedSession) {
        self.get_or_create_at(requested, Utc::now())
    }

    pub fn get_or_create_at(
        &self,
        requested: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> (Uuid, SharedSession) {
        let mut sessions = self.lock();
        if let Some(id) = requested {
            if let Some(context) = Self::live(&mut sessions, id, now, self.timeout) {
                return (id, context);
            }
        }
        Self::purge(&mut sessions, now, self.timeout);

        let id = Uuid::new_v4();
        let context = Arc::new(tokio::sync::Mutex::new(SessionContext::new(id)));
        sessions.insert(
            id,
            SessionHandle {
                context: context.clone(),
                created_at: now,
                last_seen: now,
                message_count: 0,
            },
        );
        (id, context)
    }

    /// Look up a live session without creating one.
    pub fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.get_at(id, Utc::now())
    }

    pub fn get_at(&self, id: Uuid, now: DateTime<Utc>) -> Option<SharedSession> {
        let mut sessions = self.lock();
        Self::live(&mut sessions, id, now, self.timeout)
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session deleted");
        }
        removed
    }

    /// Store the transcript length after a request, so listings stay
    /// accurate while the session is busy with the next one.
    pub fn record_message_count(&self, id: Uuid, count: usize) {
        if let Some(handle) = self.lock().get_mut(&id) {
            handle.message_count = count;
        }
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.lock();
        Self::purge(&mut sessions, now, self.timeout)
    }

    /// Number of sessions, counting only those still live.
    pub fn active_count(&self) -> usize {
        self.active_count_at(Utc::now())
    }

    pub fn active_count_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.lock();
        Self::purge(&mut sessions, now, self.timeout);
        sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Summaries of all live sessions, oldest first. Never waits on a busy
    /// session; its last recorded message count is reported instead.
    pub fn list(&self) -> Vec<SessionSummary> {
        self.list_at(Utc::now())
    }

    pub fn list_at(&self, now: DateTime<Utc>) -> Vec<SessionSummary> {
        let mut sessions = self.lock();
        Self::purge(&mut sessions, now, self.timeout);

        let mut summaries: Vec<SessionSummary> = sessions
            .iter_mut()
            .map(|(id, handle)| {
                if let Ok(ctx) = handle.context.try_lock() {
                    handle.message_count = ctx.log.len();
                }
                SessionSummary {
                    id: *id,
                    created_at: handle.created_at.to_rfc3339(),
                    last_seen: handle.last_seen.to_rfc3339(),
                    message_count: handle.message_count,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    fn purge(
        sessions: &mut HashMap<Uuid, SessionHandle>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, h| now - h.last_seen < timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, "Expired sessions purged");
        }
        removed
    }

    fn live(
        sessions: &mut HashMap<Uuid, SessionHandle>,
        id: Uuid,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Option<SharedSession> {
        match sessions.get_mut(&id) {
            Some(handle) if now - handle.last_seen < timeout => {
                handle.last_seen = now;
                return Some(handle.context.clone());
            }
            Some(_) => {}
            None => return None,
        }
        sessions.remove(&id);
        info!(session_id = %id, "Session expired");
        None
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SessionHandle>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Session registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
