//! Per-session state: reference cache, dashboard signals, computed views
//! and the conversation transcript.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use shrink_core::{ConversationLog, Filters, Table};
use shrink_warehouse::{ReferenceKind, Warehouse, WarehouseError};

use crate::cache::SessionCache;
use crate::gating::{computations_for, ComputationMemo};
use crate::signals::{DashboardEvent, DashboardSignals, ViewId};

/// Tables of one view as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewData {
    pub view: ViewId,
    pub active: bool,
    pub revision: u64,
    pub tables: BTreeMap<String, Table>,
}

/// Everything owned by one user session. Nothing here is shared across
/// sessions.
#[derive(Debug)]
pub struct SessionContext {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub log: ConversationLog,
    cache: SessionCache<Table>,
    signals: DashboardSignals,
    memo: ComputationMemo,
}

impl SessionContext {
    pub fn new(id: Uuid) -> Self {
        info!(session_id = %id, "Session created");
        Self {
            id,
            created_at: Utc::now(),
            log: ConversationLog::new(),
            cache: SessionCache::new(),
            signals: DashboardSignals::default(),
            memo: ComputationMemo::new(),
        }
    }

    pub fn signals(&self) -> &DashboardSignals {
        &self.signals
    }

    pub fn filters(&self) -> &Filters {
        &self.signals.filters
    }

    /// Reference list through the session cache. Lists are fetched
    /// unfiltered so one cache key covers every filter state.
    pub fn reference_data(
        &mut self,
        kind: ReferenceKind,
        warehouse: &dyn Warehouse,
        ttl_secs: u64,
    ) -> Result<Table, WarehouseError> {
        self.cache.get_or_fetch(kind.cache_key(), ttl_secs, || {
            warehouse.reference_data(kind, &Filters::default())
        })
    }

    pub fn cache(&self) -> &SessionCache<Table> {
        &self.cache
    }

    /// Apply a batch of client events. Returns whether the signals changed.
    pub fn apply_events(&mut self, events: &[DashboardEvent]) -> bool {
        let changed = self.signals.apply_batch(events);
        if changed {
            info!(
                session_id = %self.id,
                view = %self.signals.active_view,
                revision = self.signals.revision,
                "Dashboard signals updated"
            );
        }
        changed
    }

    /// Evaluate every computation gated by `view`. Inactive views yield
    /// empty tables without warehouse access.
    pub fn view_data(
        &mut self,
        view: ViewId,
        warehouse: &dyn Warehouse,
        limit: Option<u32>,
    ) -> Result<ViewData, WarehouseError> {
        let mut tables = BTreeMap::new();
        for computation in computations_for(view) {
            let table = self
                .memo
                .evaluate(computation, &self.signals, warehouse, limit)?;
            tables.insert(computation.name.to_string(), table);
        }
        Ok(ViewData {
            view,
            active: self.signals.is_active(view),
            revision: self.signals.revision,
            tables,
        })
    }

    /// Data for whichever view is active now.
    pub fn active_view_data(
        &mut self,
        warehouse: &dyn Warehouse,
        limit: Option<u32>,
    ) -> Result<ViewData, WarehouseError> {
        let view = self.signals.active_view;
        self.view_data(view, warehouse, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gating::tests::RecordingWarehouse;

    #[test]
    fn test_reference_data_cached_per_session() {
        let warehouse = RecordingWarehouse::default();
        let mut a = SessionContext::new(Uuid::new_v4());
        let mut b = SessionContext::new(Uuid::new_v4());

        a.reference_data(ReferenceKind::Stores, &warehouse, 3600)
            .unwrap();
        a.reference_data(ReferenceKind::Stores, &warehouse, 3600)
            .unwrap();
        assert_eq!(warehouse.call_count(), 1);

        // A second session has its own cache.
        b.reference_data(ReferenceKind::Stores, &warehouse, 3600)
            .unwrap();
        assert_eq!(warehouse.call_count(), 2);
        assert_eq!(a.cache().len(), 1);
    }

    #[test]
    fn test_inactive_view_data_is_empty() {
        let warehouse = RecordingWarehouse::default();
        let mut session = SessionContext::new(Uuid::new_v4());
        let data = session
            .view_data(ViewId::IrrRecap, &warehouse, None)
            .unwrap();
        assert!(!data.active);
        assert_eq!(data.tables["irr_recap"], Table::empty());
        assert_eq!(warehouse.call_count(), 0);
    }

    #[test]
    fn test_events_then_active_view() {
        let warehouse = RecordingWarehouse::default();
        let mut session = SessionContext::new(Uuid::new_v4());
        assert!(session.apply_events(&[DashboardEvent::ViewActivated {
            view: ViewId::BookVsSku
        }]));
        let data = session.active_view_data(&warehouse, Some(10)).unwrap();
        assert!(data.active);
        assert_eq!(data.view, ViewId::BookVsSku);
        assert_eq!(data.revision, 1);
        assert!(!data.tables["book_vs_sku"].is_empty());
    }

    #[test]
    fn test_views_without_computations() {
        let warehouse = RecordingWarehouse::default();
        let mut session = SessionContext::new(Uuid::new_v4());
        session.apply_events(&[DashboardEvent::ViewActivated {
            view: ViewId::Assistant,
        }]);
        let data = session.active_view_data(&warehouse, None).unwrap();
        assert!(data.tables.is_empty());
        assert_eq!(warehouse.call_count(), 0);
    }
}
