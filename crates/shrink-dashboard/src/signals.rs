//! Dashboard views and the explicit events that change them.
//!
//! The client reports tab switches and filter edits as events. A batch of
//! events is applied in full before anything recomputes, so a view switch
//! and a filter change arriving together are seen as one update.

use std::fmt;

use serde::{Deserialize, Serialize};

use shrink_core::Filters;

use crate::error::DashboardError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewId {
    Summary,
    Markdowns,
    IrrRecap,
    BookVsSku,
    CustomReports,
    Assistant,
}

impl ViewId {
    pub const ALL: [ViewId; 6] = [
        ViewId::Summary,
        ViewId::Markdowns,
        ViewId::IrrRecap,
        ViewId::BookVsSku,
        ViewId::CustomReports,
        ViewId::Assistant,
    ];
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewId::Summary => write!(f, "summary"),
            ViewId::Markdowns => write!(f, "markdowns"),
            ViewId::IrrRecap => write!(f, "irr_recap"),
            ViewId::BookVsSku => write!(f, "book_vs_sku"),
            ViewId::CustomReports => write!(f, "custom_reports"),
            ViewId::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for ViewId {
    type Err = DashboardError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(ViewId::Summary),
            "markdowns" => Ok(ViewId::Markdowns),
            "irr_recap" => Ok(ViewId::IrrRecap),
            "book_vs_sku" => Ok(ViewId::BookVsSku),
            "custom_reports" => Ok(ViewId::CustomReports),
            "assistant" => Ok(ViewId::Assistant),
            _ => Err(DashboardError::UnknownView(s.to_string())),
        }
    }
}

/// A user-driven change reported by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    ViewActivated { view: ViewId },
    FiltersChanged { filters: Filters },
}

/// Current active view and filter values of one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardSignals {
    pub active_view: ViewId,
    pub filters: Filters,
    /// Incremented once per batch that changed anything.
    pub revision: u64,
}

impl Default for DashboardSignals {
    fn default() -> Self {
        Self {
            active_view: ViewId::Summary,
            filters: Filters::default(),
            revision: 0,
        }
    }
}

impl DashboardSignals {
    /// Apply every event in order, then bump the revision once if the
    /// resulting state differs. Returns whether anything changed.
    pub fn apply_batch(&mut self, events: &[DashboardEvent]) -> bool {
        let before = (self.active_view, self.filters.clone());
        for event in events {
            match event {
                DashboardEvent::ViewActivated { view } => self.active_view = *view,
                DashboardEvent::FiltersChanged { filters } => self.filters = filters.clone(),
            }
        }
        let changed = before != (self.active_view, self.filters.clone());
        if changed {
            self.revision += 1;
        }
        changed
    }

    pub fn is_active(&self, view: ViewId) -> bool {
        self.active_view == view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_id_parse_and_display() {
        for view in ViewId::ALL {
            assert_eq!(view.to_string().parse::<ViewId>().unwrap(), view);
        }
        assert!(matches!(
            "charts".parse::<ViewId>(),
            Err(DashboardError::UnknownView(_))
        ));
    }

    #[test]
    fn test_event_json_shape() {
        let event: DashboardEvent =
            serde_json::from_value(json!({"type": "view_activated", "view": "irr_recap"}))
                .unwrap();
        assert_eq!(
            event,
            DashboardEvent::ViewActivated {
                view: ViewId::IrrRecap
            }
        );

        let event: DashboardEvent = serde_json::from_value(json!({
            "type": "filters_changed",
            "filters": {"store": 5, "department": null, "start_date": "2024-02-01", "end_date": null}
        }))
        .unwrap();
        match event {
            DashboardEvent::FiltersChanged { filters } => {
                assert_eq!(filters.store, Some(5));
                assert!(filters.start_date.is_some());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_batch_applies_all_events_then_bumps_once() {
        let mut signals = DashboardSignals::default();
        let filters = Filters {
            store: Some(3),
            ..Filters::default()
        };
        let changed = signals.apply_batch(&[
            DashboardEvent::FiltersChanged {
                filters: filters.clone(),
            },
            DashboardEvent::ViewActivated {
                view: ViewId::Markdowns,
            },
        ]);
        assert!(changed);
        assert_eq!(signals.revision, 1);
        assert!(signals.is_active(ViewId::Markdowns));
        assert_eq!(signals.filters, filters);
    }

    #[test]
    fn test_noop_batch_keeps_revision() {
        let mut signals = DashboardSignals::default();
        let changed = signals.apply_batch(&[DashboardEvent::ViewActivated {
            view: ViewId::Summary,
        }]);
        assert!(!changed);
        assert_eq!(signals.revision, 0);
        assert!(!signals.apply_batch(&[]));
    }

    #[test]
    fn test_last_event_wins_within_batch() {
        let mut signals = DashboardSignals::default();
        signals.apply_batch(&[
            DashboardEvent::ViewActivated {
                view: ViewId::IrrRecap,
            },
            DashboardEvent::ViewActivated {
                view: ViewId::BookVsSku,
            },
        ]);
        assert_eq!(signals.active_view, ViewId::BookVsSku);
    }
}
