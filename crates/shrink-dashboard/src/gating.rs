//! Tab-gated lazy computations.
//!
//! Each derived table names the view that must be active for it to run.
//! Evaluated while that view is inactive, it returns an empty table and
//! does not touch the warehouse. The dependency graph is the static
//! [`COMPUTATIONS`] list below.

use std::collections::HashMap;

use tracing::debug;

use shrink_core::Table;
use shrink_warehouse::{Dataset, Warehouse, WarehouseError};

use crate::signals::{DashboardSignals, ViewId};

/// A derived table and the view that gates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatedComputation {
    pub name: &'static str,
    pub view: ViewId,
    pub dataset: Dataset,
}

pub const COMPUTATIONS: &[GatedComputation] = &[
    GatedComputation {
        name: "store_summary",
        view: ViewId::Summary,
        dataset: Dataset::StoreSummary,
    },
    GatedComputation {
        name: "markdown_detail",
        view: ViewId::Markdowns,
        dataset: Dataset::Markdowns,
    },
    GatedComputation {
        name: "irr_recap",
        view: ViewId::IrrRecap,
        dataset: Dataset::IrrRecap,
    },
    GatedComputation {
        name: "book_vs_sku",
        view: ViewId::BookVsSku,
        dataset: Dataset::BookVsSku,
    },
];

/// Computations gated by `view`, in declaration order.
pub fn computations_for(view: ViewId) -> impl Iterator<Item = &'static GatedComputation> {
    COMPUTATIONS.iter().filter(move |c| c.view == view)
}

impl GatedComputation {
    /// Run the computation against the current signals. Returns an empty
    /// table without fetching when the governing view is inactive.
    pub fn evaluate(
        &self,
        signals: &DashboardSignals,
        warehouse: &dyn Warehouse,
        limit: Option<u32>,
    ) -> Result<Table, WarehouseError> {
        if !signals.is_active(self.view) {
            debug!(computation = self.name, view = %self.view, "View inactive, skipping fetch");
            return Ok(Table::empty());
        }
        warehouse.transactional_data(self.dataset, &signals.filters, None, limit)
    }
}

/// Results of gated computations keyed by name, valid for one signal
/// revision and row limit.
#[derive(Debug, Default, Clone)]
pub struct ComputationMemo {
    results: HashMap<&'static str, (u64, Option<u32>, Table)>,
}

impl ComputationMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `computation`, reusing the stored result when neither the
    /// signals nor the limit changed since it was computed. Inactive
    /// evaluations are never stored.
    pub fn evaluate(
        &mut self,
        computation: &GatedComputation,
        signals: &DashboardSignals,
        warehouse: &dyn Warehouse,
        limit: Option<u32>,
    ) -> Result<Table, WarehouseError> {
        if !signals.is_active(computation.view) {
            return computation.evaluate(signals, warehouse, limit);
        }
        if let Some((revision, cached_limit, table)) = self.results.get(computation.name) {
            if *revision == signals.revision && *cached_limit == limit {
                return Ok(table.clone());
            }
        }
        let table = computation.evaluate(signals, warehouse, limit)?;
        self.results
            .insert(computation.name, (signals.revision, limit, table.clone()));
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::signals::DashboardEvent;
    use serde_json::json;
    use shrink_core::Filters;
    use shrink_warehouse::{ReferenceKind, SortSpec};
    use std::sync::Mutex;

    /// Records every call and the filters it received.
    #[derive(Default)]
    pub(crate) struct RecordingWarehouse {
        pub calls: Mutex<Vec<(String, Filters)>>,
    }

    impl RecordingWarehouse {
        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Warehouse for RecordingWarehouse {
        fn reference_data(
            &self,
            kind: ReferenceKind,
            filters: &Filters,
        ) -> Result<Table, WarehouseError> {
            self.calls
                .lock()
                .unwrap()
                .push((kind.to_string(), filters.clone()));
            let mut t = Table::with_columns(["value"]);
            t.push_row(vec![json!(kind.to_string())]);
            Ok(t)
        }

        fn transactional_data(
            &self,
            dataset: Dataset,
            filters: &Filters,
            _sort: Option<&SortSpec>,
            _limit: Option<u32>,
        ) -> Result<Table, WarehouseError> {
            self.calls
                .lock()
                .unwrap()
                .push((dataset.to_string(), filters.clone()));
            let mut t = Table::with_columns(["store_nbr"]);
            t.push_row(vec![json!(filters.store)]);
            Ok(t)
        }
    }

    fn markdown_detail() -> &'static GatedComputation {
        computations_for(ViewId::Markdowns).next().unwrap()
    }

    #[test]
    fn test_every_data_view_has_a_computation() {
        for view in [
            ViewId::Summary,
            ViewId::Markdowns,
            ViewId::IrrRecap,
            ViewId::BookVsSku,
        ] {
            assert_eq!(computations_for(view).count(), 1);
        }
        assert_eq!(computations_for(ViewId::Assistant).count(), 0);
        assert_eq!(computations_for(ViewId::CustomReports).count(), 0);
    }

    #[test]
    fn test_inactive_view_returns_empty_without_fetch() {
        let warehouse = RecordingWarehouse::default();
        let filter_sets = [
            Filters::default(),
            Filters {
                store: Some(5),
                department: Some(7),
                ..Filters::default()
            },
        ];
        for filters in filter_sets {
            let signals = DashboardSignals {
                active_view: ViewId::Summary,
                filters,
                revision: 3,
            };
            let table = markdown_detail()
                .evaluate(&signals, &warehouse, None)
                .unwrap();
            assert_eq!(table, Table::empty());
        }
        assert_eq!(warehouse.call_count(), 0);
    }

    #[test]
    fn test_activation_fetches_with_latest_filters() {
        let warehouse = RecordingWarehouse::default();
        let mut signals = DashboardSignals::default();
        let mut memo = ComputationMemo::new();

        // Edits while the view is hidden never fetch.
        signals.apply_batch(&[DashboardEvent::FiltersChanged {
            filters: Filters {
                store: Some(1),
                ..Filters::default()
            },
        }]);
        memo.evaluate(markdown_detail(), &signals, &warehouse, None)
            .unwrap();
        assert_eq!(warehouse.call_count(), 0);

        // View switch and a new filter in the same cycle.
        signals.apply_batch(&[
            DashboardEvent::ViewActivated {
                view: ViewId::Markdowns,
            },
            DashboardEvent::FiltersChanged {
                filters: Filters {
                    store: Some(5),
                    ..Filters::default()
                },
            },
        ]);
        let table = memo
            .evaluate(markdown_detail(), &signals, &warehouse, None)
            .unwrap();

        let calls = warehouse.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "markdowns");
        assert_eq!(calls[0].1.store, Some(5));
        assert_eq!(table.rows[0][0], json!(5));
    }

    #[test]
    fn test_memo_reuses_result_until_signals_change() {
        let warehouse = RecordingWarehouse::default();
        let mut signals = DashboardSignals::default();
        let mut memo = ComputationMemo::new();
        let summary = computations_for(ViewId::Summary).next().unwrap();

        memo.evaluate(summary, &signals, &warehouse, None).unwrap();
        memo.evaluate(summary, &signals, &warehouse, None).unwrap();
        assert_eq!(warehouse.call_count(), 1);

        signals.apply_batch(&[DashboardEvent::FiltersChanged {
            filters: Filters {
                department: Some(13),
                ..Filters::default()
            },
        }]);
        memo.evaluate(summary, &signals, &warehouse, None).unwrap();
        assert_eq!(warehouse.call_count(), 2);

        // A different row limit is a different result.
        memo.evaluate(summary, &signals, &warehouse, Some(5)).unwrap();
        assert_eq!(warehouse.call_count(), 3);
        assert_eq!(memo.len(), 1);
    }
}
