//! Error types for dashboard sessions.

use shrink_warehouse::WarehouseError;

/// Errors from dashboard view and reference requests.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("unknown view: {0}")]
    UnknownView(String),
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_error_display() {
        assert_eq!(
            DashboardError::UnknownView("charts".into()).to_string(),
            "unknown view: charts"
        );
        let err: DashboardError = WarehouseError::LockPoisoned.into();
        assert_eq!(err.to_string(), "database lock poisoned");
    }
}
