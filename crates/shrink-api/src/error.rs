//! API error type and JSON error body.
//!
//! Every failing handler returns `{error, message}` with a status code
//! derived from the originating crate error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use shrink_chat::ChatError;
use shrink_dashboard::DashboardError;
use shrink_knowledge::KnowledgeError;
use shrink_warehouse::WarehouseError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. "bad_request".
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 404
    NotFound(String),
    /// 500
    Internal(String),
    /// 503
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<WarehouseError> for ApiError {
    fn from(err: WarehouseError) -> Self {
        match err {
            WarehouseError::UnknownReferenceKind(_)
            | WarehouseError::UnknownDataset(_)
            | WarehouseError::InvalidSortColumn { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::UnknownView(_) => ApiError::BadRequest(err.to_string()),
            DashboardError::Warehouse(e) => e.into(),
        }
    }
}

impl From<KnowledgeError> for ApiError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Disabled => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_chat_error_mapping() {
        assert!(matches!(
            ApiError::from(ChatError::EmptyMessage),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(ChatError::Disabled),
            ApiError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn test_warehouse_error_mapping() {
        assert!(matches!(
            ApiError::from(WarehouseError::UnknownReferenceKind("regions".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(WarehouseError::LockPoisoned),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(DashboardError::UnknownView("charts".into())),
            ApiError::BadRequest(_)
        ));
    }
}
