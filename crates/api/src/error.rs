//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::{ErrorKind, FulfillmentError};

/// API-level error type that maps to HTTP responses.
///
/// Rendered as `{"success": false, "message": ..., "kind": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Error raised by a service.
    Fulfillment(FulfillmentError),
}

impl ApiError {
    /// HTTP status for an error kind.
    pub fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::InvalidArgument
            | ErrorKind::EmptyCart
            | ErrorKind::InsufficientStock
            | ErrorKind::InvalidStateTransition
            | ErrorKind::AlreadyCancelled => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound | ErrorKind::ProductGone => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::SequencerExhausted | ErrorKind::StorageUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::InvalidArgument,
            ApiError::Fulfillment(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = Self::status_for(kind);

        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Fulfillment(err) if kind.is_retryable() => {
                tracing::error!(error = %err, kind = %kind, "request failed on infrastructure");
                "Service temporarily unavailable, please retry".to_string()
            }
            ApiError::Fulfillment(err) => err.to_string(),
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
            "kind": kind.as_str(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::StoreError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::status_for(ErrorKind::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::status_for(ErrorKind::InsufficientStock),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::status_for(ErrorKind::AlreadyCancelled),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::status_for(ErrorKind::InvalidStateTransition),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::status_for(ErrorKind::ProductGone), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::status_for(ErrorKind::SequencerExhausted),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_infrastructure_details_are_hidden() {
        let err = ApiError::from(FulfillmentError::StorageUnavailable(StoreError::Unavailable(
            "connection refused".into(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "storage_unavailable");
        assert!(!json["message"].as_str().unwrap().contains("connection refused"));
    }
}
