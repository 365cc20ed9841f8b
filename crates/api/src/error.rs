//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use service::ServiceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// A message could not be handled.
    Service(ServiceError),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    /// Returns the status code this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Service(err) => service_error_status(err),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) => msg,
            ApiError::Service(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, "failed to handle request");
                }
                err.to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                msg
            }
        };

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_error_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidSku(_)
        | ServiceError::UnknownBatch(_)
        | ServiceError::DuplicateBatch(_)
        | ServiceError::Domain(_) => StatusCode::BAD_REQUEST,
        err if err.is_concurrent_update() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{BatchReference, Sku};
    use domain::DomainError;
    use product_store::StoreError;

    use super::*;

    #[test]
    fn test_client_errors() {
        let invalid_sku = ApiError::from(ServiceError::InvalidSku(Sku::new("LAMP")));
        assert_eq!(invalid_sku.status(), StatusCode::BAD_REQUEST);

        let unknown_batch = ApiError::from(ServiceError::UnknownBatch(BatchReference::new("b1")));
        assert_eq!(unknown_batch.status(), StatusCode::BAD_REQUEST);

        let domain = ApiError::from(ServiceError::Domain(DomainError::UnknownBatch {
            sku: Sku::new("LAMP"),
            reference: BatchReference::new("b1"),
        }));
        assert_eq!(domain.status(), StatusCode::BAD_REQUEST);

        let duplicate = ApiError::from(ServiceError::DuplicateBatch(BatchReference::new("b1")));
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_concurrent_update_is_conflict() {
        let err = ApiError::from(ServiceError::Store(StoreError::ConcurrentUpdate {
            sku: Sku::new("LAMP"),
        }));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_other_failures_are_internal() {
        let err = ApiError::from(ServiceError::TransactionClosed);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::Internal("boom".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found() {
        assert_eq!(
            ApiError::NotFound("missing".to_string()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
