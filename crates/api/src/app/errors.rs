use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use hotelbook_core::DomainError;
use hotelbook_infra::ServiceError;

/// Map a service failure to its HTTP response.
///
/// `NotFound` is a bare 404 with no body.
pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::NotFound => StatusCode::NOT_FOUND.into_response(),
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Concurrency(msg) => {
            tracing::error!(error = %msg, "concurrent modification");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "concurrency_conflict", msg)
        }
        ServiceError::Invariant(msg) => {
            tracing::error!(error = %msg, "stored row violates schema");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation", msg)
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// Request-shape problems detected before reaching a service.
pub fn domain_error_to_response(err: DomainError) -> Response {
    service_error_to_response(err.into())
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "bad_request", message)
}
