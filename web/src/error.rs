//! Error types for web handlers.
//!
//! [`AppError`] bridges [`DomainError`] and HTTP responses. Every error body
//! has the shape `{"code": "...", "message": "..."}`, plus any detail fields
//! the error carries (a declined payment adds `paymentId` and `failureReason`).

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bookings_core::DomainError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Booking>, AppError> {
///     let booking = state.system.orchestrator.get_booking(id, &requester).await?;
///     Ok(Json(booking))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Extra top-level body fields
    details: Map<String, Value>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            details: Map::new(),
            source: None,
        }
    }

    /// Add a field to the response body next to `code` and `message`.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Attach the underlying failure for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST".to_string())
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "UNAUTHORIZED".to_string())
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message.into(), "NOT_FOUND".to_string())
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), "CONFLICT".to_string())
    }

    /// Create a 400 error for a rejected payload.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "VALIDATION_ERROR".to_string())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// HTTP status this error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Detail field rendered into the body, if present.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(flatten)]
    details: Map<String, Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { .. } | DomainError::Unauthorized => {
                Self::not_found(err.to_string())
            }
            DomainError::PaymentDeclined { payment_id, reason } => Self::new(
                StatusCode::PAYMENT_REQUIRED,
                "Payment failed".to_string(),
                "PAYMENT_DECLINED".to_string(),
            )
            .with_detail("paymentId", payment_id.to_string())
            .with_detail("failureReason", reason),
            DomainError::Validation(message) => Self::validation(message),
            DomainError::Conflict(message) => Self::conflict(message),
            DomainError::BookingNotCreated => Self::new(
                StatusCode::BAD_REQUEST,
                err.to_string(),
                "BOOKING_NOT_CREATED".to_string(),
            ),
            DomainError::Storage(_) => {
                let source = anyhow::Error::new(err);
                Self::internal("An internal error occurred").with_source(source)
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookings_core::PaymentId;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_unauthorized_reads_like_not_found() {
        let missing = AppError::from(DomainError::not_found("Booking", "b-1"));
        let denied = AppError::from(DomainError::Unauthorized);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(denied.status(), StatusCode::NOT_FOUND);
        assert_eq!(denied.code(), "NOT_FOUND");
    }

    #[test]
    fn test_domain_status_mapping() {
        let cases = [
            (DomainError::Validation("Card has expired".into()), StatusCode::BAD_REQUEST),
            (DomainError::Conflict("duplicate".into()), StatusCode::CONFLICT),
            (DomainError::BookingNotCreated, StatusCode::BAD_REQUEST),
            (DomainError::Storage("pool closed".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (domain, status) in cases {
            assert_eq!(AppError::from(domain).status(), status);
        }
    }

    #[test]
    fn test_declined_payment_carries_details() {
        let payment_id = PaymentId::new();
        let err = AppError::from(DomainError::PaymentDeclined {
            payment_id,
            reason: "Insufficient funds".into(),
        });

        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.code(), "PAYMENT_DECLINED");
        assert_eq!(err.to_string(), "[PAYMENT_DECLINED] Payment failed");
        assert_eq!(err.detail("paymentId"), Some(&Value::from(payment_id.to_string())));
        assert_eq!(err.detail("failureReason"), Some(&Value::from("Insufficient funds")));
    }

    #[test]
    fn test_storage_details_stay_internal() {
        let err = AppError::from(DomainError::Storage("password=hunter2".into()));
        assert!(!err.to_string().contains("hunter2"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
