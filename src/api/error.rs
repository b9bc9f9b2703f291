use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::LedgerError;
use crate::model::intent::{ErrorCode, IntentError, IntentResult};

/// Boundary failure: always rendered as the `IntentResult` envelope with
/// `success: false`, plus the mapped HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub errors: Vec<IntentError>,
    /// Seconds, attached as `Retry-After` on 429s.
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            errors: vec![IntentError::new(code, message)],
            retry_after: None,
        }
    }

    pub fn missing_intent() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::MissingIntent,
            "request carries no intent",
        )
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::InvalidMessage, message)
    }

    pub fn unknown_intent(intent: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::IntentError,
            format!("unrecognized intent `{intent}`"),
        )
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RateLimited,
            format!("rate limit exceeded; retry in {retry_after}s"),
        );
        err.retry_after = Some(retry_after);
        err
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let (status, code) = match &err {
            LedgerError::TemporalViolation { .. } => {
                (StatusCode::CONFLICT, ErrorCode::TemporalViolation)
            }
            LedgerError::ChainBroken { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal)
            }
            LedgerError::VersionConflict { .. } => {
                (StatusCode::CONFLICT, ErrorCode::VersionConflict)
            }
            LedgerError::PhysicsViolation { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::PhysicsViolation)
            }
            LedgerError::InsufficientBalance { .. }
            | LedgerError::InsufficientQuantity { .. }
            | LedgerError::InsufficientFund { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::InsufficientBalance)
            }
            LedgerError::CircuitBreakerBlocked { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::CircuitBreakerBlocked,
            ),
            LedgerError::TransactionRolledBack { .. } => {
                (StatusCode::CONFLICT, ErrorCode::IntentError)
            }
            LedgerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidMessage),
            LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            LedgerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
        };
        ApiError::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = IntentResult::failure(self.errors)
            .stamped(chrono::Utc::now().timestamp_millis(), 0);
        let mut response = (self.status, axum::Json(envelope)).into_response();
        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
