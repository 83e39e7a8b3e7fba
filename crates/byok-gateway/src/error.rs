//! API error types and JSON error rendering

use crate::middleware::current_request_id;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use byok_core::{api::ErrorBody, CoreError};
use thiserror::Error;

/// Result type alias using `ApiError`
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    /// Consent, delegation or attribute failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Missing or unusable credential
    #[error("{0}")]
    Unauthorized(String),

    /// Request could not be parsed
    #[error("{0}")]
    BadRequest(String),

    #[error("please reduce your request rate")]
    RateLimited,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// HTTP status and stable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Core(e) => match e {
                CoreError::MalformedToken(_)
                | CoreError::InvalidSignature
                | CoreError::TokenExpired
                | CoreError::TokenRevoked => (StatusCode::UNAUTHORIZED, "consent_denied"),
                CoreError::ScopeMismatch { .. } | CoreError::WrongAgent { .. } => {
                    (StatusCode::FORBIDDEN, "consent_denied")
                }
                CoreError::Identity(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                CoreError::InvalidScope(_) => (StatusCode::BAD_REQUEST, "invalid_scope"),
                CoreError::InvalidTtl(_) => (StatusCode::BAD_REQUEST, "invalid_ttl"),
                CoreError::InvalidRequest(_) | CoreError::Serialization(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_request")
                }
                CoreError::Crypto(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
                CoreError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        }
    }

    /// The JSON body this error renders as
    pub fn body(&self, request_id: Option<String>) -> ErrorBody {
        let (_, code) = self.status_and_code();
        let reason = match self {
            Self::Core(e) => e.validation_failure(),
            _ => None,
        };
        let message = match self {
            // Storage faults are logged, not echoed
            Self::Core(CoreError::Storage(_)) => "internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            error: code.to_string(),
            reason,
            message,
            request_id,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let request_id = current_request_id().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        (status, Json(self.body(Some(request_id)))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byok_core::ValidationFailure;
    use rstest::rstest;

    #[rstest]
    #[case(CoreError::TokenExpired, StatusCode::UNAUTHORIZED, Some(ValidationFailure::Expired))]
    #[case(CoreError::TokenRevoked, StatusCode::UNAUTHORIZED, Some(ValidationFailure::Revoked))]
    #[case(CoreError::InvalidSignature, StatusCode::UNAUTHORIZED, Some(ValidationFailure::InvalidSignature))]
    #[case(
        CoreError::ScopeMismatch { required: "domain.food.read".into() },
        StatusCode::FORBIDDEN,
        Some(ValidationFailure::ScopeMismatch)
    )]
    #[case(CoreError::NotFound("x".into()), StatusCode::NOT_FOUND, None)]
    #[case(CoreError::InvalidTtl("x".into()), StatusCode::BAD_REQUEST, None)]
    #[case(CoreError::Identity("x".into()), StatusCode::UNAUTHORIZED, None)]
    fn test_core_error_mapping(
        #[case] error: CoreError,
        #[case] status: StatusCode,
        #[case] reason: Option<ValidationFailure>,
    ) {
        let error = ApiError::from(error);
        assert_eq!(error.status_and_code().0, status);
        assert_eq!(error.body(None).reason, reason);
    }

    #[test]
    fn test_internal_details_are_not_echoed() {
        let body = ApiError::Core(CoreError::Storage("disk at /var/lib/x".into())).body(None);
        assert_eq!(body.error, "internal_error");
        assert!(!body.message.contains("/var/lib"));
    }
}
