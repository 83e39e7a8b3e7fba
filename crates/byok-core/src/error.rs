//! Error types for the byok-core crate

use crate::consent::ValidationFailure;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors from consent, delegation and attribute operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Scope string does not follow the scope grammar
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Token or link could not be parsed
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Token or link signature did not verify
    #[error("invalid signature")]
    InvalidSignature,

    /// Token or link has expired
    #[error("token expired")]
    TokenExpired,

    /// Token has been revoked
    #[error("token revoked")]
    TokenRevoked,

    /// Requested scope is not granted
    #[error("scope mismatch: {required} is not granted")]
    ScopeMismatch { required: String },

    /// Trust link presented by an agent it was not issued to
    #[error("trust link was not issued to {agent}")]
    WrongAgent { agent: String },

    /// Primary identity credential rejected
    #[error("identity verification failed: {0}")]
    Identity(String),

    /// TTL outside the accepted range
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),

    /// Request failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Backing store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Crypto error
    #[error("crypto error: {0}")]
    Crypto(#[from] byok_crypto::CryptoError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Validation reason for consent failures, `None` for anything else
    pub fn validation_failure(&self) -> Option<ValidationFailure> {
        match self {
            Self::MalformedToken(_) => Some(ValidationFailure::Malformed),
            Self::InvalidSignature => Some(ValidationFailure::InvalidSignature),
            Self::TokenExpired => Some(ValidationFailure::Expired),
            Self::TokenRevoked => Some(ValidationFailure::Revoked),
            Self::ScopeMismatch { .. } => Some(ValidationFailure::ScopeMismatch),
            Self::WrongAgent { .. } => Some(ValidationFailure::WrongAgent),
            _ => None,
        }
    }

    /// Check if this error denies consent (as opposed to a fault)
    pub fn is_consent_denied(&self) -> bool {
        self.validation_failure().is_some()
    }
}
