//! Client error types

use byok_core::{api::ErrorBody, ValidationFailure};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Timeout, unreachable service or 5xx
    #[error("Network error: {0}")]
    Network(String),

    /// Consent token expired
    #[error("Consent token expired")]
    TokenExpired,

    /// Consent token revoked
    #[error("Consent token revoked")]
    TokenRevoked,

    /// Token does not grant the scope the operation needs
    #[error("Scope mismatch: {0}")]
    ScopeMismatch(String),

    /// Token or credential rejected for another reason
    #[error("Consent denied ({reason:?}): {message}")]
    ConsentDenied {
        reason: Option<ValidationFailure>,
        message: String,
    },

    /// Missing vault, attribute or profile
    #[error("Not found: {0}")]
    NotFound(String),

    /// A vault already exists for the user
    #[error("Vault already exists for {0}")]
    VaultExists(String),

    /// No backend resolved or registered, or missing collaborator
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation needs an unlocked vault
    #[error("Vault is locked")]
    VaultLocked,

    /// Arguments rejected before any work was done
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Write failed at the network level; not retried automatically
    #[error("Write of {domain}/{attribute_key} failed: {source}")]
    WriteFailed {
        domain: String,
        attribute_key: String,
        token_id: Option<String>,
        #[source]
        source: Box<ClientError>,
    },

    /// Other error response from the service
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Encryption error
    #[error("Crypto error: {0}")]
    Crypto(#[from] byok_crypto::CryptoError),

    /// Consent or attribute contract error raised locally
    #[error("Core error: {0}")]
    Core(#[from] byok_core::CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Map an error response to a typed error
    pub fn from_response(status: u16, body: Option<ErrorBody>) -> Self {
        let (code, message, reason, request_id) = match body {
            Some(b) => (b.error, b.message, b.reason, b.request_id),
            None => (format!("HTTP{}", status), "Unknown error".to_string(), None, None),
        };

        if status >= 500 {
            return Self::Network(format!("server error {}: {}", status, message));
        }
        match (status, reason) {
            (_, Some(ValidationFailure::Expired)) => Self::TokenExpired,
            (_, Some(ValidationFailure::Revoked)) => Self::TokenRevoked,
            (_, Some(ValidationFailure::ScopeMismatch)) => Self::ScopeMismatch(message),
            (401 | 403, reason) => Self::ConsentDenied { reason, message },
            (404, _) => Self::NotFound(message),
            _ => Self::Api {
                status,
                code,
                message,
                request_id,
            },
        }
    }

    /// Whether a read may be retried after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether consent was refused (expired, revoked, wrong scope, bad token)
    pub fn is_consent_denied(&self) -> bool {
        match self {
            Self::TokenExpired | Self::TokenRevoked | Self::ScopeMismatch(_) | Self::ConsentDenied { .. } => true,
            Self::Core(e) => e.is_consent_denied(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {}", e))
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else if e.is_builder() {
            Self::Configuration(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
