//! Error types for the byok-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key derivation failed or was given unusable parameters
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// AEAD tag did not verify: wrong key, corrupted ciphertext, or tampering
    #[error("authentication failed: ciphertext or tag did not verify")]
    Authentication,

    /// Payload is malformed (invalid base64, wrong lengths, unsupported algorithm)
    #[error("decoding failed: {0}")]
    Decoding(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Signature verification failed
    #[error("signature verification failed")]
    SignatureVerification,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CryptoError {
    /// True when the failure means the data was not produced under this key
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}
