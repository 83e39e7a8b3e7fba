//! HMAC-SHA256 signing keys for consent tokens and trust links
//!
//! Every MAC is computed over `context || 0x00 || message` so that a
//! signature minted for one structure can never verify as another.

use crate::{encoding, CryptoError, Result};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Size of a signing key in bytes
pub const SIGNING_KEY_SIZE: usize = 32;

/// Size of a signature in bytes
pub const SIGNATURE_SIZE: usize = 32;

/// A detached signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// Parse from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::Decoding(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; SIGNATURE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Parse from unpadded base64url
    pub fn from_base64url(s: &str) -> Result<Self> {
        Self::from_bytes(&encoding::from_base64url("signature", s)?)
    }

    /// Encode as unpadded base64url
    pub fn to_base64url(&self) -> String {
        encoding::to_base64url(&self.0)
    }

    /// Get the signature bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

/// Secret key held by the authority that mints tokens or links
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    key: [u8; SIGNING_KEY_SIZE],
}

impl SigningKey {
    /// Generate a random signing key
    pub fn generate() -> Self {
        let mut key = [0u8; SIGNING_KEY_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut key);
        Self { key }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNING_KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "signing key must be {} bytes, got {}",
                SIGNING_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; SIGNING_KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Parse from hex (configuration form)
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("signing key is not valid hex: {}", e)))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    fn mac(&self, context: &str, message: &[u8]) -> Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        mac.update(context.as_bytes());
        mac.update(&[0u8]);
        mac.update(message);
        Ok(mac)
    }

    /// Sign a message under a context label
    pub fn sign(&self, context: &str, message: &[u8]) -> Result<Signature> {
        let tag = self.mac(context, message)?.finalize().into_bytes();
        Signature::from_bytes(&tag)
    }

    /// Verify a signature in constant time
    pub fn verify(&self, context: &str, message: &[u8], signature: &Signature) -> Result<()> {
        self.mac(context, message)?
            .verify_slice(signature.as_bytes())
            .map_err(|_| CryptoError::SignatureVerification)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let key = SigningKey::generate();
        let sig = key.sign("consent-token-v1", b"payload").unwrap();
        assert!(key.verify("consent-token-v1", b"payload", &sig).is_ok());
    }

    #[test]
    fn test_context_separation() {
        let key = SigningKey::generate();
        let sig = key.sign("consent-token-v1", b"payload").unwrap();
        assert!(matches!(
            key.verify("trust-link-v1", b"payload", &sig),
            Err(CryptoError::SignatureVerification)
        ));
    }

    #[test]
    fn test_wrong_key_or_message() {
        let key = SigningKey::generate();
        let other = SigningKey::generate();
        let sig = key.sign("ctx", b"payload").unwrap();
        assert!(other.verify("ctx", b"payload", &sig).is_err());
        assert!(key.verify("ctx", b"payload!", &sig).is_err());
    }

    #[test]
    fn test_signature_base64url_roundtrip() {
        let key = SigningKey::from_hex(&"11".repeat(32)).unwrap();
        let sig = key.sign("ctx", b"m").unwrap();
        let parsed = Signature::from_base64url(&sig.to_base64url()).unwrap();
        assert_eq!(sig, parsed);
        assert!(Signature::from_base64url("AAAA").is_err());
    }
}
