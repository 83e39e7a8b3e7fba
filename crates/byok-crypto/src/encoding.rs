//! Base64 and hex helpers shared by the wire formats

use crate::{CryptoError, Result};
use base64::Engine;

/// Encode bytes as standard (padded) base64
pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode standard base64, reporting the field that failed
pub fn from_base64(field: &str, s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| CryptoError::Decoding(format!("{field} is not valid base64: {e}")))
}

/// Encode bytes as unpadded base64url (for tokens and links)
pub fn to_base64url(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded base64url
pub fn from_base64url(field: &str, s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| CryptoError::Decoding(format!("{field} is not valid base64url: {e}")))
}

/// Decode a hex string
pub fn from_hex(field: &str, s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| CryptoError::Decoding(format!("{field} is not valid hex: {e}")))
}

/// Serde adapter storing bytes as a lowercase hex string
pub mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
