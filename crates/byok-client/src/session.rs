//! An unlocked vault
//!
//! The session holds the vault key for as long as the vault is unlocked.
//! Values are encrypted here before they leave the process and decrypted here
//! after they come back; the service only ever sees ciphertext. Locking the
//! session zeroizes the key.

use crate::{ClientError, Result, VaultClient};
use byok_core::{AttributeMetadata, StoreAttributeResult, WorldModelAttribute};
use byok_crypto::{symmetric, EncryptedPayload, VaultKey};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// Attribute with its value decrypted locally
#[derive(Clone, Debug, PartialEq)]
pub struct DecryptedAttribute {
    pub domain: String,
    pub attribute_key: String,
    pub value: Value,
    pub metadata: AttributeMetadata,
    pub updated_at: i64,
}

impl DecryptedAttribute {
    /// Deserialize the value into a concrete type
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

/// Holder-side view of an unlocked vault
pub struct VaultSession {
    user_id: String,
    key: Option<VaultKey>,
}

impl VaultSession {
    pub fn new(user_id: impl Into<String>, key: VaultKey) -> Self {
        Self {
            user_id: user_id.into(),
            key: Some(key),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    /// Drop and zeroize the key. Further crypto fails with `VaultLocked`.
    pub fn lock(&mut self) {
        if self.key.take().is_some() {
            debug!("vault locked");
        }
    }

    fn key(&self) -> Result<&VaultKey> {
        self.key.as_ref().ok_or(ClientError::VaultLocked)
    }

    /// Encrypt raw bytes under the vault key
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        Ok(symmetric::encrypt(self.key()?, plaintext)?)
    }

    pub fn decrypt_bytes(&self, payload: &EncryptedPayload) -> Result<Vec<u8>> {
        Ok(symmetric::decrypt(self.key()?, payload)?)
    }

    /// Encrypt a JSON-serializable value
    pub fn encrypt_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<EncryptedPayload> {
        let key = self.key()?;
        let plaintext =
            zeroize::Zeroizing::new(serde_json::to_vec(value).map_err(|e| ClientError::InvalidArgument(e.to_string()))?);
        Ok(symmetric::encrypt(key, &plaintext)?)
    }

    /// Decrypt a payload produced by [`encrypt_value`](Self::encrypt_value)
    pub fn decrypt_value(&self, payload: &EncryptedPayload) -> Result<Value> {
        let key = self.key()?;
        let plaintext = zeroize::Zeroizing::new(symmetric::decrypt(key, payload)?);
        serde_json::from_slice(&plaintext).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Decrypt one attribute fetched from the service
    pub fn decrypt_attribute(&self, attribute: WorldModelAttribute) -> Result<DecryptedAttribute> {
        let value = self.decrypt_value(&attribute.payload)?;
        Ok(DecryptedAttribute {
            domain: attribute.domain,
            attribute_key: attribute.attribute_key,
            value,
            metadata: attribute.metadata,
            updated_at: attribute.updated_at,
        })
    }

    /// Encrypt `value` locally and store it
    #[instrument(skip(self, client, consent_token, value, metadata), fields(user = %self.user_id))]
    pub async fn store_value<T: Serialize + ?Sized>(
        &self,
        client: &VaultClient,
        consent_token: &str,
        domain: &str,
        attribute_key: &str,
        value: &T,
        metadata: AttributeMetadata,
    ) -> Result<StoreAttributeResult> {
        let payload = self.encrypt_value(value)?;
        client
            .store_attribute(consent_token, domain, attribute_key, payload, metadata)
            .await
    }

    /// Fetch attributes and decrypt them locally.
    ///
    /// Any payload that fails to decrypt fails the whole call.
    #[instrument(skip(self, client, consent_token), fields(user = %self.user_id))]
    pub async fn get_decrypted(
        &self,
        client: &VaultClient,
        consent_token: &str,
        domain: Option<&str>,
    ) -> Result<Vec<DecryptedAttribute>> {
        self.key()?;
        client
            .get_attributes(consent_token, domain)
            .await?
            .into_iter()
            .map(|a| self.decrypt_attribute(a))
            .collect()
    }
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("user_id", &self.user_id)
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byok_crypto::CryptoError;
    use serde_json::json;

    #[test]
    fn test_value_roundtrip_and_lock() {
        let mut session = VaultSession::new("u1", VaultKey::generate());
        let payload = session.encrypt_value(&json!({"income": 85000})).unwrap();
        assert_eq!(session.decrypt_value(&payload).unwrap()["income"], 85000);

        session.lock();
        assert!(!session.is_unlocked());
        assert!(matches!(session.decrypt_value(&payload), Err(ClientError::VaultLocked)));
        assert!(matches!(session.encrypt_value("x"), Err(ClientError::VaultLocked)));
    }

    #[test]
    fn test_foreign_payload_fails_authentication() {
        let session = VaultSession::new("u1", VaultKey::generate());
        let other = VaultSession::new("u1", VaultKey::generate());
        let payload = other.encrypt_value("secret").unwrap();
        assert!(matches!(
            session.decrypt_value(&payload),
            Err(ClientError::Crypto(CryptoError::Authentication))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let session = VaultSession::new("u1", VaultKey::generate());
        assert_eq!(format!("{:?}", session), "VaultSession { user_id: \"u1\", unlocked: true }");
    }
}
