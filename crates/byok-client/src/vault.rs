//! Durable vault records
//!
//! A record holds everything needed to re-derive the vault key from the
//! holder's passphrase, plus a key check: a fixed plaintext sealed under the
//! key, so a wrong passphrase is detected on unlock instead of on first read.
//! The key itself is never stored.

use crate::Result;
use byok_core::time::now_ms;
use byok_crypto::{
    keys::{KdfParams, DEFAULT_ITERATIONS},
    symmetric, EncryptedPayload, VaultKey,
};
use serde::{Deserialize, Serialize};

const KEY_CHECK_PLAINTEXT: &[u8] = b"byok-vault-key-check";

/// Persisted description of a user's vault
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub user_id: String,
    /// Hex-encoded salt
    pub salt: String,
    pub iterations: u32,
    pub key_check: EncryptedPayload,
    pub created_at: i64,
}

impl VaultRecord {
    /// Create a record for a new vault, returning it with the derived key
    pub fn create(user_id: &str, passphrase: &str) -> Result<(Self, VaultKey)> {
        Self::create_with_iterations(user_id, passphrase, DEFAULT_ITERATIONS)
    }

    pub fn create_with_iterations(user_id: &str, passphrase: &str, iterations: u32) -> Result<(Self, VaultKey)> {
        let params = KdfParams {
            iterations,
            ..KdfParams::generate()
        };
        let key = params.derive(passphrase)?.into_key();
        let key_check = symmetric::encrypt(&key, KEY_CHECK_PLAINTEXT)?;

        let record = Self {
            user_id: user_id.to_string(),
            salt: params.salt_hex(),
            iterations,
            key_check,
            created_at: now_ms(),
        };
        Ok((record, key))
    }

    /// Derivation parameters stored in this record
    pub fn kdf_params(&self) -> Result<KdfParams> {
        let salt = byok_crypto::encoding::from_hex("salt", &self.salt)?;
        Ok(KdfParams {
            salt,
            iterations: self.iterations,
        })
    }

    /// Re-derive the key; a wrong passphrase fails with an authentication error
    pub fn unlock(&self, passphrase: &str) -> Result<VaultKey> {
        let key = self.kdf_params()?.derive(passphrase)?.into_key();
        let check = symmetric::decrypt(&key, &self.key_check)?;
        if check != KEY_CHECK_PLAINTEXT {
            return Err(byok_crypto::CryptoError::Authentication.into());
        }
        Ok(key)
    }
}
