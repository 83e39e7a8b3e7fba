//! Canonical JSON call schema for the platform bridge
//!
//! UI layers call the bridge as `call(method, args)` with camelCase JSON.
//! Older callers used other argument names (`key` for `keyHex`, snake_case
//! fields, `encrypted` for `payload`); those names are accepted here while
//! parsing and nowhere else.
//!
//! `setupVault` and `unlockVault` leave the vault unlocked in the bridge until
//! `lockVault`. While unlocked, `encryptData` and `decryptData` accept a
//! `userId` in place of `keyHex` and use the held key.

use super::PlatformBridge;
use crate::{ClientError, Result, VaultRecord};
use byok_core::api::StoreAttributeRequest;
use byok_crypto::{keys::DEFAULT_ITERATIONS, EncryptedPayload};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveKeyArgs {
    pub passphrase: String,
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptDataArgs {
    #[serde(default, alias = "key", alias = "key_hex")]
    pub key_hex: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(alias = "data", alias = "text")]
    pub plaintext: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptDataArgs {
    #[serde(default, alias = "key", alias = "key_hex")]
    pub key_hex: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(alias = "encrypted", alias = "encryptedData")]
    pub payload: EncryptedPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserArgs {
    #[serde(alias = "user_id")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassphraseArgs {
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(alias = "password")]
    pub passphrase: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAttributesArgs {
    #[serde(alias = "consent_token", alias = "token")]
    pub consent_token: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// One bridge call
#[derive(Debug, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum BridgeCall {
    DeriveKey(DeriveKeyArgs),
    #[serde(alias = "encrypt")]
    EncryptData(EncryptDataArgs),
    #[serde(alias = "decrypt")]
    DecryptData(DecryptDataArgs),
    HasVault(UserArgs),
    GetVault(UserArgs),
    SetupVault(PassphraseArgs),
    UnlockVault(PassphraseArgs),
    LockVault(UserArgs),
    IsUnlocked(UserArgs),
    StoreAttribute(StoreAttributeRequest),
    GetAttributes(GetAttributesArgs),
}

impl BridgeCall {
    /// Parse a call from its method name and JSON arguments
    pub fn parse(method: &str, args: Value) -> Result<Self> {
        serde_json::from_value(json!({ "method": method, "args": args }))
            .map_err(|e| ClientError::InvalidArgument(format!("{}: {}", method, e)))
    }
}

/// Where `encryptData` / `decryptData` take their key from
enum KeySource {
    Hex(String),
    Held(String),
}

impl KeySource {
    fn pick(method: &str, key_hex: Option<String>, user_id: Option<String>) -> Result<Self> {
        match (key_hex, user_id) {
            (Some(key_hex), _) => Ok(Self::Hex(key_hex)),
            (None, Some(user_id)) => Ok(Self::Held(user_id)),
            (None, None) => Err(ClientError::InvalidArgument(format!("{}: keyHex or userId required", method))),
        }
    }
}

/// Result of `setupVault` / `unlockVault` / `lockVault`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VaultOpened<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    vault: Option<&'a VaultRecord>,
    unlocked: bool,
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

impl PlatformBridge {
    /// Dispatch a call through the canonical schema
    #[instrument(skip(self, args))]
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        match BridgeCall::parse(method, args)? {
            BridgeCall::DeriveKey(a) => {
                to_value(&self.derive_key(&a.passphrase, a.salt.as_deref(), a.iterations).await?)
            }
            BridgeCall::EncryptData(a) => {
                let payload = match KeySource::pick(method, a.key_hex, a.user_id)? {
                    KeySource::Hex(key_hex) => self.encrypt_data(&key_hex, &a.plaintext)?,
                    KeySource::Held(user_id) => self.encrypt_for(&user_id, &a.plaintext)?,
                };
                to_value(&payload)
            }
            BridgeCall::DecryptData(a) => {
                let plaintext = match KeySource::pick(method, a.key_hex, a.user_id)? {
                    KeySource::Hex(key_hex) => self.decrypt_data(&key_hex, &a.payload)?,
                    KeySource::Held(user_id) => self.decrypt_for(&user_id, &a.payload)?,
                };
                Ok(Value::String(plaintext))
            }
            BridgeCall::HasVault(a) => Ok(Value::Bool(self.has_vault(&a.user_id).await?)),
            BridgeCall::GetVault(a) => to_value(&self.get_vault(&a.user_id).await?),
            BridgeCall::SetupVault(a) => {
                let session = self.setup_vault(&a.user_id, &a.passphrase).await?;
                self.hold_session(session);
                let record = self.get_vault(&a.user_id).await?;
                to_value(&VaultOpened {
                    vault: Some(&record),
                    unlocked: true,
                })
            }
            BridgeCall::UnlockVault(a) => {
                let session = self.unlock_vault(&a.user_id, &a.passphrase).await?;
                self.hold_session(session);
                to_value(&VaultOpened {
                    vault: None,
                    unlocked: true,
                })
            }
            BridgeCall::LockVault(a) => {
                self.backend()?;
                self.lock_vault(&a.user_id);
                to_value(&VaultOpened {
                    vault: None,
                    unlocked: false,
                })
            }
            BridgeCall::IsUnlocked(a) => {
                self.backend()?;
                Ok(Value::Bool(self.is_unlocked(&a.user_id)))
            }
            BridgeCall::StoreAttribute(a) => to_value(
                &self
                    .store_attribute(&a.consent_token, &a.domain, &a.attribute_key, a.payload, a.metadata)
                    .await?,
            ),
            BridgeCall::GetAttributes(a) => {
                to_value(&self.get_attributes(&a.consent_token, a.domain.as_deref()).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{BackendRegistry, BridgeConfig, Platform};
    use rstest::rstest;

    const FIXTURE_KEY: &str = "49d49c25f597846209f0d92e7770ab64e1c75e94b4ce6c509265ee67175d2a1e";

    fn bridge() -> PlatformBridge {
        let bridge = PlatformBridge::new(BackendRegistry::with_defaults(), BridgeConfig::default());
        bridge.resolve(Platform::Web).unwrap();
        bridge
    }

    #[rstest]
    #[case(json!({"keyHex": FIXTURE_KEY, "plaintext": "hello vault"}))]
    #[case(json!({"key": FIXTURE_KEY, "plaintext": "hello vault"}))]
    #[case(json!({"key_hex": FIXTURE_KEY, "data": "hello vault"}))]
    fn test_encrypt_accepts_legacy_names(#[case] args: Value) {
        assert!(matches!(
            BridgeCall::parse("encryptData", args),
            Ok(BridgeCall::EncryptData(EncryptDataArgs { .. }))
        ));
    }

    #[test]
    fn test_unknown_method_and_missing_args() {
        assert!(matches!(
            BridgeCall::parse("formatDisk", json!({})),
            Err(ClientError::InvalidArgument(_))
        ));
        assert!(matches!(
            BridgeCall::parse("encryptData", json!({"keyHex": FIXTURE_KEY})),
            Err(ClientError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypt_needs_a_key_source() {
        let err = bridge()
            .call("encryptData", json!({"plaintext": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_call_roundtrip_through_bridge() {
        let bridge = bridge();
        let derived = bridge
            .call(
                "deriveKey",
                json!({"passphrase": "correct horse battery staple", "salt": "000102030405060708090a0b0c0d0e0f"}),
            )
            .await
            .unwrap();
        assert_eq!(derived["keyHex"], FIXTURE_KEY);

        let payload = bridge
            .call("encrypt", json!({"key": FIXTURE_KEY, "plaintext": "hello vault"}))
            .await
            .unwrap();
        let plaintext = bridge
            .call("decryptData", json!({"keyHex": FIXTURE_KEY, "encrypted": payload}))
            .await
            .unwrap();
        assert_eq!(plaintext, "hello vault");
    }

    #[tokio::test]
    async fn test_vault_calls() {
        let bridge = bridge();
        assert_eq!(bridge.call("hasVault", json!({"userId": "u1"})).await.unwrap(), false);

        let opened = bridge
            .call("setupVault", json!({"user_id": "u1", "password": "pw"}))
            .await
            .unwrap();
        assert_eq!(opened["unlocked"], true);
        assert_eq!(opened["vault"]["userId"], "u1");

        assert_eq!(bridge.call("hasVault", json!({"userId": "u1"})).await.unwrap(), true);
        let err = bridge
            .call("unlockVault", json!({"userId": "u1", "passphrase": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Crypto(_)));
        assert!(bridge.call("getVault", json!({"userId": "u2"})).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unlocked_vault_holds_key_until_locked() {
        let bridge = bridge();
        bridge
            .call("setupVault", json!({"userId": "u1", "passphrase": "pw"}))
            .await
            .unwrap();
        bridge.call("lockVault", json!({"userId": "u1"})).await.unwrap();
        assert_eq!(bridge.call("isUnlocked", json!({"userId": "u1"})).await.unwrap(), false);

        let opened = bridge
            .call("unlockVault", json!({"userId": "u1", "passphrase": "pw"}))
            .await
            .unwrap();
        assert_eq!(opened["unlocked"], true);
        assert_eq!(bridge.call("isUnlocked", json!({"userId": "u1"})).await.unwrap(), true);

        let payload = bridge
            .call("encryptData", json!({"userId": "u1", "plaintext": "hello vault"}))
            .await
            .unwrap();
        let plaintext = bridge
            .call("decryptData", json!({"user_id": "u1", "payload": payload.clone()}))
            .await
            .unwrap();
        assert_eq!(plaintext, "hello vault");

        let locked = bridge.call("lockVault", json!({"userId": "u1"})).await.unwrap();
        assert_eq!(locked["unlocked"], false);
        let err = bridge
            .call("decryptData", json!({"userId": "u1", "payload": payload}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::VaultLocked), "{:?}", err);
    }

    #[tokio::test]
    async fn test_call_on_unresolved_bridge() {
        let bridge = PlatformBridge::new(BackendRegistry::with_defaults(), BridgeConfig::default());
        let err = bridge
            .call("encryptData", json!({"keyHex": FIXTURE_KEY, "plaintext": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
