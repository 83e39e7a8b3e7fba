//! Platform bridge
//!
//! One logical vault interface with exactly one backing implementation per
//! process. Backends register a factory in a [`BackendRegistry`]; the bridge
//! resolves a single platform once and keeps it for the rest of the process.
//!
//! ```text
//! Unresolved ──resolve(native)──▶ Resolved(native)
//!      └──────resolve(web)─────▶ Resolved(web)
//! ```
//!
//! Every operation on an unresolved bridge fails with
//! [`ClientError::Configuration`], never with an operation error.

pub mod native;
pub mod schema;
pub mod web;

use crate::{ClientError, Result, VaultClient, VaultRecord, VaultSession};
use async_trait::async_trait;
use byok_core::{AttributeMetadata, StoreAttributeResult, WorldModelAttribute};
use byok_crypto::{keys, symmetric, DerivedKeyHex, EncryptedPayload};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

/// Environment variable overriding platform detection
pub const PLATFORM_ENV: &str = "BYOK_PLATFORM";

/// Execution environment of the vault
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Native,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Web => "web",
        }
    }

    /// Detect the platform from the build target and `BYOK_PLATFORM`
    pub fn detect() -> Result<Self> {
        match std::env::var(PLATFORM_ENV) {
            Ok(value) => value.parse(),
            Err(_) if cfg!(target_arch = "wasm32") => Ok(Self::Web),
            Err(_) => Ok(Self::Native),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "web" | "browser" => Ok(Self::Web),
            other => Err(ClientError::Configuration(format!("unknown platform '{}'", other))),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable storage for vault records, one per platform
#[async_trait]
pub trait VaultBackend: Send + Sync {
    fn platform(&self) -> Platform;

    async fn load_record(&self, user_id: &str) -> Result<Option<VaultRecord>>;

    async fn save_record(&self, record: &VaultRecord) -> Result<()>;

    /// Store a record only if the user has none yet; `VaultExists` otherwise.
    /// The check and the write are one atomic step.
    async fn create_record(&self, record: &VaultRecord) -> Result<()>;

    async fn delete_record(&self, user_id: &str) -> Result<bool>;
}

/// Settings handed to backend factories
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Directory for native vault records
    pub data_dir: PathBuf,
    /// PBKDF2 iterations for new vaults
    pub iterations: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".byok-vault"),
            iterations: keys::DEFAULT_ITERATIONS,
        }
    }
}

/// Builds the backend for one platform
pub type BackendFactory = Box<dyn Fn(&BridgeConfig) -> Result<Arc<dyn VaultBackend>> + Send + Sync>;

/// Table of available backend implementations
#[derive(Default)]
pub struct BackendRegistry {
    factories: HashMap<Platform, BackendFactory>,
}

impl BackendRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in native and web backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            Platform::Native,
            Box::new(|config: &BridgeConfig| {
                Ok(Arc::new(native::NativeBackend::new(&config.data_dir)) as Arc<dyn VaultBackend>)
            }),
        );
        registry.register(
            Platform::Web,
            Box::new(|_: &BridgeConfig| Ok(Arc::new(web::WebBackend::new()) as Arc<dyn VaultBackend>)),
        );
        registry
    }

    /// Register (or replace) the factory for a platform
    pub fn register(&mut self, platform: Platform, factory: BackendFactory) {
        self.factories.insert(platform, factory);
    }

    pub fn is_registered(&self, platform: Platform) -> bool {
        self.factories.contains_key(&platform)
    }
}

/// Lifecycle state of a bridge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Unresolved,
    Resolved(Platform),
}

/// The single entry point UI code calls into
pub struct PlatformBridge {
    registry: RwLock<BackendRegistry>,
    config: BridgeConfig,
    backend: OnceLock<Arc<dyn VaultBackend>>,
    client: Option<VaultClient>,
    /// Vaults unlocked through `call`, by user id
    sessions: RwLock<HashMap<String, VaultSession>>,
}

impl PlatformBridge {
    pub fn new(registry: BackendRegistry, config: BridgeConfig) -> Self {
        Self {
            registry: RwLock::new(registry),
            config,
            backend: OnceLock::new(),
            client: None,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Attach the attribute service client
    pub fn with_client(mut self, client: VaultClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Register a backend before resolution
    pub fn register(&self, platform: Platform, factory: BackendFactory) -> Result<()> {
        if let Some(backend) = self.backend.get() {
            return Err(ClientError::Configuration(format!(
                "bridge already resolved to {}",
                backend.platform()
            )));
        }
        self.registry.write().register(platform, factory);
        Ok(())
    }

    pub fn state(&self) -> BridgeState {
        match self.backend.get() {
            Some(backend) => BridgeState::Resolved(backend.platform()),
            None => BridgeState::Unresolved,
        }
    }

    /// Resolve the bridge to `platform`.
    ///
    /// Resolving again to the same platform is a no-op; any other platform
    /// is rejected.
    #[instrument(skip(self))]
    pub fn resolve(&self, platform: Platform) -> Result<Platform> {
        if let Some(backend) = self.backend.get() {
            return Self::check_same(backend, platform);
        }

        let registry = self.registry.read();
        let factory = registry.factories.get(&platform).ok_or_else(|| {
            ClientError::Configuration(format!("no backend registered for platform {}", platform))
        })?;
        let created = factory(&self.config)?;
        drop(registry);

        let backend = self.backend.get_or_init(|| created);
        let resolved = Self::check_same(backend, platform)?;
        info!(platform = %resolved, "platform bridge resolved");
        Ok(resolved)
    }

    /// Resolve to the detected platform
    pub fn resolve_default(&self) -> Result<Platform> {
        self.resolve(Platform::detect()?)
    }

    fn check_same(backend: &Arc<dyn VaultBackend>, platform: Platform) -> Result<Platform> {
        if backend.platform() == platform {
            Ok(platform)
        } else {
            Err(ClientError::Configuration(format!(
                "bridge already resolved to {}, cannot switch to {}",
                backend.platform(),
                platform
            )))
        }
    }

    fn backend(&self) -> Result<&Arc<dyn VaultBackend>> {
        self.backend
            .get()
            .ok_or_else(|| ClientError::Configuration("platform bridge is unresolved".to_string()))
    }

    fn client(&self) -> Result<&VaultClient> {
        self.backend()?;
        self.client
            .as_ref()
            .ok_or_else(|| ClientError::Configuration("no attribute service configured".to_string()))
    }

    // ==================== Crypto ====================

    /// PBKDF2 key derivation; `salt_hex` is generated when absent
    #[instrument(skip(self, passphrase))]
    pub async fn derive_key(&self, passphrase: &str, salt_hex: Option<&str>, iterations: u32) -> Result<DerivedKeyHex> {
        self.backend()?;
        let passphrase = Zeroizing::new(passphrase.to_string());
        let salt_hex = salt_hex.map(str::to_string);
        let derived = tokio::task::spawn_blocking(move || {
            keys::derive_key_hex(&passphrase, salt_hex.as_deref(), iterations)
        })
        .await
        .map_err(|e| ClientError::Configuration(format!("key derivation task failed: {}", e)))??;
        Ok(derived)
    }

    /// Encrypt UTF-8 text under a hex key
    pub fn encrypt_data(&self, key_hex: &str, plaintext: &str) -> Result<EncryptedPayload> {
        self.backend()?;
        Ok(symmetric::encrypt_data(key_hex, plaintext.as_bytes())?)
    }

    /// Decrypt a payload to UTF-8 text
    pub fn decrypt_data(&self, key_hex: &str, payload: &EncryptedPayload) -> Result<String> {
        self.backend()?;
        let plaintext = symmetric::decrypt_data(key_hex, payload)?;
        String::from_utf8(plaintext)
            .map_err(|_| ClientError::Crypto(byok_crypto::CryptoError::Decoding("plaintext is not UTF-8".to_string())))
    }

    // ==================== Vault records ====================

    pub async fn has_vault(&self, user_id: &str) -> Result<bool> {
        Ok(self.backend()?.load_record(user_id).await?.is_some())
    }

    /// The stored record; `NotFound` when the user has no vault
    pub async fn get_vault(&self, user_id: &str) -> Result<VaultRecord> {
        self.backend()?
            .load_record(user_id)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("no vault for {}", user_id)))
    }

    /// Create a vault and return it unlocked
    #[instrument(skip(self, passphrase))]
    pub async fn setup_vault(&self, user_id: &str, passphrase: &str) -> Result<VaultSession> {
        let backend = self.backend()?;
        if backend.load_record(user_id).await?.is_some() {
            return Err(ClientError::VaultExists(user_id.to_string()));
        }

        let owned_user = user_id.to_string();
        let passphrase = Zeroizing::new(passphrase.to_string());
        let iterations = self.config.iterations;
        let (record, key) = tokio::task::spawn_blocking(move || {
            VaultRecord::create_with_iterations(&owned_user, &passphrase, iterations)
        })
        .await
        .map_err(|e| ClientError::Configuration(format!("vault setup task failed: {}", e)))??;

        backend.create_record(&record).await?;
        debug!("vault created");
        Ok(VaultSession::new(user_id, key))
    }

    /// Unlock an existing vault
    #[instrument(skip(self, passphrase))]
    pub async fn unlock_vault(&self, user_id: &str, passphrase: &str) -> Result<VaultSession> {
        let record = self.get_vault(user_id).await?;
        let passphrase = Zeroizing::new(passphrase.to_string());
        let key = tokio::task::spawn_blocking(move || record.unlock(&passphrase))
            .await
            .map_err(|e| ClientError::Configuration(format!("vault unlock task failed: {}", e)))??;
        Ok(VaultSession::new(user_id, key))
    }

    /// Remove the stored record, locking any held session first
    pub async fn delete_vault(&self, user_id: &str) -> Result<bool> {
        let backend = self.backend()?;
        self.lock_vault(user_id);
        backend.delete_record(user_id).await
    }

    // ==================== Held sessions ====================

    /// Keep `session` unlocked in the bridge, replacing any earlier one
    pub fn hold_session(&self, session: VaultSession) {
        let user_id = session.user_id().to_string();
        if let Some(mut previous) = self.sessions.write().insert(user_id, session) {
            previous.lock();
        }
    }

    /// Whether the bridge holds an unlocked session for `user_id`
    pub fn is_unlocked(&self, user_id: &str) -> bool {
        self.sessions
            .read()
            .get(user_id)
            .is_some_and(VaultSession::is_unlocked)
    }

    /// Drop and zeroize the held key. Returns whether one was held.
    #[instrument(skip(self))]
    pub fn lock_vault(&self, user_id: &str) -> bool {
        match self.sessions.write().remove(user_id) {
            Some(mut session) => {
                session.lock();
                true
            }
            None => false,
        }
    }

    /// Encrypt UTF-8 text under the held key of `user_id`
    pub fn encrypt_for(&self, user_id: &str, plaintext: &str) -> Result<EncryptedPayload> {
        self.backend()?;
        let sessions = self.sessions.read();
        let session = sessions.get(user_id).ok_or(ClientError::VaultLocked)?;
        session.encrypt_bytes(plaintext.as_bytes())
    }

    /// Decrypt to UTF-8 text under the held key of `user_id`
    pub fn decrypt_for(&self, user_id: &str, payload: &EncryptedPayload) -> Result<String> {
        self.backend()?;
        let plaintext = {
            let sessions = self.sessions.read();
            let session = sessions.get(user_id).ok_or(ClientError::VaultLocked)?;
            session.decrypt_bytes(payload)?
        };
        String::from_utf8(plaintext)
            .map_err(|_| ClientError::Crypto(byok_crypto::CryptoError::Decoding("plaintext is not UTF-8".to_string())))
    }

    // ==================== Attributes ====================

    pub async fn store_attribute(
        &self,
        consent_token: &str,
        domain: &str,
        attribute_key: &str,
        payload: EncryptedPayload,
        metadata: AttributeMetadata,
    ) -> Result<StoreAttributeResult> {
        self.client()?
            .store_attribute(consent_token, domain, attribute_key, payload, metadata)
            .await
    }

    pub async fn get_attributes(&self, consent_token: &str, domain: Option<&str>) -> Result<Vec<WorldModelAttribute>> {
        self.client()?.get_attributes(consent_token, domain).await
    }
}

static GLOBAL_BRIDGE: OnceLock<PlatformBridge> = OnceLock::new();

/// Install the process-wide bridge. Only the first call succeeds.
pub fn install(bridge: PlatformBridge) -> Result<&'static PlatformBridge> {
    GLOBAL_BRIDGE
        .set(bridge)
        .map_err(|_| ClientError::Configuration("platform bridge already installed".to_string()))?;
    global()
}

/// The process-wide bridge
pub fn global() -> Result<&'static PlatformBridge> {
    GLOBAL_BRIDGE
        .get()
        .ok_or_else(|| ClientError::Configuration("no platform bridge installed".to_string()))
}
