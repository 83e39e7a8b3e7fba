//! Application state

use crate::auth::JwtIdentityVerifier;
use crate::GatewayConfig;
use byok_core::{
    AuthorityConfig, ConsentAuthority, MemoryAttributeRepository, MemoryRevocationStore, TrustLinkAuthority,
    WorldModelService,
};
use byok_crypto::SigningKey;
use std::sync::Arc;
use tracing::warn;

/// Consent authority used by the gateway
pub type Authority = ConsentAuthority<MemoryRevocationStore>;

/// World-model service used by the gateway
pub type WorldModel = WorldModelService<MemoryAttributeRepository, MemoryRevocationStore>;

/// Application state shared across handlers
pub struct AppState {
    /// Configuration
    pub config: GatewayConfig,
    /// Issues, validates and revokes consent tokens
    pub authority: Arc<Authority>,
    /// Creates and verifies trust links
    pub trust_links: TrustLinkAuthority,
    /// Consent-gated attribute store
    pub world_model: WorldModel,
}

impl AppState {
    /// Create new application state
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("an identity JWT secret is required"))?;
        let identity = Arc::new(JwtIdentityVerifier::new(secret));

        let consent_key = signing_key(config.consent_key_hex.as_deref(), "consent")?;
        let trust_link_key = signing_key(config.trust_link_key_hex.as_deref(), "trust link")?;

        let authority = Arc::new(
            ConsentAuthority::new(consent_key, identity, Arc::new(MemoryRevocationStore::new())).with_config(
                AuthorityConfig {
                    default_ttl: config.default_token_ttl(),
                    max_ttl: config.max_token_ttl(),
                },
            ),
        );
        let trust_links = TrustLinkAuthority::new(trust_link_key).with_max_ttl(config.max_trust_link_ttl());
        let world_model = WorldModelService::new(Arc::clone(&authority), Arc::new(MemoryAttributeRepository::new()))
            .with_expected_domains(config.expected_domains.clone());

        Ok(Self {
            config,
            authority,
            trust_links,
            world_model,
        })
    }
}

fn signing_key(key_hex: Option<&str>, purpose: &str) -> anyhow::Result<SigningKey> {
    match key_hex {
        Some(hex) => SigningKey::from_hex(hex).map_err(|e| anyhow::anyhow!("invalid {} signing key: {}", purpose, e)),
        None => {
            warn!("no {} signing key configured; generated one for this process only", purpose);
            Ok(SigningKey::generate())
        }
    }
}

/// Hash a subject id for logging
pub fn hash_subject(subject_id: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"byok:subject:");
    hasher.update(subject_id.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash.as_bytes()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_subject() {
        let hash = hash_subject("alice");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, hash_subject("alice"));
        assert_ne!(hash, hash_subject("bob"));
    }

    #[test]
    fn test_state_requires_jwt_secret() {
        assert!(AppState::new(GatewayConfig::default()).is_err());
    }

    #[test]
    fn test_state_rejects_bad_signing_key() {
        let config = GatewayConfig {
            jwt_secret: Some("s".into()),
            consent_key_hex: Some("not-hex".into()),
            ..Default::default()
        };
        assert!(AppState::new(config).is_err());
    }
}
