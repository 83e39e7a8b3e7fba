//! Gateway configuration

use byok_core::world_model::DEFAULT_EXPECTED_DOMAINS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway server configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// HS256 secret for identity JWTs
    pub jwt_secret: Option<String>,
    /// Consent token signing key (hex); random per process when absent
    pub consent_key_hex: Option<String>,
    /// Trust link signing key (hex); random per process when absent
    pub trust_link_key_hex: Option<String>,
    /// TTL of consent tokens issued without an explicit one (seconds)
    pub default_token_ttl_secs: u64,
    /// Longest consent token TTL a caller may request (seconds)
    pub max_token_ttl_secs: u64,
    /// Longest trust link TTL (seconds, capped at 24 hours)
    pub max_trust_link_ttl_secs: u64,
    /// Rate limit (requests per second per client)
    pub rate_limit_rps: u32,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Domains counted by the world-model completeness score
    pub expected_domains: Vec<String>,
    /// How often expired revocations are forgotten (seconds)
    pub revocation_purge_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: None,
            consent_key_hex: None,
            trust_link_key_hex: None,
            default_token_ttl_secs: 60 * 60,          // 1 hour
            max_token_ttl_secs: 30 * 24 * 60 * 60,    // 30 days
            max_trust_link_ttl_secs: 24 * 60 * 60,    // 24 hours
            rate_limit_rps: 100,
            max_body_size: 1024 * 1024, // 1 MB
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
            expected_domains: DEFAULT_EXPECTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            revocation_purge_secs: 5 * 60,
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_token_ttl(&self) -> Duration {
        Duration::from_secs(self.default_token_ttl_secs)
    }

    pub fn max_token_ttl(&self) -> Duration {
        Duration::from_secs(self.max_token_ttl_secs)
    }

    pub fn max_trust_link_ttl(&self) -> Duration {
        Duration::from_secs(self.max_trust_link_ttl_secs)
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "***"))
            .field("consent_key_hex", &self.consent_key_hex.as_ref().map(|_| "***"))
            .field("trust_link_key_hex", &self.trust_link_key_hex.as_ref().map(|_| "***"))
            .field("default_token_ttl_secs", &self.default_token_ttl_secs)
            .field("max_token_ttl_secs", &self.max_token_ttl_secs)
            .field("max_trust_link_ttl_secs", &self.max_trust_link_ttl_secs)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("max_body_size", &self.max_body_size)
            .field("cors_enabled", &self.cors_enabled)
            .field("cors_origins", &self.cors_origins)
            .field("expected_domains", &self.expected_domains)
            .field("revocation_purge_secs", &self.revocation_purge_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.max_trust_link_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.expected_domains.len(), DEFAULT_EXPECTED_DOMAINS.len());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = GatewayConfig {
            jwt_secret: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
