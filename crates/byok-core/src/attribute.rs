//! Domain-scoped encrypted attributes and the store that holds them
//!
//! The store only ever sees [`EncryptedPayload`]s. Everything it can report
//! about an attribute comes from the structural metadata kept next to the
//! ciphertext.

use crate::{scope::is_valid_segment, CoreError, Result};
use async_trait::async_trait;
use byok_crypto::EncryptedPayload;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest accepted attribute key
pub const MAX_ATTRIBUTE_KEY_LEN: usize = 128;

fn default_source() -> String {
    "user".to_string()
}

fn default_data_type() -> String {
    "string".to_string()
}

/// Descriptive metadata stored in the clear next to the ciphertext
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMetadata {
    /// Where the value came from ("user", "import", "inferred", ...)
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default = "default_data_type")]
    pub data_type: String,
}

impl Default for AttributeMetadata {
    fn default() -> Self {
        Self {
            source: default_source(),
            confidence: None,
            display_name: None,
            data_type: default_data_type(),
        }
    }
}

impl AttributeMetadata {
    pub fn validate(&self) -> Result<()> {
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(CoreError::InvalidRequest(format!(
                    "confidence must be within [0, 1], got {}",
                    c
                )));
            }
        }
        if self.source.is_empty() || self.data_type.is_empty() {
            return Err(CoreError::InvalidRequest(
                "source and dataType must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One encrypted attribute of a user's world model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldModelAttribute {
    pub domain: String,
    pub attribute_key: String,
    pub payload: EncryptedPayload,
    #[serde(flatten)]
    pub metadata: AttributeMetadata,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Check a domain name (one scope segment)
pub fn validate_domain(domain: &str) -> Result<()> {
    if is_valid_segment(domain) {
        Ok(())
    } else {
        Err(CoreError::InvalidRequest(format!("invalid domain '{}'", domain)))
    }
}

/// Check an attribute key
pub fn validate_attribute_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_ATTRIBUTE_KEY_LEN {
        return Err(CoreError::InvalidRequest(format!(
            "attribute key must be 1..={} characters",
            MAX_ATTRIBUTE_KEY_LEN
        )));
    }
    if key.chars().any(|c| c.is_control() || c == '/') {
        return Err(CoreError::InvalidRequest(format!("invalid attribute key '{}'", key)));
    }
    Ok(())
}

/// Persistence for encrypted attributes, keyed by `(user, domain, key)`
#[async_trait]
pub trait AttributeRepository: Send + Sync {
    /// Insert or overwrite; `created_at` of an existing row is kept
    async fn upsert(&self, user_id: &str, attribute: WorldModelAttribute) -> Result<()>;

    /// All attributes of a user, optionally restricted to one domain
    async fn list(&self, user_id: &str, domain: Option<&str>) -> Result<Vec<WorldModelAttribute>>;

    /// Remove one attribute, returning whether it existed
    async fn remove(&self, user_id: &str, domain: &str, attribute_key: &str) -> Result<bool>;
}

type AttributeKey = (String, String);

/// In-memory attribute store
#[derive(Debug, Default)]
pub struct MemoryAttributeRepository {
    users: DashMap<String, BTreeMap<AttributeKey, WorldModelAttribute>>,
}

impl MemoryAttributeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttributeRepository for MemoryAttributeRepository {
    async fn upsert(&self, user_id: &str, mut attribute: WorldModelAttribute) -> Result<()> {
        let mut rows = self.users.entry(user_id.to_string()).or_default();
        let key = (attribute.domain.clone(), attribute.attribute_key.clone());
        if let Some(existing) = rows.get(&key) {
            attribute.created_at = existing.created_at;
        }
        rows.insert(key, attribute);
        Ok(())
    }

    async fn list(&self, user_id: &str, domain: Option<&str>) -> Result<Vec<WorldModelAttribute>> {
        let Some(rows) = self.users.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .values()
            .filter(|a| domain.map_or(true, |d| a.domain == d))
            .cloned()
            .collect())
    }

    async fn remove(&self, user_id: &str, domain: &str, attribute_key: &str) -> Result<bool> {
        let Some(mut rows) = self.users.get_mut(user_id) else {
            return Ok(false);
        };
        Ok(rows
            .remove(&(domain.to_string(), attribute_key.to_string()))
            .is_some())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byok_crypto::{symmetric, VaultKey};
    use rstest::rstest;

    pub(crate) fn attribute(domain: &str, key: &str, at: i64) -> WorldModelAttribute {
        let payload = symmetric::encrypt(&VaultKey::generate(), key.as_bytes()).unwrap();
        WorldModelAttribute {
            domain: domain.to_string(),
            attribute_key: key.to_string(),
            payload,
            metadata: AttributeMetadata::default(),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_keeps_created_at() {
        let repo = MemoryAttributeRepository::new();
        repo.upsert("u1", attribute("finance", "income", 1)).await.unwrap();
        repo.upsert("u1", attribute("finance", "income", 5)).await.unwrap();

        let rows = repo.list("u1", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].created_at, 1);
        assert_eq!(rows[0].updated_at, 5);
    }

    #[tokio::test]
    async fn test_users_and_domains_are_isolated() {
        let repo = MemoryAttributeRepository::new();
        repo.upsert("u1", attribute("finance", "income", 1)).await.unwrap();
        repo.upsert("u1", attribute("food", "diet", 1)).await.unwrap();
        repo.upsert("u2", attribute("finance", "income", 1)).await.unwrap();

        let food = repo.list("u1", Some("food")).await.unwrap();
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].attribute_key, "diet");

        assert!(repo.remove("u1", "finance", "income").await.unwrap());
        assert!(!repo.remove("u1", "finance", "income").await.unwrap());
        assert_eq!(repo.list("u2", None).await.unwrap().len(), 1);
        assert!(repo.list("nobody", None).await.unwrap().is_empty());
    }

    #[rstest]
    #[case("income", true)]
    #[case("risk tolerance", true)]
    #[case("", false)]
    #[case("a/b", false)]
    #[case("tab\there", false)]
    fn test_attribute_key_validation(#[case] key: &str, #[case] ok: bool) {
        assert_eq!(validate_attribute_key(key).is_ok(), ok);
    }

    #[test]
    fn test_wire_shape() {
        let attr = attribute("finance", "income", 42);
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["attributeKey"], "income");
        assert_eq!(json["source"], "user");
        assert_eq!(json["dataType"], "string");
        assert!(json["payload"]["ciphertext"].is_string());
        assert!(json.get("confidence").is_none());

        let parsed: WorldModelAttribute = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, attr);
    }

    #[test]
    fn test_metadata_validation() {
        let mut meta = AttributeMetadata::default();
        assert!(meta.validate().is_ok());
        meta.confidence = Some(1.5);
        assert!(meta.validate().is_err());
    }
}
