//! Consent-gated access to a user's encrypted world model

use crate::{
    attribute::{validate_attribute_key, validate_domain, AttributeMetadata, AttributeRepository, WorldModelAttribute},
    consent::{ConsentAuthority, RevocationStore, VerifiedConsent},
    scope::{ConsentScope, ScopeAction},
    time::now_ms,
    CoreError, Result,
};
use byok_crypto::EncryptedPayload;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Domains a complete world model is expected to cover
pub const DEFAULT_EXPECTED_DOMAINS: [&str; 6] =
    ["finance", "food", "health", "travel", "shopping", "preferences"];

/// Result of a successful store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAttributeResult {
    pub success: bool,
    /// Scope the write was authorized under
    pub scope: String,
}

/// Result of a successful delete
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAttributeResult {
    pub success: bool,
}

/// Structural summary of one domain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSummary {
    pub domain: String,
    pub attribute_count: usize,
    pub data_types: Vec<String>,
    pub sources: Vec<String>,
    pub last_updated: i64,
}

/// Per-domain summary of a user's world model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldModelMetadata {
    pub user_id: String,
    pub domains: Vec<DomainSummary>,
    pub total_attributes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
    pub completeness_score: f64,
}

/// Lightweight index of which domains hold data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldModelIndex {
    pub user_id: String,
    pub available_domains: Vec<String>,
    pub total_attributes: usize,
    pub completeness_score: f64,
}

/// Build domain summaries from attribute metadata only
fn summarize(attributes: &[WorldModelAttribute]) -> Vec<DomainSummary> {
    let mut domains: BTreeMap<&str, (usize, BTreeSet<&str>, BTreeSet<&str>, i64)> = BTreeMap::new();
    for attr in attributes {
        let entry = domains
            .entry(attr.domain.as_str())
            .or_insert_with(|| (0, BTreeSet::new(), BTreeSet::new(), 0));
        entry.0 += 1;
        entry.1.insert(attr.metadata.data_type.as_str());
        entry.2.insert(attr.metadata.source.as_str());
        entry.3 = entry.3.max(attr.updated_at);
    }
    domains
        .into_iter()
        .map(|(domain, (count, types, sources, last))| DomainSummary {
            domain: domain.to_string(),
            attribute_count: count,
            data_types: types.into_iter().map(str::to_string).collect(),
            sources: sources.into_iter().map(str::to_string).collect(),
            last_updated: last,
        })
        .collect()
}

/// Applies consent checks in front of an [`AttributeRepository`]
pub struct WorldModelService<A: AttributeRepository, R: RevocationStore> {
    authority: Arc<ConsentAuthority<R>>,
    repository: Arc<A>,
    expected_domains: Vec<String>,
}

impl<A: AttributeRepository, R: RevocationStore> WorldModelService<A, R> {
    pub fn new(authority: Arc<ConsentAuthority<R>>, repository: Arc<A>) -> Self {
        Self {
            authority,
            repository,
            expected_domains: DEFAULT_EXPECTED_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Domains counted by the completeness score
    pub fn with_expected_domains(mut self, domains: Vec<String>) -> Self {
        self.expected_domains = domains;
        self
    }

    pub fn authority(&self) -> &Arc<ConsentAuthority<R>> {
        &self.authority
    }

    /// Store (or overwrite) one encrypted attribute.
    ///
    /// Requires `domain.<domain>.write`. The payload must already be
    /// encrypted; only its structure is checked here.
    #[instrument(skip(self, token, payload, metadata))]
    pub async fn store_attribute(
        &self,
        token: &str,
        domain: &str,
        attribute_key: &str,
        payload: EncryptedPayload,
        metadata: AttributeMetadata,
    ) -> Result<StoreAttributeResult> {
        let required = ConsentScope::domain(domain, ScopeAction::Write)?;
        let consent = self.authority.authorize(token, &required).await?;

        validate_attribute_key(attribute_key)?;
        metadata.validate()?;
        payload.validate()?;

        let now = now_ms();
        self.repository
            .upsert(
                consent.subject_id(),
                WorldModelAttribute {
                    domain: domain.to_string(),
                    attribute_key: attribute_key.to_string(),
                    payload,
                    metadata,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await?;

        debug!(token_id = consent.token_id(), "stored attribute");
        Ok(StoreAttributeResult {
            success: true,
            scope: required.to_string(),
        })
    }

    /// Read encrypted attributes.
    ///
    /// With a domain, requires `domain.<domain>.read`. Without one, returns
    /// the attributes of every domain the token can read; if the user has
    /// data but none of it is readable, fails with `ScopeMismatch`.
    #[instrument(skip(self, token))]
    pub async fn get_attributes(&self, token: &str, domain: Option<&str>) -> Result<Vec<WorldModelAttribute>> {
        match domain {
            Some(domain) => {
                let required = ConsentScope::domain(domain, ScopeAction::Read)?;
                let consent = self.authority.authorize(token, &required).await?;
                self.repository.list(consent.subject_id(), Some(domain)).await
            }
            None => {
                let consent = self.authority.authenticate(token).await?;
                let all = self.repository.list(consent.subject_id(), None).await?;
                let total = all.len();
                let readable: Vec<_> = all
                    .into_iter()
                    .filter(|a| can_read(&consent, &a.domain))
                    .collect();
                if total > 0 && readable.is_empty() {
                    return Err(CoreError::ScopeMismatch {
                        required: "domain.*.read".to_string(),
                    });
                }
                Ok(readable)
            }
        }
    }

    /// Delete one attribute; requires `domain.<domain>.delete` or `.write`
    #[instrument(skip(self, token))]
    pub async fn delete_attribute(
        &self,
        token: &str,
        domain: &str,
        attribute_key: &str,
    ) -> Result<DeleteAttributeResult> {
        validate_domain(domain)?;
        let delete = ConsentScope::domain(domain, ScopeAction::Delete)?;
        let write = ConsentScope::domain(domain, ScopeAction::Write)?;

        let consent = self.authority.authenticate(token).await?;
        if !consent.permits(&delete) && !consent.permits(&write) {
            return Err(CoreError::ScopeMismatch {
                required: delete.to_string(),
            });
        }

        if !self
            .repository
            .remove(consent.subject_id(), domain, attribute_key)
            .await?
        {
            return Err(CoreError::NotFound(format!("{}/{}", domain, attribute_key)));
        }
        debug!(token_id = consent.token_id(), "deleted attribute");
        Ok(DeleteAttributeResult { success: true })
    }

    /// Per-domain summary; requires `vault.metadata.read`
    #[instrument(skip_all)]
    pub async fn get_metadata(&self, token: &str) -> Result<WorldModelMetadata> {
        let consent = self.authority.authorize(token, &ConsentScope::metadata_read()).await?;
        let attributes = self.repository.list(consent.subject_id(), None).await?;
        let domains = summarize(&attributes);
        let completeness_score = self.completeness(&domains);

        Ok(WorldModelMetadata {
            user_id: consent.subject_id().to_string(),
            total_attributes: attributes.len(),
            last_updated: domains.iter().map(|d| d.last_updated).max(),
            completeness_score,
            domains,
        })
    }

    /// Domains holding data; requires `vault.metadata.read`
    #[instrument(skip_all)]
    pub async fn get_index(&self, token: &str) -> Result<WorldModelIndex> {
        let consent = self.authority.authorize(token, &ConsentScope::metadata_read()).await?;
        let attributes = self.repository.list(consent.subject_id(), None).await?;
        let domains = summarize(&attributes);

        Ok(WorldModelIndex {
            user_id: consent.subject_id().to_string(),
            available_domains: domains.iter().map(|d| d.domain.clone()).collect(),
            total_attributes: attributes.len(),
            completeness_score: self.completeness(&domains),
        })
    }

    /// Share of expected domains that hold at least one attribute
    fn completeness(&self, domains: &[DomainSummary]) -> f64 {
        if self.expected_domains.is_empty() {
            return 0.0;
        }
        let covered = self
            .expected_domains
            .iter()
            .filter(|d| domains.iter().any(|s| &s.domain == *d))
            .count();
        covered as f64 / self.expected_domains.len() as f64
    }
}

fn can_read(consent: &VerifiedConsent, domain: &str) -> bool {
    ConsentScope::domain(domain, ScopeAction::Read)
        .map(|s| consent.permits(&s))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::MemoryAttributeRepository;
    use crate::consent::{tests::authority, MemoryRevocationStore};
    use byok_crypto::{symmetric, VaultKey};
    use std::time::Duration;

    type Service = WorldModelService<MemoryAttributeRepository, MemoryRevocationStore>;

    fn service() -> Service {
        WorldModelService::new(Arc::new(authority()), Arc::new(MemoryAttributeRepository::new()))
    }

    async fn token(service: &Service, subject: &str, scope: &[&str]) -> String {
        service
            .authority()
            .issue_token(&format!("id:{}", subject), subject, scope, Some(Duration::from_secs(600)))
            .await
            .unwrap()
            .token
    }

    fn payload(key: &VaultKey, value: &str) -> EncryptedPayload {
        symmetric::encrypt(key, value.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let service = service();
        let key = VaultKey::generate();
        let owner = token(&service, "u1", &["domain.*", "vault.*"]).await;

        let result = service
            .store_attribute(&owner, "finance", "income", payload(&key, "85000"), AttributeMetadata::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.scope, "domain.finance.write");

        let rows = service.get_attributes(&owner, Some("finance")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(symmetric::decrypt(&key, &rows[0].payload).unwrap(), b"85000");
    }

    #[tokio::test]
    async fn test_attribute_isolation() {
        let service = service();
        let key = VaultKey::generate();
        let owner = token(&service, "u1", &["domain.*"]).await;

        service
            .store_attribute(&owner, "food", "diet", payload(&key, "vegetarian"), AttributeMetadata::default())
            .await
            .unwrap();
        let before = service.get_attributes(&owner, Some("food")).await.unwrap();

        service
            .store_attribute(&owner, "finance", "income", payload(&key, "1"), AttributeMetadata::default())
            .await
            .unwrap();
        let after = service.get_attributes(&owner, Some("food")).await.unwrap();

        assert_eq!(before, after);
        assert!(after.iter().all(|a| a.domain == "food"));
    }

    #[tokio::test]
    async fn test_scope_enforcement() {
        let service = service();
        let key = VaultKey::generate();
        let reader = token(&service, "u1", &["domain.finance.read"]).await;

        let denied = service
            .store_attribute(&reader, "finance", "income", payload(&key, "1"), AttributeMetadata::default())
            .await;
        assert!(matches!(denied, Err(CoreError::ScopeMismatch { .. })));

        let denied = service.get_attributes(&reader, Some("food")).await;
        assert!(matches!(denied, Err(CoreError::ScopeMismatch { .. })));

        let denied = service.delete_attribute(&reader, "finance", "income").await;
        assert!(matches!(denied, Err(CoreError::ScopeMismatch { .. })));

        assert!(matches!(
            service.get_metadata(&reader).await,
            Err(CoreError::ScopeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unscoped_read_filters_domains() {
        let service = service();
        let key = VaultKey::generate();
        let owner = token(&service, "u1", &["domain.*"]).await;
        for (domain, attr) in [("finance", "income"), ("food", "diet")] {
            service
                .store_attribute(&owner, domain, attr, payload(&key, "x"), AttributeMetadata::default())
                .await
                .unwrap();
        }

        let food_reader = token(&service, "u1", &["domain.food.read"]).await;
        let rows = service.get_attributes(&food_reader, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].domain, "food");

        let stranger = token(&service, "u1", &["domain.travel.read"]).await;
        assert!(matches!(
            service.get_attributes(&stranger, None).await,
            Err(CoreError::ScopeMismatch { .. })
        ));

        let empty_user = token(&service, "u2", &["domain.travel.read"]).await;
        assert!(service.get_attributes(&empty_user, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let service = service();
        let key = VaultKey::generate();
        let writer = token(&service, "u1", &["domain.finance.write", "domain.finance.read"]).await;
        service
            .store_attribute(&writer, "finance", "income", payload(&key, "1"), AttributeMetadata::default())
            .await
            .unwrap();

        let deleter = token(&service, "u1", &["domain.finance.delete"]).await;
        assert!(service.delete_attribute(&deleter, "finance", "income").await.unwrap().success);
        assert!(service.get_attributes(&writer, Some("finance")).await.unwrap().is_empty());
        assert!(matches!(
            service.delete_attribute(&writer, "finance", "income").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_blocks_everything() {
        let service = service();
        let key = VaultKey::generate();
        let owner = token(&service, "u1", &["domain.*", "vault.*"]).await;
        service.authority().revoke_token(&owner).await.unwrap();

        assert!(matches!(
            service
                .store_attribute(&owner, "finance", "income", payload(&key, "1"), AttributeMetadata::default())
                .await,
            Err(CoreError::TokenRevoked)
        ));
        assert!(matches!(service.get_attributes(&owner, None).await, Err(CoreError::TokenRevoked)));
        assert!(matches!(service.get_index(&owner).await, Err(CoreError::TokenRevoked)));
    }

    #[tokio::test]
    async fn test_rejects_malformed_payload() {
        let service = service();
        let owner = token(&service, "u1", &["domain.*"]).await;
        let mut bad = payload(&VaultKey::generate(), "x");
        bad.iv = "AAAA".to_string();
        assert!(matches!(
            service
                .store_attribute(&owner, "finance", "income", bad, AttributeMetadata::default())
                .await,
            Err(CoreError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_and_index_are_structural() {
        let service = service().with_expected_domains(vec!["finance".into(), "food".into()]);
        let key = VaultKey::generate();
        let owner = token(&service, "u1", &["domain.*", "vault.*"]).await;

        let mut meta = AttributeMetadata::default();
        meta.data_type = "number".into();
        service
            .store_attribute(&owner, "finance", "income", payload(&key, "85000"), meta)
            .await
            .unwrap();
        service
            .store_attribute(&owner, "finance", "goal", payload(&key, "retire"), AttributeMetadata::default())
            .await
            .unwrap();

        let metadata = service.get_metadata(&owner).await.unwrap();
        assert_eq!(metadata.total_attributes, 2);
        assert_eq!(metadata.domains.len(), 1);
        assert_eq!(metadata.domains[0].data_types, vec!["number", "string"]);
        assert!((metadata.completeness_score - 0.5).abs() < f64::EPSILON);
        assert!(metadata.last_updated.is_some());

        let index = service.get_index(&owner).await.unwrap();
        assert_eq!(index.available_domains, vec!["finance"]);
        assert_eq!(index.user_id, "u1");
    }
}
