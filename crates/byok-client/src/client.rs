//! HTTP client for the consent and attribute service

use crate::{ClientError, Config, Result};
use byok_core::{
    api::{
        AttributesResponse, CreateTrustLinkRequest, ErrorBody, HealthResponse, IssueTokenRequest,
        RevokeTokenRequest, RevokeTokenResponse, StoreAttributeRequest, ValidateTokenRequest,
        VerifyTrustLinkRequest,
    },
    peek_token_id, AttributeMetadata, DeleteAttributeResult, IssuedToken, StoreAttributeResult,
    TokenValidation, TrustLink, TrustLinkVerification, WorldModelAttribute, WorldModelIndex,
    WorldModelMetadata,
};
use byok_crypto::EncryptedPayload;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Whether a request may be replayed after a transient failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Read,
    Write,
}

/// Vault service client
#[derive(Clone, Debug)]
pub struct VaultClient {
    config: Config,
    base: Url,
    http: Client,
}

impl VaultClient {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let base = Url::parse(config.base_url())
            .map_err(|e| ClientError::Configuration(format!("invalid endpoint: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Configuration(format!(
                "endpoint cannot be a base URL: {}",
                config.endpoint
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self { config, base, http })
    }

    /// Create with endpoint URL
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Self::new(Config::new(endpoint))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Consent ====================

    /// Exchange a primary identity credential for a consent token
    #[instrument(skip(self, identity_credential, scope), fields(scopes = scope.len()))]
    pub async fn issue_token(
        &self,
        identity_credential: &str,
        subject_id: &str,
        scope: &[String],
        ttl: Option<Duration>,
    ) -> Result<IssuedToken> {
        let body = IssueTokenRequest {
            subject_id: subject_id.to_string(),
            scope: scope.to_vec(),
            ttl_ms: ttl.map(|t| t.as_millis() as u64),
        };
        let request = self
            .request(Method::POST, &["api", "consent", "token"])?
            .bearer_auth(identity_credential)
            .json(&body);
        self.execute(request, Operation::Write).await
    }

    /// Ask the authority whether `token` grants `expected_scope`
    #[instrument(skip(self, token))]
    pub async fn validate_token(&self, token: &str, expected_scope: &str) -> Result<TokenValidation> {
        let body = ValidateTokenRequest {
            token: token.to_string(),
            expected_scope: expected_scope.to_string(),
        };
        let request = self.request(Method::POST, &["api", "consent", "validate"])?.json(&body);
        self.execute(request, Operation::Read).await
    }

    /// Revoke a consent token
    #[instrument(skip_all)]
    pub async fn revoke_token(&self, token: &str) -> Result<()> {
        let body = RevokeTokenRequest {
            token: token.to_string(),
        };
        let request = self.request(Method::POST, &["api", "consent", "revoke"])?.json(&body);
        let _: RevokeTokenResponse = self.execute(request, Operation::Write).await?;
        Ok(())
    }

    // ==================== Trust links ====================

    /// Delegate one scope of `consent_token` to another agent
    #[instrument(skip(self, consent_token))]
    pub async fn create_trust_link(
        &self,
        consent_token: &str,
        request: &CreateTrustLinkRequest,
    ) -> Result<TrustLink> {
        let builder = self
            .request(Method::POST, &["api", "trust-links"])?
            .bearer_auth(consent_token)
            .json(request);
        self.execute(builder, Operation::Write).await
    }

    /// Verify a link for `required_scope`, optionally for a specific agent
    #[instrument(skip(self, link), fields(link_id = %link.link_id))]
    pub async fn verify_trust_link(
        &self,
        link: &TrustLink,
        required_scope: &str,
        agent: Option<&str>,
    ) -> Result<TrustLinkVerification> {
        let body = VerifyTrustLinkRequest {
            link: link.clone(),
            required_scope: required_scope.to_string(),
            agent: agent.map(str::to_string),
        };
        let request = self
            .request(Method::POST, &["api", "trust-links", "verify"])?
            .json(&body);
        self.execute(request, Operation::Read).await
    }

    // ==================== Attributes ====================

    /// Store an already-encrypted attribute. Never retried.
    #[instrument(skip(self, consent_token, payload, metadata))]
    pub async fn store_attribute(
        &self,
        consent_token: &str,
        domain: &str,
        attribute_key: &str,
        payload: EncryptedPayload,
        metadata: AttributeMetadata,
    ) -> Result<StoreAttributeResult> {
        let body = StoreAttributeRequest {
            consent_token: consent_token.to_string(),
            domain: domain.to_string(),
            attribute_key: attribute_key.to_string(),
            payload,
            metadata,
        };
        let request = self
            .request(Method::POST, &["api", "world-model", "attributes"])?
            .json(&body);
        self.execute(request, Operation::Write)
            .await
            .map_err(|e| write_failed(e, consent_token, domain, attribute_key))
    }

    /// Fetch encrypted attributes, optionally for one domain
    #[instrument(skip(self, consent_token))]
    pub async fn get_attributes(
        &self,
        consent_token: &str,
        domain: Option<&str>,
    ) -> Result<Vec<WorldModelAttribute>> {
        let mut request = self
            .request(Method::GET, &["api", "world-model", "attributes"])?
            .bearer_auth(consent_token);
        if let Some(domain) = domain {
            request = request.query(&[("domain", domain)]);
        }
        let response: AttributesResponse = self.execute(request, Operation::Read).await?;
        Ok(response.attributes)
    }

    /// Delete one attribute. Never retried.
    #[instrument(skip(self, consent_token))]
    pub async fn delete_attribute(
        &self,
        consent_token: &str,
        domain: &str,
        attribute_key: &str,
    ) -> Result<DeleteAttributeResult> {
        let request = self
            .request(Method::DELETE, &["api", "world-model", "attributes", domain, attribute_key])?
            .bearer_auth(consent_token);
        self.execute(request, Operation::Write)
            .await
            .map_err(|e| write_failed(e, consent_token, domain, attribute_key))
    }

    /// Structural summary of the world model
    #[instrument(skip_all)]
    pub async fn get_metadata(&self, consent_token: &str) -> Result<WorldModelMetadata> {
        let request = self
            .request(Method::GET, &["api", "world-model", "metadata"])?
            .bearer_auth(consent_token);
        self.execute(request, Operation::Read).await
    }

    /// Domains that hold data
    #[instrument(skip_all)]
    pub async fn get_index(&self, consent_token: &str) -> Result<WorldModelIndex> {
        let request = self
            .request(Method::GET, &["api", "world-model", "index"])?
            .bearer_auth(consent_token);
        self.execute(request, Operation::Read).await
    }

    /// Service health
    pub async fn health(&self) -> Result<HealthResponse> {
        let request = self.request(Method::GET, &["health"])?;
        self.execute(request, Operation::Read).await
    }

    // ==================== Internal ====================

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Configuration("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.http.request(method, url))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, operation: Operation) -> Result<T> {
        let attempts = match operation {
            Operation::Read => self.config.max_retries + 1,
            Operation::Write => 1,
        };

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            let req = request
                .try_clone()
                .ok_or_else(|| ClientError::Configuration("request cannot be replayed".to_string()))?;
            match self.dispatch(req).await {
                Ok(response) => break response,
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.config.retry_backoff * attempt;
                    warn!(attempt, ?delay, error = %e, "transient failure, retrying read");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        response.json::<T>().await.map_err(ClientError::from)
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "response received");

        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<ErrorBody>().await.ok();
        Err(ClientError::from_response(status.as_u16(), body))
    }
}

/// Attach write context to network failures
fn write_failed(error: ClientError, token: &str, domain: &str, attribute_key: &str) -> ClientError {
    if !error.is_transient() {
        return error;
    }
    ClientError::WriteFailed {
        domain: domain.to_string(),
        attribute_key: attribute_key.to_string(),
        token_id: peek_token_id(token),
        source: Box::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_encodes_segments() {
        let client = VaultClient::with_endpoint("http://localhost:8080/vault/").unwrap();
        let request = client
            .request(Method::DELETE, &["api", "world-model", "attributes", "finance", "risk tolerance"])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:8080/vault/api/world-model/attributes/finance/risk%20tolerance"
        );
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(matches!(
            VaultClient::with_endpoint("not a url"),
            Err(ClientError::Configuration(_))
        ));
        assert!(matches!(
            VaultClient::with_endpoint("mailto:someone@example.com"),
            Err(ClientError::Configuration(_))
        ));
    }
}
