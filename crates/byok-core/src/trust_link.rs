//! Agent-to-agent trust links
//!
//! A trust link lets one agent delegate a single scope to another for a
//! bounded period. The link is signed over every field, can never grant a
//! scope its creator's consent token lacks, and never outlives that token.
//! Links are not individually revocable; they are short-lived instead.
//!
//! Links travel as unpadded base64url JSON so they can be handed between
//! agents as a single string.

use crate::{
    consent::{ValidationFailure, VerifiedConsent},
    scope::ConsentScope,
    time::now_ms,
    CoreError, Result,
};
use byok_crypto::{encoding, Signature, SigningKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const SIGNING_CONTEXT: &str = "byok-trust-link-v1";

/// Longest lifetime a trust link may be created with
pub const MAX_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A signed delegation of one scope from one agent to another
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustLink {
    pub link_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub scope: ConsentScope,
    pub signed_by_user: bool,
    pub issued_at: i64,
    pub expires_at: i64,
    pub signature: String,
}

/// Fields covered by the signature, in a fixed order
#[derive(Serialize)]
struct SignedFields<'a> {
    link_id: &'a str,
    from_agent: &'a str,
    to_agent: &'a str,
    scope: &'a str,
    signed_by_user: bool,
    issued_at: i64,
    expires_at: i64,
}

impl TrustLink {
    fn signing_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&SignedFields {
            link_id: &self.link_id,
            from_agent: &self.from_agent,
            to_agent: &self.to_agent,
            scope: self.scope.as_str(),
            signed_by_user: self.signed_by_user,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
        .map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn is_expired(&self) -> bool {
        now_ms() >= self.expires_at
    }

    /// Milliseconds until expiry, `None` once expired
    pub fn time_until_expiry(&self) -> Option<i64> {
        let remaining = self.expires_at - now_ms();
        (remaining > 0).then_some(remaining)
    }

    /// Encode as a portable string
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(encoding::to_base64url(&json))
    }

    /// Decode a portable string. The signature is not checked here.
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = encoding::from_base64url("trust link", encoded.trim())
            .map_err(|e| CoreError::MalformedToken(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| CoreError::MalformedToken(e.to_string()))
    }
}

/// Parameters for a new trust link
#[derive(Clone, Debug)]
pub struct TrustLinkRequest {
    from_agent: String,
    to_agent: String,
    scope: String,
    signed_by_user: bool,
    ttl: Duration,
}

impl TrustLinkRequest {
    pub fn new(from_agent: impl Into<String>, to_agent: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            scope: scope.into(),
            signed_by_user: false,
            ttl: Duration::from_secs(60 * 60),
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Mark the link as explicitly approved by the vault holder
    pub fn signed_by_user(mut self, signed: bool) -> Self {
        self.signed_by_user = signed;
        self
    }
}

/// Outcome of verifying a trust link
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustLinkVerification {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationFailure>,
}

impl TrustLinkVerification {
    fn accepted() -> Self {
        Self { valid: true, reason: None }
    }

    fn rejected(reason: ValidationFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// Creates and verifies trust links
pub struct TrustLinkAuthority {
    signing_key: SigningKey,
    max_ttl: Duration,
}

impl TrustLinkAuthority {
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            max_ttl: MAX_LINK_TTL,
        }
    }

    /// Lower the maximum TTL (it can never exceed [`MAX_LINK_TTL`])
    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = max_ttl.min(MAX_LINK_TTL);
        self
    }

    /// Create a link on behalf of the holder of `grantor`.
    ///
    /// The delegated scope must be permitted by the grantor's token, and the
    /// link expires no later than that token.
    #[instrument(skip(self, grantor), fields(token_id = grantor.token_id()))]
    pub fn create_trust_link(&self, grantor: &VerifiedConsent, request: TrustLinkRequest) -> Result<TrustLink> {
        if request.from_agent.trim().is_empty() || request.to_agent.trim().is_empty() {
            return Err(CoreError::InvalidRequest("agents must not be empty".to_string()));
        }
        if request.from_agent == request.to_agent {
            return Err(CoreError::InvalidRequest("an agent cannot delegate to itself".to_string()));
        }

        let scope = ConsentScope::parse(&request.scope)?;
        grantor.require(&scope)?;

        if request.ttl.is_zero() {
            return Err(CoreError::InvalidTtl("ttl must be positive".to_string()));
        }
        if request.ttl > self.max_ttl {
            return Err(CoreError::InvalidTtl(format!(
                "ttl exceeds maximum of {}s",
                self.max_ttl.as_secs()
            )));
        }

        let issued_at = now_ms();
        let expires_at = issued_at
            .saturating_add(request.ttl.as_millis() as i64)
            .min(grantor.expires_at());

        let mut link = TrustLink {
            link_id: uuid::Uuid::new_v4().to_string(),
            from_agent: request.from_agent,
            to_agent: request.to_agent,
            scope,
            signed_by_user: request.signed_by_user,
            issued_at,
            expires_at,
            signature: String::new(),
        };
        let signature = self.signing_key.sign(SIGNING_CONTEXT, &link.signing_bytes()?)?;
        link.signature = signature.to_base64url();

        debug!(link_id = %link.link_id, expires_at, "created trust link");
        Ok(link)
    }

    /// Verify signature, then expiry, then that `required_scope` is covered.
    ///
    /// `Err` is returned only for an unparseable `required_scope`.
    pub fn verify_trust_link(&self, link: &TrustLink, required_scope: &str) -> Result<TrustLinkVerification> {
        let required = ConsentScope::parse(required_scope)?;
        Ok(match self.check(link, &required) {
            Ok(()) => TrustLinkVerification::accepted(),
            Err(reason) => TrustLinkVerification::rejected(reason),
        })
    }

    /// Like [`verify_trust_link`](Self::verify_trust_link), also requiring
    /// the link to have been issued to `agent`
    pub fn verify_for_agent(
        &self,
        link: &TrustLink,
        agent: &str,
        required_scope: &str,
    ) -> Result<TrustLinkVerification> {
        let verification = self.verify_trust_link(link, required_scope)?;
        if verification.valid && link.to_agent != agent {
            return Ok(TrustLinkVerification::rejected(ValidationFailure::WrongAgent));
        }
        Ok(verification)
    }

    fn check(&self, link: &TrustLink, required: &ConsentScope) -> std::result::Result<(), ValidationFailure> {
        let signature =
            Signature::from_base64url(&link.signature).map_err(|_| ValidationFailure::Malformed)?;
        let message = link.signing_bytes().map_err(|_| ValidationFailure::Malformed)?;
        self.signing_key
            .verify(SIGNING_CONTEXT, &message, &signature)
            .map_err(|_| ValidationFailure::InvalidSignature)?;

        if link.is_expired() {
            return Err(ValidationFailure::Expired);
        }
        if !link.scope.contains(required) {
            return Err(ValidationFailure::ScopeMismatch);
        }
        Ok(())
    }
}
