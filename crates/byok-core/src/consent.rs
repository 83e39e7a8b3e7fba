//! Scoped, time-limited, revocable consent tokens
//!
//! A consent token is an opaque bearer string of the form
//! `HCT:<payload>.<signature>` where `payload` is the base64url JSON claim set
//! and `signature` is an HMAC over the encoded payload. Only the issuing
//! [`ConsentAuthority`] can mint or validate tokens; everyone else treats
//! them as opaque strings.
//!
//! Validation always runs in the same order: signature, expiry, revocation,
//! scope. The first failing check determines the reported reason.

use crate::{
    scope::{ConsentScope, ScopeSet},
    time::now_ms,
    CoreError, Result,
};
use async_trait::async_trait;
use byok_crypto::{encoding, Signature, SigningKey};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Prefix of every consent token
pub const TOKEN_PREFIX: &str = "HCT:";

const SIGNING_CONTEXT: &str = "byok-consent-token-v1";

// ═══════════════════════════════════════════════════════════════════════════
// VALIDATION RESULTS
// ═══════════════════════════════════════════════════════════════════════════

/// Why a token (or trust link) was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailure {
    Malformed,
    InvalidSignature,
    Expired,
    Revoked,
    ScopeMismatch,
    WrongAgent,
}

impl ValidationFailure {
    /// Wire form of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::ScopeMismatch => "scope_mismatch",
            Self::WrongAgent => "wrong_agent",
        }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`ConsentAuthority::validate_token`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl TokenValidation {
    fn accepted(consent: &VerifiedConsent) -> Self {
        Self {
            valid: true,
            reason: None,
            subject_id: Some(consent.subject_id.clone()),
            scope: Some(consent.scope.to_strings()),
            expires_at: Some(consent.expires_at),
        }
    }

    fn rejected(reason: ValidationFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            subject_id: None,
            scope: None,
            expires_at: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════

/// Signed claim set carried inside the token
#[derive(Clone, Debug, Serialize, Deserialize)]
struct TokenClaims {
    tid: String,
    sub: String,
    scope: Vec<String>,
    iat: i64,
    exp: i64,
}

/// Decoded view of a consent token
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentToken {
    pub token_id: String,
    pub subject_id: String,
    pub scope: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub revoked: bool,
    pub signature: String,
}

impl ConsentToken {
    pub fn is_expired(&self) -> bool {
        now_ms() >= self.expires_at
    }
}

/// A freshly minted token, returned once to the caller
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub token_id: String,
    pub expires_at: i64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"***")
            .field("token_id", &self.token_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A token that passed signature, expiry and revocation checks.
///
/// Only the authority constructs these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedConsent {
    token_id: String,
    subject_id: String,
    scope: ScopeSet,
    issued_at: i64,
    expires_at: i64,
}

impl VerifiedConsent {
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// The vault holder this token was issued for
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn scope(&self) -> &ScopeSet {
        &self.scope
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the token grants `required`
    pub fn permits(&self, required: &ConsentScope) -> bool {
        self.scope.permits(required)
    }

    /// Fail with `ScopeMismatch` unless `required` is granted
    pub fn require(&self, required: &ConsentScope) -> Result<()> {
        if self.permits(required) {
            Ok(())
        } else {
            Err(CoreError::ScopeMismatch {
                required: required.to_string(),
            })
        }
    }
}

/// Read the token id without verifying anything.
///
/// Only for diagnostics such as attaching the token id to a write failure.
pub fn peek_token_id(token: &str) -> Option<String> {
    let body = token.strip_prefix(TOKEN_PREFIX)?;
    let (payload, _) = body.split_once('.')?;
    let bytes = encoding::from_base64url("payload", payload).ok()?;
    serde_json::from_slice::<TokenClaims>(&bytes).ok().map(|c| c.tid)
}

// ═══════════════════════════════════════════════════════════════════════════
// COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════

/// Identity established by the primary credential
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
}

/// Verifies the vault holder's primary identity credential
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity>;
}

/// Durable record of revoked token ids.
///
/// A revocation must be visible to every subsequent `is_revoked` call once
/// `revoke` returns.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record a revocation; `expires_at` lets the store forget it later
    async fn revoke(&self, token_id: &str, expires_at: i64) -> Result<()>;

    async fn is_revoked(&self, token_id: &str) -> Result<bool>;
}

/// In-memory revocation list
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    revoked: DashMap<String, i64>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget revocations of tokens that have expired anyway
    pub fn purge_expired(&self) -> usize {
        let now = now_ms();
        let before = self.revoked.len();
        self.revoked.retain(|_, expires_at| *expires_at > now);
        before - self.revoked.len()
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token_id: &str, expires_at: i64) -> Result<()> {
        self.revoked.insert(token_id.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool> {
        Ok(self.revoked.contains_key(token_id))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTHORITY
// ═══════════════════════════════════════════════════════════════════════════

/// Lifetime limits for issued tokens
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorityConfig {
    /// TTL applied when the caller does not pick one
    pub default_ttl: Duration,
    /// Longest TTL a caller may request
    pub max_ttl: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60 * 60),
            max_ttl: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// Issues, validates and revokes consent tokens
pub struct ConsentAuthority<R: RevocationStore = MemoryRevocationStore> {
    signing_key: SigningKey,
    identity: Arc<dyn IdentityVerifier>,
    revocations: Arc<R>,
    config: AuthorityConfig,
}

impl<R: RevocationStore> ConsentAuthority<R> {
    pub fn new(signing_key: SigningKey, identity: Arc<dyn IdentityVerifier>, revocations: Arc<R>) -> Self {
        Self {
            signing_key,
            identity,
            revocations,
            config: AuthorityConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AuthorityConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn revocations(&self) -> &Arc<R> {
        &self.revocations
    }

    /// Issue a token for `subject_id` after verifying the primary credential.
    ///
    /// The credential must belong to `subject_id`. `ttl` defaults to the
    /// configured default and may not exceed the configured maximum.
    #[instrument(skip(self, credential, scope), fields(scopes = scope.len()))]
    pub async fn issue_token<S: AsRef<str> + Sync>(
        &self,
        credential: &str,
        subject_id: &str,
        scope: &[S],
        ttl: Option<Duration>,
    ) -> Result<IssuedToken> {
        let identity = self.identity.verify(credential).await?;
        if identity.subject_id != subject_id {
            warn!("credential subject does not match requested subject");
            return Err(CoreError::Identity(
                "credential does not belong to the requested subject".to_string(),
            ));
        }

        let scope = ScopeSet::parse_all(scope)?;
        if scope.is_empty() {
            return Err(CoreError::InvalidScope("at least one scope is required".to_string()));
        }

        let ttl = ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            return Err(CoreError::InvalidTtl("ttl must be positive".to_string()));
        }
        if ttl > self.config.max_ttl {
            return Err(CoreError::InvalidTtl(format!(
                "ttl exceeds maximum of {}s",
                self.config.max_ttl.as_secs()
            )));
        }

        let issued_at = now_ms();
        let claims = TokenClaims {
            tid: uuid::Uuid::new_v4().to_string(),
            sub: subject_id.to_string(),
            scope: scope.to_strings(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl.as_millis() as i64),
        };
        let token = self.encode(&claims)?;
        debug!(token_id = %claims.tid, expires_at = claims.exp, "issued consent token");

        Ok(IssuedToken {
            token,
            token_id: claims.tid,
            expires_at: claims.exp,
        })
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String> {
        let json = serde_json::to_vec(claims).map_err(|e| CoreError::Serialization(e.to_string()))?;
        let payload = encoding::to_base64url(&json);
        let signature = self.signing_key.sign(SIGNING_CONTEXT, payload.as_bytes())?;
        Ok(format!("{}{}.{}", TOKEN_PREFIX, payload, signature.to_base64url()))
    }

    /// Parse the token and check its signature
    fn decode(&self, token: &str) -> Result<(TokenClaims, Signature)> {
        let body = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| CoreError::MalformedToken("missing token prefix".to_string()))?;
        let (payload, signature) = body
            .split_once('.')
            .ok_or_else(|| CoreError::MalformedToken("missing signature".to_string()))?;

        let signature = Signature::from_base64url(signature)
            .map_err(|e| CoreError::MalformedToken(e.to_string()))?;
        self.signing_key
            .verify(SIGNING_CONTEXT, payload.as_bytes(), &signature)
            .map_err(|_| CoreError::InvalidSignature)?;

        let json = encoding::from_base64url("payload", payload)
            .map_err(|e| CoreError::MalformedToken(e.to_string()))?;
        let claims: TokenClaims =
            serde_json::from_slice(&json).map_err(|e| CoreError::MalformedToken(e.to_string()))?;
        Ok((claims, signature))
    }

    /// Check signature, expiry and revocation
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<VerifiedConsent> {
        let (claims, _) = self.decode(token)?;

        if now_ms() >= claims.exp {
            debug!(token_id = %claims.tid, "token expired");
            return Err(CoreError::TokenExpired);
        }
        if self.revocations.is_revoked(&claims.tid).await? {
            debug!(token_id = %claims.tid, "token revoked");
            return Err(CoreError::TokenRevoked);
        }

        let scope = ScopeSet::parse_all(&claims.scope)
            .map_err(|e| CoreError::MalformedToken(e.to_string()))?;
        Ok(VerifiedConsent {
            token_id: claims.tid,
            subject_id: claims.sub,
            scope,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Authenticate the token and require `expected_scope`
    pub async fn authorize(&self, token: &str, expected_scope: &ConsentScope) -> Result<VerifiedConsent> {
        let consent = self.authenticate(token).await?;
        consent.require(expected_scope)?;
        Ok(consent)
    }

    /// Validate a token against an expected scope.
    ///
    /// Consent failures are reported in the returned value; `Err` is reserved
    /// for an unparseable `expected_scope` or a revocation store fault.
    #[instrument(skip(self, token))]
    pub async fn validate_token(&self, token: &str, expected_scope: &str) -> Result<TokenValidation> {
        let expected = ConsentScope::parse(expected_scope)?;
        match self.authorize(token, &expected).await {
            Ok(consent) => Ok(TokenValidation::accepted(&consent)),
            Err(e) => match e.validation_failure() {
                Some(reason) => Ok(TokenValidation::rejected(reason)),
                None => Err(e),
            },
        }
    }

    /// Revoke a token. Idempotent; expired tokens may still be revoked.
    #[instrument(skip_all)]
    pub async fn revoke_token(&self, token: &str) -> Result<()> {
        let (claims, _) = self.decode(token)?;
        self.revocations.revoke(&claims.tid, claims.exp).await?;
        debug!(token_id = %claims.tid, "revoked consent token");
        Ok(())
    }

    /// Decode an authentic token regardless of expiry or revocation
    pub async fn inspect(&self, token: &str) -> Result<ConsentToken> {
        let (claims, signature) = self.decode(token)?;
        let revoked = self.revocations.is_revoked(&claims.tid).await?;
        Ok(ConsentToken {
            token_id: claims.tid,
            subject_id: claims.sub,
            scope: claims.scope,
            issued_at: claims.iat,
            expires_at: claims.exp,
            revoked,
            signature: signature.to_base64url(),
        })
    }
}
