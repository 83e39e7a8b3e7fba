//! Identity credentials and bearer extraction

use crate::ApiError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use byok_core::{CoreError, IdentityVerifier, VerifiedIdentity};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims of the primary identity credential
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (vault holder id)
    pub sub: String,
    /// Expiration time (seconds)
    pub exp: i64,
    /// Issued at
    pub iat: Option<i64>,
    /// Issuer
    pub iss: Option<String>,
}

/// Verifies HS256 identity JWTs
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a JWT and extract its claims
    pub fn validate(&self, token: &str) -> Result<Claims, CoreError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("identity token validation failed: {}", e);
                CoreError::Identity("invalid or expired identity token".to_string())
            })
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, credential: &str) -> byok_core::Result<VerifiedIdentity> {
        let claims = self.validate(credential)?;
        if claims.sub.is_empty() {
            return Err(CoreError::Identity("identity token has no subject".to_string()));
        }
        Ok(VerifiedIdentity { subject_id: claims.sub })
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Bearer credential of the request: an identity JWT or a consent token
/// depending on the route
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::unauthorized("missing or malformed bearer token"))?;
        Ok(Self(bearer.token().to_string()))
    }
}
