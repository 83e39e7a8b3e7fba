//! Consent token handlers

use crate::auth::BearerToken;
use crate::state::hash_subject;
use crate::error::Result;
use crate::{ApiError, AppState};
use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use byok_core::api::{IssueTokenRequest, RevokeTokenRequest, RevokeTokenResponse, ValidateTokenRequest};
use byok_core::{IssuedToken, TokenValidation};
use std::sync::Arc;
use std::time::Duration;

/// POST /api/consent/token - Issue a token; the bearer is the identity JWT
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    BearerToken(credential): BearerToken,
    WithRejection(Json(req), _): WithRejection<Json<IssueTokenRequest>, ApiError>,
) -> Result<Json<IssuedToken>> {
    let ttl = req.ttl_ms.map(Duration::from_millis);
    let issued = state
        .authority
        .issue_token(&credential, &req.subject_id, &req.scope, ttl)
        .await?;

    tracing::info!(
        subject = %hash_subject(&req.subject_id),
        token_id = %issued.token_id,
        scopes = req.scope.len(),
        "consent token issued"
    );
    Ok(Json(issued))
}

/// POST /api/consent/validate
///
/// Always answers 200 with `valid` and a reason; only an unparseable
/// expected scope is an error.
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(req), _): WithRejection<Json<ValidateTokenRequest>, ApiError>,
) -> Result<Json<TokenValidation>> {
    let validation = state.authority.validate_token(&req.token, &req.expected_scope).await?;
    Ok(Json(validation))
}

/// POST /api/consent/revoke
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(req), _): WithRejection<Json<RevokeTokenRequest>, ApiError>,
) -> Result<Json<RevokeTokenResponse>> {
    state.authority.revoke_token(&req.token).await?;
    Ok(Json(RevokeTokenResponse { revoked: true }))
}
