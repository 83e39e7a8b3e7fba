//! Trust link handlers

use crate::auth::BearerToken;
use crate::error::Result;
use crate::{ApiError, AppState};
use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use byok_core::api::{CreateTrustLinkRequest, VerifyTrustLinkRequest};
use byok_core::{TrustLink, TrustLinkRequest, TrustLinkVerification};
use std::sync::Arc;
use std::time::Duration;

/// POST /api/trust-links - the bearer is the creator's consent token
pub async fn create_trust_link(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    WithRejection(Json(req), _): WithRejection<Json<CreateTrustLinkRequest>, ApiError>,
) -> Result<Json<TrustLink>> {
    let grantor = state.authority.authenticate(&token).await?;

    let mut request = TrustLinkRequest::new(req.from_agent, req.to_agent, req.scope).signed_by_user(req.signed_by_user);
    if let Some(ttl_ms) = req.ttl_ms {
        request = request.ttl(Duration::from_millis(ttl_ms));
    }

    let link = state.trust_links.create_trust_link(&grantor, request)?;
    tracing::info!(link_id = %link.link_id, token_id = grantor.token_id(), "trust link created");
    Ok(Json(link))
}

/// POST /api/trust-links/verify
pub async fn verify_trust_link(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(req), _): WithRejection<Json<VerifyTrustLinkRequest>, ApiError>,
) -> Result<Json<TrustLinkVerification>> {
    let verification = match req.agent.as_deref() {
        Some(agent) => state.trust_links.verify_for_agent(&req.link, agent, &req.required_scope)?,
        None => state.trust_links.verify_trust_link(&req.link, &req.required_scope)?,
    };
    Ok(Json(verification))
}
