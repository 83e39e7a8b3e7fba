//! World-model attribute handlers
//!
//! Payloads pass through as ciphertext; nothing here can decrypt them.

use crate::auth::BearerToken;
use crate::error::Result;
use crate::{ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use byok_core::api::{AttributesQuery, AttributesResponse, StoreAttributeRequest};
use byok_core::{DeleteAttributeResult, StoreAttributeResult, WorldModelIndex, WorldModelMetadata};
use std::sync::Arc;

/// POST /api/world-model/attributes - the consent token travels in the body
pub async fn store_attribute(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(req), _): WithRejection<Json<StoreAttributeRequest>, ApiError>,
) -> Result<Json<StoreAttributeResult>> {
    let result = state
        .world_model
        .store_attribute(&req.consent_token, &req.domain, &req.attribute_key, req.payload, req.metadata)
        .await?;
    Ok(Json(result))
}

/// GET /api/world-model/attributes?domain=
pub async fn get_attributes(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    WithRejection(Query(query), _): WithRejection<Query<AttributesQuery>, ApiError>,
) -> Result<Json<AttributesResponse>> {
    let attributes = state.world_model.get_attributes(&token, query.domain.as_deref()).await?;
    Ok(Json(AttributesResponse { attributes }))
}

/// DELETE /api/world-model/attributes/{domain}/{attribute_key}
pub async fn delete_attribute(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    WithRejection(Path((domain, attribute_key)), _): WithRejection<Path<(String, String)>, ApiError>,
) -> Result<Json<DeleteAttributeResult>> {
    let result = state.world_model.delete_attribute(&token, &domain, &attribute_key).await?;
    Ok(Json(result))
}

/// GET /api/world-model/metadata
pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<WorldModelMetadata>> {
    Ok(Json(state.world_model.get_metadata(&token).await?))
}

/// GET /api/world-model/index
pub async fn get_index(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<WorldModelIndex>> {
    Ok(Json(state.world_model.get_index(&token).await?))
}
