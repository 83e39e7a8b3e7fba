//! Request and response bodies shared by the gateway and the client

use crate::{
    attribute::{AttributeMetadata, WorldModelAttribute},
    consent::ValidationFailure,
    trust_link::TrustLink,
};
use byok_crypto::EncryptedPayload;
use serde::{Deserialize, Serialize};

/// `POST /api/consent/token`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    #[serde(alias = "userId", alias = "user_id")]
    pub subject_id: String,
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

/// `POST /api/consent/validate`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    #[serde(alias = "consentToken")]
    pub token: String,
    #[serde(alias = "scope")]
    pub expected_scope: String,
}

/// `POST /api/consent/revoke`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeTokenRequest {
    #[serde(alias = "consentToken")]
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeTokenResponse {
    pub revoked: bool,
}

/// `POST /api/trust-links`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrustLinkRequest {
    pub from_agent: String,
    pub to_agent: String,
    pub scope: String,
    #[serde(default)]
    pub signed_by_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

/// `POST /api/trust-links/verify`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTrustLinkRequest {
    pub link: TrustLink,
    pub required_scope: String,
    /// When set, the link must have been issued to this agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// `POST /api/world-model/attributes`; the consent token travels in the body
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAttributeRequest {
    #[serde(alias = "consent_token", alias = "token")]
    pub consent_token: String,
    pub domain: String,
    #[serde(alias = "attribute_key", alias = "key")]
    pub attribute_key: String,
    pub payload: EncryptedPayload,
    #[serde(flatten)]
    pub metadata: AttributeMetadata,
}

impl std::fmt::Debug for StoreAttributeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAttributeRequest")
            .field("consent_token", &"***")
            .field("domain", &self.domain)
            .field("attribute_key", &self.attribute_key)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// `GET /api/world-model/attributes`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributesResponse {
    pub attributes: Vec<WorldModelAttribute>,
}

/// Query string of `GET /api/world-model/attributes`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Body of every error response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable error code such as `consent_denied` or `not_found`
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationFailure>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// `GET /health`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_request_accepts_legacy_names() {
        let body = json!({
            "token": "HCT:x.y",
            "domain": "finance",
            "key": "income",
            "payload": {"ciphertext": "AA==", "iv": "CgsMDQ4PEBESExQV", "tag": "ayoYViFNk1ijCJh3dCV2yA=="},
            "dataType": "number"
        });
        let req: StoreAttributeRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.consent_token, "HCT:x.y");
        assert_eq!(req.attribute_key, "income");
        assert_eq!(req.metadata.data_type, "number");
        assert_eq!(req.metadata.source, "user");
        assert_eq!(req.payload.algorithm, "aes-256-gcm");
        assert!(!format!("{:?}", req).contains("HCT:"));
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "consent_denied".into(),
            reason: Some(ValidationFailure::Revoked),
            message: "token revoked".into(),
            request_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["reason"], "revoked");
        assert!(json.get("requestId").is_none());
    }
}
