//! HTTP behavior of the vault client against a mock service

use byok_client::{ClientError, Config, VaultClient};
use byok_core::AttributeMetadata;
use byok_crypto::{encoding, symmetric, VaultKey};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> VaultClient {
    VaultClient::new(
        Config::new(server.uri())
            .with_timeout(Duration::from_millis(500))
            .with_retry_backoff(Duration::from_millis(5)),
    )
    .unwrap()
}

/// Unsigned token whose id can still be peeked
fn token(tid: &str) -> String {
    let claims = json!({"tid": tid, "sub": "u1", "scope": ["domain.*"], "iat": 0, "exp": 0});
    format!("HCT:{}.sig", encoding::to_base64url(claims.to_string().as_bytes()))
}

fn attribute_json() -> serde_json::Value {
    let payload = symmetric::encrypt(&VaultKey::generate(), b"85000").unwrap();
    json!({
        "domain": "finance",
        "attributeKey": "income",
        "payload": payload,
        "source": "user",
        "dataType": "number",
        "createdAt": 1,
        "updatedAt": 2
    })
}

#[tokio::test]
async fn test_reads_send_bearer_token_and_query() {
    let server = MockServer::start().await;
    let token = token("tok-1");

    Mock::given(method("GET"))
        .and(path("/api/world-model/attributes"))
        .and(query_param("domain", "finance"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"attributes": [attribute_json()]})))
        .expect(1)
        .mount(&server)
        .await;

    let attributes = client(&server).get_attributes(&token, Some("finance")).await.unwrap();
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].attribute_key, "income");
    assert_eq!(attributes[0].metadata.data_type, "number");
}

#[tokio::test]
async fn test_store_sends_token_in_body() {
    let server = MockServer::start().await;
    let token = token("tok-2");

    Mock::given(method("POST"))
        .and(path("/api/world-model/attributes"))
        .and(body_partial_json(json!({
            "consentToken": token,
            "domain": "finance",
            "attributeKey": "income",
            "dataType": "number"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "scope": "domain.finance.write"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let payload = symmetric::encrypt(&VaultKey::generate(), b"85000").unwrap();
    let metadata = AttributeMetadata {
        data_type: "number".into(),
        ..Default::default()
    };
    let result = client(&server)
        .store_attribute(&token, "finance", "income", payload, metadata)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.scope, "domain.finance.write");
}

#[tokio::test]
async fn test_reads_retry_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/world-model/index"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/world-model/index"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "u1",
            "availableDomains": ["finance"],
            "totalAttributes": 1,
            "completenessScore": 0.5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = client(&server).get_index(&token("tok-3")).await.unwrap();
    assert_eq!(index.available_domains, vec!["finance"]);
}

#[tokio::test]
async fn test_read_retries_are_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let client = VaultClient::new(
        Config::new(server.uri())
            .with_max_retries(2)
            .with_retry_backoff(Duration::from_millis(1)),
    )
    .unwrap();
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
}

#[tokio::test]
async fn test_writes_are_never_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/world-model/attributes"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let payload = symmetric::encrypt(&VaultKey::generate(), b"x").unwrap();
    let err = client(&server)
        .store_attribute(&token("tok-4"), "finance", "income", payload, AttributeMetadata::default())
        .await
        .unwrap_err();

    match err {
        ClientError::WriteFailed {
            domain,
            attribute_key,
            token_id,
            source,
        } => {
            assert_eq!(domain, "finance");
            assert_eq!(attribute_key, "income");
            assert_eq!(token_id.as_deref(), Some("tok-4"));
            assert!(matches!(*source, ClientError::Network(_)));
        }
        other => panic!("expected WriteFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/world-model/metadata"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = VaultClient::new(
        Config::new(server.uri())
            .with_timeout(Duration::from_millis(100))
            .with_max_retries(0),
    )
    .unwrap();
    let err = client.get_metadata(&token("tok-5")).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "{:?}", err);
}

#[tokio::test]
async fn test_consent_errors_are_typed_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/world-model/attributes"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "consent_denied",
            "reason": "revoked",
            "message": "token revoked",
            "requestId": "req-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).get_attributes(&token("tok-6"), None).await.unwrap_err();
    assert!(matches!(err, ClientError::TokenRevoked));
    assert!(err.is_consent_denied());
}

#[tokio::test]
async fn test_scope_mismatch_on_delete_is_not_wrapped() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/world-model/attributes/finance/risk%20tolerance"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "consent_denied",
            "reason": "scope_mismatch",
            "message": "domain.finance.delete is not granted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .delete_attribute(&token("tok-7"), "finance", "risk tolerance")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ScopeMismatch(_)), "{:?}", err);
}

#[tokio::test]
async fn test_unreachable_service() {
    let client = VaultClient::new(
        Config::new("http://127.0.0.1:1")
            .with_connect_timeout(Duration::from_millis(200))
            .with_max_retries(1)
            .with_retry_backoff(Duration::from_millis(1)),
    )
    .unwrap();
    let err = client.health().await.unwrap_err();
    assert!(err.is_transient());
}
