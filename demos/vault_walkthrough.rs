//! Walkthrough of the BYOK vault against a running gateway
//!
//! This demo:
//! - Creates a local vault from a passphrase (the key never leaves the device)
//! - Obtains a scoped consent token with an identity JWT
//! - Stores and reads back an encrypted attribute
//! - Revokes the token and shows the next read being refused
//!
//! Start a gateway first (`byok-gateway --jwt-secret ...`), then run with:
//! BYOK_IDENTITY_JWT=<jwt for alice> cargo run --example vault_walkthrough

use byok_client::{
    platform::{BackendRegistry, BridgeConfig, Platform, PlatformBridge},
    ClientError, Config, VaultClient,
};
use byok_core::AttributeMetadata;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let endpoint = std::env::var("BYOK_ENDPOINT").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let identity = std::env::var("BYOK_IDENTITY_JWT")?;

    let client = VaultClient::new(Config::new(endpoint))?;
    let bridge = PlatformBridge::new(BackendRegistry::with_defaults(), BridgeConfig::default())
        .with_client(client.clone());
    bridge.resolve(Platform::Native)?;

    println!("🔐 Opening vault for 'alice'...");
    let session = if bridge.has_vault("alice").await? {
        bridge.unlock_vault("alice", "correct horse battery staple").await?
    } else {
        bridge.setup_vault("alice", "correct horse battery staple").await?
    };

    println!("\n🎫 Requesting consent for the finance domain...");
    let issued = client
        .issue_token(&identity, "alice", &["domain.finance.*".to_string()], None)
        .await?;
    println!("   token {} expires at {}", issued.token_id, issued.expires_at);

    println!("\n📤 Storing an encrypted attribute...");
    let metadata = AttributeMetadata {
        data_type: "number".into(),
        ..Default::default()
    };
    session
        .store_value(&client, &issued.token, "finance", "income", &json!(85_000), metadata)
        .await?;

    println!("\n📥 Reading it back...");
    for attribute in session.get_decrypted(&client, &issued.token, Some("finance")).await? {
        println!("   {}.{} = {}", attribute.domain, attribute.attribute_key, attribute.value);
    }

    println!("\n🚫 Revoking consent...");
    client.revoke_token(&issued.token).await?;
    match client.get_attributes(&issued.token, Some("finance")).await {
        Err(ClientError::TokenRevoked) => println!("   read refused: token revoked"),
        other => println!("   unexpected: {:?}", other.map(|a| a.len())),
    }

    Ok(())
}
