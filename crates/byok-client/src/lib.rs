//! # BYOK Client SDK
//!
//! Holder-side SDK for the bring-your-own-key vault.
//!
//! ## Features
//!
//! - **Local encryption**: values are sealed with the vault key before they
//!   leave the device; the service stores ciphertext only
//! - **Consent tokens**: every attribute call carries a scoped, expiring token,
//!   as a bearer header or a body field depending on the route
//! - **Bounded network behavior**: every request has a timeout; reads retry a
//!   bounded number of times, writes never retry
//! - **Platform bridge**: one interface, resolved once to a native or web backend
//!
//! ## Example
//!
//! ```rust,ignore
//! use byok_client::{Config, VaultClient, platform::{BackendRegistry, BridgeConfig, Platform, PlatformBridge}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = VaultClient::new(Config::new("http://localhost:8080"))?;
//!     let bridge = PlatformBridge::new(BackendRegistry::with_defaults(), BridgeConfig::default())
//!         .with_client(client.clone());
//!     bridge.resolve(Platform::Native)?;
//!
//!     let session = bridge.setup_vault("alice", "correct horse battery staple").await?;
//!     let token = client
//!         .issue_token(&identity_jwt, "alice", &["domain.finance.*".into()], None)
//!         .await?;
//!
//!     session
//!         .store_value(&client, &token.token, "finance", "income", &85_000, Default::default())
//!         .await?;
//!     let values = session.get_decrypted(&client, &token.token, Some("finance")).await?;
//!     println!("{:?}", values);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
pub mod platform;
mod session;
mod vault;

pub use client::VaultClient;
pub use config::Config;
pub use error::{ClientError, Result};
pub use platform::{BackendRegistry, BridgeConfig, BridgeState, Platform, PlatformBridge, VaultBackend};
pub use session::{DecryptedAttribute, VaultSession};
pub use vault::VaultRecord;
