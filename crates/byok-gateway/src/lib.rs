//! # BYOK Gateway
//!
//! Reference HTTP service for the bring-your-own-key vault.
//!
//! This crate provides:
//! - **Consent API**: issue, validate and revoke scoped consent tokens
//! - **Trust links**: signed agent-to-agent delegation of one scope
//! - **World model**: consent-gated storage of client-encrypted attributes
//! - **Identity**: HS256 JWT verification of the holder's primary credential
//! - **Rate limiting**: per-client request throttling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │        (byok-client SDK, agents, curl, etc.)        │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                    BYOK Gateway                     │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Rate Limiter │ CORS │ Body Limit      │
//! ├─────────────────────────────────────────────────────┤
//! │        Consent / Trust Link / World Model           │
//! │                     Handlers                        │
//! ├─────────────────────────────────────────────────────┤
//! │                     byok-core                       │
//! │  (ConsentAuthority, TrustLinkAuthority, WorldModel) │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway never holds a vault key. Attribute payloads arrive and leave
//! as AES-256-GCM ciphertext.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use server::{run_server, run_server_with_shutdown, serve};
pub use state::AppState;
