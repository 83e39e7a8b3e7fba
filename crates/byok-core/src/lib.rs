//! # BYOK Core
//!
//! Consent and data-contract layer of the personal data vault.
//!
//! - [`consent`]: scoped, expiring, revocable consent tokens and the
//!   authority that issues and validates them
//! - [`trust_link`]: signed agent-to-agent delegation of a single scope
//! - [`attribute`]: encrypted world-model attributes and their store
//! - [`world_model`]: consent-gated reads, writes and structural summaries
//! - [`api`]: JSON bodies exchanged between client and gateway
//!
//! No code in this crate ever sees plaintext attribute values.

pub mod api;
pub mod attribute;
pub mod consent;
pub mod error;
pub mod scope;
pub mod time;
pub mod trust_link;
pub mod world_model;

pub use attribute::{AttributeMetadata, AttributeRepository, MemoryAttributeRepository, WorldModelAttribute};
pub use consent::{
    peek_token_id, AuthorityConfig, ConsentAuthority, ConsentToken, IdentityVerifier, IssuedToken,
    MemoryRevocationStore, RevocationStore, TokenValidation, ValidationFailure, VerifiedConsent,
    VerifiedIdentity,
};
pub use error::{CoreError, Result};
pub use scope::{ConsentScope, ScopeAction, ScopeSet};
pub use trust_link::{TrustLink, TrustLinkAuthority, TrustLinkRequest, TrustLinkVerification};
pub use world_model::{
    DeleteAttributeResult, DomainSummary, StoreAttributeResult, WorldModelIndex, WorldModelMetadata,
    WorldModelService,
};
