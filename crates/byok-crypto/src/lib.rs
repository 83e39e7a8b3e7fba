//! # BYOK Crypto
//!
//! Cryptographic primitives for the bring-your-own-key personal data vault.
//!
//! This crate provides:
//! - **Key Derivation**: PBKDF2-HMAC-SHA256 from a passphrase and salt to a 256-bit vault key
//! - **Symmetric Encryption**: AES-256-GCM with the tag carried separately from the ciphertext
//! - **Signing Keys**: Domain-separated HMAC-SHA256 for consent tokens and trust links
//!
//! ## Security Model
//!
//! - The vault key is derived and held on the holder's device only
//! - Plaintext is encrypted before it crosses any process or network boundary
//! - Key material is zeroized when dropped
//!
//! ## Cross-platform contract
//!
//! Identical `(passphrase, salt, iterations)` produce the identical key on every
//! conforming runtime, and an [`EncryptedPayload`] produced on one runtime decrypts
//! on any other holding the same key.
//!
//! ## Example
//!
//! ```rust
//! use byok_crypto::{derive_key, symmetric};
//!
//! let material = derive_key("correct horse battery staple", None, 100_000).unwrap();
//! let payload = symmetric::encrypt(material.key(), b"hello vault").unwrap();
//! let plaintext = symmetric::decrypt(material.key(), &payload).unwrap();
//! assert_eq!(plaintext, b"hello vault");
//! ```

pub mod encoding;
pub mod error;
pub mod keys;
pub mod signing;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use keys::{derive_key, derive_key_hex, generate_salt, DerivedKeyHex, KdfParams, VaultKey, VaultKeyMaterial};
pub use signing::{Signature, SigningKey};
pub use symmetric::{decrypt_data, encrypt_data, EncryptedPayload, Iv, VaultCipher};

/// Version of the payload and token formats produced by this crate
pub const CRYPTO_VERSION: u8 = 1;
