//! Vault key derivation
//!
//! The vault key is derived from the holder's passphrase with
//! PBKDF2-HMAC-SHA256. Only the salt and iteration count are durable; the
//! derived key lives in memory for the unlocked session and is zeroized on drop.

use crate::{encoding, CryptoError, Result};
use hmac::Hmac;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the vault key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Minimum accepted salt length in bytes
pub const MIN_SALT_SIZE: usize = 16;

/// Length of generated salts in bytes
pub const DEFAULT_SALT_SIZE: usize = 16;

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Lowest iteration count a vault may be created or unlocked with
pub const MIN_ITERATIONS: u32 = 100_000;

/// A 256-bit symmetric vault key
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_SIZE],
}

impl VaultKey {
    /// Generate a random key (not passphrase-bound)
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut key);
        Self { key }
    }

    /// Create a key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "vault key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Parse a hex-encoded key (the `keyHex` form used at the platform boundary)
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let mut bytes = hex::decode(key_hex.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("key is not valid hex: {}", e)))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Hex-encode the key
    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey(***)")
    }
}

/// Durable key-derivation parameters (salt and iteration count)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Salt, hex-encoded on the wire
    #[serde(with = "encoding::hex_serde")]
    pub salt: Vec<u8>,
    /// PBKDF2 iteration count
    pub iterations: u32,
}

impl KdfParams {
    /// Fresh parameters with a random salt and the default iteration count
    pub fn generate() -> Self {
        Self {
            salt: generate_salt().to_vec(),
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Salt as lowercase hex
    pub fn salt_hex(&self) -> String {
        hex::encode(&self.salt)
    }

    /// Re-derive the key for these parameters
    pub fn derive(&self, passphrase: &str) -> Result<VaultKeyMaterial> {
        derive_key(passphrase, Some(&self.salt), self.iterations)
    }
}

/// Salt, iteration count and the key derived from them
pub struct VaultKeyMaterial {
    params: KdfParams,
    key: VaultKey,
}

impl VaultKeyMaterial {
    /// The derived key
    pub fn key(&self) -> &VaultKey {
        &self.key
    }

    /// Take ownership of the derived key
    pub fn into_key(self) -> VaultKey {
        self.key
    }

    /// The durable half of the material
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Salt bytes
    pub fn salt(&self) -> &[u8] {
        &self.params.salt
    }

    /// Iteration count
    pub fn iterations(&self) -> u32 {
        self.params.iterations
    }
}

impl std::fmt::Debug for VaultKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKeyMaterial")
            .field("params", &self.params)
            .field("key", &self.key)
            .finish()
    }
}

/// Result of [`derive_key_hex`]: `{ keyHex, salt }` in the boundary encoding
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct DerivedKeyHex {
    key_hex: String,
    salt: String,
    #[zeroize(skip)]
    iterations: u32,
}

impl DerivedKeyHex {
    /// Hex-encoded 32-byte key
    pub fn key_hex(&self) -> &str {
        &self.key_hex
    }

    /// Hex-encoded salt
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Iteration count used
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl std::fmt::Debug for DerivedKeyHex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyHex")
            .field("key_hex", &"***")
            .field("salt", &self.salt)
            .field("iterations", &self.iterations)
            .finish()
    }
}

/// Generate a random salt
pub fn generate_salt() -> [u8; DEFAULT_SALT_SIZE] {
    let mut salt = [0u8; DEFAULT_SALT_SIZE];
    rand::RngCore::fill_bytes(&mut OsRng, &mut salt);
    salt
}

/// Derive a vault key with PBKDF2-HMAC-SHA256.
///
/// A random salt is generated when `salt` is `None`. Identical
/// `(passphrase, salt, iterations)` always yield the identical key.
pub fn derive_key(passphrase: &str, salt: Option<&[u8]>, iterations: u32) -> Result<VaultKeyMaterial> {
    if passphrase.is_empty() {
        return Err(CryptoError::KeyDerivation("passphrase must not be empty".to_string()));
    }
    if iterations < MIN_ITERATIONS {
        return Err(CryptoError::KeyDerivation(format!(
            "iterations must be at least {}, got {}",
            MIN_ITERATIONS, iterations
        )));
    }

    let salt = match salt {
        Some(s) => s.to_vec(),
        None => generate_salt().to_vec(),
    };
    if salt.len() < MIN_SALT_SIZE {
        return Err(CryptoError::KeyDerivation(format!(
            "salt must be at least {} bytes, got {}",
            MIN_SALT_SIZE,
            salt.len()
        )));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), &salt, iterations, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let vault_key = VaultKey { key };
    key.zeroize();

    Ok(VaultKeyMaterial {
        params: KdfParams { salt, iterations },
        key: vault_key,
    })
}

/// Derive a key taking and returning the hex boundary encoding.
///
/// `salt_hex` is hex-decoded to bytes before derivation on every platform.
pub fn derive_key_hex(passphrase: &str, salt_hex: Option<&str>, iterations: u32) -> Result<DerivedKeyHex> {
    let salt = match salt_hex {
        Some(s) => Some(
            hex::decode(s.trim())
                .map_err(|e| CryptoError::KeyDerivation(format!("salt is not valid hex: {}", e)))?,
        ),
        None => None,
    };
    let material = derive_key(passphrase, salt.as_deref(), iterations)?;
    Ok(DerivedKeyHex {
        key_hex: material.key().to_hex(),
        salt: material.params().salt_hex(),
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_SALT: &str = "000102030405060708090a0b0c0d0e0f";
    const FIXTURE_KEY: &str = "49d49c25f597846209f0d92e7770ab64e1c75e94b4ce6c509265ee67175d2a1e";

    #[test]
    fn test_pinned_derivation_fixture() {
        let derived = derive_key_hex("correct horse battery staple", Some(FIXTURE_SALT), 100_000).unwrap();
        assert_eq!(derived.key_hex(), FIXTURE_KEY);
        assert_eq!(derived.key_hex().len(), 64);
        assert_eq!(derived.salt(), FIXTURE_SALT);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = generate_salt();
        let a = derive_key("passphrase", Some(&salt), MIN_ITERATIONS).unwrap();
        let b = derive_key("passphrase", Some(&salt), MIN_ITERATIONS).unwrap();
        assert_eq!(a.key().as_bytes(), b.key().as_bytes());
    }

    #[test]
    fn test_random_salt_when_omitted() {
        let a = derive_key("passphrase", None, MIN_ITERATIONS).unwrap();
        let b = derive_key("passphrase", None, MIN_ITERATIONS).unwrap();
        assert!(a.salt().len() >= MIN_SALT_SIZE);
        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.key().as_bytes(), b.key().as_bytes());
    }

    #[test]
    fn test_rejects_weak_parameters() {
        assert!(matches!(
            derive_key("p", Some(&[0u8; 8]), MIN_ITERATIONS),
            Err(CryptoError::KeyDerivation(_))
        ));
        assert!(matches!(
            derive_key("p", None, 1_000),
            Err(CryptoError::KeyDerivation(_))
        ));
        assert!(matches!(
            derive_key("", None, MIN_ITERATIONS),
            Err(CryptoError::KeyDerivation(_))
        ));
        assert!(matches!(
            derive_key_hex("p", Some("not-hex"), MIN_ITERATIONS),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn test_key_hex_roundtrip() {
        let key = VaultKey::generate();
        let parsed = VaultKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
        assert!(VaultKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = VaultKey::generate();
        assert_eq!(format!("{:?}", key), "VaultKey(***)");
        let derived = derive_key_hex("p", Some(FIXTURE_SALT), MIN_ITERATIONS).unwrap();
        assert!(!format!("{:?}", derived).contains(derived.key_hex()));
    }

    #[test]
    fn test_kdf_params_serialize_salt_as_hex() {
        let params = KdfParams {
            salt: hex::decode(FIXTURE_SALT).unwrap(),
            iterations: 100_000,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["salt"], FIXTURE_SALT);
        assert_eq!(json["iterations"], 100_000);
    }
}
