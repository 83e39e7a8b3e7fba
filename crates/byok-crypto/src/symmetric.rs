//! Authenticated encryption with AES-256-GCM
//!
//! Every call generates a fresh 96-bit IV. The 128-bit tag that the AEAD
//! primitive appends to its output is split off at the 16-byte boundary from
//! the end and carried as its own field, then recombined before decryption.

use crate::{encoding, keys::VaultKey, CryptoError, Result};
use aes_gcm::{aead::Aead as AeadTrait, Aes256Gcm, KeyInit};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Size of the IV in bytes (96 bits)
pub const IV_SIZE: usize = 12;

/// Size of the authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Algorithm identifier carried in every payload
pub const ALGORITHM: &str = "aes-256-gcm";

/// Encoding identifier carried in every payload
pub const ENCODING: &str = "base64";

/// An IV for AES-GCM
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generate a random IV from the OS CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IV_SIZE {
            return Err(CryptoError::Decoding(format!(
                "iv must be {} bytes, got {}",
                IV_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; IV_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the IV bytes
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.bytes
    }
}

fn default_encoding() -> String {
    ENCODING.to_string()
}

fn default_algorithm() -> String {
    ALGORITHM.to_string()
}

/// Encrypted value in its wire shape
///
/// ```json
/// { "ciphertext": "<base64>", "iv": "<base64>", "tag": "<base64>",
///   "encoding": "base64", "algorithm": "aes-256-gcm" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Ciphertext without the tag
    pub ciphertext: String,
    /// 12-byte IV
    pub iv: String,
    /// 16-byte authentication tag
    pub tag: String,
    /// Always "base64"
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Always "aes-256-gcm"
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

/// Decoded components of an [`EncryptedPayload`]
struct DecodedPayload {
    ciphertext: Vec<u8>,
    iv: Iv,
    tag: [u8; TAG_SIZE],
}

impl EncryptedPayload {
    fn from_parts(iv: &Iv, mut sealed: Vec<u8>) -> Result<Self> {
        if sealed.len() < TAG_SIZE {
            return Err(CryptoError::Encryption("AEAD output shorter than its tag".to_string()));
        }
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);
        Ok(Self {
            ciphertext: encoding::to_base64(&sealed),
            iv: encoding::to_base64(iv.as_bytes()),
            tag: encoding::to_base64(&tag),
            encoding: default_encoding(),
            algorithm: default_algorithm(),
        })
    }

    /// Check the payload is structurally well formed without decrypting it
    pub fn validate(&self) -> Result<()> {
        self.decode().map(|_| ())
    }

    /// Length of the ciphertext in bytes (equal to the plaintext length)
    pub fn ciphertext_len(&self) -> Result<usize> {
        Ok(self.decode()?.ciphertext.len())
    }

    fn decode(&self) -> Result<DecodedPayload> {
        if !self.algorithm.eq_ignore_ascii_case(ALGORITHM) {
            return Err(CryptoError::Decoding(format!(
                "unsupported algorithm: {}",
                self.algorithm
            )));
        }
        if self.encoding != ENCODING {
            return Err(CryptoError::Decoding(format!(
                "unsupported encoding: {}",
                self.encoding
            )));
        }

        let iv = Iv::from_bytes(&encoding::from_base64("iv", &self.iv)?)?;
        let tag_bytes = encoding::from_base64("tag", &self.tag)?;
        if tag_bytes.len() != TAG_SIZE {
            return Err(CryptoError::Decoding(format!(
                "tag must be {} bytes, got {}",
                TAG_SIZE,
                tag_bytes.len()
            )));
        }
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&tag_bytes);
        let ciphertext = encoding::from_base64("ciphertext", &self.ciphertext)?;

        Ok(DecodedPayload { ciphertext, iv, tag })
    }
}

/// AES-256-GCM bound to one vault key
pub struct VaultCipher {
    cipher: Aes256Gcm,
}

impl VaultCipher {
    /// Create a cipher for the given key
    pub fn new(key: &VaultKey) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt under a fresh random IV
    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        self.seal_with_iv(&Iv::generate(), plaintext)
    }

    fn seal_with_iv(&self, iv: &Iv, plaintext: &[u8]) -> Result<EncryptedPayload> {
        let nonce = aes_gcm::Nonce::from_slice(iv.as_bytes());
        let sealed = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        EncryptedPayload::from_parts(iv, sealed)
    }

    /// Verify the tag and decrypt; no bytes are returned unless the tag verifies
    pub fn open(&self, payload: &EncryptedPayload) -> Result<Vec<u8>> {
        let DecodedPayload { mut ciphertext, iv, tag } = payload.decode()?;
        ciphertext.extend_from_slice(&tag);
        let nonce = aes_gcm::Nonce::from_slice(iv.as_bytes());
        self.cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| CryptoError::Authentication)
    }
}

/// Encrypt with a typed key (convenience function)
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<EncryptedPayload> {
    VaultCipher::new(key)?.seal(plaintext)
}

/// Decrypt with a typed key (convenience function)
pub fn decrypt(key: &VaultKey, payload: &EncryptedPayload) -> Result<Vec<u8>> {
    VaultCipher::new(key)?.open(payload)
}

/// Encrypt with a hex-encoded key
pub fn encrypt_data(key_hex: &str, plaintext: &[u8]) -> Result<EncryptedPayload> {
    encrypt(&VaultKey::from_hex(key_hex)?, plaintext)
}

/// Decrypt with a hex-encoded key
pub fn decrypt_data(key_hex: &str, payload: &EncryptedPayload) -> Result<Vec<u8>> {
    decrypt(&VaultKey::from_hex(key_hex)?, payload)
}
