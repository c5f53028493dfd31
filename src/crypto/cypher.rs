use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CypherError;

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Symmetric authenticated encryption.
///
/// Anything encrypted by one instance can only be decrypted by an instance
/// sharing the same key.
pub trait Cypher: Send + Sync {
    /// Encrypts `data`. The output is opaque and self-contained.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CypherError>;

    /// Decrypts data produced by [`Cypher::encrypt`] with the same key.
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CypherError>;
}

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Creates a `SecureKey` from a slice, which must be exactly 32 bytes.
    pub fn from_slice(key: &[u8]) -> Result<Self, CypherError> {
        let bytes: [u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| CypherError::InvalidKeyLength(key.len()))?;
        Ok(Self(bytes))
    }

    /// Parses a key from 64 hexadecimal characters.
    pub fn from_hex(encoded: &str) -> Result<Self, CypherError> {
        let mut bytes =
            hex::decode(encoded.trim()).map_err(|_| CypherError::InvalidKeyLength(encoded.len() / 2))?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    /// Encodes the key as lowercase hexadecimal, suitable for `CYPHER_KEY`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Generates a new random AES-256 key.
pub fn generate_key() -> SecureKey {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    let secure = SecureKey::new(key);
    key.zeroize();
    secure
}

/// Generates a new random AES-GCM nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// [`Cypher`] backed by AES-256-GCM.
///
/// Output layout is `nonce || ciphertext || tag`, with a fresh random
/// 12-byte nonce per call and no associated data.
#[derive(Clone)]
pub struct Aes256Cypher {
    cipher: Aes256Gcm,
}

impl Aes256Cypher {
    /// Creates a cypher with the provided key.
    pub fn new(key: &SecureKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
        }
    }

    /// Creates a cypher from raw key bytes. Fails unless exactly 32 bytes are given.
    pub fn from_slice(key: &[u8]) -> Result<Self, CypherError> {
        Ok(Self::new(&SecureKey::from_slice(key)?))
    }

    /// Creates a cypher with a fresh random key. Nothing encrypted by another
    /// instance can be decrypted by this one.
    pub fn random() -> Self {
        Self::new(&generate_key())
    }
}

impl Cypher for Aes256Cypher {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CypherError> {
        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, data)
            .map_err(|e| CypherError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CypherError> {
        if data.len() < NONCE_SIZE {
            return Err(CypherError::MalformedCiphertext);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CypherError::AuthenticationFailure)
    }
}
