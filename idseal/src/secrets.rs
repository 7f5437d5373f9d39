//! Symmetric secrets supplied by configuration: the storage key and the
//! blind-index key. Both are opaque and immutable once loaded.

use crate::error::Error;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretVec};
use std::fmt;
use tracing::warn;

/// Storage key size in bytes (256 bits).
pub const STORAGE_KEY_SIZE: usize = 32;

/// Recommended minimum blind-index key size in bytes.
pub const RECOMMENDED_INDEX_KEY_SIZE: usize = 32;

/// Key for the randomized at-rest cipher.
pub struct StorageKey(SecretVec<u8>);

impl StorageKey {
    /// Wraps raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` unless `bytes` is exactly 32 bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() != STORAGE_KEY_SIZE {
            return Err(Error::Configuration(format!(
                "storage key must be {STORAGE_KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(SecretVec::new(bytes)))
    }

    /// Parses a base64 key, standard or URL-safe alphabet.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the text is not base64 or does not
    /// decode to 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let encoded = encoded.trim();
        let bytes = STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .map_err(|_| Error::Configuration("storage key is not valid base64".to_string()))?;
        Self::from_bytes(bytes)
    }

    /// Generates a random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(SecretVec::new(random_bytes(STORAGE_KEY_SIZE)))
    }

    /// Renders the key as standard base64, for provisioning.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.expose_secret())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageKey").field(&"[REDACTED]").finish()
    }
}

/// Key for the blind-index MAC. Independent of every other key.
pub struct IndexKey(SecretVec<u8>);

impl IndexKey {
    /// Wraps raw key bytes. Any non-empty length is accepted; keys shorter
    /// than 32 bytes are logged as weak.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if `bytes` is empty.
    pub fn new(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::Configuration("blind index secret is empty".to_string()));
        }
        if bytes.len() < RECOMMENDED_INDEX_KEY_SIZE {
            warn!(
                len = bytes.len(),
                recommended = RECOMMENDED_INDEX_KEY_SIZE,
                "blind index secret is shorter than recommended"
            );
        }
        Ok(Self(SecretVec::new(bytes)))
    }

    /// Generates a random 32-byte key.
    #[must_use]
    pub fn generate() -> Self {
        Self(SecretVec::new(random_bytes(RECOMMENDED_INDEX_KEY_SIZE)))
    }

    /// Renders the key as lowercase hex. Hex text is valid UTF-8, so it can
    /// be fed back through configuration verbatim.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.expose_secret())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IndexKey").field(&"[REDACTED]").finish()
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_from_base64() {
        let key = StorageKey::generate();
        let parsed = StorageKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.expose(), parsed.expose());
    }

    #[test]
    fn test_storage_key_accepts_url_safe_alphabet() {
        // 0xfb 0xff encodes to "+/" in standard and "-_" in URL-safe base64
        let bytes = [0xfbu8, 0xff].repeat(16);
        let encoded = URL_SAFE.encode(&bytes);
        assert!(encoded.contains('-') || encoded.contains('_'));

        let key = StorageKey::from_base64(&encoded).unwrap();
        assert_eq!(key.expose(), &bytes[..]);
    }

    #[test]
    fn test_storage_key_wrong_length() {
        let result = StorageKey::from_base64(&STANDARD.encode([1u8; 16]));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_storage_key_not_base64() {
        let result = StorageKey::from_base64("definitely not base64!");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(StorageKey::generate().expose(), StorageKey::generate().expose());
        assert_ne!(IndexKey::generate().expose(), IndexKey::generate().expose());
    }

    #[test]
    fn test_index_key_rejects_empty() {
        assert!(matches!(IndexKey::new(Vec::new()), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_index_key_accepts_short_secret() {
        let key = IndexKey::new(b"short".to_vec()).unwrap();
        assert_eq!(key.expose(), b"short");
    }

    #[test]
    fn test_index_key_hex() {
        let key = IndexKey::generate();
        assert_eq!(key.to_hex().len(), RECOMMENDED_INDEX_KEY_SIZE * 2);
    }

    #[test]
    fn test_debug_redacts() {
        assert_eq!(format!("{:?}", StorageKey::generate()), "StorageKey(\"[REDACTED]\")");
        assert_eq!(format!("{:?}", IndexKey::generate()), "IndexKey(\"[REDACTED]\")");
    }
}
