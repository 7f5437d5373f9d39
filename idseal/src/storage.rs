//! Randomized authenticated encryption for values at rest.
//!
//! Every call to [`StorageCipher::seal`] draws a fresh random nonce, so
//! sealing the same value twice yields two different blobs. Equality search
//! is the job of the [blind index](crate::blind_index), never of the blob.

use crate::blob::{BlobParts, BLOB_VERSION, NONCE_SIZE};
use crate::error::Error;
use crate::plaintext::PlaintextRecord;
use crate::secrets::StorageKey;
use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Nonce,
};
use std::fmt;
use tracing::debug;
use zeroize::Zeroize;

/// Opaque, self-contained ciphertext of a stored value.
///
/// Text-safe (URL-safe base64), so it can live in a `TEXT`/`VARCHAR` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBlob(String);

impl StorageBlob {
    /// Returns the blob as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the blob, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for StorageBlob {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for StorageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seals and opens storage blobs with ChaCha20-Poly1305.
///
/// # Example
///
/// ```
/// use idseal::secrets::StorageKey;
/// use idseal::storage::StorageCipher;
///
/// let cipher = StorageCipher::new(StorageKey::generate());
///
/// let first = cipher.seal("AB1234567").unwrap();
/// let second = cipher.seal("AB1234567").unwrap();
/// assert_ne!(first, second);
///
/// assert_eq!(cipher.open(&first).unwrap().expose(), "AB1234567");
/// ```
pub struct StorageCipher {
    cipher: ChaCha20Poly1305,
}

impl StorageCipher {
    /// Creates a storage cipher from the configured key.
    #[must_use]
    pub fn new(key: StorageKey) -> Self {
        let cipher = ChaCha20Poly1305::new(key.expose().into());
        Self { cipher }
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns `Error::EncryptionFailed` only if the input exceeds the
    /// cipher's length limit.
    pub fn seal(&self, plaintext: &str) -> Result<StorageBlob, Error> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let aad = [BLOB_VERSION];
        let sealed = self
            .cipher
            .encrypt(
                &Nonce::from(nonce_bytes),
                Payload { msg: plaintext.as_bytes(), aad: &aad },
            )
            .map_err(|e| Error::EncryptionFailed(format!("ChaCha20-Poly1305 encryption failed: {e}")))?;

        Ok(StorageBlob(BlobParts::new(nonce_bytes, sealed).encode()))
    }

    /// Decrypts and authenticates a blob produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns `Error::DecryptionFailed` for any tampered, truncated,
    /// malformed or foreign blob, and for a blob sealed under another key.
    pub fn open(&self, blob: &StorageBlob) -> Result<PlaintextRecord, Error> {
        let parts = BlobParts::decode(blob.as_str()).map_err(|reason| {
            debug!(?reason, "storage blob rejected");
            Error::DecryptionFailed
        })?;

        let plaintext = self
            .cipher
            .decrypt(
                &Nonce::from(parts.nonce),
                Payload { msg: &parts.sealed, aad: &parts.aad() },
            )
            .map_err(|_| {
                debug!("storage blob rejected");
                Error::DecryptionFailed
            })?;

        String::from_utf8(plaintext).map(PlaintextRecord::new).map_err(|e| {
            e.into_bytes().zeroize();
            Error::DecryptionFailed
        })
    }
}

impl fmt::Debug for StorageCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCipher").field("cipher", &"ChaCha20-Poly1305").finish()
    }
}
