//! Storage blob wire format.
//!
//! A blob is self-contained: everything `open` needs apart from the key.
//!
//! ```text
//! [version:1][nonce:12][ciphertext:N][tag:16]
//! ```
//!
//! The raw bytes are rendered as URL-safe base64 without padding, which is
//! the only form blobs are handed to callers in.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Current blob format version: ChaCha20-Poly1305, 96-bit random nonce.
pub const BLOB_VERSION: u8 = 1;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// Why a blob failed to parse. Never surfaced to callers; every variant
/// collapses into the same decryption failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlobFormatError {
    Encoding,
    Truncated,
    UnsupportedVersion(u8),
}

/// A parsed storage blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlobParts {
    pub(crate) version: u8,
    pub(crate) nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag appended.
    pub(crate) sealed: Vec<u8>,
}

impl BlobParts {
    pub(crate) const fn new(nonce: [u8; NONCE_SIZE], sealed: Vec<u8>) -> Self {
        Self { version: BLOB_VERSION, nonce, sealed }
    }

    /// Associated data binding the version byte to the ciphertext.
    pub(crate) fn aad(&self) -> [u8; 1] {
        [self.version]
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.sealed.len());
        bytes.push(self.version);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.sealed);
        bytes
    }

    pub(crate) fn from_bytes(data: &[u8]) -> Result<Self, BlobFormatError> {
        let (&version, rest) = data.split_first().ok_or(BlobFormatError::Truncated)?;

        if version != BLOB_VERSION {
            return Err(BlobFormatError::UnsupportedVersion(version));
        }

        if rest.len() < NONCE_SIZE + TAG_SIZE {
            return Err(BlobFormatError::Truncated);
        }

        let (nonce, sealed) = rest.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| BlobFormatError::Truncated)?;

        Ok(Self { version, nonce, sealed: sealed.to_vec() })
    }

    pub(crate) fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes())
    }

    pub(crate) fn decode(text: &str) -> Result<Self, BlobFormatError> {
        let bytes = URL_SAFE_NO_PAD.decode(text).map_err(|_| BlobFormatError::Encoding)?;
        Self::from_bytes(&bytes)
    }
}
