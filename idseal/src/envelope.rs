//! Hybrid decryption of client envelopes.
//!
//! A client fetches the server's public key, encrypts its payload with a
//! one-time AES-GCM key, wraps that key with RSA-OAEP (SHA-256 digest and
//! MGF1-SHA-256), and sends the pieces over as an [`Envelope`].
//!
//! Every failure on the way back to plaintext (OAEP padding, content key
//! length, IV or tag shape, GCM tag mismatch, invalid UTF-8) is reported as
//! the same [`Error::DecryptionFailed`]. Nothing about the cause crosses the
//! interface, which is what keeps the RSA step from acting as a padding
//! oracle.

use crate::error::Error;
use crate::keystore::KeyStore;
use crate::plaintext::PlaintextRecord;
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, Nonce, Tag};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::Oaep;
use secrecy::{ExposeSecret, SecretVec};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroize;

/// AES-GCM IV size accepted from clients (96 bits).
pub const IV_SIZE: usize = 12;

/// AES-GCM tag size (128 bits).
pub const TAG_SIZE: usize = 16;

/// A client-built encrypted package, consumed once by [`EnvelopeDecryptor`].
///
/// All fields are raw bytes; undoing the transport encoding is the caller's
/// job (see [`EncodedEnvelope`] for the common base64 JSON shape).
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    wrapped_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Option<Vec<u8>>,
}

impl Envelope {
    /// Creates an envelope whose ciphertext carries the GCM tag appended, as
    /// WebCrypto's `AES-GCM` encrypt produces it.
    #[must_use]
    pub fn new(wrapped_key: Vec<u8>, iv: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self { wrapped_key, iv, ciphertext, tag: None }
    }

    /// Supplies the GCM tag separately from the ciphertext.
    #[must_use]
    pub fn with_tag(mut self, tag: Vec<u8>) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Returns the RSA-wrapped content key.
    #[must_use]
    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }

    /// Returns the IV.
    #[must_use]
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Returns the payload ciphertext.
    #[must_use]
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Returns the detached tag, if one was supplied.
    #[must_use]
    pub fn tag(&self) -> Option<&[u8]> {
        self.tag.as_deref()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("wrapped_key_len", &self.wrapped_key.len())
            .field("iv_len", &self.iv.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .field("tag_len", &self.tag.as_ref().map(Vec::len))
            .finish()
    }
}

/// Envelope as browsers usually send it: standard base64 fields in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedEnvelope {
    /// Base64 RSA-OAEP wrapped AES key.
    pub encrypted_key: String,
    /// Base64 AES-GCM IV.
    pub iv: String,
    /// Base64 payload ciphertext.
    pub encrypted_data: String,
    /// Base64 GCM tag, when not appended to `encrypted_data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_tag: Option<String>,
}

impl EncodedEnvelope {
    /// Decodes the base64 fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::DecryptionFailed` if any field is not valid base64,
    /// the same outcome as every other unusable envelope.
    pub fn decode(&self) -> Result<Envelope, Error> {
        let field = |value: &str| STANDARD.decode(value.trim()).map_err(|_| Error::DecryptionFailed);

        let envelope =
            Envelope::new(field(&self.encrypted_key)?, field(&self.iv)?, field(&self.encrypted_data)?);

        match &self.auth_tag {
            Some(tag) => Ok(envelope.with_tag(field(tag)?)),
            None => Ok(envelope),
        }
    }
}

impl From<&Envelope> for EncodedEnvelope {
    fn from(envelope: &Envelope) -> Self {
        Self {
            encrypted_key: STANDARD.encode(&envelope.wrapped_key),
            iv: STANDARD.encode(&envelope.iv),
            encrypted_data: STANDARD.encode(&envelope.ciphertext),
            auth_tag: envelope.tag.as_ref().map(|tag| STANDARD.encode(tag)),
        }
    }
}

/// Unit marker for an internal rejection; the cause is dropped on purpose.
struct Rejected;

/// Decrypts client envelopes with the server's private key.
///
/// Stateless apart from the shared [`KeyStore`], so one instance can serve
/// any number of threads.
#[derive(Debug, Clone)]
pub struct EnvelopeDecryptor {
    keys: Arc<KeyStore>,
}

impl EnvelopeDecryptor {
    /// Creates a decryptor over the process key store.
    #[must_use]
    pub const fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    /// Unwraps the content key, decrypts and authenticates the payload, and
    /// decodes it as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `Error::DecryptionFailed` for every failure, whatever the
    /// cause.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<PlaintextRecord, Error> {
        self.try_decrypt(envelope).map_err(|Rejected| {
            debug!("envelope rejected");
            Error::DecryptionFailed
        })
    }

    fn try_decrypt(&self, envelope: &Envelope) -> Result<PlaintextRecord, Rejected> {
        let content_key = self.unwrap_content_key(&envelope.wrapped_key)?;

        let mut buffer = envelope.ciphertext.clone();
        let tag = match &envelope.tag {
            Some(tag) => tag.clone(),
            None => {
                let split = buffer.len().checked_sub(TAG_SIZE).ok_or(Rejected)?;
                buffer.split_off(split)
            }
        };

        let opened = match content_key.expose_secret().len() {
            16 => open_detached::<Aes128Gcm>(content_key.expose_secret(), &envelope.iv, &mut buffer, &tag),
            32 => open_detached::<Aes256Gcm>(content_key.expose_secret(), &envelope.iv, &mut buffer, &tag),
            _ => Err(Rejected),
        };
        if opened.is_err() {
            buffer.zeroize();
            return Err(Rejected);
        }

        String::from_utf8(buffer).map(PlaintextRecord::new).map_err(|e| {
            e.into_bytes().zeroize();
            Rejected
        })
    }

    fn unwrap_content_key(&self, wrapped_key: &[u8]) -> Result<SecretVec<u8>, Rejected> {
        self.keys
            .private_key()
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), wrapped_key)
            .map(SecretVec::new)
            .map_err(|_| Rejected)
    }
}

/// AES-GCM decryption with a detached tag, verified before the buffer is
/// released to the caller.
fn open_detached<C>(key: &[u8], iv: &[u8], buffer: &mut Vec<u8>, tag: &[u8]) -> Result<(), Rejected>
where
    C: KeyInit + AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    if iv.len() != IV_SIZE || tag.len() != TAG_SIZE {
        return Err(Rejected);
    }

    let cipher = C::new_from_slice(key).map_err(|_| Rejected)?;
    cipher
        .decrypt_in_place_detached(
            Nonce::<C>::from_slice(iv),
            b"",
            buffer.as_mut_slice(),
            Tag::<C>::from_slice(tag),
        )
        .map_err(|_| Rejected)
}
