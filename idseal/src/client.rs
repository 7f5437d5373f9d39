//! Client-side envelope construction.
//!
//! Mirrors what a browser does with WebCrypto before calling the server:
//! a one-time AES-GCM key encrypts the payload, RSA-OAEP-SHA-256 wraps the
//! key. Used by the integration tests and by `idseal envelope` to produce
//! test traffic; servers never need it.

use crate::envelope::{Envelope, IV_SIZE, TAG_SIZE};
use crate::error::Error;
use aes_gcm::aead::{AeadInPlace, KeyInit, Nonce};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Content key size used by [`seal_envelope`] (AES-256).
pub const CONTENT_KEY_SIZE: usize = 32;

/// Encrypts `plaintext` for the holder of `public_key_pem` under a fresh
/// random AES-256 key and IV, returning an envelope with a detached tag.
///
/// # Errors
///
/// Returns `Error::Configuration` if the PEM is not an RSA public key and
/// `Error::EncryptionFailed` if encryption fails.
pub fn seal_envelope(public_key_pem: &str, plaintext: &[u8]) -> Result<Envelope, Error> {
    let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_SIZE]);
    OsRng.fill_bytes(&mut *content_key);
    seal_envelope_with_key(public_key_pem, &*content_key, plaintext)
}

/// Like [`seal_envelope`], with a caller-chosen AES-128 or AES-256 key.
///
/// # Errors
///
/// Returns `Error::Configuration` if the PEM is not an RSA public key or the
/// key is neither 16 nor 32 bytes, and `Error::EncryptionFailed` if
/// encryption fails.
pub fn seal_envelope_with_key(
    public_key_pem: &str,
    content_key: &[u8],
    plaintext: &[u8],
) -> Result<Envelope, Error> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| Error::Configuration(format!("invalid RSA public key: {e}")))?;

    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut ciphertext = plaintext.to_vec();
    // Both key sizes share the 96-bit nonce type
    let nonce = Nonce::<Aes256Gcm>::from_slice(&iv);
    let tag = match content_key.len() {
        16 => Aes128Gcm::new_from_slice(content_key)
            .map_err(|e| Error::EncryptionFailed(e.to_string()))?
            .encrypt_in_place_detached(nonce, b"", &mut ciphertext),
        32 => Aes256Gcm::new_from_slice(content_key)
            .map_err(|e| Error::EncryptionFailed(e.to_string()))?
            .encrypt_in_place_detached(nonce, b"", &mut ciphertext),
        other => {
            return Err(Error::Configuration(format!(
                "content key must be 16 or 32 bytes, got {other}"
            )))
        }
    }
    .map_err(|e| Error::EncryptionFailed(format!("AES-GCM encryption failed: {e}")))?;
    debug_assert_eq!(tag.len(), TAG_SIZE);

    let wrapped_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), content_key)
        .map_err(|e| Error::EncryptionFailed(format!("RSA-OAEP key wrap failed: {e}")))?;

    Ok(Envelope::new(wrapped_key, iv.to_vec(), ciphertext).with_tag(tag.to_vec()))
}
