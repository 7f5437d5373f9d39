//! Key source abstraction for the server's RSA key pair.
//!
//! A [`KeySource`] decides where the private key lives: a PEM file on disk
//! (see the `idseal-key-file` crate), a value injected by a secret manager
//! ([`PemKeySource`]), or an HSM/vault-backed implementation. The
//! [`KeyStore`](crate::keystore::KeyStore) and everything downstream of it
//! are unaware of which one is in use.

use crate::error::KeySourceError;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Smallest RSA modulus accepted, in bits.
pub const MIN_KEY_BITS: usize = 2048;

/// Public exponent used for generated keys.
pub const PUBLIC_EXPONENT: u32 = 65_537;

/// Provides the server's RSA private key.
///
/// Implementations must be thread-safe (`Send + Sync`). `load_or_generate`
/// is called once per process during startup; a source that cannot produce
/// a key must fail rather than hand back a placeholder.
///
/// # Example
///
/// ```rust,ignore
/// use idseal::key_source::KeySource;
///
/// struct VaultKeySource { /* client handle */ }
///
/// impl KeySource for VaultKeySource {
///     fn load_or_generate(&self) -> Result<RsaPrivateKey, KeySourceError> {
///         let pem = self.fetch_pem()?;
///         idseal::key_source::decode_private_key_pem(&pem)
///     }
///
///     fn describe(&self) -> String {
///         "vault:secret/idseal".to_string()
///     }
/// }
/// ```
pub trait KeySource: Send + Sync {
    /// Returns the stored private key, generating and persisting one first
    /// if the source supports that and nothing is stored yet.
    ///
    /// # Errors
    ///
    /// Returns `KeySourceError::Malformed` if stored key material cannot be
    /// decoded, `KeySourceError::PersistFailed` if a generated key could not
    /// be saved, and `KeySourceError::NotFound` if the source holds no key
    /// and cannot create one.
    fn load_or_generate(&self) -> Result<RsaPrivateKey, KeySourceError>;

    /// A non-secret label identifying where the key comes from, for logs.
    fn describe(&self) -> String;
}

/// Key source backed by a PEM string supplied from outside the process,
/// e.g. an environment variable populated by a secret manager.
///
/// It never generates keys.
pub struct PemKeySource {
    pem: SecretString,
}

impl PemKeySource {
    /// Creates a key source from PKCS#8 or PKCS#1 PEM text.
    #[must_use]
    pub const fn new(pem: SecretString) -> Self {
        Self { pem }
    }
}

impl KeySource for PemKeySource {
    fn load_or_generate(&self) -> Result<RsaPrivateKey, KeySourceError> {
        let pem = self.pem.expose_secret();
        if pem.trim().is_empty() {
            return Err(KeySourceError::NotFound("inline PEM is empty".to_string()));
        }
        decode_private_key_pem(pem)
    }

    fn describe(&self) -> String {
        "inline PEM".to_string()
    }
}

/// Decodes and validates an RSA private key from PEM text.
///
/// PKCS#8 (`PRIVATE KEY`) is tried first, then PKCS#1 (`RSA PRIVATE KEY`).
///
/// # Errors
///
/// Returns `KeySourceError::Malformed` if neither encoding parses or the key
/// fails its consistency check, and `KeySourceError::WeakKey` if the modulus
/// is smaller than [`MIN_KEY_BITS`].
pub fn decode_private_key_pem(pem: &str) -> Result<RsaPrivateKey, KeySourceError> {
    let key = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|pkcs8_err| {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|_| pkcs8_err.to_string())
        })
        .map_err(KeySourceError::Malformed)?;

    key.validate().map_err(|e| KeySourceError::Malformed(e.to_string()))?;

    let bits = key.size() * 8;
    if bits < MIN_KEY_BITS {
        return Err(KeySourceError::WeakKey { bits, minimum: MIN_KEY_BITS });
    }

    Ok(key)
}

/// Encodes a private key as unencrypted PKCS#8 PEM with LF line endings.
///
/// # Errors
///
/// Returns `KeySourceError::PersistFailed` if encoding fails.
pub fn encode_private_key_pem(key: &RsaPrivateKey) -> Result<Zeroizing<String>, KeySourceError> {
    key.to_pkcs8_pem(LineEnding::LF).map_err(|e| KeySourceError::PersistFailed(e.to_string()))
}

/// Generates a fresh RSA private key with public exponent 65537.
///
/// # Errors
///
/// Returns `KeySourceError::WeakKey` if `bits` is below [`MIN_KEY_BITS`] and
/// `KeySourceError::GenerationFailed` if generation fails.
pub fn generate_private_key(bits: usize) -> Result<RsaPrivateKey, KeySourceError> {
    if bits < MIN_KEY_BITS {
        return Err(KeySourceError::WeakKey { bits, minimum: MIN_KEY_BITS });
    }

    RsaPrivateKey::new_with_exp(&mut OsRng, bits, &BigUint::from(PUBLIC_EXPONENT))
        .map_err(|e| KeySourceError::GenerationFailed(e.to_string()))
}
