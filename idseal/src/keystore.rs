//! Owner of the server's asymmetric key pair.

use crate::error::{Error, KeySourceError};
use crate::key_source::{KeySource, MIN_KEY_BITS};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use std::fmt;
use tracing::info;

/// Holds the RSA key pair for the lifetime of the process.
///
/// The public key PEM is rendered once at construction, so every call to
/// [`public_key_pem`](Self::public_key_pem) returns the same bytes and always
/// matches the private key used for decryption.
pub struct KeyStore {
    private_key: RsaPrivateKey,
    public_key_pem: String,
}

impl KeyStore {
    /// Loads the key pair from `source`, generating it first if the source
    /// supports that and holds nothing yet.
    ///
    /// # Errors
    ///
    /// Any key source failure is returned as `Error::KeySource`; startup
    /// should abort.
    pub fn load_or_generate(source: &dyn KeySource) -> Result<Self, Error> {
        let private_key = source.load_or_generate()?;
        let store = Self::from_private_key(private_key)?;

        info!(
            source = %source.describe(),
            modulus_bits = store.modulus_bits(),
            "RSA key pair loaded"
        );

        Ok(store)
    }

    /// Wraps an already loaded private key.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeySource` if the modulus is below [`MIN_KEY_BITS`]
    /// or the public key cannot be encoded.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, Error> {
        let bits = private_key.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(KeySourceError::WeakKey { bits, minimum: MIN_KEY_BITS }.into());
        }

        let public_key_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeySourceError::Malformed(format!("public key encoding: {e}")))?;

        Ok(Self { private_key, public_key_pem })
    }

    /// Returns the public key as SubjectPublicKeyInfo PEM, for distribution
    /// to clients.
    #[must_use]
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Returns the modulus size in bits.
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        self.private_key.size() * 8
    }

    pub(crate) const fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("modulus_bits", &self.modulus_bits())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}
