//! The process-wide security context.
//!
//! All key material is loaded exactly once, at startup, into a
//! [`SecureContext`]. Request handlers share it by reference (or `Arc`);
//! there is no global state.

use crate::blind_index::{BlindIndex, BlindIndexer};
use crate::config::Config;
use crate::envelope::{Envelope, EnvelopeDecryptor};
use crate::error::Error;
use crate::key_source::KeySource;
use crate::keystore::KeyStore;
use crate::plaintext::PlaintextRecord;
use crate::storage::{StorageBlob, StorageCipher};
use std::sync::Arc;
use tracing::info;

/// Blind index and storage blob produced for one ingested value; what the
/// caller persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecord {
    /// Equality-search key.
    pub blind_index: BlindIndex,
    /// Randomized ciphertext of the value.
    pub blob: StorageBlob,
}

/// Key store, envelope decryptor, blind indexer and storage cipher, built
/// once and immutable afterwards.
///
/// # Example
///
/// ```rust,ignore
/// use idseal::prelude::*;
/// use idseal_key_file::FileKeySource;
///
/// let config = Config::from_env()?;
/// let source = FileKeySource::new(&config.keys.private_key_path);
/// let context = SecureContext::from_config(&config, &source)?;
///
/// let pem = context.public_key_pem();          // hand to clients
/// let record = context.ingest(&envelope)?;     // persist record.blind_index + record.blob
/// let value = context.open(&record.blob)?;     // later, on retrieval
/// ```
#[derive(Debug)]
pub struct SecureContext {
    keys: Arc<KeyStore>,
    decryptor: EnvelopeDecryptor,
    indexer: BlindIndexer,
    storage: StorageCipher,
}

impl SecureContext {
    /// Assembles a context from already loaded parts.
    #[must_use]
    pub fn new(keys: KeyStore, indexer: BlindIndexer, storage: StorageCipher) -> Self {
        let keys = Arc::new(keys);
        let decryptor = EnvelopeDecryptor::new(Arc::clone(&keys));
        Self { keys, decryptor, indexer, storage }
    }

    /// Validates `config`, loads the key pair from `source` and builds the
    /// context. Secrets are checked before the key source is touched, so a
    /// misconfigured process never generates a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` or `Error::KeySource`; either way the
    /// process must not start.
    pub fn from_config(config: &Config, source: &dyn KeySource) -> Result<Self, Error> {
        config.validate()?;
        let indexer = config.blind_indexer()?;
        let storage = config.storage_cipher()?;
        let keys = KeyStore::load_or_generate(source)?;

        info!(
            key_source = %source.describe(),
            blind_index = %indexer.algorithm(),
            "secure context ready"
        );

        Ok(Self::new(keys, indexer, storage))
    }

    /// Public key PEM for client distribution.
    #[must_use]
    pub fn public_key_pem(&self) -> &str {
        self.keys.public_key_pem()
    }

    /// Returns the shared key store.
    #[must_use]
    pub const fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// Returns the blind indexer.
    #[must_use]
    pub const fn indexer(&self) -> &BlindIndexer {
        &self.indexer
    }

    /// Decrypts a client envelope.
    ///
    /// # Errors
    ///
    /// Returns `Error::DecryptionFailed` for any unusable envelope.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<PlaintextRecord, Error> {
        self.decryptor.decrypt(envelope)
    }

    /// Computes the blind index of `plaintext`.
    #[must_use]
    pub fn index(&self, plaintext: &str) -> BlindIndex {
        self.indexer.index(plaintext)
    }

    /// Seals `plaintext` for storage.
    ///
    /// # Errors
    ///
    /// Returns `Error::EncryptionFailed` only for inputs beyond the cipher's
    /// length limit.
    pub fn seal(&self, plaintext: &str) -> Result<StorageBlob, Error> {
        self.storage.seal(plaintext)
    }

    /// Opens a storage blob.
    ///
    /// # Errors
    ///
    /// Returns `Error::DecryptionFailed` for any unusable blob.
    pub fn open(&self, blob: &StorageBlob) -> Result<PlaintextRecord, Error> {
        self.storage.open(blob)
    }

    /// Decrypts `envelope`, then derives the blind index and storage blob of
    /// the value. The plaintext itself is dropped before returning.
    ///
    /// # Errors
    ///
    /// Returns `Error::DecryptionFailed` if the envelope is unusable or
    /// decrypts to an empty value.
    pub fn ingest(&self, envelope: &Envelope) -> Result<SealedRecord, Error> {
        let plaintext = self.decrypt(envelope)?;
        if plaintext.is_empty() {
            return Err(Error::DecryptionFailed);
        }

        Ok(SealedRecord {
            blind_index: self.index(plaintext.expose()),
            blob: self.seal(plaintext.expose())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blind_index::IndexAlgorithm;
    use crate::client::seal_envelope;
    use crate::key_source::tests::test_key;
    use crate::secrets::{IndexKey, StorageKey};

    fn context() -> SecureContext {
        SecureContext::new(
            KeyStore::from_private_key(test_key().clone()).unwrap(),
            BlindIndexer::new(IndexKey::new(vec![1u8; 32]).unwrap(), IndexAlgorithm::HmacSha256)
                .unwrap(),
            StorageCipher::new(StorageKey::from_bytes(vec![2u8; 32]).unwrap()),
        )
    }

    #[test]
    fn test_ingest() {
        let context = context();
        let envelope = seal_envelope(context.public_key_pem(), b"AB1234567").unwrap();

        let record = context.ingest(&envelope).unwrap();
        assert_eq!(record.blind_index, context.index("AB1234567"));
        assert_eq!(context.open(&record.blob).unwrap().expose(), "AB1234567");
    }

    #[test]
    fn test_ingest_same_value_twice() {
        let context = context();
        let pem = context.public_key_pem().to_string();

        let first = context.ingest(&seal_envelope(&pem, b"AB1234567").unwrap()).unwrap();
        let second = context.ingest(&seal_envelope(&pem, b"AB1234567").unwrap()).unwrap();

        assert_eq!(first.blind_index, second.blind_index);
        assert_ne!(first.blob, second.blob);
    }

    #[test]
    fn test_ingest_rejects_empty_value() {
        let context = context();
        let envelope = seal_envelope(context.public_key_pem(), b"").unwrap();

        assert!(context.decrypt(&envelope).unwrap().is_empty());
        assert!(matches!(context.ingest(&envelope), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_from_config_requires_secrets_before_touching_keys() {
        struct PanickingSource;

        impl KeySource for PanickingSource {
            fn load_or_generate(&self) -> Result<rsa::RsaPrivateKey, crate::error::KeySourceError> {
                panic!("key source must not be consulted");
            }

            fn describe(&self) -> String {
                "panicking".to_string()
            }
        }

        let result = SecureContext::from_config(&Config::default(), &PanickingSource);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_context_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SecureContext>();
    }
}
