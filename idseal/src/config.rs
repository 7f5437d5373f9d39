//! Process configuration.
//!
//! Loaded once at startup from a TOML file, environment variables, or both
//! (environment wins). Secrets have no defaults: a missing blind-index
//! secret or storage key stops the process from starting.
//!
//! ```toml
//! [keys]
//! private_key_path = "/var/lib/idseal/private_key.pem"
//! key_bits = 3072
//!
//! [blind_index]
//! algorithm = "hmac-sha256"
//! secret = "..."
//!
//! [storage]
//! key = "base64 of 32 random bytes"
//! ```

use crate::blind_index::{BlindIndexer, IndexAlgorithm};
use crate::error::Error;
use crate::key_source::MIN_KEY_BITS;
use crate::secrets::{IndexKey, StorageKey};
use crate::storage::StorageCipher;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable: path of the private key PEM file.
pub const ENV_PRIVATE_KEY_PATH: &str = "IDSEAL_PRIVATE_KEY_PATH";
/// Environment variable: inline private key PEM (takes precedence over the path).
pub const ENV_PRIVATE_KEY_PEM: &str = "IDSEAL_PRIVATE_KEY_PEM";
/// Environment variable: modulus size for generated keys.
pub const ENV_KEY_BITS: &str = "IDSEAL_KEY_BITS";
/// Environment variable: blind-index secret.
pub const ENV_BLIND_INDEX_SECRET: &str = "IDSEAL_BLIND_INDEX_SECRET";
/// Environment variable: blind-index algorithm.
pub const ENV_BLIND_INDEX_ALGORITHM: &str = "IDSEAL_BLIND_INDEX_ALGORITHM";
/// Environment variable: base64 storage key.
pub const ENV_STORAGE_KEY: &str = "IDSEAL_STORAGE_KEY";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keys: KeyConfig,
    pub blind_index: BlindIndexConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// PEM file used by the file key source (default: `private_key.pem`)
    pub private_key_path: PathBuf,
    /// Inline PEM, e.g. injected by a secret manager
    pub private_key_pem: Option<SecretString>,
    /// Modulus size for newly generated keys (default: 2048)
    pub key_bits: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from("private_key.pem"),
            private_key_pem: None,
            key_bits: MIN_KEY_BITS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BlindIndexConfig {
    pub algorithm: IndexAlgorithm,
    /// Secret used verbatim (UTF-8 bytes) as the MAC key
    pub secret: Option<SecretString>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base64 (standard or URL-safe) encoding of 32 bytes
    pub key: Option<SecretString>,
}

impl Config {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the document is invalid.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Configuration(format!("invalid config: {e}")))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, Error> {
        Self::default().with_env()
    }

    /// Overlays the process environment onto this configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a variable holds an invalid value.
    pub fn with_env(self) -> Result<Self, Error> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlays values from `lookup`, keyed by the `IDSEAL_*` variable names.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a value is invalid.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_PRIVATE_KEY_PATH) {
            self.keys.private_key_path = PathBuf::from(path);
        }
        if let Some(pem) = lookup(ENV_PRIVATE_KEY_PEM) {
            self.keys.private_key_pem = Some(SecretString::new(pem));
        }
        if let Some(bits) = lookup(ENV_KEY_BITS) {
            self.keys.key_bits = bits.trim().parse().map_err(|_| {
                Error::Configuration(format!("{ENV_KEY_BITS} is not a number: {bits}"))
            })?;
        }
        if let Some(secret) = lookup(ENV_BLIND_INDEX_SECRET) {
            self.blind_index.secret = Some(SecretString::new(secret));
        }
        if let Some(algorithm) = lookup(ENV_BLIND_INDEX_ALGORITHM) {
            self.blind_index.algorithm = algorithm.parse()?;
        }
        if let Some(key) = lookup(ENV_STORAGE_KEY) {
            self.storage.key = Some(SecretString::new(key));
        }
        Ok(self)
    }

    /// Checks everything that can be checked without touching the key source.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` naming the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.keys.key_bits < MIN_KEY_BITS {
            return Err(Error::Configuration(format!(
                "key_bits must be at least {MIN_KEY_BITS}, got {}",
                self.keys.key_bits
            )));
        }
        self.index_key()?;
        self.storage_key()?;
        Ok(())
    }

    /// Builds the blind-index key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the secret is missing or empty.
    pub fn index_key(&self) -> Result<IndexKey, Error> {
        let secret = self.blind_index.secret.as_ref().ok_or_else(|| {
            Error::Configuration(format!("blind index secret is not set ({ENV_BLIND_INDEX_SECRET})"))
        })?;
        IndexKey::new(secret.expose_secret().as_bytes().to_vec())
    }

    /// Builds the storage key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the key is missing or malformed.
    pub fn storage_key(&self) -> Result<StorageKey, Error> {
        let key = self.storage.key.as_ref().ok_or_else(|| {
            Error::Configuration(format!("storage key is not set ({ENV_STORAGE_KEY})"))
        })?;
        StorageKey::from_base64(key.expose_secret())
    }

    /// Builds the blind indexer described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the secret is missing or empty.
    pub fn blind_indexer(&self) -> Result<BlindIndexer, Error> {
        BlindIndexer::new(self.index_key()?, self.blind_index.algorithm)
    }

    /// Builds the storage cipher described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the key is missing or malformed.
    pub fn storage_cipher(&self) -> Result<StorageCipher, Error> {
        Ok(StorageCipher::new(self.storage_key()?))
    }
}
