//! File-based key source for `idseal`.
//!
//! Loads the server's RSA private key from a PEM file, generating and
//! persisting one on first start. Convenient for development and single-host
//! deployments; note that the key is stored **unencrypted** and protected
//! only by file permissions. Production deployments should prefer a key
//! source backed by a secret manager or HSM.

#![warn(clippy::pedantic, clippy::nursery)]

use idseal::error::KeySourceError;
use idseal::key_source::{
    decode_private_key_pem, encode_private_key_pem, generate_private_key, KeySource, MIN_KEY_BITS,
};
use rsa::RsaPrivateKey;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// File-backed key source.
///
/// ```text
/// private_key.pem   (PKCS#8 PEM, unencrypted, 0600 permissions)
/// ```
///
/// Concurrent first starts are safe: each process writes its freshly
/// generated key to a private temporary file and links it into place only if
/// nothing exists there yet. The processes that lose the race discard their
/// key and load the winner's.
#[derive(Debug, Clone)]
pub struct FileKeySource {
    path: PathBuf,
    key_bits: usize,
}

impl FileKeySource {
    /// Creates a key source for the PEM file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), key_bits: MIN_KEY_BITS }
    }

    /// Sets the modulus size used if a key has to be generated.
    #[must_use]
    pub const fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Returns the key file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<RsaPrivateKey>, KeySourceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(pem) => decode_private_key_pem(&pem).map(Some).map_err(|e| match e {
                KeySourceError::Malformed(msg) => {
                    KeySourceError::Malformed(format!("{}: {msg}", self.path.display()))
                }
                other => other,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KeySourceError::Io(e)),
        }
    }

    /// Generates a key and persists it unless another process got there
    /// first. Returns the key that ended up on disk.
    fn generate_and_persist(&self) -> Result<RsaPrivateKey, KeySourceError> {
        info!(path = %self.path.display(), bits = self.key_bits, "generating new RSA key pair");
        let key = generate_private_key(self.key_bits)?;
        let pem = encode_private_key_pem(&key)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let persist_failed =
            |e: std::io::Error| KeySourceError::PersistFailed(format!("{}: {e}", self.path.display()));

        // Temporary files are created with owner-only permissions.
        let mut tmp = NamedTempFile::new_in(dir).map_err(persist_failed)?;
        tmp.write_all(pem.as_bytes()).map_err(persist_failed)?;
        tmp.as_file().sync_all().map_err(persist_failed)?;

        match tmp.persist_noclobber(&self.path) {
            Ok(_) => {
                warn!(
                    path = %self.path.display(),
                    "private key stored unencrypted; restrict access to this file"
                );
                Ok(key)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                info!(path = %self.path.display(), "key file created concurrently; loading it");
                self.read()?.ok_or_else(|| {
                    KeySourceError::NotFound(self.path.display().to_string())
                })
            }
            Err(e) => Err(persist_failed(e.error)),
        }
    }
}

impl KeySource for FileKeySource {
    fn load_or_generate(&self) -> Result<RsaPrivateKey, KeySourceError> {
        match self.read()? {
            Some(key) => Ok(key),
            None => self.generate_and_persist(),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
