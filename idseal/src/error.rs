//! Error types for `idseal` operations.
//!
//! Callers only ever need to distinguish two kinds of failure: the process
//! is misconfigured (fatal at startup) or an input could not be decrypted
//! (an opaque, per-request rejection). See [`ErrorKind`].

use std::fmt;

/// Main error type for `idseal` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required configuration is missing or invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The private key could not be loaded, generated or persisted
    #[error("key source error: {0}")]
    KeySource(#[from] KeySourceError),

    /// An envelope or storage blob could not be decrypted or authenticated.
    ///
    /// Deliberately carries no detail: bad padding, a wrong key, a tag
    /// mismatch, a malformed encoding and invalid UTF-8 all end up here.
    #[error("payload could not be decrypted or authenticated")]
    DecryptionFailed,

    /// The storage cipher refused to encrypt the input
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// The two externally observable failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal, not retried. The subsystem must not run in this state.
    Configuration,
    /// Recoverable, reported to the caller as an opaque rejection.
    Decryption,
}

impl Error {
    /// Returns the kind of failure this error represents.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DecryptionFailed => ErrorKind::Decryption,
            Self::Configuration(_) | Self::KeySource(_) | Self::EncryptionFailed(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Returns `true` for the opaque decryption failure.
    #[must_use]
    pub const fn is_decryption_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::Decryption)
    }
}

/// Errors raised by a [`KeySource`](crate::key_source::KeySource).
#[derive(Debug)]
pub enum KeySourceError {
    /// No key material at the configured location
    NotFound(String),

    /// Stored key material could not be decoded
    Malformed(String),

    /// Key is below the minimum modulus size
    WeakKey {
        /// Modulus size of the rejected key
        bits: usize,
        /// Minimum accepted modulus size
        minimum: usize,
    },

    /// Key generation failed
    GenerationFailed(String),

    /// Generated key could not be written out
    PersistFailed(String),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for KeySourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(location) => write!(f, "private key not found: {location}"),
            Self::Malformed(msg) => write!(f, "private key could not be decoded: {msg}"),
            Self::WeakKey { bits, minimum } => {
                write!(f, "private key modulus is {bits} bits (minimum: {minimum})")
            }
            Self::GenerationFailed(msg) => write!(f, "key generation failed: {msg}"),
            Self::PersistFailed(msg) => write!(f, "private key could not be persisted: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for KeySourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KeySourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
