//! # `idseal`
//!
//! Secure processing of sensitive identity values (national ID numbers and
//! the like) handed over by an untrusted client.
//!
//! ## Features
//!
//! - RSA key pair bootstrap behind a pluggable [`KeySource`](key_source::KeySource)
//! - Hybrid envelope decryption (RSA-OAEP-SHA-256 + AES-GCM) with a single,
//!   opaque failure mode
//! - Keyed, deterministic blind indexes (HMAC-SHA-256) for exact-match search
//! - Randomized at-rest encryption (ChaCha20-Poly1305) in a versioned,
//!   text-safe blob format
//!
//! ## Example
//!
//! ```rust,ignore
//! use idseal::prelude::*;
//! use idseal_key_file::FileKeySource;
//!
//! let config = Config::from_env()?;
//! let source = FileKeySource::new(&config.keys.private_key_path);
//! let context = SecureContext::from_config(&config, &source)?;
//!
//! let envelope = EncodedEnvelope { /* from the request body */ }.decode()?;
//! let record = context.ingest(&envelope)?;
//! println!("{}", record.blind_index);
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod blind_index;
mod blob;
pub mod client;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod key_source;
pub mod keystore;
pub mod plaintext;
pub mod secrets;
pub mod storage;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::blind_index::{BlindIndex, BlindIndexer, IndexAlgorithm};
    pub use crate::config::Config;
    pub use crate::context::{SealedRecord, SecureContext};
    pub use crate::envelope::{EncodedEnvelope, Envelope, EnvelopeDecryptor};
    pub use crate::error::{Error, ErrorKind, KeySourceError};
    pub use crate::key_source::{KeySource, PemKeySource};
    pub use crate::keystore::KeyStore;
    pub use crate::plaintext::PlaintextRecord;
    pub use crate::secrets::{IndexKey, StorageKey};
    pub use crate::storage::{StorageBlob, StorageCipher};
}
