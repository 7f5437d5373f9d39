//! Blind index generation for exact-match search.
//!
//! A blind index is a keyed, deterministic digest of a plaintext value. It
//! can be stored next to the encrypted value and compared for equality
//! without exposing the value itself.
//!
//! The algorithm and key together define the index function. Changing either
//! invalidates every stored index, so both are chosen once, in configuration,
//! and injected through [`BlindIndexer::new`].

use crate::error::Error;
use crate::secrets::IndexKey;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Keyed hash used to derive blind indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexAlgorithm {
    /// HMAC-SHA-256, 64 hex characters.
    #[default]
    HmacSha256,
    /// HMAC-SHA-512, 128 hex characters.
    HmacSha512,
}

impl IndexAlgorithm {
    /// Stable identifier, suitable for recording next to stored indexes.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha512 => "hmac-sha512",
        }
    }

    /// Length of the hex-encoded index.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::HmacSha256 => 64,
            Self::HmacSha512 => 128,
        }
    }
}

impl fmt::Display for IndexAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for IndexAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hmac-sha256" => Ok(Self::HmacSha256),
            "hmac-sha512" => Ok(Self::HmacSha512),
            other => Err(Error::Configuration(format!("unknown blind index algorithm: {other}"))),
        }
    }
}

/// Lowercase hexadecimal blind index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlindIndex(String);

impl BlindIndex {
    /// Returns the index as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the index, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BlindIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BlindIndex {
    type Error = Error;

    /// Accepts a previously stored index: non-empty, even-length lowercase hex.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = !value.is_empty()
            && value.len() % 2 == 0
            && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(Error::Configuration("blind index is not lowercase hex".to_string()));
        }
        Ok(Self(value))
    }
}

/// Computes the blind index of `plaintext` under `key`.
///
/// The MAC input is the UTF-8 encoding of `plaintext` and nothing else, so
/// indexes stay comparable with any other implementation of
/// `HMAC(key, plaintext)`.
///
/// # Errors
///
/// Returns `Error::Configuration` if the MAC rejects the key.
///
/// # Example
///
/// ```
/// use idseal::blind_index::{compute_blind_index, IndexAlgorithm};
/// use idseal::secrets::IndexKey;
///
/// let key = IndexKey::new(b"server-side index secret".to_vec()).unwrap();
/// let a = compute_blind_index(IndexAlgorithm::HmacSha256, &key, "AB1234567").unwrap();
/// let b = compute_blind_index(IndexAlgorithm::HmacSha256, &key, "AB1234567").unwrap();
///
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
pub fn compute_blind_index(
    algorithm: IndexAlgorithm,
    key: &IndexKey,
    plaintext: &str,
) -> Result<BlindIndex, Error> {
    Ok(KeyedMac::new(algorithm, key)?.index(plaintext))
}

/// HMAC state with the key already absorbed; cloned once per computation.
#[derive(Clone)]
enum KeyedMac {
    Sha256(HmacSha256),
    Sha512(HmacSha512),
}

impl KeyedMac {
    fn new(algorithm: IndexAlgorithm, key: &IndexKey) -> Result<Self, Error> {
        let invalid = |_| Error::Configuration("blind index secret rejected by HMAC".to_string());
        Ok(match algorithm {
            IndexAlgorithm::HmacSha256 => {
                Self::Sha256(<HmacSha256 as Mac>::new_from_slice(key.expose()).map_err(invalid)?)
            }
            IndexAlgorithm::HmacSha512 => {
                Self::Sha512(<HmacSha512 as Mac>::new_from_slice(key.expose()).map_err(invalid)?)
            }
        })
    }

    fn index(&self, plaintext: &str) -> BlindIndex {
        let digest = match self.clone() {
            Self::Sha256(mut mac) => {
                mac.update(plaintext.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha512(mut mac) => {
                mac.update(plaintext.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        BlindIndex(hex::encode(digest))
    }

    fn verify(&self, plaintext: &str, expected: &[u8]) -> bool {
        match self.clone() {
            Self::Sha256(mut mac) => {
                mac.update(plaintext.as_bytes());
                mac.verify_slice(expected).is_ok()
            }
            Self::Sha512(mut mac) => {
                mac.update(plaintext.as_bytes());
                mac.verify_slice(expected).is_ok()
            }
        }
    }
}

/// Blind indexer bound to one key and one algorithm.
///
/// # Example
///
/// ```
/// use idseal::blind_index::{BlindIndexer, IndexAlgorithm};
/// use idseal::secrets::IndexKey;
///
/// let indexer = BlindIndexer::new(IndexKey::generate(), IndexAlgorithm::default()).unwrap();
/// let index = indexer.index("AB1234567");
///
/// assert!(indexer.verify("AB1234567", &index));
/// assert!(!indexer.verify("AB1234568", &index));
/// ```
pub struct BlindIndexer {
    mac: KeyedMac,
    algorithm: IndexAlgorithm,
}

impl BlindIndexer {
    /// Creates an indexer, keying the MAC once.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the MAC rejects the key.
    pub fn new(key: IndexKey, algorithm: IndexAlgorithm) -> Result<Self, Error> {
        Ok(Self { mac: KeyedMac::new(algorithm, &key)?, algorithm })
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> IndexAlgorithm {
        self.algorithm
    }

    /// Computes the blind index of `plaintext`.
    #[must_use]
    pub fn index(&self, plaintext: &str) -> BlindIndex {
        self.mac.index(plaintext)
    }

    /// Checks whether `index` is the blind index of `plaintext`, comparing
    /// in constant time.
    #[must_use]
    pub fn verify(&self, plaintext: &str, index: &BlindIndex) -> bool {
        let Ok(expected) = hex::decode(index.as_str()) else {
            return false;
        };
        self.mac.verify(plaintext, &expected)
    }
}

impl fmt::Debug for BlindIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlindIndexer")
            .field("algorithm", &self.algorithm)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn indexer() -> BlindIndexer {
        BlindIndexer::new(IndexKey::new(vec![42u8; 32]).unwrap(), IndexAlgorithm::HmacSha256).unwrap()
    }

    #[test]
    fn test_blind_index_deterministic() {
        let indexer = indexer();
        let index1 = indexer.index("AB1234567");
        let index2 = indexer.index("AB1234567");

        assert_eq!(index1, index2);
        assert_eq!(index1.as_str().len(), 64);
    }

    #[test]
    fn test_blind_index_different_values() {
        let indexer = indexer();
        assert_ne!(indexer.index("AB1234567"), indexer.index("AB1234568"));
    }

    #[test]
    fn test_blind_index_different_keys() {
        let other =
            BlindIndexer::new(IndexKey::new(vec![7u8; 32]).unwrap(), IndexAlgorithm::HmacSha256).unwrap();
        assert_ne!(indexer().index("AB1234567"), other.index("AB1234567"));
    }

    #[test]
    fn test_blind_index_lowercase_hex() {
        let index = indexer().index("AB1234567");
        assert!(index.as_str().bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
    }

    // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
    #[test]
    fn test_hmac_sha256_rfc4231_vector() {
        let key = IndexKey::new(b"Jefe".to_vec()).unwrap();
        let index =
            compute_blind_index(IndexAlgorithm::HmacSha256, &key, "what do ya want for nothing?")
                .unwrap();
        assert_eq!(
            index.as_str(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_sha512_output_length() {
        let indexer =
            BlindIndexer::new(IndexKey::new(vec![1u8; 32]).unwrap(), IndexAlgorithm::HmacSha512).unwrap();
        let index = indexer.index("AB1234567");
        assert_eq!(index.as_str().len(), IndexAlgorithm::HmacSha512.hex_len());
        assert!(indexer.verify("AB1234567", &index));
    }

    #[test]
    fn test_verify() {
        let indexer = indexer();
        let index = indexer.index("AB1234567");

        assert!(indexer.verify("AB1234567", &index));
        assert!(!indexer.verify("ab1234567", &index));
    }

    #[test]
    fn test_verify_wrong_algorithm_length() {
        let index = indexer().index("AB1234567");
        let wide =
            BlindIndexer::new(IndexKey::new(vec![42u8; 32]).unwrap(), IndexAlgorithm::HmacSha512).unwrap();
        assert!(!wide.verify("AB1234567", &index));
    }

    #[test]
    fn test_blind_index_try_from() {
        let index = indexer().index("AB1234567");
        let parsed = BlindIndex::try_from(index.clone().into_string()).unwrap();
        assert_eq!(parsed, index);

        assert!(BlindIndex::try_from("ABCDEF".to_string()).is_err());
        assert!(BlindIndex::try_from("abc".to_string()).is_err());
        assert!(BlindIndex::try_from(String::new()).is_err());
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("hmac-sha256".parse::<IndexAlgorithm>().unwrap(), IndexAlgorithm::HmacSha256);
        assert_eq!("HMAC-SHA512".parse::<IndexAlgorithm>().unwrap(), IndexAlgorithm::HmacSha512);
        assert!("md5".parse::<IndexAlgorithm>().is_err());
        assert_eq!(IndexAlgorithm::default().to_string(), "hmac-sha256");
    }

    #[test]
    fn test_indexer_matches_free_function() {
        let key = IndexKey::new(vec![42u8; 32]).unwrap();
        let expected = compute_blind_index(IndexAlgorithm::HmacSha256, &key, "AB1234567").unwrap();
        assert_eq!(indexer().index("AB1234567"), expected);
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", indexer());
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("HmacSha256"));
    }

    #[test]
    fn test_blind_index_empty_value() {
        assert_eq!(indexer().index("").as_str().len(), 64);
    }

    proptest! {
        #[test]
        fn prop_index_is_deterministic(value in ".*") {
            let indexer = indexer();
            prop_assert_eq!(indexer.index(&value), indexer.index(&value));
        }

        #[test]
        fn prop_distinct_values_distinct_indexes(a in "[A-Z0-9]{1,12}", b in "[A-Z0-9]{1,12}") {
            prop_assume!(a != b);
            let indexer = indexer();
            prop_assert_ne!(indexer.index(&a), indexer.index(&b));
        }
    }
}
