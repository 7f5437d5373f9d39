//! Decrypted sensitive values.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// A decrypted sensitive value.
///
/// Lives only in memory, is zeroized on drop, and prints as `[REDACTED]`
/// so it cannot end up in logs by accident. Use [`expose`](Self::expose)
/// at the point where the value is actually needed.
pub struct PlaintextRecord(SecretString);

impl PlaintextRecord {
    pub(crate) fn new(value: String) -> Self {
        Self(SecretString::new(value))
    }

    /// Returns the plaintext.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns `true` if the plaintext is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for PlaintextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlaintextRecord([REDACTED])")
    }
}
