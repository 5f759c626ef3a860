//! Prefix-preserving ciphers over byte strings.
//!
//! Two plaintexts sharing their first `p` bits (CryptoPAn) or first `p`
//! blocks (HPCBC+) encrypt to ciphertexts sharing exactly as many.

pub mod cryptopan;
pub mod hpcbc;
pub mod rh2;

use crate::error::Error;

/// Outcome of a prefix-preserving decryption.
///
/// Integrity failures are not errors: the plaintext is replaced by zeros and
/// the caller decides how to report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decryption {
    /// The plaintext, verified when the cipher carries an integrity check.
    Intact(Vec<u8>),
    /// The integrity check failed; holds a zeroed buffer of plaintext length.
    Tampered(Vec<u8>),
}

impl Decryption {
    /// Returns `true` for [`Decryption::Tampered`].
    #[must_use]
    pub const fn is_tampered(&self) -> bool {
        matches!(self, Self::Tampered(_))
    }

    /// Returns the plaintext bytes, zeroed if tampered.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Intact(bytes) | Self::Tampered(bytes) => bytes,
        }
    }
}

/// A prefix-preserving cipher.
pub trait PrefixPreserving: Send + Sync {
    /// Encrypts a byte string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Domain` if the input is longer than the cipher allows.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error>;

    /// Decrypts a byte string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Domain` or `Error::InvalidCiphertext` if the input
    /// cannot be a ciphertext of this cipher.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Decryption, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_accessors() {
        let intact = Decryption::Intact(vec![1, 2]);
        assert!(!intact.is_tampered());
        assert_eq!(intact.into_bytes(), vec![1, 2]);

        let tampered = Decryption::Tampered(vec![0, 0]);
        assert!(tampered.is_tampered());
        assert_eq!(tampered.into_bytes(), vec![0, 0]);
    }
}
