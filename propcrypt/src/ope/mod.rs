//! Order-preserving ciphers.
//!
//! Plaintexts are unsigned 64-bit integers, ciphertexts arbitrary precision
//! integers. For every cipher in this module, `x1 < x2` implies
//! `encrypt(x1) < encrypt(x2)`; the two order-revealing schemes
//! ([`piore`], [`pore`]) additionally expose a `compare` that stays exact
//! when a digit wraps around its base.

pub mod acope;
pub mod aicd;
mod digits;
pub mod fope;
pub mod piore;
pub mod pore;

use num_bigint::BigInt;

use crate::error::Error;

/// Largest supported plaintext bit width.
pub const MAX_WIDTH: u8 = 63;

/// Default plaintext bit width when neither parameters nor data give one.
pub const DEFAULT_WIDTH: u8 = 8;

/// An order-preserving cipher over `u64` plaintexts.
pub trait OrderPreserving: Send + Sync {
    /// Encrypts `plaintext`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Domain` if `plaintext` exceeds [`Self::max_plaintext`].
    fn encrypt(&self, plaintext: u64) -> Result<BigInt, Error>;

    /// Decrypts `ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCiphertext` if no plaintext encrypts to
    /// `ciphertext` under this key.
    fn decrypt(&self, ciphertext: &BigInt) -> Result<u64, Error>;

    /// Largest plaintext accepted by [`Self::encrypt`].
    fn max_plaintext(&self) -> u64;
}

/// Number of bits needed to represent `value`, at least one.
#[must_use]
pub fn bit_width(value: u64) -> u8 {
    // At most 64, so the cast is lossless
    #[allow(clippy::cast_possible_truncation)]
    let bits = (u64::BITS - value.leading_zeros()) as u8;
    bits.max(1)
}

/// Validates a plaintext bit width.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` unless `1 <= width <= 63`.
pub fn check_width(name: &str, width: u8) -> Result<u8, Error> {
    if (1..=MAX_WIDTH).contains(&width) {
        Ok(width)
    } else {
        Err(Error::InvalidParameter(format!("{name} must be in 1..={MAX_WIDTH}, was {width}")))
    }
}

/// Rejects plaintexts outside `[0, 2^width)`.
pub(crate) fn check_plaintext(plaintext: u64, width: u8) -> Result<(), Error> {
    if plaintext >> width == 0 {
        Ok(())
    } else {
        Err(Error::Domain(format!("plaintext must be in 0..{}, was {plaintext}", 1u64 << width)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_width() {
        assert_eq!(bit_width(0), 1);
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(2), 2);
        assert_eq!(bit_width(255), 8);
        assert_eq!(bit_width(256), 9);
        assert_eq!(bit_width(u64::MAX), 64);
    }

    #[test]
    fn test_check_width() {
        assert!(check_width("d", 1).is_ok());
        assert!(check_width("d", 63).is_ok());
        assert!(matches!(check_width("d", 0), Err(Error::InvalidParameter(_))));
        assert!(matches!(check_width("d", 64), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_check_plaintext_exclusive_bound() {
        assert!(check_plaintext(255, 8).is_ok());
        assert!(matches!(check_plaintext(256, 8), Err(Error::Domain(_))));
        assert!(check_plaintext(0, 1).is_ok());
        assert!(check_plaintext(1, 1).is_ok());
        assert!(check_plaintext(2, 1).is_err());
    }
}
