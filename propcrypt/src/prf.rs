//! Keyed pseudo-random function for the order-preserving ciphers.
//!
//! The PRF is HMAC-SHA256 over a short fixed-width message. Its 32-byte tag
//! is read as a signed big-endian integer and reduced into the interval the
//! caller needs, so the same key yields the same reduction on every platform.

use crate::error::Error;
use hmac::{Hmac, Mac};
use num_bigint::BigInt;
use num_integer::Integer;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 keyed once and evaluated many times.
#[derive(Clone)]
pub struct Prf {
    mac: HmacSha256,
}

impl Prf {
    /// Keys the PRF.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if the MAC rejects the key.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| Error::InvalidKey(format!("invalid PRF key: {e}")))?;
        Ok(Self { mac })
    }

    /// Returns the raw 32-byte tag for `message`.
    #[must_use]
    pub fn tag(&self, message: &[u8]) -> [u8; 32] {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.finalize().into_bytes().into()
    }

    /// Returns the tag for `message` as a signed big-endian integer.
    #[must_use]
    pub fn evaluate(&self, message: &[u8]) -> BigInt {
        BigInt::from_signed_bytes_be(&self.tag(message))
    }

    /// Returns `evaluate(message) mod modulus`, always in `[0, modulus)`.
    #[must_use]
    pub fn evaluate_mod(&self, message: &[u8], modulus: &BigInt) -> BigInt {
        self.evaluate(message).mod_floor(modulus)
    }
}
