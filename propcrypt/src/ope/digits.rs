//! Digit construction shared by the order-revealing ciphers.
//!
//! A `width`-bit plaintext becomes `width` digits in base `B`, most
//! significant first. Digit `i` is `PRF(i, prefix_{i-1}(x)) + bit_i mod B`,
//! so two plaintexts agree on every digit before their first differing bit
//! and differ by exactly one (mod `B`) at that bit.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use super::check_plaintext;
use crate::error::Error;
use crate::prf::Prf;

pub(super) struct DigitEncoder {
    base: BigInt,
    width: u8,
    max_ciphertext: BigInt,
    prf: Prf,
}

impl DigitEncoder {
    pub(super) fn new(base: BigInt, width: u8, prf_key: &[u8]) -> Result<Self, Error> {
        let max_ciphertext = num_traits::pow(base.clone(), usize::from(width)) - 1;
        Ok(Self { base, width, max_ciphertext, prf: Prf::new(prf_key)? })
    }

    pub(super) const fn width(&self) -> u8 {
        self.width
    }

    /// Digit `level` (1-based) for the plaintext bits of `x`, with the bit at
    /// that level replaced by `bit`.
    fn digit(&self, level: u8, x: u64, bit: bool) -> BigInt {
        let shift = self.width - level + 1;
        let prefix = (x >> shift) << shift;

        let mut message = [0u8; 12];
        message[..4].copy_from_slice(&i32::from(level).to_be_bytes());
        message[4..].copy_from_slice(&prefix.to_be_bytes());

        let digit = self.prf.evaluate(&message) + u8::from(bit);
        digit.mod_floor(&self.base)
    }

    pub(super) fn encrypt(&self, plaintext: u64) -> Result<BigInt, Error> {
        check_plaintext(plaintext, self.width)?;

        let mut c = BigInt::zero();
        for level in 1..=self.width {
            let bit = (plaintext >> (self.width - level)) & 1 == 1;
            c = c * &self.base + self.digit(level, plaintext, bit);
        }
        Ok(c)
    }

    fn split(&self, ciphertext: &BigInt) -> Result<Vec<BigInt>, Error> {
        if ciphertext.is_negative() || *ciphertext > self.max_ciphertext {
            return Err(Error::InvalidCiphertext(format!(
                "ciphertext must be in 0..={}, was {ciphertext}",
                self.max_ciphertext
            )));
        }

        let mut digits = vec![BigInt::zero(); usize::from(self.width)];
        let mut rest = ciphertext.clone();
        for digit in digits.iter_mut().rev() {
            let (quotient, remainder) = rest.div_mod_floor(&self.base);
            *digit = remainder;
            rest = quotient;
        }
        if !rest.is_zero() {
            return Err(Error::InvalidCiphertext(format!("{ciphertext} has too many digits")));
        }
        Ok(digits)
    }

    pub(super) fn decrypt(&self, ciphertext: &BigInt) -> Result<u64, Error> {
        let digits = self.split(ciphertext)?;

        let mut x = 0u64;
        for level in 1..=self.width {
            let digit = &digits[usize::from(level - 1)];
            if *digit == self.digit(level, x, false) {
                continue;
            }
            if *digit == self.digit(level, x, true) {
                x |= 1 << (self.width - level);
            } else {
                return Err(Error::InvalidCiphertext(format!(
                    "digit {level} of {ciphertext} does not decrypt under this key"
                )));
            }
        }
        Ok(x)
    }

    /// Compares the plaintexts behind two ciphertexts.
    ///
    /// The first differing digit decides: the larger plaintext's digit is the
    /// smaller one's plus one modulo the base.
    pub(super) fn compare(&self, left: &BigInt, right: &BigInt) -> Result<Ordering, Error> {
        let left_digits = self.split(left)?;
        let right_digits = self.split(right)?;

        let Some((l, r)) = left_digits.iter().zip(&right_digits).find(|(l, r)| l != r) else {
            return Ok(Ordering::Equal);
        };
        if (l + BigInt::one()).mod_floor(&self.base) == *r {
            Ok(Ordering::Less)
        } else if (r + BigInt::one()).mod_floor(&self.base) == *l {
            Ok(Ordering::Greater)
        } else {
            Err(Error::InvalidCiphertext("ciphertexts are not comparable under this key".to_string()))
        }
    }
}
