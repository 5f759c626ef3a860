//! Format-preserving ciphers over numeral strings.
//!
//! A numeral string in radix `r` (2..=36) encrypts to a numeral string of the
//! same radix and length. Digits above 9 are letters; input is accepted in
//! either case and output is always lowercase.

pub mod dff;
pub mod ff3;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::error::Error;

/// Smallest supported radix.
pub const MIN_RADIX: u32 = 2;

/// Largest supported radix.
pub const MAX_RADIX: u32 = 36;

/// Default radix.
pub const DEFAULT_RADIX: u32 = 10;

/// Smallest domain (`radix^len`) a numeral string must span.
const DOMAIN_MIN: u32 = 100;

/// A tweakable format-preserving cipher.
pub trait FormatPreserving: Send + Sync {
    /// Encrypts a numeral string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` for characters outside the radix and
    /// `Error::Domain` for lengths outside the cipher's bounds.
    fn encrypt(&self, numeral: &str) -> Result<String, Error>;

    /// Decrypts a numeral string.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::encrypt`].
    fn decrypt(&self, numeral: &str) -> Result<String, Error>;

    /// Radix of the numeral strings.
    fn radix(&self) -> u32;

    /// Tweak the cipher was built with.
    fn tweak(&self) -> &[u8];
}

/// Radix and tweak of a format-preserving cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpeParams {
    radix: u32,
    tweak: Option<Vec<u8>>,
}

impl FpeParams {
    /// Creates parameters. The tweak length is checked by each cipher.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `radix` is outside `2..=36`.
    pub fn new(radix: u32, tweak: Option<Vec<u8>>) -> Result<Self, Error> {
        if !(MIN_RADIX..=MAX_RADIX).contains(&radix) {
            return Err(Error::InvalidParameter(format!(
                "radix must be in {MIN_RADIX}..={MAX_RADIX}, was {radix}"
            )));
        }
        Ok(Self { radix, tweak })
    }

    /// Numeral radix.
    #[must_use]
    pub const fn radix(&self) -> u32 {
        self.radix
    }

    /// Configured tweak, if any.
    #[must_use]
    pub fn tweak(&self) -> Option<&[u8]> {
        self.tweak.as_deref()
    }

    /// Returns a copy with `tweak` set.
    #[must_use]
    pub fn with_tweak(mut self, tweak: Vec<u8>) -> Self {
        self.tweak = Some(tweak);
        self
    }
}

impl Default for FpeParams {
    fn default() -> Self {
        Self { radix: DEFAULT_RADIX, tweak: None }
    }
}

/// Length bounds of numeral strings for one radix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LengthBounds {
    pub(crate) min: usize,
    pub(crate) max: usize,
}

impl LengthBounds {
    /// Bounds where each half of the string must fit `half_bits` bits.
    pub(crate) fn new(radix: u32, half_bits: u32) -> Self {
        Self { min: min_length(radix), max: 2 * max_digits(radix, half_bits) }
    }

    pub(crate) fn check(self, len: usize) -> Result<(), Error> {
        if (self.min..=self.max).contains(&len) {
            Ok(())
        } else {
            Err(Error::Domain(format!(
                "numeral length must be in {}..={}, was {len}",
                self.min, self.max
            )))
        }
    }
}

/// Smallest `len` with `radix^len >= 100`.
fn min_length(radix: u32) -> usize {
    let mut len = 1;
    let mut domain = radix;
    while domain < DOMAIN_MIN {
        domain *= radix;
        len += 1;
    }
    len
}

/// Largest `len` with `radix^len <= 2^bits`.
fn max_digits(radix: u32, bits: u32) -> usize {
    let limit = BigUint::from(1u8) << bits;
    let mut len = 0;
    let mut domain = BigUint::from(radix);
    while domain <= limit {
        domain *= radix;
        len += 1;
    }
    len
}

/// Parses a numeral string into digits.
pub(crate) fn parse_digits(numeral: &str, radix: u32) -> Result<Vec<u32>, Error> {
    numeral
        .chars()
        .map(|c| {
            c.to_digit(radix).ok_or_else(|| {
                Error::Encoding(format!("`{c}` is not a digit in radix {radix}"))
            })
        })
        .collect()
}

/// Renders digits as a lowercase numeral string.
pub(crate) fn render_digits(digits: &[u32], radix: u32) -> String {
    digits.iter().filter_map(|&d| char::from_digit(d, radix)).collect()
}

/// `NUM_radix(X)`, most significant digit first.
pub(crate) fn num_be(digits: &[u32], radix: u32) -> BigUint {
    digits.iter().fold(BigUint::zero(), |acc, &d| acc * radix + d)
}

/// `NUM_radix(REV(X))`, least significant digit first.
pub(crate) fn num_le(digits: &[u32], radix: u32) -> BigUint {
    digits.iter().rev().fold(BigUint::zero(), |acc, &d| acc * radix + d)
}

/// `STR^len_radix(value)`, most significant digit first.
pub(crate) fn str_be(value: &BigUint, radix: u32, len: usize) -> Vec<u32> {
    let mut digits = str_le(value, radix, len);
    digits.reverse();
    digits
}

/// `REV(STR^len_radix(value))`, least significant digit first.
pub(crate) fn str_le(value: &BigUint, radix: u32, len: usize) -> Vec<u32> {
    let radix_big = BigUint::from(radix);
    let mut rest = value.clone();
    let mut digits = Vec::with_capacity(len);
    for _ in 0..len {
        let (quotient, remainder) = rest.div_rem(&radix_big);
        digits.push(remainder.to_u32().unwrap_or(0));
        rest = quotient;
    }
    digits
}

/// Writes `value` right-aligned into `out` as big-endian bytes.
pub(crate) fn write_be(value: &BigUint, out: &mut [u8]) {
    let bytes = value.to_bytes_be();
    let start = out.len().saturating_sub(bytes.len());
    let n = out.len() - start;
    out[..start].fill(0);
    out[start..].copy_from_slice(&bytes[bytes.len() - n..]);
}
