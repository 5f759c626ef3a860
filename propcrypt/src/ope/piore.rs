//! Practical order-revealing encryption with base `2^m` digits (`PIOre`).

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_traits::One;
use rand::{CryptoRng, Rng, RngCore};
use zeroize::Zeroizing;

use super::digits::DigitEncoder;
use super::{check_width, OrderPreserving, DEFAULT_WIDTH};
use crate::error::Error;
use crate::key::{check_key_size, KeyGenerator, KeyReader, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::PiOre;

/// Bytes taken by `m` and `d` before the PRF key.
pub const FIXED_LENGTH: usize = 2;

/// Smallest digit exponent; digits live in `[0, 2^m)`.
pub const MIN_EXPONENT: u8 = 12;

/// Largest digit exponent.
pub const MAX_EXPONENT: u8 = 127;

/// Parameters of the `PIOre` cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PioreParams {
    d: u8,
}

impl PioreParams {
    /// Creates parameters for `d`-bit plaintexts.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `d` is outside `1..=63`.
    pub fn new(d: u8) -> Result<Self, Error> {
        Ok(Self { d: check_width("d", d)? })
    }

    /// Plaintext bit width.
    #[must_use]
    pub const fn d(&self) -> u8 {
        self.d
    }
}

impl Default for PioreParams {
    fn default() -> Self {
        Self { d: DEFAULT_WIDTH }
    }
}

/// Typed `PIOre` key.
#[derive(Clone)]
pub struct PioreKey {
    m: u8,
    d: u8,
    prf_key: Zeroizing<Vec<u8>>,
}

impl PioreKey {
    /// Assembles and validates a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` unless `12 <= m <= 127` and `1 <= d <= 63`,
    /// and `Error::InvalidKeySize` if the encoded size is not allowed.
    pub fn new(m: u8, d: u8, prf_key: Vec<u8>) -> Result<Self, Error> {
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&m) {
            return Err(Error::InvalidKey(format!(
                "m must be in {MIN_EXPONENT}..={MAX_EXPONENT}, was {m}"
            )));
        }
        if !(1..=super::MAX_WIDTH).contains(&d) {
            return Err(Error::InvalidKey(format!("d must be in 1..={}, was {d}", super::MAX_WIDTH)));
        }
        check_key_size(ALGORITHM.name(), (FIXED_LENGTH + prf_key.len()) * 8, ALGORITHM.key_sizes())?;
        Ok(Self { m, d, prf_key: Zeroizing::new(prf_key) })
    }

    /// Decodes a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is not allowed or a field is invalid.
    pub fn from_secret(key: &SecretKey) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;

        let mut reader = KeyReader::new(key.expose());
        let m = reader.read_u8("m")?;
        let d = reader.read_u8("d")?;
        Self::new(m, d, reader.rest().to_vec())
    }

    /// Encodes the key.
    #[must_use]
    pub fn to_secret(&self) -> SecretKey {
        let mut bytes = vec![self.m, self.d];
        bytes.extend_from_slice(&self.prf_key);
        SecretKey::new(bytes)
    }
}

/// Generates `PIOre` keys.
#[derive(Debug, Clone, Default)]
pub struct PioreKeyGenerator {
    params: PioreParams,
}

impl PioreKeyGenerator {
    /// Creates a generator for `params`.
    #[must_use]
    pub const fn new(params: PioreParams) -> Self {
        Self { params }
    }
}

impl KeyGenerator for PioreKeyGenerator {
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let size = key_size.unwrap_or(ALGORITHM.key_sizes()[0]);
        check_key_size(ALGORITHM.name(), size, ALGORITHM.key_sizes())?;

        let m = rng.gen_range(MIN_EXPONENT..24);
        let prf_key = crate::kdf::random_bytes(rng, size / 8 - FIXED_LENGTH);
        Ok(PioreKey::new(m, self.params.d, prf_key.to_vec())?.to_secret())
    }
}

/// The `PIOre` cipher.
pub struct PioreCipher {
    digits: DigitEncoder,
}

impl PioreCipher {
    /// Builds the cipher from a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if the PRF rejects the key.
    pub fn new(key: &PioreKey) -> Result<Self, Error> {
        let base = BigInt::one() << key.m;
        Ok(Self { digits: DigitEncoder::new(base, key.d, &key.prf_key)? })
    }

    /// Orders the plaintexts of two ciphertexts without decrypting them.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCiphertext` if either value is not a ciphertext
    /// of this key.
    pub fn compare(&self, left: &BigInt, right: &BigInt) -> Result<Ordering, Error> {
        self.digits.compare(left, right)
    }
}

impl OrderPreserving for PioreCipher {
    fn encrypt(&self, plaintext: u64) -> Result<BigInt, Error> {
        self.digits.encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &BigInt) -> Result<u64, Error> {
        self.digits.decrypt(ciphertext)
    }

    fn max_plaintext(&self) -> u64 {
        (1u64 << self.digits.width()) - 1
    }
}
