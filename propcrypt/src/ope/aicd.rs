//! Approximate integer common divisor OPE (`CommonDivisor`).
//!
//! The key is a large positive integer `k`. A plaintext `x` encrypts to
//! `x * k + r` with `r` drawn uniformly from `[k^(3/4), k - k^(3/4))`, so
//! ciphertexts of consecutive plaintexts never overlap and decryption is a
//! single integer division. Plaintexts are bounded by `floor(k^(3/8))`.

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::{Integer, Roots};
use num_traits::{One, ToPrimitive, Zero};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use super::OrderPreserving;
use crate::error::Error;
use crate::key::{check_key_size, KeyGenerator, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::CommonDivisor;

/// Domain upper bound used when none is configured.
pub const DEFAULT_DOMAIN: u64 = 256;

/// Parameters of the `CommonDivisor` cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AicdParams {
    m: u64,
}

impl AicdParams {
    /// Creates parameters for plaintexts up to `m`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `m` is zero.
    pub fn new(m: u64) -> Result<Self, Error> {
        if m == 0 {
            return Err(Error::InvalidParameter("m must be positive, was 0".to_string()));
        }
        Ok(Self { m })
    }

    /// Domain upper bound.
    #[must_use]
    pub const fn m(&self) -> u64 {
        self.m
    }

    /// Smallest allowed key size whose domain covers `m`.
    ///
    /// A key of `s` bits has `k >= 2^(s-2)`, and the domain bound
    /// `k^(3/8) >= m` needs `s - 2 >= 8/3 * log2(m)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if no allowed key size is large enough.
    pub fn min_key_size(&self) -> Result<usize, Error> {
        let required = required_bits(self.m);
        ALGORITHM
            .key_sizes()
            .iter()
            .copied()
            .find(|&size| size >= required)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("m = {} needs a key of {required} bits", self.m))
            })
    }
}

impl Default for AicdParams {
    fn default() -> Self {
        Self { m: DEFAULT_DOMAIN }
    }
}

// ceil(8/3 * log2(m)) + 2
fn required_bits(m: u64) -> usize {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lambda = (8.0 / 3.0 * (m as f64).log2()).ceil().max(0.0) as usize;
    lambda + 2
}

/// Typed `CommonDivisor` key.
#[derive(Clone, PartialEq, Eq)]
pub struct AicdKey {
    k: BigUint,
}

impl AicdKey {
    /// Wraps a key integer.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if `k` is not positive and
    /// `Error::InvalidKeySize` if its encoding is not an allowed size.
    pub fn new(k: BigInt) -> Result<Self, Error> {
        let bits = k.to_signed_bytes_be().len() * 8;
        let key = Self::positive(k)?;
        check_key_size(ALGORITHM.name(), bits, ALGORITHM.key_sizes())?;
        Ok(key)
    }

    /// Decodes a key from its signed big-endian encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is not allowed or `k <= 0`.
    pub fn from_secret(key: &SecretKey) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;
        Self::positive(BigInt::from_signed_bytes_be(key.expose()))
    }

    fn positive(k: BigInt) -> Result<Self, Error> {
        match k.into_parts() {
            (Sign::Plus, k) => Ok(Self { k }),
            _ => Err(Error::InvalidKey("k must be positive".to_string())),
        }
    }

    /// Encodes the key.
    #[must_use]
    pub fn to_secret(&self) -> SecretKey {
        SecretKey::new(BigInt::from(self.k.clone()).to_signed_bytes_be())
    }
}

/// Generates `CommonDivisor` keys for a domain bound.
#[derive(Debug, Clone, Default)]
pub struct AicdKeyGenerator {
    params: AicdParams,
}

impl AicdKeyGenerator {
    /// Creates a generator for `params`.
    #[must_use]
    pub const fn new(params: AicdParams) -> Self {
        Self { params }
    }
}

impl KeyGenerator for AicdKeyGenerator {
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let min = self.params.min_key_size()?;
        let size = key_size.unwrap_or(min);
        check_key_size(ALGORITHM.name(), size, ALGORITHM.key_sizes())?;
        if size < min {
            return Err(Error::InvalidKeySize {
                algorithm: ALGORITHM.name(),
                actual: size,
                allowed: format!("at least {min} for m = {}", self.params.m),
            });
        }

        // k in [2^(s-2), 2^(s-1)) keeps the sign byte clear
        let low = BigUint::one() << (size - 2);
        let k = &low + rng.gen_biguint_below(&low);
        Ok(AicdKey { k }.to_secret())
    }
}

/// The `CommonDivisor` cipher.
pub struct AicdCipher {
    k: BigUint,
    k34: BigUint,
    max_plaintext: u64,
    max_ciphertext: BigUint,
}

impl AicdCipher {
    /// Builds the cipher from a key.
    #[must_use]
    pub fn new(key: &AicdKey) -> Self {
        let k = key.k.clone();
        let cube = k.pow(3);
        let k34 = cube.nth_root(4);
        let max_plaintext = cube.nth_root(8).to_u64().unwrap_or(u64::MAX);
        let max_ciphertext = BigUint::from(max_plaintext) * &k + (&k - &k34);

        Self { k, k34, max_plaintext, max_ciphertext }
    }
}

impl OrderPreserving for AicdCipher {
    fn encrypt(&self, plaintext: u64) -> Result<BigInt, Error> {
        if plaintext > self.max_plaintext {
            return Err(Error::Domain(format!(
                "plaintext must be in 0..={}, was {plaintext}",
                self.max_plaintext
            )));
        }

        let noise = OsRng.gen_biguint_range(&self.k34, &(&self.k - &self.k34));
        Ok(BigInt::from(BigUint::from(plaintext) * &self.k + noise))
    }

    fn decrypt(&self, ciphertext: &BigInt) -> Result<u64, Error> {
        let c = match ciphertext.to_biguint() {
            Some(c) if !c.is_zero() && c <= self.max_ciphertext => c,
            _ => {
                return Err(Error::InvalidCiphertext(format!(
                    "ciphertext must be in 1..={}, was {ciphertext}",
                    self.max_ciphertext
                )))
            }
        };

        c.div_floor(&self.k)
            .to_u64()
            .ok_or_else(|| Error::InvalidCiphertext("plaintext exceeds 64 bits".to_string()))
    }

    fn max_plaintext(&self) -> u64 {
        self.max_plaintext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn create_test_cipher(m: u64, seed: u64) -> AicdCipher {
        let mut rng = StdRng::seed_from_u64(seed);
        let generator = AicdKeyGenerator::new(AicdParams::new(m).unwrap());
        let key = generator.generate_key(None, &mut rng).expect("key generation failed");
        AicdCipher::new(&AicdKey::from_secret(&key).expect("generated key must decode"))
    }

    #[test]
    fn test_min_key_size() {
        assert_eq!(AicdParams::new(1).unwrap().min_key_size().unwrap(), 128);
        assert_eq!(AicdParams::new(256).unwrap().min_key_size().unwrap(), 128);
        // 8/3 * 64 = 171 bits plus 2
        assert_eq!(AicdParams::new(u64::MAX).unwrap().min_key_size().unwrap(), 192);
    }

    #[test]
    fn test_zero_domain_rejected() {
        assert!(matches!(AicdParams::new(0), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_round_trip() {
        let cipher = create_test_cipher(10_000, 1);

        for x in [0, 1, 2, 255, 9_999, 10_000] {
            let c = cipher.encrypt(x).expect("encryption failed");
            assert_eq!(cipher.decrypt(&c).expect("decryption failed"), x);
        }
    }

    #[test]
    fn test_domain_covers_m() {
        let cipher = create_test_cipher(1 << 40, 2);
        assert!(cipher.max_plaintext() >= 1 << 40);
    }

    #[test]
    fn test_order_preserved() {
        let cipher = create_test_cipher(1000, 3);

        let mut previous = cipher.encrypt(0).unwrap();
        for x in 1..200 {
            let current = cipher.encrypt(x).unwrap();
            assert!(previous < current, "encrypt({}) must be below encrypt({x})", x - 1);
            previous = current;
        }
    }

    #[test]
    fn test_encryption_is_randomized() {
        let cipher = create_test_cipher(1000, 4);
        assert_ne!(cipher.encrypt(42).unwrap(), cipher.encrypt(42).unwrap());
    }

    #[test]
    fn test_out_of_domain() {
        let cipher = create_test_cipher(1000, 5);
        let result = cipher.encrypt(cipher.max_plaintext() + 1);
        assert!(matches!(result, Err(Error::Domain(_))));
    }

    #[test]
    fn test_invalid_ciphertexts() {
        let cipher = create_test_cipher(1000, 6);

        assert!(matches!(cipher.decrypt(&BigInt::zero()), Err(Error::InvalidCiphertext(_))));
        assert!(matches!(cipher.decrypt(&BigInt::from(-5)), Err(Error::InvalidCiphertext(_))));

        let too_large = BigInt::from(cipher.max_ciphertext.clone()) + 1;
        assert!(matches!(cipher.decrypt(&too_large), Err(Error::InvalidCiphertext(_))));
    }

    #[test]
    fn test_key_validation() {
        // 16 bytes with the sign bit set encodes a negative k
        let negative = SecretKey::new(vec![0xFF; 16]);
        assert!(matches!(AicdKey::from_secret(&negative), Err(Error::InvalidKey(_))));

        let zero = SecretKey::new(vec![0x00; 16]);
        assert!(matches!(AicdKey::from_secret(&zero), Err(Error::InvalidKey(_))));

        assert!(matches!(AicdKey::new(BigInt::from(12345)), Err(Error::InvalidKeySize { .. })));

        let wrong_size = SecretKey::new(vec![0x01; 10]);
        assert!(matches!(AicdKey::from_secret(&wrong_size), Err(Error::InvalidKeySize { .. })));
    }

    #[test]
    fn test_key_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let key = AicdKeyGenerator::default().generate_key(Some(256), &mut rng).unwrap();
        assert_eq!(key.bit_len(), 256);

        let typed = AicdKey::from_secret(&key).unwrap();
        assert_eq!(typed.to_secret().expose(), key.expose());
    }

    #[test]
    fn test_key_size_too_small_for_domain() {
        let mut rng = StdRng::seed_from_u64(8);
        let generator = AicdKeyGenerator::new(AicdParams::new(u64::MAX).unwrap());

        let result = generator.generate_key(Some(128), &mut rng);
        assert!(matches!(result, Err(Error::InvalidKeySize { .. })));
    }
}
