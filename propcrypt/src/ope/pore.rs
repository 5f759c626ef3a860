//! Parametrized order-revealing encryption with base `q` digits (`POre`).
//!
//! Same digit construction as `PIOre` with an arbitrary base. Small bases
//! give short ciphertexts at the cost of more frequent digit wrap around, so
//! callers that need exact order should use [`PoreCipher::compare`].

use std::cmp::Ordering;

use num_bigint::BigInt;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::digits::DigitEncoder;
use super::{check_width, OrderPreserving, DEFAULT_WIDTH};
use crate::error::Error;
use crate::key::{check_key_size, KeyGenerator, KeyReader, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::POre;

/// Bytes taken by `q` and `n` before the PRF key.
pub const FIXED_LENGTH: usize = 3;

/// Smallest digit base.
pub const MIN_BASE: u16 = 3;

/// Largest digit base.
pub const MAX_BASE: u16 = 16384;

/// Default digit base.
pub const DEFAULT_BASE: u16 = 1024;

fn check_base(q: u16) -> Result<u16, String> {
    if (MIN_BASE..=MAX_BASE).contains(&q) {
        Ok(q)
    } else {
        Err(format!("q must be in {MIN_BASE}..={MAX_BASE}, was {q}"))
    }
}

/// Parameters of the `POre` cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoreParams {
    n: u8,
    q: u16,
}

impl PoreParams {
    /// Creates parameters for `n`-bit plaintexts and base `q` digits.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `n` is outside `1..=63` or `q`
    /// outside `3..=16384`.
    pub fn new(n: u8, q: u16) -> Result<Self, Error> {
        let n = check_width("n", n)?;
        let q = check_base(q).map_err(Error::InvalidParameter)?;
        Ok(Self { n, q })
    }

    /// Plaintext bit width.
    #[must_use]
    pub const fn n(&self) -> u8 {
        self.n
    }

    /// Digit base.
    #[must_use]
    pub const fn q(&self) -> u16 {
        self.q
    }
}

impl Default for PoreParams {
    fn default() -> Self {
        Self { n: DEFAULT_WIDTH, q: DEFAULT_BASE }
    }
}

/// Typed `POre` key.
#[derive(Clone)]
pub struct PoreKey {
    q: u16,
    n: u8,
    prf_key: Zeroizing<Vec<u8>>,
}

impl PoreKey {
    /// Assembles and validates a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` unless `3 <= q <= 16384` and `1 <= n <= 63`,
    /// and `Error::InvalidKeySize` if the encoded size is not allowed.
    pub fn new(q: u16, n: u8, prf_key: Vec<u8>) -> Result<Self, Error> {
        let q = check_base(q).map_err(Error::InvalidKey)?;
        if !(1..=super::MAX_WIDTH).contains(&n) {
            return Err(Error::InvalidKey(format!("n must be in 1..={}, was {n}", super::MAX_WIDTH)));
        }
        check_key_size(ALGORITHM.name(), (FIXED_LENGTH + prf_key.len()) * 8, ALGORITHM.key_sizes())?;
        Ok(Self { q, n, prf_key: Zeroizing::new(prf_key) })
    }

    /// Decodes a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is not allowed or a field is invalid.
    pub fn from_secret(key: &SecretKey) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;

        let mut reader = KeyReader::new(key.expose());
        let q = reader.read_u16("q")?;
        let n = reader.read_u8("n")?;
        Self::new(q, n, reader.rest().to_vec())
    }

    /// Encodes the key.
    #[must_use]
    pub fn to_secret(&self) -> SecretKey {
        let mut bytes = self.q.to_be_bytes().to_vec();
        bytes.push(self.n);
        bytes.extend_from_slice(&self.prf_key);
        SecretKey::new(bytes)
    }
}

/// Generates `POre` keys.
#[derive(Debug, Clone, Default)]
pub struct PoreKeyGenerator {
    params: PoreParams,
}

impl PoreKeyGenerator {
    /// Creates a generator for `params`.
    #[must_use]
    pub const fn new(params: PoreParams) -> Self {
        Self { params }
    }
}

impl KeyGenerator for PoreKeyGenerator {
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let size = key_size.unwrap_or(ALGORITHM.key_sizes()[0]);
        check_key_size(ALGORITHM.name(), size, ALGORITHM.key_sizes())?;

        let prf_key = crate::kdf::random_bytes(rng, size / 8 - FIXED_LENGTH);
        Ok(PoreKey::new(self.params.q, self.params.n, prf_key.to_vec())?.to_secret())
    }
}

/// The `POre` cipher.
pub struct PoreCipher {
    digits: DigitEncoder,
}

impl PoreCipher {
    /// Builds the cipher from a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if the PRF rejects the key.
    pub fn new(key: &PoreKey) -> Result<Self, Error> {
        Ok(Self { digits: DigitEncoder::new(BigInt::from(key.q), key.n, &key.prf_key)? })
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

impl OrderPreserving for PoreCipher {
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

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn create_test_cipher(n: u8, q: u16, seed: u64) -> PoreCipher {
        let mut rng = StdRng::seed_from_u64(seed);
        let generator = PoreKeyGenerator::new(PoreParams::new(n, q).unwrap());
        let key = generator.generate_key(None, &mut rng).expect("key generation failed");
        PoreCipher::new(&PoreKey::from_secret(&key).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cipher = create_test_cipher(9, DEFAULT_BASE, 1);

        for x in 0..512 {
            let c = cipher.encrypt(x).expect("encryption failed");
            assert_eq!(cipher.decrypt(&c).expect("decryption failed"), x);
        }
    }

    #[test]
    fn test_small_base_compare() {
        // Base 3 wraps often, compare must still be exact
        let cipher = create_test_cipher(6, 3, 2);
        let ciphertexts: Vec<_> = (0..64).map(|x| cipher.encrypt(x).unwrap()).collect();

        for (i, left) in ciphertexts.iter().enumerate() {
            for (j, right) in ciphertexts.iter().enumerate() {
                assert_eq!(cipher.compare(left, right).unwrap(), i.cmp(&j));
            }
        }
    }

    #[test]
    fn test_small_base_round_trip() {
        let cipher = create_test_cipher(6, 3, 3);

        for x in 0..64 {
            let c = cipher.encrypt(x).unwrap();
            assert_eq!(cipher.decrypt(&c).unwrap(), x);
        }
    }

    #[test]
    fn test_out_of_domain() {
        let cipher = create_test_cipher(4, DEFAULT_BASE, 4);
        assert_eq!(cipher.max_plaintext(), 15);
        assert!(matches!(cipher.encrypt(16), Err(Error::Domain(_))));
    }

    #[test]
    fn test_params_validation() {
        assert!(matches!(PoreParams::new(8, 2), Err(Error::InvalidParameter(_))));
        assert!(matches!(PoreParams::new(8, 16385), Err(Error::InvalidParameter(_))));
        assert!(matches!(PoreParams::new(0, 1024), Err(Error::InvalidParameter(_))));
        assert_eq!(PoreParams::default().q(), 1024);
    }

    #[test]
    fn test_key_validation() {
        assert!(matches!(PoreKey::new(2, 8, vec![0; 29]), Err(Error::InvalidKey(_))));
        assert!(matches!(PoreKey::new(1024, 64, vec![0; 29]), Err(Error::InvalidKey(_))));
        assert!(matches!(PoreKey::new(1024, 8, vec![0; 30]), Err(Error::InvalidKeySize { .. })));

        let key = PoreKey::new(1024, 8, vec![7; 29]).unwrap();
        let decoded = PoreKey::from_secret(&key.to_secret()).unwrap();
        assert_eq!(decoded.q, 1024);
        assert_eq!(decoded.n, 8);
    }
}
