//! Arithmetic-coding order-preserving encryption (`ArithmeticCoding`).
//!
//! The plaintext `x` is mapped to the point `x / 2^n` of the unit interval.
//! Encryption narrows `[a, b)` around that point `k` times, splitting at
//! `a + (b - a) * p / (p + q)` with the key's ratio pairs used cyclically,
//! and emits one ciphertext bit per step (most significant first). The key
//! guarantees the final interval is at most `2^-n` wide, so decryption
//! recovers `x` as `ceil(2^n * a)`.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, Rng, RngCore};

use super::{check_plaintext, check_width, OrderPreserving, DEFAULT_WIDTH};
use crate::error::Error;
use crate::key::{check_key_size, KeyGenerator, KeyReader, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::ArithmeticCoding;

/// Bytes taken by `n` and `k` after the ratio pairs.
pub const FIXED_LENGTH: usize = 2;

/// Largest number of narrowing steps.
pub const MAX_STEPS: u16 = 255;

/// Parameters of the `ArithmeticCoding` cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcopeParams {
    n: u8,
}

impl AcopeParams {
    /// Creates parameters for `n`-bit plaintexts.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `n` is outside `1..=63`.
    pub fn new(n: u8) -> Result<Self, Error> {
        Ok(Self { n: check_width("n", n)? })
    }

    /// Plaintext bit width.
    #[must_use]
    pub const fn n(&self) -> u8 {
        self.n
    }
}

impl Default for AcopeParams {
    fn default() -> Self {
        Self { n: DEFAULT_WIDTH }
    }
}

/// Typed `ArithmeticCoding` key.
#[derive(Clone, PartialEq, Eq)]
pub struct AcopeKey {
    ratios: Vec<(u8, u8)>,
    n: u8,
    k: u16,
}

impl AcopeKey {
    /// Assembles and validates a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if a ratio term is outside `1..=127`, `n`
    /// outside `1..=63`, `k` outside `1..=255`, or if `k` steps cannot narrow
    /// the interval to `2^-n`. Returns `Error::InvalidKeySize` if the encoded
    /// size is not allowed.
    pub fn new(ratios: Vec<(u8, u8)>, n: u8, k: u16) -> Result<Self, Error> {
        check_key_size(
            ALGORITHM.name(),
            (ratios.len() * 2 + FIXED_LENGTH) * 8,
            ALGORITHM.key_sizes(),
        )?;

        let mut problems = Vec::new();
        for (index, &(p, q)) in ratios.iter().enumerate() {
            if !(1..=127).contains(&p) {
                problems.push(format!("p{index} must be in 1..=127, was {p}"));
            }
            if !(1..=127).contains(&q) {
                problems.push(format!("q{index} must be in 1..=127, was {q}"));
            }
        }
        if !(1..=super::MAX_WIDTH).contains(&n) {
            problems.push(format!("n must be in 1..={}, was {n}", super::MAX_WIDTH));
        }
        if !(1..=MAX_STEPS).contains(&k) {
            problems.push(format!("k must be in 1..={MAX_STEPS}, was {k}"));
        }
        if !problems.is_empty() {
            return Err(Error::InvalidKey(problems.join("; ")));
        }
        match steps_needed(&ratios, n) {
            Some(steps) if steps <= k => {}
            _ => {
                return Err(Error::InvalidKey(format!(
                    "{k} steps cannot distinguish {n}-bit plaintexts"
                )))
            }
        }

        Ok(Self { ratios, n, k })
    }

    /// Decodes a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is not allowed or a field is invalid.
    pub fn from_secret(key: &SecretKey) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;

        let count = (key.expose().len() - FIXED_LENGTH) / 2;
        let mut reader = KeyReader::new(key.expose());
        let mut ratios = Vec::with_capacity(count);
        for _ in 0..count {
            ratios.push((reader.read_u8("p")?, reader.read_u8("q")?));
        }
        let n = reader.read_u8("n")?;
        // Stored as k - 128 in a signed byte
        let k = u16::from(reader.read_u8("k")?.wrapping_sub(128));
        Self::new(ratios, n, k)
    }

    /// Encodes the key.
    #[must_use]
    pub fn to_secret(&self) -> SecretKey {
        let mut bytes = Vec::with_capacity(self.ratios.len() * 2 + FIXED_LENGTH);
        for &(p, q) in &self.ratios {
            bytes.push(p);
            bytes.push(q);
        }
        bytes.push(self.n);
        // k <= 255 so k - 128 fits a signed byte
        #[allow(clippy::cast_possible_truncation)]
        bytes.push((self.k as u8).wrapping_add(128));
        SecretKey::new(bytes)
    }
}

/// Worst-case shrink factor of one step.
fn shrink(p: u8, q: u8) -> BigRational {
    BigRational::new(BigInt::from(p.max(q)), BigInt::from(u16::from(p) + u16::from(q)))
}

/// Fewest steps after which every interval is at most `2^-n` wide, if that
/// happens within [`MAX_STEPS`].
fn steps_needed(ratios: &[(u8, u8)], n: u8) -> Option<u16> {
    let target = BigRational::new(BigInt::one(), BigInt::one() << n);
    let mut product = BigRational::one();
    for step in 1..=MAX_STEPS {
        let (p, q) = ratios[usize::from(step - 1) % ratios.len()];
        product *= shrink(p, q);
        if product <= target {
            return Some(step);
        }
    }
    None
}

/// Generates `ArithmeticCoding` keys.
#[derive(Debug, Clone, Default)]
pub struct AcopeKeyGenerator {
    params: AcopeParams,
}

impl AcopeKeyGenerator {
    /// Creates a generator for `params`.
    #[must_use]
    pub const fn new(params: AcopeParams) -> Self {
        Self { params }
    }
}

impl KeyGenerator for AcopeKeyGenerator {
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let size = key_size.unwrap_or(ALGORITHM.key_sizes()[0]);
        check_key_size(ALGORITHM.name(), size, ALGORITHM.key_sizes())?;

        let count = (size / 8 - FIXED_LENGTH) / 2;
        loop {
            let ratios: Vec<(u8, u8)> =
                (0..count).map(|_| (rng.gen_range(1..=126), rng.gen_range(1..=126))).collect();

            if let Some(steps) = steps_needed(&ratios, self.params.n) {
                // Use every ratio at least once
                let k = steps.max(u16::try_from(count).unwrap_or(MAX_STEPS));
                return Ok(AcopeKey::new(ratios, self.params.n, k)?.to_secret());
            }
        }
    }
}

/// The `ArithmeticCoding` cipher.
pub struct AcopeCipher {
    key: AcopeKey,
    scale: BigRational,
    max_ciphertext: BigInt,
}

impl AcopeCipher {
    /// Builds the cipher from a key.
    #[must_use]
    pub fn new(key: &AcopeKey) -> Self {
        Self {
            key: key.clone(),
            scale: BigRational::from_integer(BigInt::one() << key.n),
            max_ciphertext: (BigInt::one() << key.k) - 1,
        }
    }

    fn split(&self, step: u16, low: &BigRational, high: &BigRational) -> BigRational {
        let (p, q) = self.key.ratios[usize::from(step) % self.key.ratios.len()];
        let ratio = BigRational::new(BigInt::from(p), BigInt::from(u16::from(p) + u16::from(q)));
        low + (high - low) * ratio
    }
}

impl OrderPreserving for AcopeCipher {
    fn encrypt(&self, plaintext: u64) -> Result<BigInt, Error> {
        check_plaintext(plaintext, self.key.n)?;

        let point = BigRational::from_integer(BigInt::from(plaintext)) / &self.scale;
        let mut low = BigRational::zero();
        let mut high = BigRational::one();
        let mut c = BigInt::zero();
        for step in 0..self.key.k {
            let split = self.split(step, &low, &high);
            c <<= 1;
            if split > point {
                high = split;
            } else {
                c += 1;
                low = split;
            }
        }
        Ok(c)
    }

    fn decrypt(&self, ciphertext: &BigInt) -> Result<u64, Error> {
        if ciphertext.is_negative() || *ciphertext > self.max_ciphertext {
            return Err(Error::InvalidCiphertext(format!(
                "ciphertext must be in 0..={}, was {ciphertext}",
                self.max_ciphertext
            )));
        }

        let mut low = BigRational::zero();
        let mut high = BigRational::one();
        for step in 0..self.key.k {
            let split = self.split(step, &low, &high);
            if ciphertext.bit(u64::from(self.key.k - step - 1)) {
                low = split;
            } else {
                high = split;
            }
        }

        let x = (low * &self.scale).ceil().to_integer();
        u64::try_from(&x)
            .ok()
            .filter(|&x| x >> self.key.n == 0)
            .ok_or_else(|| Error::InvalidCiphertext(format!("{ciphertext} decodes outside the domain")))
    }

    fn max_plaintext(&self) -> u64 {
        (1u64 << self.key.n) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn create_test_key(n: u8, seed: u64) -> AcopeKey {
        let mut rng = StdRng::seed_from_u64(seed);
        let generator = AcopeKeyGenerator::new(AcopeParams::new(n).unwrap());
        let key = generator.generate_key(None, &mut rng).expect("key generation failed");
        AcopeKey::from_secret(&key).expect("generated key must decode")
    }

    #[test]
    fn test_round_trip_full_domain() {
        let cipher = AcopeCipher::new(&create_test_key(8, 1));

        for x in 0..256 {
            let c = cipher.encrypt(x).expect("encryption failed");
            assert_eq!(cipher.decrypt(&c).expect("decryption failed"), x);
        }
    }

    #[test]
    fn test_order_preserved() {
        let cipher = AcopeCipher::new(&create_test_key(8, 2));

        let ciphertexts: Vec<_> = (0..256).map(|x| cipher.encrypt(x).unwrap()).collect();
        for pair in ciphertexts.windows(2) {
            assert!(pair[0] < pair[1], "ciphertexts must be strictly increasing");
        }
    }

    #[test]
    fn test_even_ratios_are_identity_like() {
        // 1:1 splits halve the interval, so ciphertext bits equal plaintext bits
        let key = AcopeKey::new(vec![(1, 1); 15], 4, 4).unwrap();
        let cipher = AcopeCipher::new(&key);

        for x in 0..16 {
            assert_eq!(cipher.encrypt(x).unwrap(), BigInt::from(x));
        }
    }

    #[test]
    fn test_out_of_domain() {
        let cipher = AcopeCipher::new(&create_test_key(4, 3));
        assert!(matches!(cipher.encrypt(16), Err(Error::Domain(_))));
        assert!(matches!(cipher.decrypt(&BigInt::from(-3)), Err(Error::InvalidCiphertext(_))));
    }

    #[test]
    fn test_key_round_trip() {
        let key = create_test_key(16, 4);
        let secret = key.to_secret();

        assert_eq!(secret.bit_len(), 256);
        assert!(AcopeKey::from_secret(&secret).unwrap() == key);
    }

    #[test]
    fn test_key_validation() {
        assert!(matches!(AcopeKey::new(vec![(0, 1); 15], 4, 10), Err(Error::InvalidKey(_))));
        assert!(matches!(AcopeKey::new(vec![(1, 1); 15], 0, 10), Err(Error::InvalidKey(_))));
        assert!(matches!(AcopeKey::new(vec![(1, 1); 15], 4, 0), Err(Error::InvalidKey(_))));
        // Halving 3 times cannot separate 4-bit plaintexts
        assert!(matches!(AcopeKey::new(vec![(1, 1); 15], 4, 3), Err(Error::InvalidKey(_))));
        assert!(matches!(AcopeKey::new(vec![(1, 1); 10], 4, 4), Err(Error::InvalidKeySize { .. })));
    }

    #[test]
    fn test_k_encoding_extremes() {
        let key = AcopeKey::new(vec![(1, 1); 15], 4, 255).unwrap();
        let bytes = key.to_secret().expose().to_vec();
        assert_eq!(*bytes.last().unwrap(), 127);
        assert_eq!(AcopeKey::from_secret(&key.to_secret()).unwrap().k, 255);

        let key = AcopeKey::new(vec![(1, 1); 15], 1, 1).unwrap();
        assert_eq!(*key.to_secret().expose().last().unwrap(), 0x81);
    }
}
