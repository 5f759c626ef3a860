//! Fast order-preserving encryption (`FastOPE`).
//!
//! A `d`-bit plaintext walks down a binary tree. Level `i` contributes
//! `+f(i, x)` or `-f(i, x)` depending on bit `i`, where `f` is a PRF of the
//! first `i` plaintext bits reduced into `[inf[i], sup[i])`. The intervals
//! shrink geometrically with ratio `e <= alpha`, so the contribution of any
//! level dominates everything below it and the sum preserves order.
//!
//! Interval bounds are computed exactly from the stored doubles with
//! arbitrary precision rationals.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, Rng, RngCore};
use zeroize::Zeroizing;

use super::{check_plaintext, check_width, OrderPreserving, DEFAULT_WIDTH};
use crate::error::Error;
use crate::key::{check_key_size, KeyGenerator, KeyReader, SecretKey};
use crate::prf::Prf;
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::FastOpe;

/// Bytes taken by `n`, `alpha`, `e` and `d` before the PRF key.
pub const FIXED_LENGTH: usize = 3 * 8 + 1;

/// Default minimum ciphertext distance.
pub const DEFAULT_TAU: u32 = 16;

/// Parameters of the `FastOPE` cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FopeParams {
    tau: u32,
    d: u8,
}

impl FopeParams {
    /// Creates parameters.
    ///
    /// # Arguments
    ///
    /// * `tau` - Minimum distance between ciphertexts of consecutive plaintexts
    /// * `d` - Plaintext bit width
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `tau < 2` or `d` is outside `1..=63`.
    pub fn new(tau: u32, d: u8) -> Result<Self, Error> {
        if tau < 2 {
            return Err(Error::InvalidParameter(format!("tau must be at least 2, was {tau}")));
        }
        Ok(Self { tau, d: check_width("d", d)? })
    }

    /// Minimum ciphertext distance.
    #[must_use]
    pub const fn tau(&self) -> u32 {
        self.tau
    }

    /// Plaintext bit width.
    #[must_use]
    pub const fn d(&self) -> u8 {
        self.d
    }
}

impl Default for FopeParams {
    fn default() -> Self {
        Self { tau: DEFAULT_TAU, d: DEFAULT_WIDTH }
    }
}

/// Typed `FastOPE` key.
#[derive(Clone)]
pub struct FopeKey {
    n: f64,
    alpha: f64,
    e: f64,
    d: u8,
    prf_key: Zeroizing<Vec<u8>>,
}

impl FopeKey {
    /// Assembles and validates a key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` unless `n > 0` is finite, `0 < alpha <= 0.5`,
    /// `0 < e <= alpha` and `1 <= d <= 63`, and `Error::InvalidKeySize` if
    /// the encoded size is not allowed.
    pub fn new(n: f64, alpha: f64, e: f64, d: u8, prf_key: Vec<u8>) -> Result<Self, Error> {
        let mut problems = Vec::new();
        if !(n.is_finite() && n > 0.0) {
            problems.push(format!("n must be positive and finite, was {n}"));
        }
        if !(alpha > 0.0 && alpha <= 0.5) {
            problems.push(format!("alpha must be in (0, 0.5], was {alpha}"));
        }
        if !(e > 0.0 && e <= alpha) {
            problems.push(format!("e must be in (0, alpha], was {e}"));
        }
        if !(1..=super::MAX_WIDTH).contains(&d) {
            problems.push(format!("d must be in 1..={}, was {d}", super::MAX_WIDTH));
        }
        if !problems.is_empty() {
            return Err(Error::InvalidKey(problems.join("; ")));
        }

        check_key_size(ALGORITHM.name(), (FIXED_LENGTH + prf_key.len()) * 8, ALGORITHM.key_sizes())?;
        Ok(Self { n, alpha, e, d, prf_key: Zeroizing::new(prf_key) })
    }

    /// Decodes a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is not allowed or a field is invalid.
    pub fn from_secret(key: &SecretKey) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;

        let mut reader = KeyReader::new(key.expose());
        let n = reader.read_f64("n")?;
        let alpha = reader.read_f64("alpha")?;
        let e = reader.read_f64("e")?;
        let d = reader.read_u8("d")?;
        Self::new(n, alpha, e, d, reader.rest().to_vec())
    }

    /// Encodes the key.
    #[must_use]
    pub fn to_secret(&self) -> SecretKey {
        let mut bytes = Vec::with_capacity(FIXED_LENGTH + self.prf_key.len());
        bytes.extend_from_slice(&self.n.to_be_bytes());
        bytes.extend_from_slice(&self.alpha.to_be_bytes());
        bytes.extend_from_slice(&self.e.to_be_bytes());
        bytes.push(self.d);
        bytes.extend_from_slice(&self.prf_key);
        SecretKey::new(bytes)
    }

    /// Plaintext bit width.
    #[must_use]
    pub const fn d(&self) -> u8 {
        self.d
    }
}

/// Generates `FastOPE` keys.
#[derive(Debug, Clone, Default)]
pub struct FopeKeyGenerator {
    params: FopeParams,
}

impl FopeKeyGenerator {
    /// Creates a generator for `params`.
    #[must_use]
    pub const fn new(params: FopeParams) -> Self {
        Self { params }
    }
}

impl KeyGenerator for FopeKeyGenerator {
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let size = key_size.unwrap_or(ALGORITHM.key_sizes()[0]);
        check_key_size(ALGORITHM.name(), size, ALGORITHM.key_sizes())?;

        let d = self.params.d;
        let tau = f64::from(self.params.tau);
        loop {
            let alpha = 0.5 * rng.gen::<f64>();
            let beta = 1.0 - alpha;
            let e = rng.gen::<f64>() * alpha;
            let n = tau / (beta * e.powi(i32::from(d)));

            let prf_key = crate::kdf::random_bytes(rng, size / 8 - FIXED_LENGTH).to_vec();
            let Ok(key) = FopeKey::new(n, alpha, e, d, prf_key) else {
                continue;
            };
            if FopeCipher::new(&key).is_ok() {
                return Ok(key.to_secret());
            }
        }
    }
}

/// The `FastOPE` cipher.
pub struct FopeCipher {
    d: u8,
    max_ciphertext: BigInt,
    inf: Vec<BigInt>,
    span: Vec<BigInt>,
    prf: Prf,
}

impl FopeCipher {
    /// Builds the cipher and its interval table.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if some level's interval is empty or too
    /// narrow to dominate the levels below it.
    pub fn new(key: &FopeKey) -> Result<Self, Error> {
        let exact = |value: f64, name: &str| {
            BigRational::from_float(value)
                .ok_or_else(|| Error::InvalidKey(format!("{name} is not a finite number")))
        };
        let n = exact(key.n, "n")?;
        let alpha = exact(key.alpha, "alpha")?;
        let e = exact(key.e, "e")?;
        let beta = BigRational::one() - &alpha;

        let levels = usize::from(key.d) + 1;
        let mut inf = Vec::with_capacity(levels);
        let mut span = Vec::with_capacity(levels);
        let mut scale = n.clone();
        for level in 0..levels {
            let low = if level == levels - 1 {
                BigInt::one()
            } else {
                (&alpha * &scale).floor().to_integer()
            };
            let high = (&beta * &scale).ceil().to_integer();
            if high <= low {
                return Err(Error::InvalidKey(format!("interval of level {level} is empty")));
            }
            span.push(&high - &low);
            inf.push(low);
            scale *= &e;
        }

        // Each level must outweigh the largest swing of all levels below it
        let mut below = BigInt::zero();
        for level in (1..levels).rev() {
            if level < levels - 1 && inf[level] <= below {
                return Err(Error::InvalidKey(format!(
                    "level {level} does not dominate the levels below it"
                )));
            }
            below += &inf[level] + &span[level] - 1;
        }

        Ok(Self {
            d: key.d,
            max_ciphertext: n.floor().to_integer(),
            inf,
            span,
            prf: Prf::new(&key.prf_key)?,
        })
    }

    /// `f(level, x)` over the first `level` bits of `x`.
    fn f(&self, level: u8, x: u64) -> BigInt {
        let shift = self.d - level;
        let prefix = (x >> shift) << shift;
        let index = usize::from(level);
        self.prf.evaluate_mod(&prefix.to_be_bytes(), &self.span[index]) + &self.inf[index]
    }
}

impl OrderPreserving for FopeCipher {
    fn encrypt(&self, plaintext: u64) -> Result<BigInt, Error> {
        check_plaintext(plaintext, self.d)?;

        let mut c = self.f(0, 0);
        for level in 1..=self.d {
            let term = self.f(level, plaintext);
            if (plaintext >> (self.d - level)) & 1 == 1 {
                c += term;
            } else {
                c -= term;
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

        let d = self.d;
        let mut acc = self.f(0, 0);
        let mut x: u64 = if *ciphertext < acc { 0 } else { 1 << (d - 1) };

        for level in 2..=d {
            // Add the previous level, whose bit is already known
            let term = self.f(level - 1, x);
            if (x >> (d - level + 1)) & 1 == 1 {
                acc += term;
            } else {
                acc -= term;
            }
            if *ciphertext >= acc {
                x |= 1 << (d - level);
            }
        }

        let term = self.f(d, x);
        if x & 1 == 1 {
            acc += term;
        } else {
            acc -= term;
        }

        if acc == *ciphertext {
            Ok(x)
        } else {
            Err(Error::InvalidCiphertext(format!("{ciphertext} does not decrypt under this key")))
        }
    }

    fn max_plaintext(&self) -> u64 {
        (1u64 << self.d) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn create_test_key(d: u8, seed: u64) -> FopeKey {
        let mut rng = StdRng::seed_from_u64(seed);
        let generator = FopeKeyGenerator::new(FopeParams::new(DEFAULT_TAU, d).unwrap());
        let key = generator.generate_key(None, &mut rng).expect("key generation failed");
        FopeKey::from_secret(&key).expect("generated key must decode")
    }

    fn create_test_cipher(d: u8, seed: u64) -> FopeCipher {
        FopeCipher::new(&create_test_key(d, seed)).expect("generated key must build a cipher")
    }

    #[test]
    fn test_round_trip_full_domain() {
        let cipher = create_test_cipher(8, 1);

        for x in 0..256 {
            let c = cipher.encrypt(x).expect("encryption failed");
            assert_eq!(cipher.decrypt(&c).expect("decryption failed"), x);
        }
    }

    #[test]
    fn test_order_preserved() {
        let cipher = create_test_cipher(8, 2);

        let ciphertexts: Vec<_> = (0..256).map(|x| cipher.encrypt(x).unwrap()).collect();
        for pair in ciphertexts.windows(2) {
            assert!(pair[0] < pair[1], "ciphertexts must be strictly increasing");
        }
    }

    #[test]
    fn test_deterministic() {
        let cipher = create_test_cipher(16, 3);
        assert_eq!(cipher.encrypt(12_345).unwrap(), cipher.encrypt(12_345).unwrap());
    }

    #[test]
    fn test_single_bit_domain() {
        let cipher = create_test_cipher(1, 4);

        let zero = cipher.encrypt(0).unwrap();
        let one = cipher.encrypt(1).unwrap();
        assert!(zero < one);
        assert_eq!(cipher.decrypt(&zero).unwrap(), 0);
        assert_eq!(cipher.decrypt(&one).unwrap(), 1);
        assert!(matches!(cipher.encrypt(2), Err(Error::Domain(_))));
    }

    #[test]
    fn test_domain_exclusive_bound() {
        let cipher = create_test_cipher(8, 5);
        assert_eq!(cipher.max_plaintext(), 255);
        assert!(matches!(cipher.encrypt(256), Err(Error::Domain(_))));
    }

    #[test]
    fn test_invalid_ciphertext() {
        let cipher = create_test_cipher(8, 6);

        assert!(matches!(cipher.decrypt(&BigInt::from(-1)), Err(Error::InvalidCiphertext(_))));
        let beyond = &cipher.max_ciphertext + 1;
        assert!(matches!(cipher.decrypt(&beyond), Err(Error::InvalidCiphertext(_))));

        // A value between two valid ciphertexts does not decrypt
        let c = cipher.encrypt(100).unwrap();
        let next = cipher.encrypt(101).unwrap();
        assert!(&next - &c > BigInt::one(), "tau keeps ciphertexts apart");
        assert!(matches!(cipher.decrypt(&(c + 1)), Err(Error::InvalidCiphertext(_))));
    }

    #[test]
    fn test_key_round_trip() {
        let key = create_test_key(12, 7);
        let decoded = FopeKey::from_secret(&key.to_secret()).unwrap();

        assert_eq!(decoded.to_secret().expose(), key.to_secret().expose());
        assert_eq!(decoded.d(), 12);
        assert_eq!(key.to_secret().bit_len(), 256);
    }

    #[test]
    fn test_key_validation() {
        let prf_key = vec![0u8; 32 - FIXED_LENGTH];

        assert!(FopeKey::new(1e6, 0.3, 0.1, 8, prf_key.clone()).is_ok());
        assert!(matches!(FopeKey::new(1e6, 0.6, 0.1, 8, prf_key.clone()), Err(Error::InvalidKey(_))));
        assert!(matches!(FopeKey::new(1e6, 0.3, 0.4, 8, prf_key.clone()), Err(Error::InvalidKey(_))));
        assert!(matches!(FopeKey::new(-1.0, 0.3, 0.1, 8, prf_key.clone()), Err(Error::InvalidKey(_))));
        assert!(matches!(FopeKey::new(f64::NAN, 0.3, 0.1, 8, prf_key.clone()), Err(Error::InvalidKey(_))));
        assert!(matches!(FopeKey::new(1e6, 0.3, 0.1, 0, prf_key.clone()), Err(Error::InvalidKey(_))));
        assert!(matches!(FopeKey::new(1e6, 0.3, 0.1, 64, prf_key), Err(Error::InvalidKey(_))));

        assert!(matches!(
            FopeKey::new(1e6, 0.3, 0.1, 8, vec![0u8; 3]),
            Err(Error::InvalidKeySize { .. })
        ));
        assert!(matches!(
            FopeKey::from_secret(&SecretKey::new(vec![0u8; 20])),
            Err(Error::InvalidKeySize { .. })
        ));
    }

    #[test]
    fn test_params_validation() {
        assert!(matches!(FopeParams::new(1, 8), Err(Error::InvalidParameter(_))));
        assert!(matches!(FopeParams::new(16, 0), Err(Error::InvalidParameter(_))));
        assert_eq!(FopeParams::default().tau(), 16);
        assert_eq!(FopeParams::default().d(), 8);
    }
}
