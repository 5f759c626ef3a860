//! NIST SP 800-38G FF3 format-preserving encryption.
//!
//! An 8-round Feistel network over the two halves of a numeral string. The
//! round function encrypts the round tweak half and the reversed right half
//! with AES, keyed with the byte-reversed key.
//!
//! # Example
//!
//! ```
//! use propcrypt::fpe::{ff3::Ff3Cipher, FormatPreserving, FpeParams};
//! use propcrypt::key::SecretKey;
//!
//! let key = SecretKey::new(vec![0x2B; 16]);
//! let params = FpeParams::new(10, Some(vec![0; 8])).unwrap();
//! let cipher = Ff3Cipher::new(&key, &params).unwrap();
//!
//! let encrypted = cipher.encrypt("4111111111111111").unwrap();
//! assert_eq!(encrypted.len(), 16);
//! assert_eq!(cipher.decrypt(&encrypted).unwrap(), "4111111111111111");
//! ```

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

use super::{
    num_le, parse_digits, render_digits, str_le, write_be, FormatPreserving, FpeParams,
    LengthBounds,
};
use crate::block::{Aes, BLOCK_SIZE};
use crate::error::Error;
use crate::key::{check_key_size, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::Ff3;

/// Exact tweak length in bytes.
pub const TWEAK_LENGTH: usize = 8;

const ROUNDS: u8 = 8;

/// Each half must fit the 12 bytes left in the round input.
const HALF_BITS: u32 = 96;

/// Returns a fresh random tweak.
pub fn random_tweak<R>(rng: &mut R) -> Vec<u8>
where
    R: RngCore + CryptoRng + ?Sized,
{
    crate::kdf::random_bytes(rng, TWEAK_LENGTH).to_vec()
}

/// Checks the tweak length.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` unless `tweak` is exactly 8 bytes.
pub fn check_tweak(tweak: &[u8]) -> Result<(), Error> {
    if tweak.len() == TWEAK_LENGTH {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "FF3 tweak must be {TWEAK_LENGTH} bytes, was {}",
            tweak.len()
        )))
    }
}

/// The FF3 cipher for one key, radix and tweak.
#[derive(Clone)]
pub struct Ff3Cipher {
    aes: Aes,
    radix: u32,
    tweak: [u8; TWEAK_LENGTH],
    bounds: LengthBounds,
}

impl Ff3Cipher {
    /// Builds the cipher.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeySize` for keys other than 128, 192 or 256
    /// bits and `Error::InvalidParameter` if the tweak is missing or not
    /// 8 bytes long.
    pub fn new(key: &SecretKey, params: &FpeParams) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;
        let tweak = params
            .tweak()
            .ok_or_else(|| Error::InvalidParameter("FF3 requires a tweak".to_string()))?;
        check_tweak(tweak)?;

        let reversed: Vec<u8> = key.expose().iter().rev().copied().collect();
        let mut fixed = [0u8; TWEAK_LENGTH];
        fixed.copy_from_slice(tweak);

        Ok(Self {
            aes: Aes::new(&reversed)?,
            radix: params.radix(),
            tweak: fixed,
            bounds: LengthBounds::new(params.radix(), HALF_BITS),
        })
    }

    /// Round function output for round `round` over the half `half`.
    fn round_value(&self, round: u8, half: &[u32]) -> BigUint {
        let w = if round % 2 == 0 { &self.tweak[4..] } else { &self.tweak[..4] };

        let mut block = [0u8; BLOCK_SIZE];
        block[..4].copy_from_slice(w);
        block[3] ^= round;
        write_be(&num_le(half, self.radix), &mut block[4..]);

        block.reverse();
        self.aes.encrypt_block(&mut block);
        block.reverse();
        BigUint::from_bytes_be(&block)
    }

    fn split(&self, numeral: &str) -> Result<(Vec<u32>, Vec<u32>), Error> {
        let mut digits = parse_digits(numeral, self.radix)?;
        self.bounds.check(digits.len())?;
        let right = digits.split_off(digits.len().div_ceil(2));
        Ok((digits, right))
    }

    fn modulus(&self, len: usize) -> BigUint {
        BigUint::from(self.radix).pow(len as u32)
    }
}

impl FormatPreserving for Ff3Cipher {
    fn encrypt(&self, numeral: &str) -> Result<String, Error> {
        let (mut a, mut b) = self.split(numeral)?;
        let (u, v) = (a.len(), b.len());
        let moduli = [self.modulus(u), self.modulus(v)];

        for round in 0..ROUNDS {
            let m = if round % 2 == 0 { u } else { v };
            let c = (num_le(&a, self.radix) + self.round_value(round, &b))
                % &moduli[usize::from(round % 2)];
            a = std::mem::replace(&mut b, str_le(&c, self.radix, m));
        }

        a.extend_from_slice(&b);
        Ok(render_digits(&a, self.radix))
    }

    fn decrypt(&self, numeral: &str) -> Result<String, Error> {
        let (mut a, mut b) = self.split(numeral)?;
        let (u, v) = (a.len(), b.len());
        let moduli = [self.modulus(u), self.modulus(v)];

        for round in (0..ROUNDS).rev() {
            let m = if round % 2 == 0 { u } else { v };
            let modulus = &moduli[usize::from(round % 2)];
            let y = self.round_value(round, &a) % modulus;
            let c = (num_le(&b, self.radix) + modulus - y) % modulus;
            b = std::mem::replace(&mut a, str_le(&c, self.radix, m));
        }

        a.extend_from_slice(&b);
        Ok(render_digits(&a, self.radix))
    }

    fn radix(&self) -> u32 {
        self.radix
    }

    fn tweak(&self) -> &[u8] {
        &self.tweak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyGenerator, RandomKeyGenerator};
    use rand::{rngs::StdRng, SeedableRng};

    const NIST_KEY: &str = "EF4359D8D580AA4F7F036D6F04FC6A94";

    fn create_test_cipher(key_hex: &str, radix: u32, tweak_hex: &str) -> Ff3Cipher {
        let key = SecretKey::new(hex::decode(key_hex).unwrap());
        let params = FpeParams::new(radix, Some(hex::decode(tweak_hex).unwrap())).unwrap();
        Ff3Cipher::new(&key, &params).expect("valid cipher")
    }

    fn check_vector(radix: u32, tweak_hex: &str, plaintext: &str, ciphertext: &str) {
        let cipher = create_test_cipher(NIST_KEY, radix, tweak_hex);
        assert_eq!(cipher.encrypt(plaintext).unwrap(), ciphertext);
        assert_eq!(cipher.decrypt(ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_nist_sample_1() {
        check_vector(10, "D8E7920AFA330A73", "890121234567890000", "750918814058654607");
    }

    #[test]
    fn test_nist_sample_2() {
        check_vector(10, "9A768A92F60E12D8", "890121234567890000", "018989839189395384");
    }

    #[test]
    fn test_nist_sample_3() {
        check_vector(
            10,
            "D8E7920AFA330A73",
            "89012123456789000000789000000",
            "48598367162252569629397416226",
        );
    }

    #[test]
    fn test_nist_sample_4() {
        check_vector(
            10,
            "0000000000000000",
            "89012123456789000000789000000",
            "34695224821734535122613701434",
        );
    }

    #[test]
    fn test_nist_sample_5() {
        check_vector(26, "9A768A92F60E12D8", "0123456789abcdefghi", "g2pk40i992fn20cjakb");
    }

    #[test]
    fn test_uppercase_input() {
        let cipher = create_test_cipher(NIST_KEY, 26, "9A768A92F60E12D8");
        assert_eq!(cipher.encrypt("0123456789ABCDEFGHI").unwrap(), "g2pk40i992fn20cjakb");
    }

    #[test]
    fn test_odd_lengths_and_radixes() {
        let mut rng = StdRng::seed_from_u64(5);
        let key = RandomKeyGenerator::new(ALGORITHM).generate_key(Some(256), &mut rng).unwrap();

        for (radix, numeral) in [(2, "1011001"), (16, "deadbeef1"), (36, "zz9"), (10, "123")] {
            let params = FpeParams::new(radix, Some(random_tweak(&mut rng))).unwrap();
            let cipher = Ff3Cipher::new(&key, &params).unwrap();

            let encrypted = cipher.encrypt(numeral).unwrap();
            assert_eq!(encrypted.len(), numeral.len());
            assert!(encrypted.chars().all(|c| c.is_digit(radix)));
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), numeral);
        }
    }

    #[test]
    fn test_length_bounds() {
        let cipher = create_test_cipher(NIST_KEY, 10, "D8E7920AFA330A73");

        assert!(matches!(cipher.encrypt("7"), Err(Error::Domain(_))));
        assert!(matches!(cipher.encrypt(&"1".repeat(57)), Err(Error::Domain(_))));
        assert!(cipher.encrypt(&"1".repeat(56)).is_ok());
    }

    #[test]
    fn test_invalid_digits() {
        let cipher = create_test_cipher(NIST_KEY, 10, "D8E7920AFA330A73");
        assert!(matches!(cipher.encrypt("12ab"), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_tweak_validation() {
        let key = SecretKey::new(vec![0; 16]);

        let missing = FpeParams::new(10, None).unwrap();
        assert!(matches!(Ff3Cipher::new(&key, &missing), Err(Error::InvalidParameter(_))));

        let short = FpeParams::new(10, Some(vec![0; 7])).unwrap();
        assert!(matches!(Ff3Cipher::new(&key, &short), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_key_size_validation() {
        let params = FpeParams::new(10, Some(vec![0; 8])).unwrap();
        let result = Ff3Cipher::new(&SecretKey::new(vec![0; 20]), &params);
        assert!(matches!(result, Err(Error::InvalidKeySize { .. })));
    }
}
