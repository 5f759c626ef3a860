//! Crypto-PAn prefix-preserving encryption, generalized to byte strings.
//!
//! Bit `i` of the ciphertext is bit `i` of the plaintext XORed with one bit
//! of a pseudo-random function of the preceding plaintext bits. The function
//! takes the most significant bit of an AES CBC-MAC over a secret pad, rotated
//! by `i` bits, with the plaintext prefix mixed in.

use std::sync::OnceLock;

use zeroize::Zeroizing;

use super::{Decryption, PrefixPreserving};
use crate::bits;
use crate::block::{Aes, BLOCK_SIZE};
use crate::error::Error;
use crate::kdf;
use crate::key::{check_key_size, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::CryptoPan;

/// Smallest maximum input length in bytes.
pub const MIN_MAX_LENGTH: usize = 1;

/// Largest maximum input length in bytes.
pub const MAX_MAX_LENGTH: usize = 1024;

/// Default maximum input length in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 16;

/// Maximum input length for IPv4 addresses.
pub const IPV4_LENGTH: usize = 4;

/// Maximum input length for IPv6 addresses.
pub const IPV6_LENGTH: usize = 16;

const PAD_INFO: &[u8] = b"cryptopan pad";

/// Parameters of the Crypto-PAn cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoPanParams {
    max_length: usize,
}

impl CryptoPanParams {
    /// Creates parameters for inputs of at most `max_length` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `max_length` is outside `1..=1024`.
    pub fn new(max_length: usize) -> Result<Self, Error> {
        if !(MIN_MAX_LENGTH..=MAX_MAX_LENGTH).contains(&max_length) {
            return Err(Error::InvalidParameter(format!(
                "max_length must be in {MIN_MAX_LENGTH}..={MAX_MAX_LENGTH}, was {max_length}"
            )));
        }
        Ok(Self { max_length })
    }

    /// Maximum input length in bytes.
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for CryptoPanParams {
    fn default() -> Self {
        Self { max_length: DEFAULT_MAX_LENGTH }
    }
}

/// The Crypto-PAn cipher.
pub struct CryptoPanCipher {
    aes: Aes,
    pad: Zeroizing<Vec<u8>>,
    /// `pad` rotated left by the bit position, filled on first use.
    rotated: Vec<OnceLock<Vec<u8>>>,
}

impl CryptoPanCipher {
    /// Builds the cipher. The first half of the key keys AES, the second
    /// half seeds the pad.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeySize` unless the key is 256, 384 or 512 bits.
    pub fn new(key: &SecretKey, params: &CryptoPanParams) -> Result<Self, Error> {
        check_key_size(ALGORITHM.name(), key.bit_len(), ALGORITHM.key_sizes())?;
        let (cipher_key, pad_seed) = key.expose().split_at(key.expose().len() / 2);
        let aes = Aes::new(cipher_key)?;

        let length = params.max_length;
        let mut pad = kdf::expand(pad_seed, PAD_INFO, length.div_ceil(BLOCK_SIZE) * BLOCK_SIZE)?;
        for chunk in pad.chunks_exact_mut(BLOCK_SIZE) {
            let block: &mut [u8; BLOCK_SIZE] = chunk
                .try_into()
                .map_err(|_| Error::InvalidParameter("pad is not block aligned".to_string()))?;
            aes.encrypt_block(block);
        }
        pad.truncate(length);

        Ok(Self { aes, pad, rotated: (0..length * 8).map(|_| OnceLock::new()).collect() })
    }

    /// Maximum input length in bytes.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.pad.len()
    }

    fn check_length(&self, len: usize) -> Result<(), Error> {
        if len <= self.max_length() {
            Ok(())
        } else {
            Err(Error::Domain(format!(
                "input is {len} bytes, max_length is {}",
                self.max_length()
            )))
        }
    }

    /// Pseudo-random bit for position `pos` given the plaintext `known`,
    /// of which only the first `pos` bits are read.
    fn flip(&self, known: &[u8], pos: usize) -> bool {
        let rotated = self.rotated[pos].get_or_init(|| bits::rotate_left(&self.pad, pos));
        let mut otp = bits::prefix(known, pos);
        bits::xor_in_place(&mut otp, rotated);

        let mut state = [0u8; BLOCK_SIZE];
        for chunk in otp.chunks(BLOCK_SIZE) {
            bits::xor_in_place(&mut state, chunk);
            self.aes.encrypt_block(&mut state);
        }
        bits::bit(&state, 0)
    }
}

impl PrefixPreserving for CryptoPanCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_length(plaintext.len())?;

        let mut padded = plaintext.to_vec();
        padded.resize(self.max_length(), 0);

        let mut ciphertext = plaintext.to_vec();
        for pos in 0..plaintext.len() * 8 {
            if self.flip(&padded, pos) {
                let flipped = !bits::bit(&ciphertext, pos);
                bits::set_bit(&mut ciphertext, pos, flipped);
            }
        }
        Ok(ciphertext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Decryption, Error> {
        self.check_length(ciphertext.len())?;

        let mut plaintext = vec![0u8; self.max_length()];
        for pos in 0..ciphertext.len() * 8 {
            let value = bits::bit(ciphertext, pos) ^ self.flip(&plaintext, pos);
            bits::set_bit(&mut plaintext, pos, value);
        }
        plaintext.truncate(ciphertext.len());
        Ok(Decryption::Intact(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyGenerator, RandomKeyGenerator};
    use rand::{rngs::StdRng, SeedableRng};

    fn create_test_cipher(max_length: usize, key_size: usize, seed: u64) -> CryptoPanCipher {
        let mut rng = StdRng::seed_from_u64(seed);
        let key = RandomKeyGenerator::new(ALGORITHM).generate_key(Some(key_size), &mut rng).unwrap();
        CryptoPanCipher::new(&key, &CryptoPanParams::new(max_length).unwrap()).unwrap()
    }

    fn common_prefix_bits(a: &[u8], b: &[u8]) -> usize {
        (0..a.len().min(b.len()) * 8)
            .take_while(|&pos| bits::bit(a, pos) == bits::bit(b, pos))
            .count()
    }

    #[test]
    fn test_round_trip() {
        let cipher = create_test_cipher(32, 256, 1);

        let texts: [&[u8]; 4] = [b"", b"a", b"hello world", &[0xFF; 32]];
        for text in texts {
            let encrypted = cipher.encrypt(text).unwrap();
            assert_eq!(encrypted.len(), text.len());
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), Decryption::Intact(text.to_vec()));
        }
    }

    #[test]
    fn test_encrypt_flips_bits_in_place() {
        let cipher = create_test_cipher(16, 256, 5);
        let text = [0x5Au8; 16];

        let encrypted = cipher.encrypt(&text).unwrap();
        assert_ne!(encrypted, text);
        let flipped: u32 = encrypted.iter().zip(text).map(|(c, p)| (c ^ p).count_ones()).sum();
        assert!(flipped > 0 && flipped < 128);
    }

    #[test]
    fn test_prefix_preservation() {
        let cipher = create_test_cipher(8, 384, 2);
        let pairs: [(&[u8], &[u8]); 4] = [
            (b"abcdefgh", b"abcdefgi"),
            (b"abcdefgh", b"abcdxxxx"),
            (&[0x00, 0x10], &[0x00, 0x18]),
            (&[0x80], &[0x00]),
        ];

        for (a, b) in pairs {
            let shared = common_prefix_bits(a, b);
            let (ca, cb) = (cipher.encrypt(a).unwrap(), cipher.encrypt(b).unwrap());
            assert_eq!(common_prefix_bits(&ca, &cb), shared);
        }
    }

    #[test]
    fn test_ipv4_subnet() {
        let cipher = create_test_cipher(IPV4_LENGTH, 256, 3);
        let first = cipher.encrypt(&[192, 168, 1, 10]).unwrap();

        for host in [1, 77, 200, 255] {
            let other = cipher.encrypt(&[192, 168, 1, host]).unwrap();
            assert_eq!(other[..3], first[..3]);
        }
        let elsewhere = cipher.encrypt(&[192, 168, 2, 10]).unwrap();
        assert_eq!(elsewhere[..2], first[..2]);
        assert_ne!(elsewhere[2], first[2]);
    }

    #[test]
    fn test_deterministic_per_key() {
        let first = create_test_cipher(16, 512, 4);
        let again = create_test_cipher(16, 512, 4);
        let other = create_test_cipher(16, 512, 5);

        let text = b"10.0.0.1/secret";
        assert_eq!(first.encrypt(text).unwrap(), again.encrypt(text).unwrap());
        assert_ne!(first.encrypt(text).unwrap(), other.encrypt(text).unwrap());
    }

    #[test]
    fn test_input_too_long() {
        let cipher = create_test_cipher(4, 256, 6);
        assert!(matches!(cipher.encrypt(b"abcde"), Err(Error::Domain(_))));
        assert!(matches!(cipher.decrypt(b"abcde"), Err(Error::Domain(_))));
    }

    #[test]
    fn test_params_validation() {
        assert!(matches!(CryptoPanParams::new(0), Err(Error::InvalidParameter(_))));
        assert!(matches!(CryptoPanParams::new(1025), Err(Error::InvalidParameter(_))));
        assert_eq!(CryptoPanParams::new(1024).unwrap().max_length(), 1024);
        assert_eq!(CryptoPanParams::default().max_length(), 16);
    }

    #[test]
    fn test_key_size_validation() {
        let result = CryptoPanCipher::new(&SecretKey::new(vec![0; 16]), &CryptoPanParams::default());
        assert!(matches!(result, Err(Error::InvalidKeySize { .. })));
    }
}
