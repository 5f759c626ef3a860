//! HPCBC+ prefix-preserving block chaining.
//!
//! Each block is whitened with an RH2 hash of the previous plaintext and
//! ciphertext blocks and permuted with FF3 over its hexadecimal form, so two
//! messages sharing their first `i` blocks share their first `i` ciphertext
//! blocks. The last block may be short and is encrypted without padding.
//!
//! With the integrity check enabled, one extra block, the FF3 encryption of
//! the final chain hash under a second key, is appended. Decryption recomputes
//! it and zeroes the plaintext if it does not match.
//!
//! The integrity block is `block_size` bytes long, so a modified ciphertext
//! slips through with probability about `2^(-8 * block_size)`. The default
//! block size of 1 gives only a one-byte tag.

use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::rh2::Rh2;
use super::{Decryption, PrefixPreserving};
use crate::bits;
use crate::error::Error;
use crate::fpe::ff3::{self, Ff3Cipher};
use crate::fpe::{FormatPreserving, FpeParams};
use crate::key::{check_key_size, KeyGenerator, KeyReader, SecretKey};
use crate::registry::Algorithm;

const ALGORITHM: Algorithm = Algorithm::Hpcbc;

/// Largest block size: twice this many hex digits is FF3's radix 16 limit.
pub const MAX_BLOCK_SIZE: usize = 24;

/// Default block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 1;

const CIPHER_KEY_LENGTH: usize = 16;
const SHORT_HASH_KEY_LENGTH: usize = 8;
const LONG_HASH_KEY_LENGTH: usize = 16;

/// Parameters of the HPCBC+ cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpcbcParams {
    block_size: usize,
    integrity_check: bool,
}

impl HpcbcParams {
    /// Creates parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `block_size` is outside `1..=24`.
    ///
    /// The integrity block has `block_size` bytes; pick at least 4 when the
    /// check has to catch tampering reliably.
    pub fn new(block_size: usize, integrity_check: bool) -> Result<Self, Error> {
        if !(1..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(Error::InvalidParameter(format!(
                "block_size must be in 1..={MAX_BLOCK_SIZE}, was {block_size}"
            )));
        }
        Ok(Self { block_size, integrity_check })
    }

    /// Block size in bytes.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether an integrity block is appended.
    #[must_use]
    pub const fn integrity_check(&self) -> bool {
        self.integrity_check
    }

    /// The only key size valid for these parameters.
    #[must_use]
    pub const fn key_size(&self) -> usize {
        if self.integrity_check {
            512
        } else {
            256
        }
    }
}

impl Default for HpcbcParams {
    fn default() -> Self {
        Self { block_size: DEFAULT_BLOCK_SIZE, integrity_check: false }
    }
}

/// An FF3 key and tweak pair inside an HPCBC+ key.
#[derive(Clone)]
struct Ff3Part {
    key: Zeroizing<Vec<u8>>,
    tweak: Vec<u8>,
}

impl Ff3Part {
    fn read(reader: &mut KeyReader<'_>, name: &str) -> Result<Self, Error> {
        let key = reader.read_bytes(CIPHER_KEY_LENGTH, &format!("{name} key"))?;
        let tweak = reader.read_bytes(ff3::TWEAK_LENGTH, &format!("{name} tweak"))?;
        Ok(Self { key: Zeroizing::new(key.to_vec()), tweak: tweak.to_vec() })
    }

    fn cipher(&self) -> Result<Ff3Cipher, Error> {
        let params = FpeParams::new(16, Some(self.tweak.clone()))?;
        Ff3Cipher::new(&SecretKey::new(self.key.to_vec()), &params)
    }
}

/// Typed HPCBC+ key.
///
/// Without the integrity check: `cipher key (16) || tweak (8) || hash key (8)`.
/// With it: `cipher key (16) || tweak (8) || hash key (16) || integrity key
/// (16) || integrity tweak (8)`.
#[derive(Clone)]
pub struct HpcbcKey {
    primary: Ff3Part,
    hash_key: Zeroizing<Vec<u8>>,
    integrity: Option<Ff3Part>,
}

impl HpcbcKey {
    /// Decodes a key for the given integrity setting.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeySize` unless the key is 256 bits without the
    /// integrity check or 512 bits with it.
    pub fn from_secret(key: &SecretKey, integrity_check: bool) -> Result<Self, Error> {
        let expected = if integrity_check { 512 } else { 256 };
        check_key_size(ALGORITHM.name(), key.bit_len(), &[expected])?;

        let mut reader = KeyReader::new(key.expose());
        let primary = Ff3Part::read(&mut reader, "cipher")?;
        let hash_length = if integrity_check { LONG_HASH_KEY_LENGTH } else { SHORT_HASH_KEY_LENGTH };
        let hash_key = Zeroizing::new(reader.read_bytes(hash_length, "hash key")?.to_vec());
        let integrity =
            if integrity_check { Some(Ff3Part::read(&mut reader, "integrity")?) } else { None };

        Ok(Self { primary, hash_key, integrity })
    }

    /// Encodes the key.
    #[must_use]
    pub fn to_secret(&self) -> SecretKey {
        let mut bytes = self.primary.key.to_vec();
        bytes.extend_from_slice(&self.primary.tweak);
        bytes.extend_from_slice(&self.hash_key);
        if let Some(integrity) = &self.integrity {
            bytes.extend_from_slice(&integrity.key);
            bytes.extend_from_slice(&integrity.tweak);
        }
        SecretKey::new(bytes)
    }
}

/// Generates HPCBC+ keys; the size follows the integrity setting.
#[derive(Debug, Clone, Default)]
pub struct HpcbcKeyGenerator {
    params: HpcbcParams,
}

impl HpcbcKeyGenerator {
    /// Creates a generator for `params`.
    #[must_use]
    pub const fn new(params: HpcbcParams) -> Self {
        Self { params }
    }
}

impl KeyGenerator for HpcbcKeyGenerator {
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let size = self.params.key_size();
        if let Some(requested) = key_size {
            check_key_size(ALGORITHM.name(), requested, &[size])?;
        }
        Ok(SecretKey::new(crate::kdf::random_bytes(rng, size / 8).to_vec()))
    }
}

/// The HPCBC+ cipher.
pub struct HpcbcCipher {
    cipher: Ff3Cipher,
    integrity: Option<Ff3Cipher>,
    hash: Rh2,
    block_size: usize,
}

impl HpcbcCipher {
    /// Builds the cipher.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not match the integrity setting.
    pub fn new(key: &SecretKey, params: &HpcbcParams) -> Result<Self, Error> {
        let key = HpcbcKey::from_secret(key, params.integrity_check)?;
        Ok(Self {
            cipher: key.primary.cipher()?,
            integrity: key.integrity.as_ref().map(Ff3Part::cipher).transpose()?,
            hash: Rh2::new(&key.hash_key, params.block_size)?,
            block_size: params.block_size,
        })
    }

    /// Hash of the previous plaintext and ciphertext blocks.
    fn chain_hash(&self, plain: &[u8], cipher: &[u8]) -> Vec<u8> {
        let mut input = plain.to_vec();
        input.extend_from_slice(cipher);
        self.hash.digest(&input)
    }

    /// Applies FF3 to the hexadecimal form of `bytes`.
    fn permute(cipher: &Ff3Cipher, bytes: &[u8], forward: bool) -> Result<Vec<u8>, Error> {
        let numeral = hex::encode(bytes);
        let permuted = if forward { cipher.encrypt(&numeral)? } else { cipher.decrypt(&numeral)? };
        hex::decode(permuted).map_err(|e| Error::Encoding(format!("invalid hex from FF3: {e}")))
    }

    /// `permute(block ^ h) ^ h`.
    fn whitened(cipher: &Ff3Cipher, block: &[u8], h: &[u8], forward: bool) -> Result<Vec<u8>, Error> {
        let mut input = block.to_vec();
        bits::xor_in_place(&mut input, h);
        let mut output = Self::permute(cipher, &input, forward)?;
        bits::xor_in_place(&mut output, h);
        Ok(output)
    }

    fn padded(&self, block: &[u8]) -> Vec<u8> {
        let mut padded = block.to_vec();
        padded.resize(self.block_size, 0);
        padded
    }
}

impl PrefixPreserving for HpcbcCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let mut previous = (vec![0u8; self.block_size], vec![0u8; self.block_size]);
        let mut ciphertext = Vec::with_capacity(plaintext.len() + self.block_size);

        for block in plaintext.chunks(self.block_size) {
            let h = self.chain_hash(&previous.0, &previous.1);
            let encrypted = Self::whitened(&self.cipher, block, &h, true)?;
            ciphertext.extend_from_slice(&encrypted);
            previous = (self.padded(block), self.padded(&encrypted));
        }

        if let Some(integrity) = &self.integrity {
            let h = self.chain_hash(&previous.0, &previous.1);
            let tag = Self::whitened(integrity, &vec![0u8; self.block_size], &h, true)?;
            ciphertext.extend_from_slice(&tag);
        }
        Ok(ciphertext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Decryption, Error> {
        let body_length = if self.integrity.is_some() {
            ciphertext.len().checked_sub(self.block_size).ok_or_else(|| {
                Error::InvalidCiphertext(format!(
                    "ciphertext of {} bytes is shorter than the integrity block",
                    ciphertext.len()
                ))
            })?
        } else {
            ciphertext.len()
        };
        let (body, tag) = ciphertext.split_at(body_length);

        let mut previous = (vec![0u8; self.block_size], vec![0u8; self.block_size]);
        let mut plaintext = Vec::with_capacity(body_length);

        for block in body.chunks(self.block_size) {
            let h = self.chain_hash(&previous.0, &previous.1);
            let decrypted = Self::whitened(&self.cipher, block, &h, false)?;
            plaintext.extend_from_slice(&decrypted);
            previous = (self.padded(&decrypted), self.padded(block));
        }

        if let Some(integrity) = &self.integrity {
            let h = self.chain_hash(&previous.0, &previous.1);
            let check = Self::whitened(integrity, tag, &h, false)?;
            if check.iter().any(|&b| b != 0) {
                return Ok(Decryption::Tampered(vec![0u8; plaintext.len()]));
            }
        }
        Ok(Decryption::Intact(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn create_test_cipher(block_size: usize, integrity_check: bool, seed: u64) -> HpcbcCipher {
        let mut rng = StdRng::seed_from_u64(seed);
        let params = HpcbcParams::new(block_size, integrity_check).unwrap();
        let key = HpcbcKeyGenerator::new(params).generate_key(None, &mut rng).unwrap();
        HpcbcCipher::new(&key, &params).expect("valid cipher")
    }

    #[test]
    fn test_round_trip() {
        for (block_size, integrity_check) in [(1, false), (4, false), (8, true), (24, true)] {
            let cipher = create_test_cipher(block_size, integrity_check, 1);

            let texts: [&[u8]; 4] = [b"", b"x", b"prefix preserving", &[0xAB; 50]];
            for text in texts {
                let encrypted = cipher.encrypt(text).unwrap();
                let extra = if integrity_check { block_size } else { 0 };
                assert_eq!(encrypted.len(), text.len() + extra);
                assert_eq!(cipher.decrypt(&encrypted).unwrap(), Decryption::Intact(text.to_vec()));
            }
        }
    }

    #[test]
    fn test_shared_blocks_are_preserved() {
        let cipher = create_test_cipher(4, false, 2);

        let first = cipher.encrypt(b"AAAABBBBCCCC").unwrap();
        let second = cipher.encrypt(b"AAAABBBBDDDD").unwrap();
        assert_eq!(first[..8], second[..8]);
        assert_ne!(first[8..], second[8..]);
    }

    #[test]
    fn test_change_propagates() {
        let cipher = create_test_cipher(8, false, 3);

        let first = cipher.encrypt(b"00000000111111112222222233333333").unwrap();
        let second = cipher.encrypt(b"00000000X11111112222222233333333").unwrap();
        assert_eq!(first[..8], second[..8]);
        for block in 1..4 {
            let range = block * 8..(block + 1) * 8;
            assert_ne!(first[range.clone()], second[range]);
        }
    }

    #[test]
    fn test_tampering_is_detected() {
        let cipher = create_test_cipher(8, true, 4);
        let mut encrypted = cipher.encrypt(b"a message with several blocks").unwrap();

        encrypted[3] ^= 0x01;
        let decrypted = cipher.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, Decryption::Tampered(vec![0; 29]));
    }

    #[test]
    fn test_tampered_tag_is_detected() {
        let cipher = create_test_cipher(4, true, 5);
        let mut encrypted = cipher.encrypt(b"tagged").unwrap();

        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x80;
        assert!(cipher.decrypt(&encrypted).unwrap().is_tampered());
    }

    #[test]
    fn test_tag_strength_follows_block_size() {
        let plaintext = [0x3Cu8; 40];
        let missed_flips = |block_size: usize| {
            let cipher = create_test_cipher(block_size, true, 8);
            let encrypted = cipher.encrypt(&plaintext).unwrap();
            (0..encrypted.len() * 8)
                .filter(|&pos| {
                    let mut tampered = encrypted.clone();
                    tampered[pos / 8] ^= 0x80 >> (pos % 8);
                    !cipher.decrypt(&tampered).unwrap().is_tampered()
                })
                .count()
        };

        // A one-byte tag lets about one flip in 256 through
        assert!(missed_flips(1) < 32);
        assert_eq!(missed_flips(4), 0);
    }

    #[test]
    fn test_short_ciphertext_with_integrity() {
        let cipher = create_test_cipher(8, true, 6);
        assert!(matches!(cipher.decrypt(&[0; 7]), Err(Error::InvalidCiphertext(_))));
    }

    #[test]
    fn test_key_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        let plain = HpcbcKeyGenerator::default().generate_key(None, &mut rng).unwrap();
        assert_eq!(plain.bit_len(), 256);

        let key = HpcbcKey::from_secret(&plain, false).unwrap();
        assert_eq!(key.hash_key.len(), 8);
        assert!(key.integrity.is_none());
        assert_eq!(key.to_secret().expose(), plain.expose());

        let with_integrity = HpcbcParams::new(1, true).unwrap();
        let long = HpcbcKeyGenerator::new(with_integrity).generate_key(Some(512), &mut rng).unwrap();
        let key = HpcbcKey::from_secret(&long, true).unwrap();
        assert_eq!(key.hash_key.len(), 16);
        assert_eq!(key.to_secret().expose(), long.expose());
    }

    #[test]
    fn test_key_size_must_match_integrity() {
        let mut rng = StdRng::seed_from_u64(8);
        let generator = HpcbcKeyGenerator::default();
        assert!(matches!(generator.generate_key(Some(512), &mut rng), Err(Error::InvalidKeySize { .. })));

        let key = generator.generate_key(None, &mut rng).unwrap();
        let result = HpcbcCipher::new(&key, &HpcbcParams::new(1, true).unwrap());
        assert!(matches!(result, Err(Error::InvalidKeySize { .. })));
    }

    #[test]
    fn test_params_validation() {
        assert!(matches!(HpcbcParams::new(0, false), Err(Error::InvalidParameter(_))));
        assert!(matches!(HpcbcParams::new(25, false), Err(Error::InvalidParameter(_))));
        assert_eq!(HpcbcParams::default().block_size(), 1);
    }
}
