//! Deterministic symmetric encryption for columns that need no property.
//!
//! AES or Blowfish in ECB mode with PKCS#7 padding. The same plaintext always
//! encrypts to the same ciphertext under one key, so equality survives and
//! nothing else does.
//!
//! # Security Warning
//!
//! ECB reveals which blocks repeat, inside one value and across values. Use
//! it only for short identifiers where equality is meant to survive.

use blowfish::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use blowfish::Blowfish;

use crate::block::{self, Aes};
use crate::error::Error;
use crate::key::{check_key_size, SecretKey};
use crate::registry::{Algorithm, Family};

/// A block permutation run block by block under ECB.
trait EcbBlock {
    const BLOCK_SIZE: usize;

    fn encrypt_chunk(&self, chunk: &mut [u8]);

    fn decrypt_chunk(&self, chunk: &mut [u8]);
}

impl EcbBlock for Aes {
    const BLOCK_SIZE: usize = block::BLOCK_SIZE;

    fn encrypt_chunk(&self, chunk: &mut [u8]) {
        let mut block = [0u8; block::BLOCK_SIZE];
        block.copy_from_slice(chunk);
        self.encrypt_block(&mut block);
        chunk.copy_from_slice(&block);
    }

    fn decrypt_chunk(&self, chunk: &mut [u8]) {
        let mut block = [0u8; block::BLOCK_SIZE];
        block.copy_from_slice(chunk);
        self.decrypt_block(&mut block);
        chunk.copy_from_slice(&block);
    }
}

impl EcbBlock for Blowfish {
    const BLOCK_SIZE: usize = 8;

    fn encrypt_chunk(&self, chunk: &mut [u8]) {
        BlockEncrypt::encrypt_block(self, GenericArray::from_mut_slice(chunk));
    }

    fn decrypt_chunk(&self, chunk: &mut [u8]) {
        BlockDecrypt::decrypt_block(self, GenericArray::from_mut_slice(chunk));
    }
}

fn ecb_encrypt<C: EcbBlock>(cipher: &C, plaintext: &[u8]) -> Vec<u8> {
    let padding = C::BLOCK_SIZE - plaintext.len() % C::BLOCK_SIZE;
    let mut buffer = plaintext.to_vec();
    buffer.resize(plaintext.len() + padding, padding as u8);

    for chunk in buffer.chunks_exact_mut(C::BLOCK_SIZE) {
        cipher.encrypt_chunk(chunk);
    }
    buffer
}

fn ecb_decrypt<C: EcbBlock>(cipher: &C, ciphertext: &[u8], name: &str) -> Result<Vec<u8>, Error> {
    if ciphertext.is_empty() || ciphertext.len() % C::BLOCK_SIZE != 0 {
        return Err(Error::InvalidCiphertext(format!(
            "{name} ciphertext must be a positive multiple of {} bytes, was {}",
            C::BLOCK_SIZE,
            ciphertext.len()
        )));
    }

    let mut buffer = ciphertext.to_vec();
    for chunk in buffer.chunks_exact_mut(C::BLOCK_SIZE) {
        cipher.decrypt_chunk(chunk);
    }

    let padding = usize::from(buffer[buffer.len() - 1]);
    let valid = (1..=C::BLOCK_SIZE).contains(&padding)
        && buffer[buffer.len() - padding..].iter().all(|&b| usize::from(b) == padding);
    if !valid {
        return Err(Error::InvalidCiphertext("invalid PKCS#7 padding".to_string()));
    }
    buffer.truncate(buffer.len() - padding);
    Ok(buffer)
}

/// ECB with PKCS#7 padding over AES or Blowfish.
///
/// # Example
///
/// ```
/// use propcrypt::key::SecretKey;
/// use propcrypt::registry::Algorithm;
/// use propcrypt::symmetric::SymmetricCipher;
///
/// let key = SecretKey::new(vec![7u8; 32]);
/// let cipher = SymmetricCipher::new(Algorithm::Aes, &key).unwrap();
///
/// let first = cipher.encrypt(b"alice@example.com");
/// let second = cipher.encrypt(b"alice@example.com");
/// assert_eq!(first, second);
/// assert_eq!(cipher.decrypt(&first).unwrap(), b"alice@example.com");
/// ```
#[derive(Clone)]
pub enum SymmetricCipher {
    /// AES-128, AES-192 or AES-256
    Aes(Aes),
    /// Blowfish with a 32 to 448-bit key
    Blowfish(Blowfish),
}

impl SymmetricCipher {
    /// Creates the cipher for a symmetric algorithm.
    ///
    /// # Arguments
    ///
    /// * `algorithm` - [`Algorithm::Aes`] or [`Algorithm::Blowfish`]
    /// * `key` - Raw cipher key
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `algorithm` is not a symmetric algorithm (`Error::InvalidParameter`)
    /// - The key length is not accepted by the algorithm (`Error::InvalidKeySize`)
    pub fn new(algorithm: Algorithm, key: &SecretKey) -> Result<Self, Error> {
        if algorithm.family() != Family::Symmetric {
            return Err(Error::InvalidParameter(format!("{algorithm} is not a symmetric cipher")));
        }
        check_key_size(algorithm.name(), key.bit_len(), algorithm.key_sizes())?;

        match algorithm {
            Algorithm::Blowfish => Blowfish::new_from_slice(key.expose())
                .map(Self::Blowfish)
                .map_err(|_| Error::InvalidKey(format!("Blowfish rejected a {}-byte key", key.expose().len()))),
            _ => Ok(Self::Aes(Aes::new(key.expose())?)),
        }
    }

    /// Algorithm the cipher was keyed for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Aes(_) => Algorithm::Aes,
            Self::Blowfish(_) => Algorithm::Blowfish,
        }
    }

    /// Block size in bytes.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        match self {
            Self::Aes(_) => <Aes as EcbBlock>::BLOCK_SIZE,
            Self::Blowfish(_) => <Blowfish as EcbBlock>::BLOCK_SIZE,
        }
    }

    /// Encrypts `plaintext`.
    ///
    /// # Returns
    ///
    /// Ciphertext of `block_size * (len / block_size + 1)` bytes
    #[must_use]
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        match self {
            Self::Aes(cipher) => ecb_encrypt(cipher, plaintext),
            Self::Blowfish(cipher) => ecb_encrypt(cipher, plaintext),
        }
    }

    /// Decrypts `ciphertext` and strips the padding.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCiphertext` if:
    /// - The length is not a positive multiple of the block size
    /// - The padding is malformed (wrong key or corrupted data)
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        let name = self.algorithm().name();
        match self {
            Self::Aes(cipher) => ecb_decrypt(cipher, ciphertext, name),
            Self::Blowfish(cipher) => ecb_decrypt(cipher, ciphertext, name),
        }
    }
}
