//! Raw AES block primitive.
//!
//! The format- and prefix-preserving constructions use AES as a pseudo-random
//! permutation on single 16-byte blocks, never as a mode of operation, so the
//! key size picks the variant at runtime.

use crate::error::Error;
use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// AES keyed with a 128-, 192- or 256-bit key.
#[derive(Clone)]
pub enum Aes {
    /// AES-128
    Aes128(Aes128),
    /// AES-192
    Aes192(Aes192),
    /// AES-256
    Aes256(Aes256),
}

impl Aes {
    /// Keys the block cipher.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` unless `key` is 16, 24 or 32 bytes long.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        let invalid =
            || Error::InvalidKey(format!("AES key must be 16, 24 or 32 bytes, got {}", key.len()));
        match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128).map_err(|_| invalid()),
            24 => Aes192::new_from_slice(key).map(Self::Aes192).map_err(|_| invalid()),
            32 => Aes256::new_from_slice(key).map(Self::Aes256).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    /// Encrypts one block in place.
    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(cipher) => cipher.encrypt_block(block),
            Self::Aes192(cipher) => cipher.encrypt_block(block),
            Self::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }

    /// Decrypts one block in place.
    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(cipher) => cipher.decrypt_block(block),
            Self::Aes192(cipher) => cipher.decrypt_block(block),
            Self::Aes256(cipher) => cipher.decrypt_block(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 Appendix C vectors
    const PLAINTEXT: &str = "00112233445566778899aabbccddeeff";

    fn check_vector(key_hex: &str, expected_hex: &str) {
        let cipher = Aes::new(&hex::decode(key_hex).unwrap()).expect("valid AES key");
        let mut block: [u8; BLOCK_SIZE] = hex::decode(PLAINTEXT).unwrap().try_into().unwrap();

        cipher.encrypt_block(&mut block);
        assert_eq!(hex::encode(block), expected_hex);

        cipher.decrypt_block(&mut block);
        assert_eq!(hex::encode(block), PLAINTEXT);
    }

    #[test]
    fn test_aes128_vector() {
        check_vector("000102030405060708090a0b0c0d0e0f", "69c4e0d86a7b0430d8cdb78070b4c55a");
    }

    #[test]
    fn test_aes192_vector() {
        check_vector(
            "000102030405060708090a0b0c0d0e0f1011121314151617",
            "dda97ca4864cdfe06eaf70a0ec0d7191",
        );
    }

    #[test]
    fn test_aes256_vector() {
        check_vector(
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            "8ea2b7ca516745bfeafc49904b496089",
        );
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(Aes::new(&[0u8; 20]), Err(Error::InvalidKey(_))));
        assert!(matches!(Aes::new(&[]), Err(Error::InvalidKey(_))));
    }
}
