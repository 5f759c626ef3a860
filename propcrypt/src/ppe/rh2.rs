//! RH2 polynomial hash over GF(2^(8 * block_size)).
//!
//! The evaluation point `k` and the field's reduction pentanomial are both
//! derived from the hash key, so neither is known to an observer.

use zeroize::Zeroizing;

use crate::bits::{self, BinaryField};
use crate::error::Error;
use crate::kdf;

const HASH_INFO: &[u8] = b"rh2";

/// Bytes of derived material spent on picking the pentanomial.
const SELECTOR_LENGTH: usize = 8;

/// Accepted hash key lengths in bytes.
pub const KEY_LENGTHS: [usize; 2] = [8, 16];

/// A keyed RH2 hash with `block_size`-byte digests.
#[derive(Clone)]
pub struct Rh2 {
    field: BinaryField,
    k: Zeroizing<Vec<u8>>,
    k_squared: Zeroizing<Vec<u8>>,
}

impl Rh2 {
    /// Keys the hash.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` unless the key is 8 or 16 bytes, and
    /// `Error::InvalidParameter` if `block_size` is zero.
    pub fn new(key: &[u8], block_size: usize) -> Result<Self, Error> {
        if !KEY_LENGTHS.contains(&key.len()) {
            return Err(Error::InvalidKey(format!(
                "RH2 key must be 64 or 128 bits, was {}",
                key.len() * 8
            )));
        }
        if block_size == 0 {
            return Err(Error::InvalidParameter("RH2 block size must be positive".to_string()));
        }

        let material = kdf::expand(key, HASH_INFO, block_size + SELECTOR_LENGTH)?;
        let (k, selector) = material.split_at(block_size);
        let mut selector_bytes = [0u8; SELECTOR_LENGTH];
        selector_bytes.copy_from_slice(selector);

        // middle in [2, n - 2] keeps every pentanomial term below x^n
        let degree = block_size as u64 * 8;
        let middle = 2 + u64::from_be_bytes(selector_bytes) % (degree - 3);
        let field = BinaryField::pentanomial(block_size, middle as usize);

        let k = Zeroizing::new(k.to_vec());
        let k_squared = Zeroizing::new(field.mul(&k, &k));
        Ok(Self { field, k, k_squared })
    }

    /// Digest length in bytes.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.field.width()
    }

    /// Hashes `message` into one block.
    #[must_use]
    pub fn digest(&self, message: &[u8]) -> Vec<u8> {
        let block_size = self.block_size();
        let data_blocks = message.len().div_ceil(block_size);
        let blocks = data_blocks + 1;

        let mut padded = message.to_vec();
        padded.resize(blocks * block_size, 0);
        // length block: number of zero bytes padded onto the data blocks
        let padding = data_blocks * block_size - message.len();
        if let Some(last) = padded.last_mut() {
            *last = padding as u8;
        }

        let mut t = self.k_squared.to_vec();
        for block in padded.chunks_exact(block_size) {
            bits::xor_in_place(&mut t, block);
            t = self.field.mul(&t, &self.k);
        }
        if blocks % 2 == 0 {
            t = self.field.mul(&t, &self.k);
        }
        t
    }
}
