//! Opaque secret keys and their byte layouts.
//!
//! Every algorithm stores its key as a flat big-endian byte string. The
//! typed key of each algorithm decodes that string with [`KeyReader`] and
//! re-validates every constraint on the way in, so a key that decodes is a
//! key the cipher can use.
//!
//! Layouts:
//! ```text
//! CommonDivisor     [k: signed big-endian integer]
//! FastOPE           [n:f64][alpha:f64][e:f64][d:1][prf key]
//! PIOre             [m:1][d:1][prf key]
//! POre              [q:2][n:1][prf key]
//! ArithmeticCoding  [(p:1)(q:1)]*[n:1][k-128:1]
//! FF3 / DFF / AES   [aes key]
//! CryptoPAn         [aes key][pad seed]
//! HPCBC             [cipher key:16][tweak:8][hash key:8|16]([integrity key:16][integrity tweak:8])
//! ```

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretVec};

use crate::error::Error;
use crate::registry::Algorithm;

/// Secret key bytes for one algorithm.
pub struct SecretKey {
    bytes: SecretVec<u8>,
}

impl SecretKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: SecretVec::new(bytes) }
    }

    /// Decodes a standard base64 key as found in engine configurations.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if `encoded` is not valid base64.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidKey(format!("key is not valid base64: {e}")))?;
        Ok(Self::new(bytes))
    }

    /// Encodes the key as standard base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes.expose_secret())
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.bytes.expose_secret()
    }

    /// Returns the key size in bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bytes.expose_secret().len() * 8
    }
}

impl Clone for SecretKey {
    fn clone(&self) -> Self {
        Self::new(self.bytes.expose_secret().clone())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED; {} bits])", self.bit_len())
    }
}

/// Checks that `bits` is one of the `allowed` key sizes of `algorithm`.
///
/// # Errors
///
/// Returns `Error::InvalidKeySize` otherwise.
pub fn check_key_size(algorithm: &'static str, bits: usize, allowed: &[usize]) -> Result<(), Error> {
    if allowed.contains(&bits) {
        Ok(())
    } else {
        Err(Error::InvalidKeySize { algorithm, actual: bits, allowed: format_sizes(allowed) })
    }
}

fn format_sizes(sizes: &[usize]) -> String {
    sizes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Produces fresh keys for one algorithm and parameter set.
///
/// Implementations hold the validated parameters; the key size is chosen per
/// call, or defaulted when `None`.
pub trait KeyGenerator {
    /// Generates a key of `key_size` bits.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeySize` if the size is not allowed for the
    /// algorithm or too small for the configured parameters.
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized;
}

/// Generates keys that are plain random bytes of an allowed size.
#[derive(Debug, Clone, Copy)]
pub struct RandomKeyGenerator {
    algorithm: Algorithm,
}

impl RandomKeyGenerator {
    /// Creates a generator for `algorithm`'s key sizes.
    #[must_use]
    pub const fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }
}

impl KeyGenerator for RandomKeyGenerator {
    fn generate_key<R>(&self, key_size: Option<usize>, rng: &mut R) -> Result<SecretKey, Error>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let allowed = self.algorithm.key_sizes();
        let size = key_size.unwrap_or_else(|| self.algorithm.default_key_size());
        check_key_size(self.algorithm.name(), size, allowed)?;
        Ok(SecretKey::new(crate::kdf::random_bytes(rng, size / 8).to_vec()))
    }
}

/// Cursor over a key's byte layout.
pub struct KeyReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> KeyReader<'a> {
    /// Starts reading at the beginning of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads `len` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize, field: &str) -> Result<&'a [u8], Error> {
        if self.pos + len > self.data.len() {
            return Err(Error::InvalidKey(format!("key truncated: missing {field}")));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads one unsigned byte.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if the key is exhausted.
    pub fn read_u8(&mut self, field: &str) -> Result<u8, Error> {
        Ok(self.read_bytes(1, field)?[0])
    }

    /// Reads a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if fewer than two bytes remain.
    pub fn read_u16(&mut self, field: &str) -> Result<u16, Error> {
        let bytes = self.read_bytes(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian IEEE-754 double.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKey` if fewer than eight bytes remain.
    pub fn read_f64(&mut self, field: &str) -> Result<f64, Error> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8, field)?);
        Ok(f64::from_be_bytes(buf))
    }

    /// Returns everything not yet read.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Number of bytes not yet read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}
