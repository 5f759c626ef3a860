//! Key material derivation and generation.
//!
//! Ciphers that need more secret material than their key carries (the
//! CryptoPAn pad, the RH2 hash constants) stretch a seed with HKDF-SHA256.
//! Fresh key material comes from a caller-supplied CSPRNG so that tests can
//! seed it.

use crate::error::Error;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Largest output HKDF-SHA256 can produce (255 hash blocks).
pub const MAX_EXPANSION: usize = 255 * 32;

/// Expands `seed` into `length` bytes of key material bound to `info`.
///
/// # Arguments
///
/// * `seed` - Input key material
/// * `info` - Domain separation label
/// * `length` - Number of bytes to produce
///
/// # Errors
///
/// Returns `Error::InvalidParameter` if `length` exceeds [`MAX_EXPANSION`].
///
/// # Example
///
/// ```
/// use propcrypt::kdf::expand;
///
/// let pad = expand(&[7u8; 16], b"pad", 48).expect("expansion failed");
/// assert_eq!(pad.len(), 48);
/// ```
pub fn expand(seed: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>, Error> {
    let hkdf = Hkdf::<Sha256>::new(None, seed);

    let mut okm = Zeroizing::new(vec![0u8; length]);
    hkdf.expand(info, &mut okm).map_err(|_| {
        Error::InvalidParameter(format!(
            "cannot derive {length} bytes of key material (max: {MAX_EXPANSION})"
        ))
    })?;

    Ok(okm)
}

/// Fills a fresh buffer of `length` random bytes.
pub fn random_bytes<R>(rng: &mut R, length: usize) -> Zeroizing<Vec<u8>>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut bytes = Zeroizing::new(vec![0u8; length]);
    rng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_expand_deterministic() {
        let first = expand(&[1u8; 8], b"rh2", 24).expect("expansion failed");
        let second = expand(&[1u8; 8], b"rh2", 24).expect("expansion failed");

        assert_eq!(*first, *second);
    }

    #[test]
    fn test_expand_domain_separation() {
        let pad = expand(&[1u8; 16], b"pad", 16).expect("expansion failed");
        let hash = expand(&[1u8; 16], b"hash", 16).expect("expansion failed");

        assert_ne!(*pad, *hash);
    }

    #[test]
    fn test_expand_too_long() {
        let result = expand(&[1u8; 16], b"pad", MAX_EXPANSION + 1);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    // RFC 5869 Appendix A.3: zero-length salt and info
    #[test]
    fn test_hkdf_rfc5869_test_case_3() {
        let ikm = hex::decode("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b").unwrap();
        let expected = hex::decode(
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8",
        )
        .unwrap();

        let okm = expand(&ikm, &[], 42).expect("expansion failed");
        assert_eq!(*okm, expected);
    }

    #[test]
    fn test_random_bytes_seeded() {
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);

        assert_eq!(*random_bytes(&mut rng1, 32), *random_bytes(&mut rng2, 32));
        assert_ne!(*random_bytes(&mut rng1, 32), *random_bytes(&mut rng1, 32));
    }
}
