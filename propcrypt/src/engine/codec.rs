//! Cell encoding around the ciphers.
//!
//! Cells are strings; ciphers work on integers, numerals or bytes. This
//! module parses a cell into cipher input and renders the output back:
//!
//! | Family | Plaintext side          | Ciphertext side        |
//! |--------|-------------------------|------------------------|
//! | OPE    | decimal `u64`           | decimal big integer    |
//! | FPE    | numeral in the radix    | numeral in the radix   |
//! | PPE    | UTF-8 text              | base64                 |
//! | PPE/ip | IP address              | IP address             |
//! | SYM    | UTF-8 text              | base64                 |
//!
//! In suffix mode a PPE cell is reversed before encryption and after
//! decryption (bit-reversed for IP addresses) so that shared suffixes are
//! what survives.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use num_bigint::BigInt;
use tracing::warn;

use super::config::{CipherParams, EngineMode, IpVersion};
use crate::bits;
use crate::cipher::ColumnCipher;
use crate::error::Error;
use crate::ppe::{Decryption, PrefixPreserving};
use crate::registry::{Algorithm, Family};

/// Transforms the cells of one column.
pub(crate) struct CellCodec {
    column: String,
    mode: EngineMode,
    ip: Option<IpVersion>,
    suffix: bool,
}

impl CellCodec {
    /// Creates the codec of a column. IP and suffix modes only apply to
    /// prefix-preserving algorithms.
    pub(crate) fn new(column: &str, mode: EngineMode, algorithm: Algorithm, params: &CipherParams) -> Self {
        let prefix_preserving = algorithm.family() == Family::Ppe;
        Self {
            column: column.to_string(),
            mode,
            ip: params.ip.filter(|_| prefix_preserving),
            suffix: prefix_preserving && params.suffix.unwrap_or(false),
        }
    }

    /// Encrypts or decrypts one cell.
    pub(crate) fn apply(&self, cipher: &ColumnCipher, cell: &str) -> Result<String, Error> {
        match (cipher, self.mode) {
            (ColumnCipher::Ope(ope), EngineMode::Encrypt) => {
                let plaintext = cell.trim().parse::<u64>().map_err(|e| {
                    Error::Encoding(format!("`{cell}` is not an unsigned 64-bit integer: {e}"))
                })?;
                Ok(ope.encrypt(plaintext)?.to_string())
            }
            (ColumnCipher::Ope(ope), EngineMode::Decrypt) => {
                let ciphertext = cell
                    .trim()
                    .parse::<BigInt>()
                    .map_err(|e| Error::Encoding(format!("`{cell}` is not an integer: {e}")))?;
                Ok(ope.decrypt(&ciphertext)?.to_string())
            }
            (ColumnCipher::Fpe(fpe), EngineMode::Encrypt) => fpe.encrypt(cell),
            (ColumnCipher::Fpe(fpe), EngineMode::Decrypt) => fpe.decrypt(cell),
            (ColumnCipher::Ppe(ppe), _) => self.apply_prefix_preserving(&**ppe, cell),
            (ColumnCipher::Symmetric(symmetric), EngineMode::Encrypt) => {
                Ok(STANDARD.encode(symmetric.encrypt(cell.as_bytes())))
            }
            (ColumnCipher::Symmetric(symmetric), EngineMode::Decrypt) => {
                utf8(symmetric.decrypt(&decode(cell)?)?)
            }
        }
    }

    fn apply_prefix_preserving(&self, cipher: &dyn PrefixPreserving, cell: &str) -> Result<String, Error> {
        if let Some(version) = self.ip {
            let mut input = parse_ip(cell, version)?;
            if self.suffix {
                input = bits::reverse_bits(&input);
            }
            let mut output = match self.mode {
                EngineMode::Encrypt => cipher.encrypt(&input)?,
                EngineMode::Decrypt => self.verified(cipher.decrypt(&input)?),
            };
            if self.suffix {
                output = bits::reverse_bits(&output);
            }
            return render_ip(&output, version);
        }

        match self.mode {
            EngineMode::Encrypt => {
                let input = if self.suffix { reversed(cell) } else { cell.to_string() };
                let encoded = STANDARD.encode(cipher.encrypt(input.as_bytes())?);
                Ok(if self.suffix { reversed(&encoded) } else { encoded })
            }
            EngineMode::Decrypt => {
                let input = if self.suffix { decode(&reversed(cell))? } else { decode(cell)? };
                let text = utf8(self.verified(cipher.decrypt(&input)?))?;
                Ok(if self.suffix { reversed(&text) } else { text })
            }
        }
    }

    fn verified(&self, decryption: Decryption) -> Vec<u8> {
        if decryption.is_tampered() {
            warn!(column = %self.column, "Integrity check failed, writing zeroed value");
        }
        decryption.into_bytes()
    }
}

fn reversed(text: &str) -> String {
    text.chars().rev().collect()
}

fn decode(cell: &str) -> Result<Vec<u8>, Error> {
    STANDARD
        .decode(cell.trim())
        .map_err(|e| Error::Encoding(format!("`{cell}` is not valid base64: {e}")))
}

fn utf8(bytes: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(bytes).map_err(|e| Error::Encoding(format!("decrypted value is not UTF-8: {e}")))
}

fn parse_ip(cell: &str, version: IpVersion) -> Result<Vec<u8>, Error> {
    let address = cell
        .trim()
        .parse::<IpAddr>()
        .map_err(|e| Error::Encoding(format!("`{cell}` is not an IP address: {e}")))?;
    match (version, address) {
        (IpVersion::V4, IpAddr::V4(v4)) => Ok(v4.octets().to_vec()),
        (IpVersion::V6, IpAddr::V6(v6)) => Ok(v6.octets().to_vec()),
        (IpVersion::V4, IpAddr::V6(_)) => Err(Error::Encoding(format!("`{cell}` is not an IPv4 address"))),
        (IpVersion::V6, IpAddr::V4(_)) => Err(Error::Encoding(format!("`{cell}` is not an IPv6 address"))),
    }
}

fn render_ip(bytes: &[u8], version: IpVersion) -> Result<String, Error> {
    let invalid = || {
        Error::Encoding(format!(
            "expected {} address bytes, got {}",
            version.byte_length(),
            bytes.len()
        ))
    };
    let address = match version {
        IpVersion::V4 => IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(bytes).map_err(|_| invalid())?)),
        IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(bytes).map_err(|_| invalid())?)),
    };
    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{self, ParameterSpec, PpeParams};
    use crate::ppe::cryptopan::CryptoPanParams;
    use crate::ppe::hpcbc::HpcbcParams;
    use rand::{rngs::StdRng, SeedableRng};

    fn create_test_cipher(algorithm: Algorithm, spec: &ParameterSpec) -> ColumnCipher {
        let mut rng = StdRng::seed_from_u64(11);
        let key = cipher::generate_key(algorithm, spec, None, &mut rng).unwrap();
        cipher::build(algorithm, &key, spec).unwrap()
    }

    fn codecs(algorithm: Algorithm, params: &CipherParams) -> (CellCodec, CellCodec) {
        (
            CellCodec::new("col", EngineMode::Encrypt, algorithm, params),
            CellCodec::new("col", EngineMode::Decrypt, algorithm, params),
        )
    }

    #[test]
    fn test_ope_cells() {
        let spec = ParameterSpec::default_for(Algorithm::CommonDivisor);
        let cipher = create_test_cipher(Algorithm::CommonDivisor, &spec);
        let (encrypt, decrypt) = codecs(Algorithm::CommonDivisor, &CipherParams::default());

        let low = encrypt.apply(&cipher, "17").unwrap();
        let high = encrypt.apply(&cipher, "200").unwrap();
        assert!(low.parse::<BigInt>().unwrap() < high.parse::<BigInt>().unwrap());
        assert_eq!(decrypt.apply(&cipher, &low).unwrap(), "17");

        assert!(matches!(encrypt.apply(&cipher, "-3"), Err(Error::Encoding(_))));
        assert!(matches!(decrypt.apply(&cipher, "12ab"), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_text_cells() {
        for algorithm in [Algorithm::Aes, Algorithm::Blowfish] {
            let spec = ParameterSpec::default_for(algorithm);
            let cipher = create_test_cipher(algorithm, &spec);
            let (encrypt, decrypt) = codecs(algorithm, &CipherParams::default());

            let encrypted = encrypt.apply(&cipher, "Grüße").unwrap();
            assert!(STANDARD.decode(&encrypted).is_ok());
            assert_eq!(decrypt.apply(&cipher, &encrypted).unwrap(), "Grüße");
            assert!(matches!(decrypt.apply(&cipher, "not base64!"), Err(Error::Encoding(_))));
        }
    }

    #[test]
    fn test_ipv4_prefix() {
        let spec = ParameterSpec::Ppe(PpeParams::CryptoPan(CryptoPanParams::new(4).unwrap()));
        let cipher = create_test_cipher(Algorithm::CryptoPan, &spec);
        let params = CipherParams { ip: Some(IpVersion::V4), ..CipherParams::default() };
        let (encrypt, decrypt) = codecs(Algorithm::CryptoPan, &params);

        let first: Ipv4Addr = encrypt.apply(&cipher, "192.168.7.1").unwrap().parse().unwrap();
        let second: Ipv4Addr = encrypt.apply(&cipher, "192.168.7.200").unwrap().parse().unwrap();
        assert_eq!(first.octets()[..3], second.octets()[..3]);
        assert_eq!(decrypt.apply(&cipher, &first.to_string()).unwrap(), "192.168.7.1");

        assert!(matches!(encrypt.apply(&cipher, "::1"), Err(Error::Encoding(_))));
        assert!(matches!(encrypt.apply(&cipher, "host"), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_ipv4_suffix() {
        let spec = ParameterSpec::Ppe(PpeParams::CryptoPan(CryptoPanParams::new(4).unwrap()));
        let cipher = create_test_cipher(Algorithm::CryptoPan, &spec);
        let params = CipherParams { ip: Some(IpVersion::V4), suffix: Some(true), ..CipherParams::default() };
        let (encrypt, decrypt) = codecs(Algorithm::CryptoPan, &params);

        let first: Ipv4Addr = encrypt.apply(&cipher, "10.1.0.1").unwrap().parse().unwrap();
        let second: Ipv4Addr = encrypt.apply(&cipher, "172.16.0.1").unwrap().parse().unwrap();
        assert_eq!(first.octets()[2..], second.octets()[2..]);
        assert_eq!(decrypt.apply(&cipher, &second.to_string()).unwrap(), "172.16.0.1");
    }

    #[test]
    fn test_text_suffix() {
        let spec = ParameterSpec::Ppe(PpeParams::Hpcbc(HpcbcParams::default()));
        let cipher = create_test_cipher(Algorithm::Hpcbc, &spec);
        let params = CipherParams { suffix: Some(true), ..CipherParams::default() };
        let (encrypt, decrypt) = codecs(Algorithm::Hpcbc, &params);

        let encrypted = encrypt.apply(&cipher, "john@example.com").unwrap();
        assert_eq!(decrypt.apply(&cipher, &encrypted).unwrap(), "john@example.com");
    }

    #[test]
    fn test_tampered_cell_is_zeroed() {
        let spec = ParameterSpec::Ppe(PpeParams::Hpcbc(HpcbcParams::new(2, true).unwrap()));
        let cipher = create_test_cipher(Algorithm::Hpcbc, &spec);
        let (encrypt, decrypt) = codecs(Algorithm::Hpcbc, &CipherParams::default());

        let encrypted = encrypt.apply(&cipher, "hello").unwrap();
        let mut bytes = STANDARD.decode(&encrypted).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let decrypted = decrypt.apply(&cipher, &STANDARD.encode(&bytes)).unwrap();
        assert_eq!(decrypted, "\0".repeat(5));
    }

    #[test]
    fn test_ip_and_suffix_ignored_outside_ppe() {
        let params = CipherParams { ip: Some(IpVersion::V4), suffix: Some(true), ..CipherParams::default() };
        let codec = CellCodec::new("col", EngineMode::Encrypt, Algorithm::Aes, &params);
        assert!(codec.ip.is_none());
        assert!(!codec.suffix);
    }
}
