//! Dispatch from an [`Algorithm`] to its parameters, keys and cipher.
//!
//! Every algorithm family has its own cipher trait; [`ColumnCipher`] is the
//! tagged union the engine holds per column, built in one step from a key
//! and a [`ParameterSpec`].

use rand::{CryptoRng, RngCore};

use crate::error::Error;
use crate::fpe::dff::{self, DffCipher};
use crate::fpe::ff3::{self, Ff3Cipher};
use crate::fpe::{FormatPreserving, FpeParams};
use crate::key::{KeyGenerator, RandomKeyGenerator, SecretKey};
use crate::ope::acope::{AcopeCipher, AcopeKey, AcopeKeyGenerator, AcopeParams};
use crate::ope::aicd::{AicdCipher, AicdKey, AicdKeyGenerator, AicdParams};
use crate::ope::fope::{FopeCipher, FopeKey, FopeKeyGenerator, FopeParams};
use crate::ope::piore::{PioreCipher, PioreKey, PioreKeyGenerator, PioreParams};
use crate::ope::pore::{PoreCipher, PoreKey, PoreKeyGenerator, PoreParams};
use crate::ope::OrderPreserving;
use crate::ppe::cryptopan::{CryptoPanCipher, CryptoPanParams};
use crate::ppe::hpcbc::{HpcbcCipher, HpcbcKeyGenerator, HpcbcParams};
use crate::ppe::PrefixPreserving;
use crate::registry::{Algorithm, Family};
use crate::symmetric::SymmetricCipher;

/// Parameters of an order-preserving algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeParams {
    /// `CommonDivisor`
    CommonDivisor(AicdParams),
    /// `FastOPE`
    FastOpe(FopeParams),
    /// `PIOre`
    PiOre(PioreParams),
    /// `POre`
    POre(PoreParams),
    /// `ArithmeticCoding`
    ArithmeticCoding(AcopeParams),
}

/// Parameters of a prefix-preserving algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpeParams {
    /// `CryptoPAn`
    CryptoPan(CryptoPanParams),
    /// `HPCBC`
    Hpcbc(HpcbcParams),
}

/// Validated parameters for one algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSpec {
    /// Order-preserving parameters.
    Ope(OpeParams),
    /// Format-preserving parameters.
    Fpe(FpeParams),
    /// Prefix-preserving parameters.
    Ppe(PpeParams),
    /// The algorithm takes no parameters.
    None,
}

impl ParameterSpec {
    /// Default parameters for `algorithm`.
    #[must_use]
    pub fn default_for(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::CommonDivisor => Self::Ope(OpeParams::CommonDivisor(AicdParams::default())),
            Algorithm::FastOpe => Self::Ope(OpeParams::FastOpe(FopeParams::default())),
            Algorithm::PiOre => Self::Ope(OpeParams::PiOre(PioreParams::default())),
            Algorithm::POre => Self::Ope(OpeParams::POre(PoreParams::default())),
            Algorithm::ArithmeticCoding => {
                Self::Ope(OpeParams::ArithmeticCoding(AcopeParams::default()))
            }
            Algorithm::Ff3 | Algorithm::Dff => Self::Fpe(FpeParams::default()),
            Algorithm::CryptoPan => Self::Ppe(PpeParams::CryptoPan(CryptoPanParams::default())),
            Algorithm::Hpcbc => Self::Ppe(PpeParams::Hpcbc(HpcbcParams::default())),
            Algorithm::Aes | Algorithm::Blowfish => Self::None,
        }
    }

    fn mismatch(&self, algorithm: Algorithm) -> Error {
        Error::InvalidParameter(format!("parameters {self:?} do not apply to {algorithm}"))
    }
}

/// A ready-to-use cipher of any family.
pub enum ColumnCipher {
    /// Order-preserving cipher.
    Ope(Box<dyn OrderPreserving>),
    /// Format-preserving cipher.
    Fpe(Box<dyn FormatPreserving>),
    /// Prefix-preserving cipher.
    Ppe(Box<dyn PrefixPreserving>),
    /// Symmetric cipher.
    Symmetric(SymmetricCipher),
}

impl ColumnCipher {
    /// Family of the wrapped cipher.
    #[must_use]
    pub const fn family(&self) -> Family {
        match self {
            Self::Ope(_) => Family::Ope,
            Self::Fpe(_) => Family::Fpe,
            Self::Ppe(_) => Family::Ppe,
            Self::Symmetric(_) => Family::Symmetric,
        }
    }
}

/// Generates a key for `algorithm` under `spec`.
///
/// # Arguments
///
/// * `algorithm` - Target algorithm
/// * `spec` - Parameters the key must satisfy (`AICD` sizes its key from `m`,
///   the OPE keys embed their bit width, `HPCBC` follows the integrity flag)
/// * `key_size` - Requested size in bits, or `None` for the algorithm default
/// * `rng` - Source of key material
///
/// # Errors
///
/// Returns `Error::InvalidKeySize` if the size is not allowed, and
/// `Error::InvalidParameter` if `spec` belongs to another algorithm.
pub fn generate_key<R>(
    algorithm: Algorithm,
    spec: &ParameterSpec,
    key_size: Option<usize>,
    rng: &mut R,
) -> Result<SecretKey, Error>
where
    R: RngCore + CryptoRng + ?Sized,
{
    match (algorithm, spec) {
        (Algorithm::CommonDivisor, ParameterSpec::Ope(OpeParams::CommonDivisor(params))) => {
            AicdKeyGenerator::new(*params).generate_key(key_size, rng)
        }
        (Algorithm::FastOpe, ParameterSpec::Ope(OpeParams::FastOpe(params))) => {
            FopeKeyGenerator::new(*params).generate_key(key_size, rng)
        }
        (Algorithm::PiOre, ParameterSpec::Ope(OpeParams::PiOre(params))) => {
            PioreKeyGenerator::new(*params).generate_key(key_size, rng)
        }
        (Algorithm::POre, ParameterSpec::Ope(OpeParams::POre(params))) => {
            PoreKeyGenerator::new(*params).generate_key(key_size, rng)
        }
        (Algorithm::ArithmeticCoding, ParameterSpec::Ope(OpeParams::ArithmeticCoding(params))) => {
            AcopeKeyGenerator::new(*params).generate_key(key_size, rng)
        }
        (Algorithm::Hpcbc, ParameterSpec::Ppe(PpeParams::Hpcbc(params))) => {
            HpcbcKeyGenerator::new(*params).generate_key(key_size, rng)
        }
        (Algorithm::Ff3 | Algorithm::Dff, ParameterSpec::Fpe(_))
        | (Algorithm::CryptoPan, ParameterSpec::Ppe(PpeParams::CryptoPan(_)))
        | (Algorithm::Aes | Algorithm::Blowfish, ParameterSpec::None) => {
            RandomKeyGenerator::new(algorithm).generate_key(key_size, rng)
        }
        _ => Err(spec.mismatch(algorithm)),
    }
}

/// Generates a fresh tweak for a format-preserving algorithm.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` if `algorithm` takes no tweak.
pub fn random_tweak<R>(algorithm: Algorithm, rng: &mut R) -> Result<Vec<u8>, Error>
where
    R: RngCore + CryptoRng + ?Sized,
{
    match algorithm {
        Algorithm::Ff3 => Ok(ff3::random_tweak(rng)),
        Algorithm::Dff => Ok(dff::random_tweak(rng)),
        other => Err(Error::InvalidParameter(format!("{other} takes no tweak"))),
    }
}

/// Builds the cipher for `algorithm` from a key and parameters.
///
/// OPE keys carry their own parameters, so `spec` is only checked to belong
/// to the algorithm.
///
/// # Errors
///
/// Returns the key decoding error of the algorithm, or
/// `Error::InvalidParameter` if `spec` belongs to another algorithm.
pub fn build(algorithm: Algorithm, key: &SecretKey, spec: &ParameterSpec) -> Result<ColumnCipher, Error> {
    let cipher = match (algorithm, spec) {
        (Algorithm::CommonDivisor, ParameterSpec::Ope(OpeParams::CommonDivisor(_))) => {
            ColumnCipher::Ope(Box::new(AicdCipher::new(&AicdKey::from_secret(key)?)))
        }
        (Algorithm::FastOpe, ParameterSpec::Ope(OpeParams::FastOpe(_))) => {
            ColumnCipher::Ope(Box::new(FopeCipher::new(&FopeKey::from_secret(key)?)?))
        }
        (Algorithm::PiOre, ParameterSpec::Ope(OpeParams::PiOre(_))) => {
            ColumnCipher::Ope(Box::new(PioreCipher::new(&PioreKey::from_secret(key)?)?))
        }
        (Algorithm::POre, ParameterSpec::Ope(OpeParams::POre(_))) => {
            ColumnCipher::Ope(Box::new(PoreCipher::new(&PoreKey::from_secret(key)?)?))
        }
        (Algorithm::ArithmeticCoding, ParameterSpec::Ope(OpeParams::ArithmeticCoding(_))) => {
            ColumnCipher::Ope(Box::new(AcopeCipher::new(&AcopeKey::from_secret(key)?)))
        }
        (Algorithm::Ff3, ParameterSpec::Fpe(params)) => {
            ColumnCipher::Fpe(Box::new(Ff3Cipher::new(key, params)?))
        }
        (Algorithm::Dff, ParameterSpec::Fpe(params)) => {
            ColumnCipher::Fpe(Box::new(DffCipher::new(key, params)?))
        }
        (Algorithm::CryptoPan, ParameterSpec::Ppe(PpeParams::CryptoPan(params))) => {
            ColumnCipher::Ppe(Box::new(CryptoPanCipher::new(key, params)?))
        }
        (Algorithm::Hpcbc, ParameterSpec::Ppe(PpeParams::Hpcbc(params))) => {
            ColumnCipher::Ppe(Box::new(HpcbcCipher::new(key, params)?))
        }
        (Algorithm::Aes | Algorithm::Blowfish, ParameterSpec::None) => {
            ColumnCipher::Symmetric(SymmetricCipher::new(algorithm, key)?)
        }
        _ => return Err(spec.mismatch(algorithm)),
    };
    Ok(cipher)
}
