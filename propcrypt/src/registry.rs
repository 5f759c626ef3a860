//! Algorithm registry.
//!
//! The set of ciphers is closed and known at compile time. Each entry maps a
//! configuration name to its family, accepted key sizes and parameter
//! metadata; the metadata is descriptive and used by callers that render
//! configuration forms or validate input before building an engine.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Property family of an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Order-preserving encryption
    Ope,
    /// Format-preserving encryption
    Fpe,
    /// Prefix-preserving encryption
    Ppe,
    /// Conventional symmetric encryption
    Symmetric,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ope => "OPE",
            Self::Fpe => "FPE",
            Self::Ppe => "PPE",
            Self::Symmetric => "SYMMETRIC",
        };
        f.write_str(name)
    }
}

/// Registered algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Approximate integer common divisor OPE
    CommonDivisor,
    /// Fast order-preserving encryption
    FastOpe,
    /// Practical ORE with base `2^m` digits
    PiOre,
    /// Parametrized ORE with base `q` digits
    POre,
    /// Arithmetic-coding OPE
    ArithmeticCoding,
    /// NIST FF3
    Ff3,
    /// DFF format-preserving cipher
    Dff,
    /// Crypto-PAn prefix-preserving cipher
    CryptoPan,
    /// HPCBC+ prefix-preserving block chaining
    Hpcbc,
    /// AES in ECB mode with PKCS#7 padding
    Aes,
    /// Blowfish in ECB mode with PKCS#7 padding
    Blowfish,
}

/// Blowfish accepts any whole-byte key from 32 to 448 bits.
const BLOWFISH_KEY_SIZES: [usize; 53] = {
    let mut sizes = [0; 53];
    let mut i = 0;
    while i < sizes.len() {
        sizes[i] = 32 + 8 * i;
        i += 1;
    }
    sizes
};

impl Algorithm {
    /// Every registered algorithm.
    pub const ALL: [Self; 11] = [
        Self::CommonDivisor,
        Self::FastOpe,
        Self::PiOre,
        Self::POre,
        Self::ArithmeticCoding,
        Self::Ff3,
        Self::Dff,
        Self::CryptoPan,
        Self::Hpcbc,
        Self::Aes,
        Self::Blowfish,
    ];

    /// Name used in engine configurations.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CommonDivisor => "CommonDivisor",
            Self::FastOpe => "FastOPE",
            Self::PiOre => "PIOre",
            Self::POre => "POre",
            Self::ArithmeticCoding => "ArithmeticCoding",
            Self::Ff3 => "FF3",
            Self::Dff => "DFF",
            Self::CryptoPan => "CryptoPAn",
            Self::Hpcbc => "HPCBC",
            Self::Aes => "AES",
            Self::Blowfish => "Blowfish",
        }
    }

    /// Looks an algorithm up by its configuration name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownAlgorithm` if no algorithm has that name.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == name)
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
    }

    /// Property family.
    #[must_use]
    pub const fn family(self) -> Family {
        match self {
            Self::CommonDivisor
            | Self::FastOpe
            | Self::PiOre
            | Self::POre
            | Self::ArithmeticCoding => Family::Ope,
            Self::Ff3 | Self::Dff => Family::Fpe,
            Self::CryptoPan | Self::Hpcbc => Family::Ppe,
            Self::Aes | Self::Blowfish => Family::Symmetric,
        }
    }

    /// Accepted key sizes in bits.
    #[must_use]
    pub const fn key_sizes(self) -> &'static [usize] {
        match self {
            Self::CommonDivisor | Self::PiOre => &[128, 192, 256, 384, 512],
            Self::FastOpe | Self::POre | Self::ArithmeticCoding | Self::CryptoPan => {
                &[256, 384, 512]
            }
            Self::Ff3 | Self::Dff | Self::Aes => &[128, 192, 256],
            Self::Hpcbc => &[256, 512],
            Self::Blowfish => &BLOWFISH_KEY_SIZES,
        }
    }

    /// Key size used when a configuration requests none.
    #[must_use]
    pub const fn default_key_size(self) -> usize {
        match self {
            Self::Blowfish => 128,
            other => other.key_sizes()[0],
        }
    }

    /// Parameters the algorithm accepts.
    #[must_use]
    pub fn parameters(self) -> Vec<ParameterDescription> {
        match self {
            Self::CommonDivisor => vec![ParameterDescription::new(
                "m",
                "Domain upper bound; drives the minimum key size",
                Condition::LowerLimit(1),
            )],
            Self::FastOpe => vec![
                ParameterDescription::new(
                    "tau",
                    "Minimum distance between consecutive ciphertexts",
                    Condition::LowerLimit(2),
                ),
                ParameterDescription::new("d", "Plaintext bit width", Condition::Range(1, 63)),
            ],
            Self::PiOre => {
                vec![ParameterDescription::new("d", "Plaintext bit width", Condition::Range(1, 63))]
            }
            Self::POre => vec![
                ParameterDescription::new("n", "Plaintext bit width", Condition::Range(1, 63)),
                ParameterDescription::new("q", "Digit base", Condition::Range(3, 16384)),
            ],
            Self::ArithmeticCoding => {
                vec![ParameterDescription::new("n", "Plaintext bit width", Condition::Range(1, 63))]
            }
            Self::Ff3 => vec![
                ParameterDescription::new("radix", "Numeral radix", Condition::Range(2, 36)),
                ParameterDescription::new("tweak", "Hex encoded tweak", Condition::Regex("^[0-9a-fA-F]{16}$"))
                    .required_for_decryption(),
            ],
            Self::Dff => vec![
                ParameterDescription::new("radix", "Numeral radix", Condition::Range(2, 36)),
                ParameterDescription::new("tweak", "Hex encoded tweak", Condition::Regex("^([0-9a-fA-F]{2}){0,13}$"))
                    .required_for_decryption(),
            ],
            Self::CryptoPan => vec![
                ParameterDescription::new("ip", "Treat values as IP addresses", Condition::DistinctValues(&["4", "6"])),
                ParameterDescription::new("suffix", "Preserve suffixes instead of prefixes", Condition::Boolean),
                ParameterDescription::new("max_length", "Longest value in bytes", Condition::Range(1, 1024))
                    .required_for_decryption(),
            ],
            Self::Hpcbc => vec![
                ParameterDescription::new("ip", "Treat values as IP addresses", Condition::DistinctValues(&["4", "6"])),
                ParameterDescription::new("suffix", "Preserve suffixes instead of prefixes", Condition::Boolean),
                ParameterDescription::new("block_size", "Block size in bytes", Condition::Range(1, 24)),
                ParameterDescription::new("integrity_check", "Append an integrity block", Condition::Boolean),
            ],
            Self::Aes | Self::Blowfish => Vec::new(),
        }
    }

    /// Full description of the algorithm.
    #[must_use]
    pub fn describe(self) -> AlgorithmDescription {
        AlgorithmDescription {
            name: self.name(),
            family: self.family(),
            key_sizes: self.key_sizes(),
            parameters: self.parameters(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Describes every registered algorithm, sorted by name.
#[must_use]
pub fn describe_all() -> Vec<AlgorithmDescription> {
    let mut all: Vec<_> = Algorithm::ALL.into_iter().map(Algorithm::describe).collect();
    all.sort_by_key(|description| description.name);
    all
}

/// Registry metadata for one algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmDescription {
    /// Configuration name
    pub name: &'static str,
    /// Property family
    pub family: Family,
    /// Accepted key sizes in bits
    pub key_sizes: &'static [usize],
    /// Accepted parameters
    pub parameters: Vec<ParameterDescription>,
}

/// Metadata for one cipher parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescription {
    /// Key of the parameter in the configuration
    pub field: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Accepted values
    pub condition: Condition,
    /// Whether decryption fails without it
    pub decryption_required: bool,
}

impl ParameterDescription {
    const fn new(field: &'static str, description: &'static str, condition: Condition) -> Self {
        Self { field, description, condition, decryption_required: false }
    }

    const fn required_for_decryption(mut self) -> Self {
        self.decryption_required = true;
        self
    }
}

/// Accepted values of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Must match a regular expression
    Regex(&'static str),
    /// Inclusive integer range
    Range(i64, i64),
    /// Integer at least this large
    LowerLimit(i64),
    /// One of a fixed set of values
    DistinctValues(&'static [&'static str]),
    /// `true` or `false`
    Boolean,
}
