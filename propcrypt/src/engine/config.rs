//! Engine configuration.
//!
//! A configuration lists, per column, the cipher to apply, an optional key
//! and cipher-specific parameters. All types derive `serde` traits in the
//! shape callers exchange as JSON; reading and writing files is left to the
//! caller.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::registry::{Algorithm, Family};

/// Direction of a computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    /// Plaintext to ciphertext
    #[default]
    Encrypt,
    /// Ciphertext to plaintext
    Decrypt,
}

impl EngineMode {
    /// The opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Encrypt => Self::Decrypt,
            Self::Decrypt => Self::Encrypt,
        }
    }
}

/// IP address family of a prefix-preserving column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4, 4 bytes
    #[serde(rename = "4")]
    V4,
    /// IPv6, 16 bytes
    #[serde(rename = "6")]
    V6,
}

impl IpVersion {
    /// Address length in bytes.
    #[must_use]
    pub const fn byte_length(self) -> usize {
        match self {
            Self::V4 => 4,
            Self::V6 => 16,
        }
    }
}

/// Cipher-specific parameters. Each algorithm reads the fields it knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherParams {
    /// `CommonDivisor` domain upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m: Option<u64>,
    /// `FastOPE` and `PIOre` plaintext bit width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<u8>,
    /// `FastOPE` minimum ciphertext distance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tau: Option<u32>,
    /// `POre` and `ArithmeticCoding` plaintext bit width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u8>,
    /// `POre` digit base
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<u16>,
    /// Format-preserving radix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radix: Option<u32>,
    /// Format-preserving tweak, hex encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweak: Option<String>,
    /// `CryptoPAn` maximum plaintext length in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// `HPCBC` block size in bytes, also the length of the integrity tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_size: Option<usize>,
    /// `HPCBC` integrity block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_check: Option<bool>,
    /// Treat cells as IP addresses of this version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpVersion>,
    /// Preserve suffixes instead of prefixes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<bool>,
}

impl CipherParams {
    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn retain_for(&self, algorithm: Algorithm) -> Self {
        match (algorithm.family(), algorithm) {
            (Family::Fpe, _) => Self { radix: self.radix, tweak: self.tweak.clone(), ..Self::default() },
            (Family::Ppe, Algorithm::CryptoPan) => Self {
                ip: self.ip,
                suffix: self.suffix,
                max_length: self.max_length,
                ..Self::default()
            },
            (Family::Ppe, _) => Self {
                ip: self.ip,
                suffix: self.suffix,
                block_size: self.block_size,
                integrity_check: self.integrity_check,
                ..Self::default()
            },
            (Family::Ope | Family::Symmetric, _) => Self::default(),
        }
    }
}

/// One node of a taxonomy: a label and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    /// Label of the node
    pub cat: String,
    /// Child nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcats: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    /// Creates a leaf.
    pub fn leaf(cat: impl Into<String>) -> Self {
        Self { cat: cat.into(), subcats: Vec::new() }
    }

    /// Creates a node with children.
    pub fn new(cat: impl Into<String>, subcats: Vec<Self>) -> Self {
        Self { cat: cat.into(), subcats }
    }

    /// Labels in pre-order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        let mut labels = vec![self.cat.as_str()];
        for child in &self.subcats {
            labels.extend(child.labels());
        }
        labels
    }

    /// Rewrites every label in pre-order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<E, F>(&self, f: &mut F) -> Result<Self, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        let cat = f(&self.cat)?;
        let subcats = self.subcats.iter().map(|child| child.try_map(f)).collect::<Result<_, _>>()?;
        Ok(Self { cat, subcats })
    }
}

/// A rooted taxonomy attached to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTree {
    /// Root node
    #[serde(rename = "tree")]
    pub root: TaxonomyNode,
}

impl TaxonomyTree {
    /// Creates a tree.
    #[must_use]
    pub const fn new(root: TaxonomyNode) -> Self {
        Self { root }
    }
}

/// Parameters of one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionParams {
    /// Key size in bits for generated keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_size: Option<usize>,
    /// Taxonomy transformed alongside the column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_tree: Option<TaxonomyTree>,
    /// Cipher-specific parameters
    #[serde(flatten)]
    pub cipher_specific: CipherParams,
}

impl EncryptionParams {
    /// Returns `true` if nothing is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// How one column is transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionDetail {
    /// Column to transform
    pub column_name: String,
    /// Registered algorithm name
    pub cipher: String,
    /// Base64 key, generated when absent in encrypt mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Column parameters
    #[serde(default, skip_serializing_if = "EncryptionParams::is_empty")]
    pub params: EncryptionParams,
}

impl EncryptionDetail {
    /// Creates a detail with no key and default parameters.
    pub fn new(column_name: impl Into<String>, cipher: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            cipher: cipher.into(),
            key: None,
            params: EncryptionParams::default(),
        }
    }

    /// Sets the base64 key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the key size for generated keys.
    #[must_use]
    pub const fn with_key_size(mut self, key_size: usize) -> Self {
        self.params.key_size = Some(key_size);
        self
    }

    /// Attaches a taxonomy.
    #[must_use]
    pub fn with_taxonomy_tree(mut self, tree: TaxonomyTree) -> Self {
        self.params.taxonomy_tree = Some(tree);
        self
    }

    /// Sets the cipher-specific parameters.
    #[must_use]
    pub fn with_params(mut self, params: CipherParams) -> Self {
        self.params.cipher_specific = params;
        self
    }
}

/// A complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfiguration {
    /// Where the caller writes the transformed dataset
    pub output_filename: String,
    /// Direction of the computation
    #[serde(default)]
    pub mode: EngineMode,
    /// Per-column details, in output order
    pub encryption_details: Vec<EncryptionDetail>,
}

impl EngineConfiguration {
    /// Creates a configuration.
    pub fn new(
        output_filename: impl Into<String>,
        mode: EngineMode,
        encryption_details: Vec<EncryptionDetail>,
    ) -> Self {
        Self { output_filename: output_filename.into(), mode, encryption_details }
    }

    /// Checks the configuration against the dataset's column names.
    ///
    /// Checks run in order and the first failing one is reported:
    /// 1. Every configured column exists in the dataset
    /// 2. No column is configured twice
    /// 3. Every cipher is registered
    /// 4. In decrypt mode: keys, FPE tweaks and `CryptoPAn` lengths are set
    /// 5. `HPCBC` integrity checks are not combined with IP mode
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigurationError`] of the first failing check.
    pub fn validate<'a, I>(&self, column_names: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: HashSet<&str> = column_names.into_iter().collect();
        let details = &self.encryption_details;

        let missing = names(details.iter().filter(|d| !available.contains(d.column_name.as_str())));
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingColumns(missing));
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for detail in details {
            *counts.entry(detail.column_name.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<String> =
            counts.into_iter().filter(|&(_, count)| count > 1).map(|(name, _)| name.to_string()).collect();
        if !duplicates.is_empty() {
            duplicates.sort();
            return Err(ConfigurationError::DuplicateColumns(duplicates));
        }

        let mut unsupported: Vec<String> = Vec::new();
        let mut resolved = Vec::with_capacity(details.len());
        for detail in details {
            match Algorithm::from_name(&detail.cipher) {
                Ok(algorithm) => resolved.push((detail, algorithm)),
                Err(_) if unsupported.contains(&detail.cipher) => {}
                Err(_) => unsupported.push(detail.cipher.clone()),
            }
        }
        if !unsupported.is_empty() {
            return Err(ConfigurationError::UnsupportedCiphers(unsupported));
        }

        if self.mode == EngineMode::Decrypt {
            let missing_keys = names(details.iter().filter(|d| d.key.is_none()));
            if !missing_keys.is_empty() {
                return Err(ConfigurationError::MissingKeys(missing_keys));
            }

            let missing_tweaks = names(resolved.iter().filter_map(|&(d, algorithm)| {
                (algorithm.family() == Family::Fpe && d.params.cipher_specific.tweak.is_none())
                    .then_some(d)
            }));
            if !missing_tweaks.is_empty() {
                return Err(ConfigurationError::MissingTweaks(missing_tweaks));
            }

            let missing_lengths = names(resolved.iter().filter_map(|&(d, algorithm)| {
                let specific = &d.params.cipher_specific;
                (algorithm == Algorithm::CryptoPan
                    && specific.ip.is_none()
                    && specific.max_length.is_none())
                .then_some(d)
            }));
            if !missing_lengths.is_empty() {
                return Err(ConfigurationError::MissingMaxLength(missing_lengths));
            }
        }

        for (detail, algorithm) in resolved {
            let specific = &detail.params.cipher_specific;
            if algorithm == Algorithm::Hpcbc
                && specific.integrity_check == Some(true)
                && specific.ip.is_some()
            {
                return Err(ConfigurationError::IncompatibleOptions {
                    column: detail.column_name.clone(),
                    reason: "the integrity check changes the ciphertext length and cannot be used in IP mode"
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    /// Derives the configuration of the mirror operation.
    ///
    /// The mode is flipped and each column keeps only the parameters the
    /// mirror operation needs. Keys and key sizes are dropped when `self`
    /// is a decryption, so the next encryption generates fresh keys.
    #[must_use]
    pub fn tidy(&self) -> Self {
        let encryption_details = self
            .encryption_details
            .iter()
            .map(|detail| {
                let mut detail = detail.clone();
                if self.mode == EngineMode::Decrypt {
                    detail.key = None;
                    detail.params.key_size = None;
                }
                if let Ok(algorithm) = Algorithm::from_name(&detail.cipher) {
                    detail.params.cipher_specific = detail.params.cipher_specific.retain_for(algorithm);
                }
                detail
            })
            .collect();

        Self {
            output_filename: self.output_filename.clone(),
            mode: self.mode.flipped(),
            encryption_details,
        }
    }
}

fn names<'a, I>(details: I) -> Vec<String>
where
    I: Iterator<Item = &'a EncryptionDetail>,
{
    details.map(|d| d.column_name.clone()).collect()
}
