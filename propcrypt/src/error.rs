//! Error types for `propcrypt` operations.

use std::fmt;

/// Main error type for `propcrypt` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine configuration is inconsistent with the registry or dataset
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No algorithm is registered under the given name
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A cipher parameter is missing or out of range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Key length is not one of the sizes the algorithm accepts
    #[error("invalid key size for {algorithm}: {actual} bits (allowed: {allowed})")]
    InvalidKeySize {
        /// Algorithm the key was decoded for
        algorithm: &'static str,
        /// Size of the supplied key in bits
        actual: usize,
        /// Accepted sizes
        allowed: String,
    },

    /// Key material violates an algorithm invariant
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Plaintext is outside the cipher's domain
    #[error("value out of domain: {0}")]
    Domain(String),

    /// Ciphertext cannot have been produced under this key
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// A cell could not be parsed or rendered
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Transforming a column failed
    #[error("column `{column}` failed: {source}")]
    Column {
        /// Name of the failing column
        column: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A computation task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(String),
}

impl Error {
    /// Wraps this error with the name of the column being transformed.
    #[must_use]
    pub fn in_column(self, column: impl Into<String>) -> Self {
        match self {
            already @ Self::Column { .. } => already,
            other => Self::Column { column: column.into(), source: Box::new(other) },
        }
    }
}

/// Errors found while validating an engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Configured columns absent from the dataset
    MissingColumns(Vec<String>),

    /// Columns named more than once in the configuration or the dataset
    DuplicateColumns(Vec<String>),

    /// Cipher names with no registered algorithm
    UnsupportedCiphers(Vec<String>),

    /// Columns without a key in decrypt mode
    MissingKeys(Vec<String>),

    /// Format-preserving columns without a tweak in decrypt mode
    MissingTweaks(Vec<String>),

    /// Prefix-preserving columns without a maximum length in decrypt mode
    MissingMaxLength(Vec<String>),

    /// Options that cannot be combined on a column
    IncompatibleOptions { column: String, reason: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns(names) => {
                write!(f, "columns not found in dataset: {}", names.join(", "))
            }
            Self::DuplicateColumns(names) => {
                write!(f, "columns must appear exactly once: {}", names.join(", "))
            }
            Self::UnsupportedCiphers(names) => {
                write!(f, "unsupported ciphers: {}", names.join(", "))
            }
            Self::MissingKeys(names) => {
                write!(f, "decryption requires keys for columns: {}", names.join(", "))
            }
            Self::MissingTweaks(names) => {
                write!(f, "decryption requires tweaks for columns: {}", names.join(", "))
            }
            Self::MissingMaxLength(names) => {
                write!(f, "decryption requires max_length for columns: {}", names.join(", "))
            }
            Self::IncompatibleOptions { column, reason } => {
                write!(f, "column `{column}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::MissingColumns(vec!["age".to_string(), "zip".to_string()]);
        assert_eq!(err.to_string(), "columns not found in dataset: age, zip");

        let err: Error = ConfigurationError::MissingKeys(vec!["ip".to_string()]).into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: decryption requires keys for columns: ip"
        );
    }

    #[test]
    fn test_in_column_wraps_once() {
        let err = Error::Domain("42 exceeds 15".to_string()).in_column("age").in_column("other");

        match err {
            Error::Column { column, source } => {
                assert_eq!(column, "age");
                assert!(matches!(*source, Error::Domain(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
