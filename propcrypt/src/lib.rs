//! # `propcrypt`
//!
//! Property-preserving encryption for dataset anonymization. Columns are
//! encrypted so that the property analysts rely on survives:
//!
//! ## Features
//!
//! - Order-preserving encryption (`CommonDivisor`, `FastOPE`,
//!   `ArithmeticCoding`) and order-revealing encryption (`PIOre`, `POre`)
//! - Format-preserving encryption of numeral strings (`FF3`, `DFF`)
//! - Prefix-preserving encryption of byte strings and IP addresses
//!   (`CryptoPAn`, `HPCBC` with an optional integrity block)
//! - Deterministic AES and Blowfish for plain identifiers
//! - A concurrent engine applying a per-column configuration to a dataset,
//!   generating keys and tweaks on the way, and deriving the configuration
//!   that reverses it
//!
//! ## Example
//!
//! ```rust
//! use propcrypt::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! let dataset = Dataset::new(vec![
//!     Column::new("age", ["31", "47"]),
//!     Column::new("ip", ["10.0.0.1", "10.0.0.2"]),
//! ])?;
//! let config = EngineConfiguration::new(
//!     "anonymized.csv",
//!     EngineMode::Encrypt,
//!     vec![
//!         EncryptionDetail::new("age", "FastOPE"),
//!         EncryptionDetail::new("ip", "CryptoPAn").with_params(CipherParams {
//!             ip: Some(IpVersion::V4),
//!             ..CipherParams::default()
//!         }),
//!     ],
//! );
//!
//! let encrypted = Engine::new(dataset, &config)?.compute().await?;
//! let reverse = encrypted.tidy_configuration();
//! assert_eq!(reverse.mode, EngineMode::Decrypt);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bits;
pub mod block;
pub mod cipher;
pub mod engine;
pub mod error;
pub mod fpe;
pub mod kdf;
pub mod key;
pub mod ope;
pub mod ppe;
pub mod prf;
pub mod registry;
pub mod symmetric;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::cipher::{ColumnCipher, ParameterSpec};
    pub use crate::engine::config::{
        CipherParams, EncryptionDetail, EngineConfiguration, EngineMode, IpVersion, TaxonomyNode,
        TaxonomyTree,
    };
    pub use crate::engine::dataset::{Column, Dataset};
    pub use crate::engine::{Computation, Engine};
    pub use crate::error::{ConfigurationError, Error};
    pub use crate::fpe::FormatPreserving;
    pub use crate::key::{KeyGenerator, SecretKey};
    pub use crate::ope::OrderPreserving;
    pub use crate::ppe::{Decryption, PrefixPreserving};
    pub use crate::registry::{Algorithm, Family};
}
