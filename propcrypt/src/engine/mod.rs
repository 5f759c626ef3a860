//! Column-wise computation engine.
//!
//! [`Engine::compute`] runs one task per configured column. Each task
//! resolves the column's key and parameters (generating what is missing),
//! builds the cipher once and transforms every cell, plus the column's
//! taxonomy tree in a sibling task sharing the same cipher. The first
//! failing column aborts the rest.

mod codec;
pub mod config;
pub mod dataset;

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, info, warn};

use self::codec::CellCodec;
use self::config::{CipherParams, EncryptionDetail, EngineConfiguration, EngineMode, TaxonomyTree};
use self::dataset::{Column, Dataset};
use crate::cipher::{self, ColumnCipher, OpeParams, ParameterSpec, PpeParams};
use crate::error::Error;
use crate::fpe::{FpeParams, DEFAULT_RADIX};
use crate::key::SecretKey;
use crate::ope::acope::AcopeParams;
use crate::ope::aicd::{AicdParams, DEFAULT_DOMAIN};
use crate::ope::fope::{FopeParams, DEFAULT_TAU};
use crate::ope::piore::PioreParams;
use crate::ope::pore::{PoreParams, DEFAULT_BASE};
use crate::ope::{bit_width, DEFAULT_WIDTH};
use crate::ppe::cryptopan::{CryptoPanParams, MIN_MAX_LENGTH};
use crate::ppe::hpcbc::{HpcbcParams, DEFAULT_BLOCK_SIZE};
use crate::registry::{Algorithm, Family};

/// Result of a computation.
#[derive(Debug, Clone)]
pub struct Computation {
    dataset: Dataset,
    configuration: EngineConfiguration,
}

impl Computation {
    /// The transformed dataset.
    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Takes the transformed dataset.
    #[must_use]
    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    /// The configuration as run: generated keys and tweaks, derived
    /// parameters and transformed taxonomies filled in.
    #[must_use]
    pub const fn configuration(&self) -> &EngineConfiguration {
        &self.configuration
    }

    /// Configuration of the mirror operation, see [`EngineConfiguration::tidy`].
    #[must_use]
    pub fn tidy_configuration(&self) -> EngineConfiguration {
        self.configuration.tidy()
    }
}

/// Transforms the columns of a dataset.
///
/// # Example
///
/// ```
/// use propcrypt::engine::config::{EncryptionDetail, EngineConfiguration, EngineMode};
/// use propcrypt::engine::dataset::{Column, Dataset};
/// use propcrypt::engine::Engine;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), propcrypt::error::Error> {
/// let dataset = Dataset::new(vec![Column::new("age", ["31", "47", "25"])])?;
/// let config = EngineConfiguration::new(
///     "out.csv",
///     EngineMode::Encrypt,
///     vec![EncryptionDetail::new("age", "CommonDivisor")],
/// );
///
/// let encrypted = Engine::new(dataset.clone(), &config)?.compute().await?;
/// let decrypted = Engine::new(encrypted.dataset().clone(), &encrypted.tidy_configuration())?
///     .compute()
///     .await?;
/// assert_eq!(decrypted.dataset(), &dataset);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    dataset: Dataset,
    configuration: EngineConfiguration,
}

impl Engine {
    /// Creates an engine over `dataset`.
    ///
    /// The configuration is copied; the caller's value is never modified.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the configuration does not match
    /// the dataset or the registry, see [`EngineConfiguration::validate`].
    pub fn new(dataset: Dataset, configuration: &EngineConfiguration) -> Result<Self, Error> {
        configuration.validate(dataset.column_names())?;
        Ok(Self { dataset, configuration: configuration.clone() })
    }

    /// The configuration the engine runs.
    #[must_use]
    pub const fn configuration(&self) -> &EngineConfiguration {
        &self.configuration
    }

    /// Transforms every configured column.
    ///
    /// Columns are processed concurrently and reassembled in configuration
    /// order; unconfigured columns pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Column` wrapping the first failure (bad key, out of
    /// domain value, malformed cell), or `Error::Task` if a task panicked.
    pub async fn compute(&self) -> Result<Computation, Error> {
        let mode = self.configuration.mode;
        let details = &self.configuration.encryption_details;
        info!(columns = details.len(), rows = self.dataset.row_count(), ?mode, "Starting computation");

        let mut tasks = JoinSet::new();
        for (index, detail) in details.iter().enumerate() {
            let column = self
                .dataset
                .column(&detail.column_name)
                .cloned()
                .ok_or_else(|| Error::InvalidParameter(format!("no column `{}`", detail.column_name)))?;
            let detail = detail.clone();
            tasks.spawn(async move {
                let name = detail.column_name.clone();
                transform_column(mode, detail, column)
                    .await
                    .map(|output| (index, output))
                    .map_err(|e| e.in_column(name))
            });
        }

        let mut outputs: Vec<Option<(Column, EncryptionDetail)>> = (0..details.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(join_error).and_then(|result| result) {
                Ok((index, output)) => outputs[index] = Some(output),
                Err(error) => {
                    warn!(%error, "Column failed, aborting computation");
                    tasks.abort_all();
                    return Err(error);
                }
            }
        }

        let mut dataset = self.dataset.clone();
        let mut encryption_details = Vec::with_capacity(outputs.len());
        for output in outputs {
            let (column, detail) =
                output.ok_or_else(|| Error::Task("a column task finished without output".to_string()))?;
            dataset.replace_column(column);
            encryption_details.push(detail);
        }

        info!("Computation finished");
        Ok(Computation {
            dataset,
            configuration: EngineConfiguration { encryption_details, ..self.configuration.clone() },
        })
    }
}

async fn transform_column(
    mode: EngineMode,
    detail: EncryptionDetail,
    column: Column,
) -> Result<(Column, EncryptionDetail), Error> {
    debug!(column = %detail.column_name, cipher = %detail.cipher, "Preparing column");

    let (mut detail, algorithm, cipher, column) = task::spawn_blocking(move || {
        let (detail, algorithm, cipher) = prepare(mode, detail, &column, &mut OsRng)?;
        Ok::<_, Error>((detail, algorithm, cipher, column))
    })
    .await
    .map_err(join_error)??;

    let cipher = Arc::new(cipher);
    let codec = Arc::new(CellCodec::new(&detail.column_name, mode, algorithm, &detail.params.cipher_specific));

    let taxonomy = detail.params.taxonomy_tree.clone().map(|tree| {
        let cipher = Arc::clone(&cipher);
        let codec = Arc::clone(&codec);
        task::spawn_blocking(move || {
            tree.root.try_map(&mut |label| codec.apply(&cipher, label)).map(TaxonomyTree::new)
        })
    });

    let transformed = task::spawn_blocking(move || {
        let values = column
            .values()
            .iter()
            .map(|cell| codec.apply(&cipher, cell))
            .collect::<Result<Vec<_>, _>>()?;
        Ok::<_, Error>(Column::new(column.name(), values))
    })
    .await
    .map_err(join_error)??;

    if let Some(handle) = taxonomy {
        detail.params.taxonomy_tree = Some(handle.await.map_err(join_error)??);
    }

    debug!(column = %detail.column_name, rows = transformed.len(), "Column transformed");
    Ok((transformed, detail))
}

/// Resolves the key and parameters of a column and builds its cipher.
///
/// Returns the detail as run: generated keys, tweaks and derived
/// parameters are recorded in it.
fn prepare<R>(
    mode: EngineMode,
    mut detail: EncryptionDetail,
    column: &Column,
    rng: &mut R,
) -> Result<(EncryptionDetail, Algorithm, ColumnCipher), Error>
where
    R: RngCore + CryptoRng,
{
    let algorithm = Algorithm::from_name(&detail.cipher)?;

    let mut values: Vec<&str> = column.values().iter().map(String::as_str).collect();
    if let Some(tree) = &detail.params.taxonomy_tree {
        values.extend(tree.root.labels());
    }
    let spec = resolve_parameters(algorithm, mode, &mut detail.params.cipher_specific, &values, rng)?;

    let key = match detail.key.as_deref().map(SecretKey::from_base64) {
        Some(key) => key?,
        None => {
            let key = cipher::generate_key(algorithm, &spec, detail.params.key_size, rng)?;
            info!(column = %detail.column_name, %algorithm, bits = key.bit_len(), "Generated key");
            detail.key = Some(key.to_base64());
            key
        }
    };

    let cipher = cipher::build(algorithm, &key, &spec)?;
    Ok((detail, algorithm, cipher))
}

/// Builds the parameter spec of a column, filling unset parameters from
/// the data or defaults and writing them back into `specific`.
///
/// Order-preserving keys carry their own parameters, so nothing is derived
/// for them when decrypting.
fn resolve_parameters<R>(
    algorithm: Algorithm,
    mode: EngineMode,
    specific: &mut CipherParams,
    values: &[&str],
    rng: &mut R,
) -> Result<ParameterSpec, Error>
where
    R: RngCore + CryptoRng,
{
    if algorithm.family() == Family::Ope && mode == EngineMode::Decrypt {
        return Ok(ParameterSpec::default_for(algorithm));
    }

    let spec = match algorithm {
        Algorithm::CommonDivisor => {
            let m = match specific.m {
                Some(m) => m,
                None => max_value(values)?.map_or(DEFAULT_DOMAIN, |max| max.max(1)),
            };
            specific.m = Some(m);
            ParameterSpec::Ope(OpeParams::CommonDivisor(AicdParams::new(m)?))
        }
        Algorithm::FastOpe => {
            let d = width(specific.d, values)?;
            let tau = *specific.tau.get_or_insert(DEFAULT_TAU);
            specific.d = Some(d);
            ParameterSpec::Ope(OpeParams::FastOpe(FopeParams::new(tau, d)?))
        }
        Algorithm::PiOre => {
            let d = width(specific.d, values)?;
            specific.d = Some(d);
            ParameterSpec::Ope(OpeParams::PiOre(PioreParams::new(d)?))
        }
        Algorithm::POre => {
            let n = width(specific.n, values)?;
            let q = *specific.q.get_or_insert(DEFAULT_BASE);
            specific.n = Some(n);
            ParameterSpec::Ope(OpeParams::POre(PoreParams::new(n, q)?))
        }
        Algorithm::ArithmeticCoding => {
            let n = width(specific.n, values)?;
            specific.n = Some(n);
            ParameterSpec::Ope(OpeParams::ArithmeticCoding(AcopeParams::new(n)?))
        }
        Algorithm::Ff3 | Algorithm::Dff => {
            let radix = *specific.radix.get_or_insert(DEFAULT_RADIX);
            let tweak = match &specific.tweak {
                Some(encoded) => hex::decode(encoded)
                    .map_err(|e| Error::InvalidParameter(format!("tweak is not valid hex: {e}")))?,
                None => {
                    let tweak = cipher::random_tweak(algorithm, rng)?;
                    specific.tweak = Some(hex::encode(&tweak));
                    tweak
                }
            };
            ParameterSpec::Fpe(FpeParams::new(radix, Some(tweak))?)
        }
        Algorithm::CryptoPan => {
            let max_length = match (specific.ip, specific.max_length) {
                (Some(version), _) => version.byte_length(),
                (None, Some(max_length)) => max_length,
                (None, None) => values.iter().map(|v| v.len()).max().unwrap_or(0).max(MIN_MAX_LENGTH),
            };
            specific.max_length = Some(max_length);
            ParameterSpec::Ppe(PpeParams::CryptoPan(CryptoPanParams::new(max_length)?))
        }
        Algorithm::Hpcbc => {
            let block_size = *specific.block_size.get_or_insert(DEFAULT_BLOCK_SIZE);
            let integrity_check = *specific.integrity_check.get_or_insert(false);
            ParameterSpec::Ppe(PpeParams::Hpcbc(HpcbcParams::new(block_size, integrity_check)?))
        }
        Algorithm::Aes | Algorithm::Blowfish => ParameterSpec::None,
    };
    Ok(spec)
}

fn max_value(values: &[&str]) -> Result<Option<u64>, Error> {
    let mut max = None;
    for value in values {
        let parsed = value.trim().parse::<u64>().map_err(|e| {
            Error::Encoding(format!("`{value}` is not an unsigned 64-bit integer: {e}"))
        })?;
        max = Some(max.map_or(parsed, |current: u64| current.max(parsed)));
    }
    Ok(max)
}

// Configured width, else the width of the largest value.
fn width(configured: Option<u8>, values: &[&str]) -> Result<u8, Error> {
    match configured {
        Some(width) => Ok(width),
        None => Ok(max_value(values)?.map_or(DEFAULT_WIDTH, bit_width)),
    }
}

fn join_error(error: JoinError) -> Error {
    Error::Task(error.to_string())
}
