//! Engine configuration
//!
//! Loaded from an optional `config/offer-rec` file and `OFFER_REC_*`
//! environment variables, in that order of precedence (environment wins).
//!
//! # Environment Variables
//!
//! - `OFFER_REC_LATENT_FEATURES` (optional): latent dimension count (default: 10)
//! - `OFFER_REC_LEARNING_RATE` (optional): gradient step size (default: 0.0001)
//! - `OFFER_REC_ITERATIONS` (optional): training passes (default: 250)
//! - `OFFER_REC_TRAIN_FRACTION` (optional): share of rows used for training (default: 0.9)
//! - `OFFER_REC_SEED` (optional): seed for initialization and sampling; unset draws from entropy

use crate::error::Result;
use crate::matrix_factorization::SGDConfig;
use crate::partition::{validate_train_fraction, DEFAULT_TRAIN_FRACTION};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "OFFER_REC";
const DEFAULT_CONFIG_FILE: &str = "config/offer-rec";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_latent_features")]
    pub latent_features: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,

    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_latent_features() -> usize {
    SGDConfig::default().latent_factors
}

fn default_learning_rate() -> f64 {
    SGDConfig::default().learning_rate
}

fn default_iterations() -> usize {
    SGDConfig::default().iterations
}

fn default_train_fraction() -> f64 {
    DEFAULT_TRAIN_FRACTION
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            latent_features: default_latent_features(),
            learning_rate: default_learning_rate(),
            iterations: default_iterations(),
            train_fraction: default_train_fraction(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment and the default config file
    pub fn load() -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from an explicit file, still honoring the environment
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        self.sgd().validate()?;
        validate_train_fraction(self.train_fraction)
    }

    pub fn sgd(&self) -> SGDConfig {
        SGDConfig {
            latent_factors: self.latent_features,
            learning_rate: self.learning_rate,
            iterations: self.iterations,
        }
    }

    /// Source of randomness for partitioning and factor initialization
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
