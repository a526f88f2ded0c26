//! Random train/holdout partitioning of the engagement fact table

use crate::error::{RecommenderError, Result};
use crate::interaction::{dedup_max, Observation};
use rand::Rng;

/// Share of observed rows used for training when none is configured
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.9;

/// Training and holdout tables, each de-duplicated by (customer, offer)
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Vec<Observation>,
    pub test: Vec<Observation>,
}

/// Samples training rows uniformly without replacement
pub struct Partitioner<R: Rng> {
    train_fraction: f64,
    rng: R,
}

impl<R: Rng> Partitioner<R> {
    pub fn new(train_fraction: f64, rng: R) -> Result<Self> {
        validate_train_fraction(train_fraction)?;
        Ok(Self {
            train_fraction,
            rng,
        })
    }

    pub fn with_default_fraction(rng: R) -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            rng,
        }
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Split observed rows into training and holdout tables.
    ///
    /// `round(n * fraction)` row indices (half away from zero) go to training,
    /// the complement to holdout. Within each table repeated keys collapse to
    /// their maximum score.
    ///
    /// Sampling is over rows, not keys: the tables share no
    /// `(customer, offer)` key only when the input has no repeated keys. A
    /// repeated key whose rows land on both sides appears in both tables.
    pub fn split(&mut self, observations: &[Observation]) -> Result<TrainTestSplit> {
        let total = observations.len();
        if total == 0 {
            return Err(RecommenderError::EmptyInput);
        }

        let train_size = ((total as f64 * self.train_fraction).round() as usize).min(total);
        let mut in_train = vec![false; total];
        for idx in rand::seq::index::sample(&mut self.rng, total, train_size).into_iter() {
            in_train[idx] = true;
        }

        let (train_rows, test_rows): (Vec<_>, Vec<_>) = observations
            .iter()
            .zip(in_train.iter())
            .partition(|(_, selected)| **selected);

        tracing::info!(
            training_size = train_rows.len(),
            testing_size = test_rows.len(),
            "Partitioned observations"
        );

        Ok(TrainTestSplit {
            train: dedup_max(train_rows.into_iter().map(|(obs, _)| obs)),
            test: dedup_max(test_rows.into_iter().map(|(obs, _)| obs)),
        })
    }
}

pub(crate) fn validate_train_fraction(train_fraction: f64) -> Result<()> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(RecommenderError::invalid_config(
            format!(
                "train_fraction must be in (0, 1), got {}",
                train_fraction
            ),
            "train_fraction",
        ));
    }
    Ok(())
}
