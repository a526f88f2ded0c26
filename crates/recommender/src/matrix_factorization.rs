//! Matrix Factorization using stochastic gradient descent
//!
//! Decomposes the customer-offer engagement matrix into a customer factor
//! matrix C (customers x k) and an offer factor matrix O (k x offers) so that
//! C·O approximates every observed cell. Missing cells take no part in either
//! the gradient updates or the error accounting.

use crate::error::{DivergenceWarning, RecommenderError, Result};
use crate::interaction::InteractionMatrix;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// SGD configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SGDConfig {
    /// Number of latent factors (k)
    pub latent_factors: usize,
    /// Gradient step size
    pub learning_rate: f64,
    /// Number of full passes over the observed cells
    pub iterations: usize,
}

impl Default for SGDConfig {
    fn default() -> Self {
        Self {
            latent_factors: 10,
            learning_rate: 0.0001,
            iterations: 250,
        }
    }
}

impl SGDConfig {
    pub fn validate(&self) -> Result<()> {
        if self.latent_factors < 1 {
            return Err(RecommenderError::invalid_config(
                "latent_factors must be at least 1",
                "latent_factors",
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RecommenderError::invalid_config(
                format!(
                    "learning_rate must be a positive finite number, got {}",
                    self.learning_rate
                ),
                "learning_rate",
            ));
        }
        if self.iterations < 1 {
            return Err(RecommenderError::invalid_config(
                "iterations must be at least 1",
                "iterations",
            ));
        }
        Ok(())
    }
}

/// Mean squared error recorded after one training pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationError {
    /// 1-based pass number
    pub iteration: usize,
    pub mse: f64,
}

/// Receives the error of every completed pass
pub trait TrainingObserver {
    fn on_iteration(&mut self, iteration: usize, mse: f64);
}

impl<F> TrainingObserver for F
where
    F: FnMut(usize, f64),
{
    fn on_iteration(&mut self, iteration: usize, mse: f64) {
        self(iteration, mse)
    }
}

/// Diagnostics of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub error_series: Vec<IterationError>,
    /// First divergence signal of the run; a later non-finite pass replaces
    /// an earlier increase
    pub divergence: Option<DivergenceWarning>,
    pub observed_cells: usize,
    pub trained_at: DateTime<Utc>,
}

impl TrainingReport {
    pub fn final_mse(&self) -> Option<f64> {
        self.error_series.last().map(|e| e.mse)
    }
}

/// Learned factors plus the id orderings they were trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorModel {
    pub customer_ids: Vec<String>,
    pub offer_ids: Vec<String>,
    /// Customer latent factors: [num_customers x latent_factors]
    pub customer_factors: Array2<f64>,
    /// Offer latent factors: [latent_factors x num_offers]
    pub offer_factors: Array2<f64>,
}

impl FactorModel {
    pub fn latent_factors(&self) -> usize {
        self.customer_factors.ncols()
    }

    /// Customer embedding (row of C)
    pub fn customer_embedding(&self, customer_id: &str) -> Result<Vec<f64>> {
        let idx = self
            .customer_ids
            .iter()
            .position(|id| id == customer_id)
            .ok_or_else(|| RecommenderError::unknown_customer(customer_id))?;
        Ok(self.customer_factors.row(idx).to_vec())
    }

    /// Offer embedding (column of O)
    pub fn offer_embedding(&self, offer_id: &str) -> Result<Vec<f64>> {
        let idx = self
            .offer_ids
            .iter()
            .position(|id| id == offer_id)
            .ok_or_else(|| RecommenderError::unknown_offer(offer_id))?;
        Ok(self.offer_factors.column(idx).to_vec())
    }

    /// Encode the model with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a model and check that its ids and factor shapes agree
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: Self = bincode::deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// Check that C·O is defined and every factor row/column has one id.
    pub fn validate(&self) -> Result<()> {
        let (customers, k) = self.customer_factors.dim();
        let (offer_k, offers) = self.offer_factors.dim();

        if k != offer_k {
            return Err(RecommenderError::invalid_config(
                format!(
                    "customer factors have {} latent columns but offer factors have {} rows",
                    k, offer_k
                ),
                "offer_factors",
            ));
        }
        if customers != self.customer_ids.len() {
            return Err(RecommenderError::invalid_config(
                format!(
                    "{} customer ids for {} customer factor rows",
                    self.customer_ids.len(),
                    customers
                ),
                "customer_ids",
            ));
        }
        if offers != self.offer_ids.len() {
            return Err(RecommenderError::invalid_config(
                format!(
                    "{} offer ids for {} offer factor columns",
                    self.offer_ids.len(),
                    offers
                ),
                "offer_ids",
            ));
        }
        Ok(())
    }
}

/// Learn C and O for a cell grid.
///
/// Factors start uniform in [0, 1). Each pass visits the observed cells in
/// row-major order and applies, for every latent dimension d,
///
/// ```text
/// C[c,d] += lr * 2 * residual * O[d,o]
/// O[d,o] += lr * 2 * residual * C[c,d]   (C[c,d] read before its update)
/// ```
///
/// so both updates within a cell see pre-update values. There is no early
/// stop and no learning-rate decay; a learning rate that is too high is
/// reported through the divergence warning, not as an error.
pub fn train<R: Rng + ?Sized>(
    cells: &Array2<Option<f64>>,
    config: &SGDConfig,
    rng: &mut R,
    mut observer: Option<&mut dyn TrainingObserver>,
) -> Result<(Array2<f64>, Array2<f64>, TrainingReport)> {
    config.validate()?;

    let observed: Vec<(usize, usize, f64)> = cells
        .indexed_iter()
        .filter_map(|((row, col), cell)| cell.map(|score| (row, col, score)))
        .collect();
    if observed.is_empty() {
        return Err(RecommenderError::EmptyInput);
    }

    let k = config.latent_factors;
    let lr = config.learning_rate;
    let observed_count = observed.len() as f64;

    let mut customer_factors = Array2::from_shape_fn((cells.nrows(), k), |_| rng.gen::<f64>());
    let mut offer_factors = Array2::from_shape_fn((k, cells.ncols()), |_| rng.gen::<f64>());

    tracing::info!(
        customers = cells.nrows(),
        offers = cells.ncols(),
        observed = observed.len(),
        latent_factors = k,
        learning_rate = lr,
        iterations = config.iterations,
        "Starting SGD matrix factorization"
    );

    let mut error_series = Vec::with_capacity(config.iterations);
    let mut divergence = None;
    let mut previous_mse: Option<f64> = None;

    for iteration in 1..=config.iterations {
        let mut sse = 0.0;

        for &(row, col, score) in &observed {
            let prediction = customer_factors.row(row).dot(&offer_factors.column(col));
            let residual = score - prediction;
            sse += residual * residual;

            let step = lr * 2.0 * residual;
            for dim in 0..k {
                let customer_value = customer_factors[[row, dim]];
                customer_factors[[row, dim]] += step * offer_factors[[dim, col]];
                offer_factors[[dim, col]] += step * customer_value;
            }
        }

        let mse = sse / observed_count;
        tracing::debug!("SGD iteration {}: mse = {:.6}", iteration, mse);

        // A non-finite pass supersedes an earlier increase; otherwise keep the first signal.
        let already_non_finite = matches!(divergence, Some(DivergenceWarning::NonFinite { .. }));
        if !already_non_finite {
            if let Some(warning) = detect_divergence(iteration, previous_mse, mse) {
                if divergence.is_none() || matches!(warning, DivergenceWarning::NonFinite { .. }) {
                    tracing::warn!(%warning, "Matrix factorization is not converging");
                    divergence = Some(warning);
                }
            }
        }

        if let Some(obs) = observer.as_mut() {
            obs.on_iteration(iteration, mse);
        }
        error_series.push(IterationError { iteration, mse });
        previous_mse = Some(mse);
    }

    let report = TrainingReport {
        error_series,
        divergence,
        observed_cells: observed.len(),
        trained_at: Utc::now(),
    };

    tracing::info!(
        final_mse = ?report.final_mse(),
        diverged = report.divergence.is_some(),
        "SGD matrix factorization finished"
    );

    Ok((customer_factors, offer_factors, report))
}

fn detect_divergence(
    iteration: usize,
    previous: Option<f64>,
    current: f64,
) -> Option<DivergenceWarning> {
    if !current.is_finite() {
        return Some(DivergenceWarning::NonFinite { iteration });
    }
    match previous {
        Some(previous) if current > previous => Some(DivergenceWarning::Increasing {
            iteration,
            previous,
            current,
        }),
        _ => None,
    }
}

/// SGD-based matrix factorization bound to one source of randomness
pub struct MatrixFactorization<R: Rng> {
    config: SGDConfig,
    rng: R,
}

impl<R: Rng> MatrixFactorization<R> {
    pub fn new(config: SGDConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &SGDConfig {
        &self.config
    }

    /// Train a fresh model on the interaction matrix
    pub fn fit(&mut self, matrix: &InteractionMatrix) -> Result<(FactorModel, TrainingReport)> {
        self.fit_inner(matrix, None)
    }

    /// Train a fresh model, reporting each pass to `observer`
    pub fn fit_with_observer(
        &mut self,
        matrix: &InteractionMatrix,
        observer: &mut dyn TrainingObserver,
    ) -> Result<(FactorModel, TrainingReport)> {
        self.fit_inner(matrix, Some(observer))
    }

    fn fit_inner(
        &mut self,
        matrix: &InteractionMatrix,
        observer: Option<&mut dyn TrainingObserver>,
    ) -> Result<(FactorModel, TrainingReport)> {
        let (customer_factors, offer_factors, report) =
            train(matrix.cells(), &self.config, &mut self.rng, observer)?;

        let model = FactorModel {
            customer_ids: matrix.customer_ids().to_vec(),
            offer_ids: matrix.offer_ids().to_vec(),
            customer_factors,
            offer_factors,
        };

        Ok((model, report))
    }
}
