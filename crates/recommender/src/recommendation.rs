//! Offer recommendation pipeline
//!
//! Steps:
//! 1. Partition the fact table into training and holdout rows
//! 2. Pivot the training rows into an interaction matrix
//! 3. Factorize the matrix with SGD
//! 4. Freeze the C·O prediction matrix for recommendation queries

use crate::config::EngineConfig;
use crate::error::Result;
use crate::evaluation::{evaluate, EvaluationReport};
use crate::interaction::{InteractionMatrix, Observation};
use crate::matrix_factorization::{
    FactorModel, MatrixFactorization, TrainingObserver, TrainingReport,
};
use crate::partition::Partitioner;
use crate::prediction::{Comparison, PredictionMatrix};
use rand::Rng;

/// A fitted recommender: training matrix, holdout rows, model and predictions
pub struct OfferRecommender {
    train_matrix: InteractionMatrix,
    holdout: Vec<Observation>,
    model: FactorModel,
    report: TrainingReport,
    predictions: PredictionMatrix,
}

impl OfferRecommender {
    /// Fit with randomness drawn from the configuration (seeded or entropy)
    pub fn from_config(observations: &[Observation], config: &EngineConfig) -> Result<Self> {
        let mut rng = config.rng();
        Self::fit(observations, config, &mut rng)
    }

    pub fn fit<R: Rng>(
        observations: &[Observation],
        config: &EngineConfig,
        rng: &mut R,
    ) -> Result<Self> {
        Self::fit_inner(observations, config, rng, None)
    }

    pub fn fit_with_observer<R: Rng>(
        observations: &[Observation],
        config: &EngineConfig,
        rng: &mut R,
        observer: &mut dyn TrainingObserver,
    ) -> Result<Self> {
        Self::fit_inner(observations, config, rng, Some(observer))
    }

    fn fit_inner<R: Rng>(
        observations: &[Observation],
        config: &EngineConfig,
        rng: &mut R,
        observer: Option<&mut dyn TrainingObserver>,
    ) -> Result<Self> {
        config.validate()?;

        let split = Partitioner::new(config.train_fraction, &mut *rng)?.split(observations)?;
        let train_matrix = InteractionMatrix::from_observations(&split.train)?;

        tracing::info!(
            customers = train_matrix.num_customers(),
            offers = train_matrix.num_offers(),
            observed = train_matrix.observed_count(),
            "Built training interaction matrix"
        );

        let mut trainer = MatrixFactorization::new(config.sgd(), &mut *rng)?;
        let (model, report) = match observer {
            Some(observer) => trainer.fit_with_observer(&train_matrix, observer)?,
            None => trainer.fit(&train_matrix)?,
        };
        let predictions = PredictionMatrix::from_model(&model)?;

        Ok(Self {
            train_matrix,
            holdout: split.test,
            model,
            report,
            predictions,
        })
    }

    pub fn train_matrix(&self) -> &InteractionMatrix {
        &self.train_matrix
    }

    pub fn holdout(&self) -> &[Observation] {
        &self.holdout
    }

    pub fn model(&self) -> &FactorModel {
        &self.model
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn predictions(&self) -> &PredictionMatrix {
        &self.predictions
    }

    pub fn recommend(&self, customer_id: &str, threshold: f64) -> Result<Vec<String>> {
        self.predictions.recommend(customer_id, threshold)
    }

    /// Observed training row next to the predicted row
    pub fn compare(&self, customer_id: &str) -> Result<Comparison> {
        self.predictions.compare(&self.train_matrix, customer_id)
    }

    pub fn evaluate_holdout(&self) -> EvaluationReport {
        evaluate(&self.predictions, &self.holdout)
    }
}
