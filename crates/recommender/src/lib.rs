//! Offer Recommender Engine
//!
//! Learns latent factors for customers and promotional offers from a sparse
//! table of engagement scores, then recommends offers whose predicted
//! engagement clears a caller-supplied threshold.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod interaction;
pub mod matrix_factorization;
pub mod partition;
pub mod prediction;
pub mod recommendation;

// Re-export key types
pub use config::EngineConfig;
pub use error::{DivergenceWarning, EntityKind, RecommenderError, Result};
pub use evaluation::{evaluate, EvaluationReport};
pub use interaction::{dedup_max, InteractionMatrix, Observation};
pub use matrix_factorization::{
    train, FactorModel, IterationError, MatrixFactorization, SGDConfig, TrainingObserver,
    TrainingReport,
};
pub use partition::{Partitioner, TrainTestSplit, DEFAULT_TRAIN_FRACTION};
pub use prediction::{predict, Comparison, PredictionMatrix};
pub use recommendation::OfferRecommender;

#[cfg(test)]
mod tests;
