//! Holdout evaluation of a trained model

use crate::interaction::Observation;
use crate::prediction::PredictionMatrix;
use serde::{Deserialize, Serialize};

/// Error of the prediction matrix on held-out observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean squared error over scored pairs, `None` when nothing was scored
    pub mse: Option<f64>,
    pub rmse: Option<f64>,
    /// Pairs with both ids in the prediction index
    pub scored: usize,
    /// Pairs whose customer or offer was never seen in training
    pub skipped: usize,
}

/// Score holdout observations against the prediction matrix.
///
/// Pairs outside the trained index are cold-start cases and are counted as
/// skipped rather than failing the evaluation.
pub fn evaluate(predictions: &PredictionMatrix, holdout: &[Observation]) -> EvaluationReport {
    let mut sse = 0.0;
    let mut scored = 0usize;
    let mut skipped = 0usize;

    for obs in holdout {
        match predictions.score(&obs.customer_id, &obs.offer_id) {
            Ok(predicted) => {
                let residual = obs.score - predicted;
                sse += residual * residual;
                scored += 1;
            }
            Err(_) => skipped += 1,
        }
    }

    let mse = (scored > 0).then(|| sse / scored as f64);
    let report = EvaluationReport {
        mse,
        rmse: mse.map(f64::sqrt),
        scored,
        skipped,
    };

    tracing::info!(
        mse = ?report.mse,
        scored = report.scored,
        skipped = report.skipped,
        "Holdout evaluation complete"
    );

    report
}
