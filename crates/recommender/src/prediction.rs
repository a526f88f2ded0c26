//! Dense engagement predictions and threshold-based offer recommendations

use crate::error::{RecommenderError, Result};
use crate::interaction::{index_of, InteractionMatrix};
use crate::matrix_factorization::FactorModel;
use ndarray::Array2;
use std::collections::HashMap;

/// Reconstruct the full customer x offer prediction grid as C·O.
pub fn predict(customer_factors: &Array2<f64>, offer_factors: &Array2<f64>) -> Array2<f64> {
    customer_factors.dot(offer_factors)
}

/// Observed and predicted rows for one customer, aligned by offer
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub customer_id: String,
    pub offer_ids: Vec<String>,
    pub actual: Vec<Option<f64>>,
    pub predicted: Vec<f64>,
}

/// Predicted engagement for every (customer, offer) pair
#[derive(Debug, Clone)]
pub struct PredictionMatrix {
    customer_ids: Vec<String>,
    offer_ids: Vec<String>,
    customer_index: HashMap<String, usize>,
    offer_index: HashMap<String, usize>,
    values: Array2<f64>,
}

impl PredictionMatrix {
    /// Fails with `InvalidConfiguration` when the model's ids and factor
    /// shapes disagree, instead of panicking inside the product.
    pub fn from_model(model: &FactorModel) -> Result<Self> {
        model.validate()?;
        let values = predict(&model.customer_factors, &model.offer_factors);
        Ok(Self {
            customer_index: index_of(&model.customer_ids),
            offer_index: index_of(&model.offer_ids),
            customer_ids: model.customer_ids.clone(),
            offer_ids: model.offer_ids.clone(),
            values,
        })
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn customer_ids(&self) -> &[String] {
        &self.customer_ids
    }

    pub fn offer_ids(&self) -> &[String] {
        &self.offer_ids
    }

    pub fn customer_index(&self, customer_id: &str) -> Result<usize> {
        self.customer_index
            .get(customer_id)
            .copied()
            .ok_or_else(|| RecommenderError::unknown_customer(customer_id))
    }

    pub fn offer_index(&self, offer_id: &str) -> Result<usize> {
        self.offer_index
            .get(offer_id)
            .copied()
            .ok_or_else(|| RecommenderError::unknown_offer(offer_id))
    }

    /// Predicted score for a single pair
    pub fn score(&self, customer_id: &str, offer_id: &str) -> Result<f64> {
        let row = self.customer_index(customer_id)?;
        let col = self.offer_index(offer_id)?;
        Ok(self.values[[row, col]])
    }

    /// Offers whose predicted score is strictly above `threshold`, in
    /// ascending offer-index order.
    pub fn recommend(&self, customer_id: &str, threshold: f64) -> Result<Vec<String>> {
        let row = self.customer_index(customer_id)?;

        let offers: Vec<String> = self
            .values
            .row(row)
            .iter()
            .zip(self.offer_ids.iter())
            .filter(|(score, _)| **score > threshold)
            .map(|(_, offer_id)| offer_id.clone())
            .collect();

        tracing::debug!(
            customer_id,
            threshold,
            recommended = offers.len(),
            "Generated offer recommendations"
        );

        Ok(offers)
    }

    /// Pair a customer's observed row with the predicted row.
    ///
    /// The predicted row follows `actual`'s offer ordering.
    pub fn compare(&self, actual: &InteractionMatrix, customer_id: &str) -> Result<Comparison> {
        let actual_row = actual.row(customer_id)?;
        let row = self.customer_index(customer_id)?;

        let predicted = actual
            .offer_ids()
            .iter()
            .map(|offer_id| Ok(self.values[[row, self.offer_index(offer_id)?]]))
            .collect::<Result<Vec<f64>>>()?;

        Ok(Comparison {
            customer_id: customer_id.to_string(),
            offer_ids: actual.offer_ids().to_vec(),
            actual: actual_row,
            predicted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;
    use ndarray::array;

    fn fixed_model() -> FactorModel {
        FactorModel {
            customer_ids: vec!["alice".into(), "bob".into()],
            offer_ids: vec!["offer_0".into(), "offer_1".into(), "offer_2".into()],
            customer_factors: array![[1.0, 2.0], [0.5, 0.0]],
            offer_factors: array![[1.0, 3.0, 0.0], [2.0, 1.0, 4.0]],
        }
    }

    #[test]
    fn test_predict_shape_and_values() {
        let model = fixed_model();
        let predictions = PredictionMatrix::from_model(&model).unwrap();

        assert_eq!(predictions.values().dim(), (2, 3));
        assert_eq!(predictions.values(), &array![[5.0, 5.0, 8.0], [0.5, 1.5, 0.0]]);
    }

    #[test]
    fn test_from_model_rejects_mismatched_shapes() {
        let short_ids = FactorModel {
            customer_ids: vec!["alice".into()],
            ..fixed_model()
        };
        assert!(matches!(
            PredictionMatrix::from_model(&short_ids),
            Err(RecommenderError::InvalidConfiguration { .. })
        ));

        let inner_mismatch = FactorModel {
            customer_ids: vec!["alice".into()],
            offer_ids: vec!["offer_0".into()],
            customer_factors: array![[1.0, 2.0]],
            offer_factors: array![[3.0]],
        };
        assert!(matches!(
            PredictionMatrix::from_model(&inner_mismatch),
            Err(RecommenderError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_predict_is_idempotent() {
        let model = fixed_model();
        let first = predict(&model.customer_factors, &model.offer_factors);
        let second = predict(&model.customer_factors, &model.offer_factors);
        assert_eq!(first, second);
    }

    #[test]
    fn test_recommend_strictly_greater() {
        let predictions = PredictionMatrix::from_model(&fixed_model()).unwrap();

        assert_eq!(
            predictions.recommend("alice", 5.0).unwrap(),
            vec!["offer_2".to_string()]
        );
        assert_eq!(
            predictions.recommend("alice", 4.99).unwrap(),
            vec![
                "offer_0".to_string(),
                "offer_1".to_string(),
                "offer_2".to_string()
            ]
        );
        assert!(predictions.recommend("bob", 2.0).unwrap().is_empty());
    }

    #[test]
    fn test_recommend_monotonic_in_threshold() {
        let predictions = PredictionMatrix::from_model(&fixed_model()).unwrap();
        let thresholds = [-1.0, 0.0, 0.5, 1.0, 4.0, 5.0, 6.0, 9.0];

        for customer in ["alice", "bob"] {
            for pair in thresholds.windows(2) {
                let lower = predictions.recommend(customer, pair[0]).unwrap();
                let higher = predictions.recommend(customer, pair[1]).unwrap();
                assert!(higher.iter().all(|offer| lower.contains(offer)));
            }
        }
    }

    #[test]
    fn test_unknown_customer_is_error() {
        let predictions = PredictionMatrix::from_model(&fixed_model()).unwrap();

        match predictions.recommend("carol", 0.0) {
            Err(RecommenderError::UnknownEntity { kind, id }) => {
                assert_eq!(kind, EntityKind::Customer);
                assert_eq!(id, "carol");
            }
            other => panic!("expected UnknownEntity, got {:?}", other),
        }
        assert!(predictions.score("alice", "offer_9").is_err());
    }

    #[test]
    fn test_compare_aligns_with_actual() {
        let predictions = PredictionMatrix::from_model(&fixed_model()).unwrap();
        let actual = InteractionMatrix::from_cells(
            vec!["alice".into(), "bob".into()],
            vec!["offer_2".into(), "offer_0".into()],
            array![[Some(7.0), None], [None, Some(1.0)]],
        )
        .unwrap();

        let comparison = predictions.compare(&actual, "alice").unwrap();
        assert_eq!(comparison.actual, vec![Some(7.0), None]);
        assert_eq!(comparison.predicted, vec![8.0, 5.0]);

        assert!(matches!(
            predictions.compare(&actual, "carol"),
            Err(RecommenderError::UnknownEntity { .. })
        ));
    }
}
