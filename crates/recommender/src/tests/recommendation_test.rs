//! Recommendation behavior on a trained model

use crate::config::EngineConfig;
use crate::error::RecommenderError;
use crate::interaction::Observation;
use crate::recommendation::OfferRecommender;

fn engagement_table() -> Vec<Observation> {
    // Two customer segments with opposite offer preferences.
    let mut rows = Vec::new();
    for c in 0..12 {
        for o in 0..6 {
            let likes = (c < 6) == (o < 3);
            let score = if likes { 8.0 } else { 2.0 };
            rows.push(Observation::new(
                format!("customer_{:02}", c),
                format!("offer_{}", o),
                score,
            ));
        }
    }
    rows
}

fn config() -> EngineConfig {
    EngineConfig {
        latent_features: 2,
        learning_rate: 0.005,
        iterations: 300,
        train_fraction: 0.9,
        seed: Some(11),
    }
}

#[test]
fn test_recommend_monotonic_on_trained_model() {
    let rec = OfferRecommender::from_config(&engagement_table(), &config()).unwrap();

    for customer in rec.train_matrix().customer_ids() {
        let mut previous: Option<Vec<String>> = None;
        for threshold in [0.0, 2.0, 4.0, 5.0, 6.0, 8.0, 10.0] {
            let offers = rec.recommend(customer, threshold).unwrap();
            if let Some(prev) = &previous {
                assert!(offers.iter().all(|o| prev.contains(o)));
            }
            previous = Some(offers);
        }
    }
}

#[test]
fn test_recommendations_follow_segments() {
    let rec = OfferRecommender::from_config(&engagement_table(), &config()).unwrap();
    let offers = rec.recommend("customer_00", 5.0).unwrap();

    assert!(!offers.is_empty());
    assert!(offers
        .iter()
        .all(|o| ["offer_0", "offer_1", "offer_2"].contains(&o.as_str())));
}

#[test]
fn test_recommendations_keep_offer_order() {
    let rec = OfferRecommender::from_config(&engagement_table(), &config()).unwrap();
    let offers = rec.recommend("customer_07", f64::NEG_INFINITY).unwrap();

    assert_eq!(offers, rec.train_matrix().offer_ids().to_vec());
}

#[test]
fn test_unknown_customer_never_returns_empty_list() {
    let rec = OfferRecommender::from_config(&engagement_table(), &config()).unwrap();

    assert!(matches!(
        rec.recommend("customer_99", 0.0),
        Err(RecommenderError::UnknownEntity { .. })
    ));
    assert!(matches!(
        rec.compare("customer_99"),
        Err(RecommenderError::UnknownEntity { .. })
    ));
}
