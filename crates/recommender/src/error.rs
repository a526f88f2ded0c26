//! Error types for the offer recommender engine

use std::fmt;

pub type Result<T> = std::result::Result<T, RecommenderError>;

/// Which side of the interaction matrix an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Customer,
    Offer,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Customer => write!(f, "customer"),
            EntityKind::Offer => write!(f, "offer"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecommenderError {
    #[error("Empty dataset: at least one observation is required")]
    EmptyInput,

    #[error("Unknown {kind}: {id}")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
        key: Option<String>,
    },

    #[error("Model serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl RecommenderError {
    pub fn unknown_customer(id: impl Into<String>) -> Self {
        Self::UnknownEntity {
            kind: EntityKind::Customer,
            id: id.into(),
        }
    }

    pub fn unknown_offer(id: impl Into<String>) -> Self {
        Self::UnknownEntity {
            kind: EntityKind::Offer,
            id: id.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>, key: &str) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Non-fatal signal that gradient descent is not converging.
///
/// Surfaced on the training report; training always runs the configured
/// number of iterations regardless.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DivergenceWarning {
    /// The pass error became NaN or infinite
    NonFinite { iteration: usize },
    /// The pass error grew relative to the previous pass
    Increasing {
        iteration: usize,
        previous: f64,
        current: f64,
    },
}

impl fmt::Display for DivergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceWarning::NonFinite { iteration } => {
                write!(f, "non-finite mean squared error at iteration {}", iteration)
            }
            DivergenceWarning::Increasing {
                iteration,
                previous,
                current,
            } => write!(
                f,
                "mean squared error increased at iteration {} ({:.6} -> {:.6})",
                iteration, previous, current
            ),
        }
    }
}
