//! Customer-offer interaction matrix
//!
//! Pivots the engagement fact table into a dense matrix indexed by customer
//! (rows) and offer (columns). Unobserved pairs are `None`, never zero.

use crate::error::{RecommenderError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One aggregated engagement score for a (customer, offer) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub customer_id: String,
    pub offer_id: String,
    pub score: f64,
}

impl Observation {
    pub fn new(customer_id: impl Into<String>, offer_id: impl Into<String>, score: f64) -> Self {
        Self {
            customer_id: customer_id.into(),
            offer_id: offer_id.into(),
            score,
        }
    }
}

/// Collapse observations sharing a (customer, offer) key, keeping the maximum score.
///
/// Output is ordered by key.
pub fn dedup_max<'a, I>(observations: I) -> Vec<Observation>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut by_key: BTreeMap<(&str, &str), f64> = BTreeMap::new();

    for obs in observations {
        by_key
            .entry((obs.customer_id.as_str(), obs.offer_id.as_str()))
            .and_modify(|score| *score = score.max(obs.score))
            .or_insert(obs.score);
    }

    by_key
        .into_iter()
        .map(|((customer_id, offer_id), score)| Observation::new(customer_id, offer_id, score))
        .collect()
}

/// Dense customer x offer matrix with explicit missing cells
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    customer_ids: Vec<String>,
    offer_ids: Vec<String>,
    customer_index: HashMap<String, usize>,
    offer_index: HashMap<String, usize>,
    cells: Array2<Option<f64>>,
}

impl InteractionMatrix {
    /// Build the matrix from a fact table.
    ///
    /// Row and column orderings are the distinct ids sorted ascending. A
    /// repeated key keeps its maximum score.
    pub fn from_observations(observations: &[Observation]) -> Result<Self> {
        if observations.is_empty() {
            return Err(RecommenderError::EmptyInput);
        }

        let customer_ids: Vec<String> = observations
            .iter()
            .map(|o| o.customer_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let offer_ids: Vec<String> = observations
            .iter()
            .map(|o| o.offer_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let customer_index = index_of(&customer_ids);
        let offer_index = index_of(&offer_ids);

        let mut cells =
            Array2::<Option<f64>>::from_elem((customer_ids.len(), offer_ids.len()), None);
        let mut duplicates = 0usize;

        for obs in observations {
            let row = customer_index[&obs.customer_id];
            let col = offer_index[&obs.offer_id];
            match cells[[row, col]] {
                Some(existing) => {
                    duplicates += 1;
                    cells[[row, col]] = Some(existing.max(obs.score));
                }
                None => cells[[row, col]] = Some(obs.score),
            }
        }

        if duplicates > 0 {
            tracing::warn!(
                duplicates,
                "Duplicate customer/offer observations collapsed by maximum score"
            );
        }

        Ok(Self {
            customer_ids,
            offer_ids,
            customer_index,
            offer_index,
            cells,
        })
    }

    /// Wrap an existing cell grid with explicit row and column ids.
    pub fn from_cells(
        customer_ids: Vec<String>,
        offer_ids: Vec<String>,
        cells: Array2<Option<f64>>,
    ) -> Result<Self> {
        if cells.nrows() != customer_ids.len() || cells.ncols() != offer_ids.len() {
            return Err(RecommenderError::invalid_config(
                format!(
                    "cell grid is {}x{} but {} customer ids and {} offer ids were given",
                    cells.nrows(),
                    cells.ncols(),
                    customer_ids.len(),
                    offer_ids.len()
                ),
                "cells",
            ));
        }
        if cells.is_empty() {
            return Err(RecommenderError::EmptyInput);
        }

        let customer_index = index_of(&customer_ids);
        let offer_index = index_of(&offer_ids);
        if customer_index.len() != customer_ids.len() {
            return Err(RecommenderError::invalid_config(
                "customer ids must be distinct",
                "customer_ids",
            ));
        }
        if offer_index.len() != offer_ids.len() {
            return Err(RecommenderError::invalid_config(
                "offer ids must be distinct",
                "offer_ids",
            ));
        }

        Ok(Self {
            customer_ids,
            offer_ids,
            customer_index,
            offer_index,
            cells,
        })
    }

    /// Wrap a cell grid using positional ids `customer_{i}` and `offer_{j}`.
    pub fn from_dense(cells: Array2<Option<f64>>) -> Result<Self> {
        let customer_ids = (0..cells.nrows()).map(|i| format!("customer_{}", i)).collect();
        let offer_ids = (0..cells.ncols()).map(|j| format!("offer_{}", j)).collect();
        Self::from_cells(customer_ids, offer_ids, cells)
    }

    pub fn num_customers(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn num_offers(&self) -> usize {
        self.offer_ids.len()
    }

    pub fn customer_ids(&self) -> &[String] {
        &self.customer_ids
    }

    pub fn offer_ids(&self) -> &[String] {
        &self.offer_ids
    }

    pub fn cells(&self) -> &Array2<Option<f64>> {
        &self.cells
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get((row, col)).copied().flatten()
    }

    /// Number of observed (non-missing) cells
    pub fn observed_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Observed cells in row-major order as `(row, col, score)`
    pub fn observed(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.cells
            .indexed_iter()
            .filter_map(|((row, col), cell)| cell.map(|score| (row, col, score)))
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

    /// Observed row for one customer, in offer-index order
    pub fn row(&self, customer_id: &str) -> Result<Vec<Option<f64>>> {
        let row = self.customer_index(customer_id)?;
        Ok(self.cells.row(row).to_vec())
    }
}

pub(crate) fn index_of(ids: &[String]) -> HashMap<String, usize> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| (id.clone(), idx))
        .collect()
}
