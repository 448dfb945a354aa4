//! Training sample sets.
//!
//! A [`SampleSet`] stores each selected row once, together with the number of
//! times it was drawn. A bootstrap of `n` draws therefore keeps only about
//! `0.632 n` distinct rows while `sum(weights) == n`.

use crate::core::error::{Result, WoodError};
use crate::core::random::Random;
use crate::core::types::SampleWeight;

/// Distinct training rows with multiplicities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSet {
    indices: Vec<usize>,
    weights: Vec<SampleWeight>,
}

impl SampleSet {
    /// Draws `n` rows with replacement from `0..n`.
    pub fn bootstrap(n: usize, rng: &mut Random) -> Self {
        let mut counts: Vec<SampleWeight> = vec![0; n];
        for _ in 0..n {
            counts[rng.next_int(n)] += 1;
        }
        Self::from_counts(&counts, |i| i)
    }

    /// Draws `rows.len()` rows with replacement from `rows`.
    pub fn bootstrap_from(rows: &[usize], rng: &mut Random) -> Self {
        let m = rows.len();
        let mut counts: Vec<SampleWeight> = vec![0; m];
        for _ in 0..m {
            counts[rng.next_int(m)] += 1;
        }
        Self::from_counts(&counts, |k| rows[k])
    }

    /// Every row of `0..n` once.
    pub fn identity(n: usize) -> Self {
        SampleSet {
            indices: (0..n).collect(),
            weights: vec![1; n],
        }
    }

    /// Every row of `rows` once.
    pub fn from_rows(rows: Vec<usize>) -> Self {
        let weights = vec![1; rows.len()];
        SampleSet {
            indices: rows,
            weights,
        }
    }

    /// Caller-supplied rows and weights, validated against `num_samples`.
    pub fn external(
        indices: Vec<usize>,
        weights: Vec<SampleWeight>,
        num_samples: usize,
    ) -> Result<Self> {
        if indices.is_empty() {
            return Err(WoodError::data("sample set is empty"));
        }
        if indices.len() != weights.len() {
            return Err(WoodError::dimension_mismatch(
                format!("{} weights", indices.len()),
                format!("{} weights", weights.len()),
            ));
        }
        if let Some(&index) = indices.iter().find(|&&i| i >= num_samples) {
            return Err(WoodError::index_out_of_bounds(index, num_samples));
        }
        if weights.iter().any(|&w| w == 0) {
            return Err(WoodError::data("sample weights must be at least 1"));
        }

        Ok(SampleSet { indices, weights })
    }

    fn from_counts<F: Fn(usize) -> usize>(counts: &[SampleWeight], row: F) -> Self {
        let mut indices = Vec::new();
        let mut weights = Vec::new();
        for (k, &count) in counts.iter().enumerate() {
            if count > 0 {
                indices.push(row(k));
                weights.push(count);
            }
        }
        SampleSet { indices, weights }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn weights(&self) -> &[SampleWeight] {
        &self.weights
    }

    /// Number of distinct rows
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sum of the weights, the number of draws represented
    pub fn total_weight(&self) -> u64 {
        self.weights.iter().map(|&w| w as u64).sum()
    }
}
