//! Forests grown on random subsets.
//!
//! Each tree sees its own `n_subset` rows drawn without replacement from the
//! training data, which keeps per-tree memory bounded on very large inputs.
//! Within a subset the usual bootstrap setting of the base configuration
//! applies.

use crate::config::ForestConfig;
use crate::core::constants::RAND_R_MAX;
use crate::core::error::{Result, WoodError};
use crate::core::random::Random;
use crate::dataset::Dataset;
use crate::forest::{Forest, ForestTrainer};
use crate::tree::sampling::SampleSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of a subset forest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsetConfig {
    /// Rows per tree; every row when unset. Larger values are capped at the
    /// data size.
    pub n_subset: Option<usize>,
    /// Settings of every tree, including the tree count and seed
    pub base: ForestConfig,
}

impl SubsetConfig {
    pub fn new(n_subset: Option<usize>, base: ForestConfig) -> Self {
        SubsetConfig { n_subset, base }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_subset == Some(0) {
            return Err(WoodError::invalid_parameter("n_subset", "0", "must be at least 1"));
        }
        self.base.validate()
    }
}

/// Grows one tree per random subset.
#[derive(Debug)]
pub struct SubsetTrainer {
    n_subset: Option<usize>,
    trainer: ForestTrainer,
}

impl SubsetTrainer {
    pub fn new(config: SubsetConfig) -> Result<Self> {
        config.validate()?;
        Ok(SubsetTrainer {
            n_subset: config.n_subset,
            trainer: ForestTrainer::new(config.base)?,
        })
    }

    pub fn config(&self) -> &ForestConfig {
        self.trainer.config()
    }

    /// Sample sets of every tree, drawn from the master seed.
    pub fn draw_subsets(&self, num_samples: usize) -> Vec<SampleSet> {
        let config = self.trainer.config();
        let n_subset = self.n_subset.unwrap_or(num_samples).min(num_samples);
        let mut master = StdRng::seed_from_u64(config.seed);

        (0..config.n_estimators)
            .map(|_| {
                let mut rows = rand::seq::index::sample(&mut master, num_samples, n_subset).into_vec();
                rows.sort_unstable();
                if config.bootstrap {
                    let mut rng = Random::with_seed(master.gen_range(1..=RAND_R_MAX));
                    SampleSet::bootstrap_from(&rows, &mut rng)
                } else {
                    SampleSet::from_rows(rows)
                }
            })
            .collect()
    }

    pub fn fit(&self, dataset: &Dataset<'_>) -> Result<Forest> {
        let sets = self.draw_subsets(dataset.num_samples());
        log::info!(
            "subset training: {} trees on {} of {} samples each",
            sets.len(),
            self.n_subset.unwrap_or(dataset.num_samples()).min(dataset.num_samples()),
            dataset.num_samples()
        );
        self.trainer.fit_with_samples(dataset, sets)
    }
}
