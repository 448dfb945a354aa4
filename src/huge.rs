//! Two-stage forests for data sets too large to grow a tree on at once.
//!
//! Every estimator starts with a shallow "top" tree grown on a random subset
//! of `n_top` rows, with a minimum split size chosen so that each top leaf
//! receives about `n_patterns_leaf` rows once the full data is routed
//! through it. One "bottom" tree per leaf is then grown on the rows that
//! reached that leaf and grafted in its place.

use crate::config::ForestConfig;
use crate::core::constants::{HUGE_AUTO_MAX_PATTERNS, HUGE_AUTO_MIN_PATTERNS};
use crate::core::error::{Result, WoodError};
use crate::core::random::Random;
use crate::core::types::*;
use crate::dataset::Dataset;
use crate::forest::{build_pool, max_class_label, Forest};
use crate::tree::builder::{TreeBuilder, TreeParams};
use crate::tree::partition::TreeSamples;
use crate::tree::sampling::SampleSet;
use crate::tree::tree::Tree;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Row count that is either fixed or derived from the data size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsetSize {
    /// `clamp(100 * sqrt(n), 100_000, 500_000)`, capped by the data size
    Auto,
    Count(usize),
}

impl Default for SubsetSize {
    fn default() -> Self {
        SubsetSize::Auto
    }
}

impl SubsetSize {
    /// Resolves against `n` rows; the result never exceeds `cap`.
    pub fn resolve(self, n: usize, cap: usize) -> usize {
        match self {
            SubsetSize::Auto => {
                let auto = (100.0 * (n as f64).sqrt()) as usize;
                auto.clamp(HUGE_AUTO_MIN_PATTERNS, HUGE_AUTO_MAX_PATTERNS).min(cap)
            }
            SubsetSize::Count(count) => count.min(cap),
        }
    }
}

/// Parameters of a two-stage forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HugeWoodConfig {
    /// Rows used to grow each top tree
    pub n_top: SubsetSize,
    /// Target number of rows per top leaf
    pub n_patterns_leaf: SubsetSize,
    /// Grow top trees with the even-split criterion over all features
    pub balanced_top_tree: bool,
    pub top_tree_lambda: f64,
    /// Falls back to the bottom trees' maximum depth
    pub top_tree_max_depth: Option<usize>,
    pub top_tree_type: TreeType,
    pub top_tree_leaf_stopping_mode: LeafStoppingMode,
    /// Number of top trees
    pub n_estimators: usize,
    /// Bottom trees grown per top leaf
    pub n_estimators_bottom: usize,
    /// Settings of the bottom trees; also supplies the seed, thread count
    /// and learning type
    pub base: ForestConfig,
}

impl Default for HugeWoodConfig {
    fn default() -> Self {
        HugeWoodConfig {
            n_top: SubsetSize::Auto,
            n_patterns_leaf: SubsetSize::Auto,
            balanced_top_tree: true,
            top_tree_lambda: 0.0,
            top_tree_max_depth: None,
            top_tree_type: TreeType::Standard,
            top_tree_leaf_stopping_mode: LeafStoppingMode::IgnoreImpurity,
            n_estimators: 1,
            n_estimators_bottom: 1,
            base: ForestConfig::default(),
        }
    }
}

impl HugeWoodConfig {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;

        if self.n_estimators == 0 {
            return Err(WoodError::invalid_parameter("n_estimators", "0", "must be at least 1"));
        }
        if self.n_estimators_bottom == 0 {
            return Err(WoodError::invalid_parameter(
                "n_estimators_bottom",
                "0",
                "must be at least 1",
            ));
        }
        if self.n_top == SubsetSize::Count(0) {
            return Err(WoodError::invalid_parameter("n_top", "0", "must be at least 1"));
        }
        if self.n_patterns_leaf == SubsetSize::Count(0) {
            return Err(WoodError::invalid_parameter(
                "n_patterns_leaf",
                "0",
                "must be at least 1",
            ));
        }
        if self.top_tree_max_depth == Some(0) {
            return Err(WoodError::invalid_parameter(
                "top_tree_max_depth",
                "0",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.top_tree_lambda) {
            return Err(WoodError::invalid_parameter(
                "top_tree_lambda",
                self.top_tree_lambda.to_string(),
                "must be in range [0.0, 1.0]",
            ));
        }
        Ok(())
    }

    /// Configuration of the top trees for `n` rows, `n_top` of which are used.
    pub fn top_tree_config(&self, n: usize, n_top: usize, n_patterns_leaf: usize) -> ForestConfig {
        let mut top = self.base.clone();
        top.n_estimators = 1;
        top.bootstrap = false;
        top.tree_type = self.top_tree_type;
        top.leaf_stopping_mode = self.top_tree_leaf_stopping_mode;
        top.max_depth = self.top_tree_max_depth.unwrap_or(self.base.max_depth);
        top.lambda = self.top_tree_lambda;
        top.min_samples_split = ((n_patterns_leaf as f64 * n_top as f64 / n as f64) as usize).max(1);
        if self.balanced_top_tree {
            top.criterion = match top.criterion {
                SplitCriterion::Mse | SplitCriterion::EvenMse => SplitCriterion::EvenMse,
                SplitCriterion::Gini | SplitCriterion::EvenGini => SplitCriterion::EvenGini,
            };
            top.max_features = crate::config::MaxFeatures::All;
        }
        top
    }
}

/// Grows two-stage forests.
#[derive(Debug)]
pub struct HugeWoodTrainer {
    config: HugeWoodConfig,
    thread_pool: Arc<rayon::ThreadPool>,
}

impl HugeWoodTrainer {
    pub fn new(config: HugeWoodConfig) -> Result<Self> {
        config.validate()?;
        let thread_pool = build_pool(config.base.effective_num_threads())?;
        Ok(HugeWoodTrainer {
            config,
            thread_pool: Arc::new(thread_pool),
        })
    }

    pub fn config(&self) -> &HugeWoodConfig {
        &self.config
    }

    /// Returns a forest of `n_estimators * n_estimators_bottom` trees: each
    /// top tree is copied once per bottom estimator and completed with that
    /// estimator's bottom trees.
    pub fn fit(&self, dataset: &Dataset<'_>) -> Result<Forest> {
        let started = Instant::now();
        let config = &self.config;
        let base = &config.base;
        let n = dataset.num_samples();
        let d = dataset.num_features();

        let max_label = match base.learning_type {
            LearningType::Classification => max_class_label(dataset)?,
            LearningType::Regression => 0,
        };

        let n_top = config.n_top.resolve(n, n);
        let n_patterns_leaf = config.n_patterns_leaf.resolve(n, (n / 2).max(1));
        let top_config = config.top_tree_config(n, n_top, n_patterns_leaf);
        top_config.validate()?;
        log::info!(
            "two-stage training on {} samples: n_top={}, n_patterns_leaf={}, top min_samples_split={}",
            n,
            n_top,
            n_patterns_leaf,
            top_config.min_samples_split
        );

        let top_builder = TreeBuilder::new(TreeParams::from_config(&top_config, d));
        let bottom_builder = TreeBuilder::new(TreeParams::from_config(base, d));
        let mut master = StdRng::seed_from_u64(base.seed);

        let mut trees = Vec::with_capacity(config.n_estimators * config.n_estimators_bottom);
        for b in 0..config.n_estimators {
            // top tree on a random subset, without replacement
            let mut rows = rand::seq::index::sample(&mut master, n, n_top).into_vec();
            rows.sort_unstable();
            let mut top_rng = Random::with_seed(master.gen_range(1..=crate::core::constants::RAND_R_MAX));
            let top_samples = TreeSamples::new(dataset, &SampleSet::from_rows(rows), base.learning_type)?;
            let top = top_builder.build(dataset, top_samples, &mut top_rng)?;

            let leaves = distribute(dataset, &top);
            log::debug!(
                "estimator {}: top tree has {} leaves, {} of them reached",
                b,
                top.num_leaves(),
                leaves.len()
            );

            let seeds = Random::derive_seeds(master.gen(), leaves.len() * config.n_estimators_bottom);
            let bottoms = self.grow_bottom_trees(dataset, &bottom_builder, &leaves, &seeds)?;

            for k in 0..config.n_estimators_bottom {
                let mut tree = top.clone();
                for (i, &(leaf_id, _)) in leaves.iter().enumerate() {
                    tree.graft(&bottoms[i * config.n_estimators_bottom + k], leaf_id)?;
                }
                trees.push(tree);
            }
        }

        log::info!(
            "trained {} two-stage trees in {:.3}s",
            trees.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(Forest::from_parts(
            trees,
            base.learning_type,
            d,
            max_label,
            Arc::clone(&self.thread_pool),
        ))
    }

    /// Bottom trees, leaf-major: `n_estimators_bottom` consecutive trees per
    /// leaf.
    fn grow_bottom_trees(
        &self,
        dataset: &Dataset<'_>,
        builder: &TreeBuilder,
        leaves: &[(NodeIndex, Vec<usize>)],
        seeds: &[u32],
    ) -> Result<Vec<Tree>> {
        let per_leaf = self.config.n_estimators_bottom;
        let bootstrap = self.config.base.bootstrap;
        let learning_type = self.config.base.learning_type;

        self.thread_pool.install(|| {
            seeds
                .par_iter()
                .enumerate()
                .map(|(job, &seed)| {
                    let rows = &leaves[job / per_leaf].1;
                    let mut rng = Random::with_seed(seed);
                    let set = if bootstrap {
                        SampleSet::bootstrap_from(rows, &mut rng)
                    } else {
                        SampleSet::from_rows(rows.clone())
                    };
                    let samples = TreeSamples::new(dataset, &set, learning_type)?;
                    builder.build(dataset, samples, &mut rng)
                })
                .collect()
        })
    }
}

/// Routes every row through `top` and groups rows by reached leaf, in leaf id
/// order. Leaves no row reaches are left out.
fn distribute(dataset: &Dataset<'_>, top: &Tree) -> Vec<(NodeIndex, Vec<usize>)> {
    let mut leaves: BTreeMap<NodeIndex, Vec<usize>> = BTreeMap::new();
    for row in 0..dataset.num_samples() {
        let leaf = top.predict_leaf(&dataset.row(row));
        leaves.entry(leaf).or_default().push(row);
    }
    leaves.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_subset_size_auto() {
        assert_eq!(SubsetSize::Auto.resolve(1_000, 1_000), 1_000);
        assert_eq!(SubsetSize::Auto.resolve(1_000, 500), 500);
        assert_eq!(SubsetSize::Auto.resolve(100_000_000, 100_000_000), 500_000);
        assert_eq!(SubsetSize::Auto.resolve(4_000_000, 4_000_000), 200_000);
        assert_eq!(SubsetSize::Count(30).resolve(1_000, 10), 10);
    }

    #[test]
    fn test_top_tree_config() {
        let config = HugeWoodConfig {
            base: ForestConfig::regression(),
            top_tree_lambda: 0.2,
            ..HugeWoodConfig::default()
        };
        let top = config.top_tree_config(10_000, 1_000, 500);

        assert_eq!(top.criterion, SplitCriterion::EvenMse);
        assert_eq!(top.min_samples_split, 50);
        assert_eq!(top.tree_type, TreeType::Standard);
        assert_eq!(top.leaf_stopping_mode, LeafStoppingMode::IgnoreImpurity);
        assert!(!top.bootstrap);
        assert_eq!(top.lambda, 0.2);
        assert!(top.validate().is_ok());

        // tiny ratios still allow splitting
        assert_eq!(config.top_tree_config(10_000, 10, 10).min_samples_split, 1);
    }

    #[test]
    fn test_validation() {
        let mut config = HugeWoodConfig::default();
        assert!(config.validate().is_ok());
        config.n_estimators_bottom = 0;
        assert!(config.validate().is_err());
        config.n_estimators_bottom = 1;
        config.n_top = SubsetSize::Count(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fit_produces_valid_grafted_trees() {
        let n = 400;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 7)) % 101) as f64);
        let y = Array1::from_shape_fn(n, |i| if (i * 7) % 101 > 50 { 1.0 } else { 0.0 });
        let data = Dataset::new(x.view(), y.view()).unwrap();

        let base = ConfigBuilder::new().seed(3).num_threads(2).build().unwrap();
        let config = HugeWoodConfig {
            n_top: SubsetSize::Count(100),
            n_patterns_leaf: SubsetSize::Count(80),
            top_tree_max_depth: Some(3),
            n_estimators: 2,
            n_estimators_bottom: 2,
            base,
            ..HugeWoodConfig::default()
        };
        let forest = HugeWoodTrainer::new(config).unwrap().fit(&data).unwrap();

        assert_eq!(forest.num_trees(), 4);
        for tree in forest.trees() {
            assert!(tree.validate().is_ok());
        }
        let predictions = forest.predict(x.view()).unwrap();
        assert!(predictions.iter().all(|&p| p == 0.0 || p == 1.0));
    }

    #[test]
    fn test_distribute_groups_by_leaf() {
        let x = Array2::from_shape_fn((6, 1), |(i, _)| i as f64);
        let y = Array1::zeros(6);
        let data = Dataset::new(x.view(), y.view()).unwrap();

        let mut top = Tree::new();
        let root = top.add_internal(None, false, 0, 1.5);
        top.add_leaf(Some(root), true, 0.0, LeafCriterion::MaxDepth);
        top.add_leaf(Some(root), false, 0.0, LeafCriterion::MaxDepth);

        let leaves = distribute(&data, &top);
        assert_eq!(leaves, vec![(1, vec![0, 1]), (2, vec![2, 3, 4, 5])]);
    }
}
