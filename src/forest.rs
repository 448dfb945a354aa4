//! Forest training and inference.
//!
//! Trees are independent: each one gets its own seed, sample set and sample
//! arrays, and is grown by one rayon task. The per-tree seeds are drawn from
//! the master seed before any work starts, so a forest depends only on its
//! configuration and data, not on the number of threads.

use crate::config::ForestConfig;
use crate::core::error::{Result, WoodError};
use crate::core::random::Random;
use crate::core::types::*;
use crate::dataset::Dataset;
use crate::tree::builder::{TreeBuilder, TreeParams};
use crate::tree::partition::{class_label, TreeSamples};
use crate::tree::sampling::SampleSet;
use crate::tree::tree::Tree;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Output of [`Forest::predict_with`]
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    /// One aggregated value per query
    Values(Array1<Value>),
    /// Reached node ids, `trees × queries`
    LeafIds(Array2<NodeIndex>),
}

/// Trains forests with a fixed configuration.
#[derive(Debug)]
pub struct ForestTrainer {
    config: ForestConfig,
    thread_pool: Arc<rayon::ThreadPool>,
}

impl ForestTrainer {
    /// Validates `config` and sets up the worker pool.
    pub fn new(config: ForestConfig) -> Result<Self> {
        config.validate()?;
        let thread_pool = build_pool(config.effective_num_threads())?;
        Ok(ForestTrainer {
            config,
            thread_pool: Arc::new(thread_pool),
        })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Grows `n_estimators` trees, each on a bootstrap sample (or on every
    /// row when bootstrapping is off).
    pub fn fit(&self, dataset: &Dataset<'_>) -> Result<Forest> {
        let sets = vec![None; self.config.n_estimators];
        self.fit_trees(dataset, sets)
    }

    /// Grows one tree per caller-supplied sample set.
    pub fn fit_with_samples(&self, dataset: &Dataset<'_>, sample_sets: Vec<SampleSet>) -> Result<Forest> {
        if sample_sets.len() != self.config.n_estimators {
            return Err(WoodError::dimension_mismatch(
                format!("{} sample sets", self.config.n_estimators),
                format!("{} sample sets", sample_sets.len()),
            ));
        }
        let n = dataset.num_samples();
        for set in &sample_sets {
            if let Some(&index) = set.indices().iter().find(|&&i| i >= n) {
                return Err(WoodError::index_out_of_bounds(index, n));
            }
        }
        self.fit_trees(dataset, sample_sets.into_iter().map(Some).collect())
    }

    fn fit_trees(&self, dataset: &Dataset<'_>, sets: Vec<Option<SampleSet>>) -> Result<Forest> {
        let started = Instant::now();
        let config = &self.config;
        let n = dataset.num_samples();
        let d = dataset.num_features();

        let max_label = match config.learning_type {
            LearningType::Classification => Some(max_class_label(dataset)?),
            LearningType::Regression => None,
        };

        let params = TreeParams::from_config(config, d);
        log::info!(
            "training {} trees on {} samples x {} features ({} threads, max_features={})",
            config.n_estimators,
            n,
            d,
            self.thread_pool.current_num_threads(),
            params.max_features
        );

        let builder = TreeBuilder::new(params);
        let seeds = Random::derive_seeds(config.seed, config.n_estimators);
        let bootstrap = config.bootstrap;
        let learning_type = config.learning_type;

        let trees: Result<Vec<Tree>> = self.thread_pool.install(|| {
            seeds
                .into_par_iter()
                .zip(sets)
                .enumerate()
                .map(|(b, (seed, set))| {
                    let mut rng = Random::with_seed(seed);
                    let set = match set {
                        Some(set) => set,
                        None if bootstrap => SampleSet::bootstrap(n, &mut rng),
                        None => SampleSet::identity(n),
                    };
                    let samples = TreeSamples::new(dataset, &set, learning_type)?;
                    let tree = builder.build(dataset, samples, &mut rng)?;
                    log::debug!("tree {}: {}", b, tree);
                    Ok(tree)
                })
                .collect()
        });
        let trees = trees?;

        log::info!(
            "trained {} trees in {:.3}s",
            trees.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(Forest::from_parts(
            trees,
            learning_type,
            d,
            max_label.unwrap_or(0),
            Arc::clone(&self.thread_pool),
        ))
    }
}

pub(crate) fn build_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| WoodError::threading(format!("Failed to create thread pool: {}", e)))
}

/// Validates every label and returns the largest class.
pub(crate) fn max_class_label(dataset: &Dataset<'_>) -> Result<usize> {
    dataset
        .labels()
        .iter()
        .try_fold(0usize, |max, &y| Ok(max.max(class_label(y)?)))
}

/// Checks split features against `num_features` and, for classification,
/// leaf values against the class label rules. Returns the largest leaf class.
fn check_tree(tree: &Tree, learning_type: LearningType, num_features: usize) -> Result<usize> {
    let mut max_label = 0;
    for node in tree.nodes() {
        if node.is_leaf() {
            if learning_type == LearningType::Classification {
                max_label = max_label.max(class_label(node.threshold_or_leaf)?);
            }
        } else if node.feature >= num_features {
            return Err(WoodError::dimension_mismatch(
                format!("split features below {}", num_features),
                format!("split on feature {}", node.feature),
            ));
        }
    }
    Ok(max_label)
}

/// A trained ensemble of trees.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<Tree>,
    learning_type: LearningType,
    num_features: usize,
    /// Largest class label seen in training (0 for regression)
    max_label: usize,
    thread_pool: Arc<rayon::ThreadPool>,
}

impl Forest {
    pub(crate) fn from_parts(
        trees: Vec<Tree>,
        learning_type: LearningType,
        num_features: usize,
        max_label: usize,
        thread_pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        Forest {
            trees,
            learning_type,
            num_features,
            max_label,
            thread_pool,
        }
    }

    /// Assembles a forest from already grown trees.
    pub fn from_trees(
        trees: Vec<Tree>,
        learning_type: LearningType,
        num_features: usize,
        num_threads: usize,
    ) -> Result<Self> {
        let mut max_label = 0;
        for (b, tree) in trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| WoodError::tree_construction(format!("tree {}: {}", b, e)))?;
            max_label = max_label.max(check_tree(tree, learning_type, num_features)?);
        }
        let num_threads = if num_threads == 0 { num_cpus::get() } else { num_threads };
        Ok(Forest {
            trees,
            learning_type,
            num_features,
            max_label,
            thread_pool: Arc::new(build_pool(num_threads)?),
        })
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree(&self, index: usize) -> Option<&Tree> {
        self.trees.get(index)
    }

    pub fn tree_mut(&mut self, index: usize) -> Option<&mut Tree> {
        self.trees.get_mut(index)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn learning_type(&self) -> LearningType {
        self.learning_type
    }

    /// Node count of every tree
    pub fn num_nodes(&self) -> Vec<usize> {
        self.trees.iter().map(Tree::num_nodes).collect()
    }

    /// Memory held by the node arrays
    pub fn num_bytes(&self) -> usize {
        self.trees.iter().map(Tree::num_bytes).sum()
    }

    /// Grafts `subtree` onto leaf `leaf_id` of tree `tree_index`.
    pub fn graft(&mut self, tree_index: usize, subtree: &Tree, leaf_id: NodeIndex) -> Result<()> {
        let num_trees = self.trees.len();
        let subtree_label = check_tree(subtree, self.learning_type, self.num_features)?;
        let tree = self
            .trees
            .get_mut(tree_index)
            .ok_or_else(|| WoodError::index_out_of_bounds(tree_index, num_trees))?;
        tree.graft(subtree, leaf_id)?;
        self.max_label = self.max_label.max(subtree_label);
        Ok(())
    }

    /// Aggregated prediction per query row: the mean over trees for
    /// regression, the majority vote for classification.
    pub fn predict(&self, queries: ArrayView2<'_, Value>) -> Result<Array1<Value>> {
        let values = self.tree_values(queries, None)?;
        Ok(self.aggregate(&values))
    }

    /// Per-tree predictions, `queries × trees`.
    pub fn predict_all(&self, queries: ArrayView2<'_, Value>) -> Result<Array2<Value>> {
        let values = self.tree_values(queries, None)?;
        Ok(values.t().to_owned())
    }

    /// Reached leaf ids, `trees × queries`.
    pub fn predict_leaf_ids(&self, queries: ArrayView2<'_, Value>) -> Result<Array2<NodeIndex>> {
        self.tree_leaf_ids(queries, None)
    }

    /// Prediction restricted to the query rows in `indices` (all rows when
    /// `None`).
    pub fn predict_with(
        &self,
        queries: ArrayView2<'_, Value>,
        indices: Option<&[usize]>,
        mode: PredictionMode,
    ) -> Result<Predictions> {
        match mode {
            PredictionMode::Value => {
                let values = self.tree_values(queries, indices)?;
                Ok(Predictions::Values(self.aggregate(&values)))
            }
            PredictionMode::LeafId => Ok(Predictions::LeafIds(self.tree_leaf_ids(queries, indices)?)),
        }
    }

    fn check_queries(&self, queries: &ArrayView2<'_, Value>, indices: Option<&[usize]>) -> Result<()> {
        if self.trees.is_empty() {
            return Err(WoodError::prediction("forest has no trees"));
        }
        if queries.ncols() != self.num_features {
            return Err(WoodError::dimension_mismatch(
                format!("{} features", self.num_features),
                format!("{} features", queries.ncols()),
            ));
        }
        if let Some(indices) = indices {
            if let Some(&index) = indices.iter().find(|&&i| i >= queries.nrows()) {
                return Err(WoodError::index_out_of_bounds(index, queries.nrows()));
            }
        }
        Ok(())
    }

    fn rows(queries: &ArrayView2<'_, Value>, indices: Option<&[usize]>) -> Vec<usize> {
        match indices {
            Some(indices) => indices.to_vec(),
            None => (0..queries.nrows()).collect(),
        }
    }

    /// Leaf values, `trees × rows`, one rayon task per tree.
    fn tree_values(&self, queries: ArrayView2<'_, Value>, indices: Option<&[usize]>) -> Result<Array2<Value>> {
        self.check_queries(&queries, indices)?;
        let rows = Self::rows(&queries, indices);
        let mut values = Array2::zeros((self.trees.len(), rows.len()));

        self.thread_pool.install(|| {
            values
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(self.trees.par_iter())
                .for_each(|(mut out, tree)| {
                    for (slot, &row) in out.iter_mut().zip(&rows) {
                        *slot = tree.predict_value(&queries.row(row));
                    }
                });
        });
        Ok(values)
    }

    fn tree_leaf_ids(&self, queries: ArrayView2<'_, Value>, indices: Option<&[usize]>) -> Result<Array2<NodeIndex>> {
        self.check_queries(&queries, indices)?;
        let rows = Self::rows(&queries, indices);
        let mut ids = Array2::zeros((self.trees.len(), rows.len()));

        self.thread_pool.install(|| {
            ids.axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(self.trees.par_iter())
                .for_each(|(mut out, tree)| {
                    for (slot, &row) in out.iter_mut().zip(&rows) {
                        *slot = tree.predict_leaf(&queries.row(row));
                    }
                });
        });
        Ok(ids)
    }

    fn aggregate(&self, values: &Array2<Value>) -> Array1<Value> {
        match self.learning_type {
            LearningType::Regression => values
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(values.ncols())),
            LearningType::Classification => {
                let mut votes = vec![0usize; self.max_label + 1];
                values
                    .axis_iter(Axis(1))
                    .map(|column| {
                        votes.iter_mut().for_each(|v| *v = 0);
                        for &value in column {
                            let class = (value.round().max(0.0) as usize).min(self.max_label);
                            votes[class] += 1;
                        }
                        let mut best = 0;
                        for (class, &count) in votes.iter().enumerate() {
                            if count > votes[best] {
                                best = class;
                            }
                        }
                        best as Value
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod compile_time_assertions {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Forest: Send, Sync);
    assert_impl_all!(ForestTrainer: Send, Sync);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::core::types::LeafCriterion;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Tree {
        let mut tree = Tree::new();
        let root = tree.add_internal(None, false, feature, threshold);
        tree.add_leaf(Some(root), true, left, LeafCriterion::MaxDepth);
        tree.add_leaf(Some(root), false, right, LeafCriterion::MaxDepth);
        tree
    }

    #[test]
    fn test_mean_aggregation() {
        let forest = Forest::from_trees(
            vec![stump(0, 0.0, 1.0, 2.0), stump(0, 0.0, 3.0, 6.0)],
            LearningType::Regression,
            1,
            1,
        )
        .unwrap();

        let queries = array![[-1.0], [1.0]];
        let predictions = forest.predict(queries.view()).unwrap();
        assert_abs_diff_eq!(predictions[0], 2.0);
        assert_abs_diff_eq!(predictions[1], 4.0);

        let all = forest.predict_all(queries.view()).unwrap();
        assert_eq!(all.dim(), (2, 2));
        assert_eq!(all[[1, 1]], 6.0);
    }

    #[test]
    fn test_majority_vote_first_max_wins() {
        let forest = Forest::from_trees(
            vec![
                stump(0, 0.0, 2.0, 1.0),
                stump(0, 0.0, 1.0, 1.0),
                stump(0, 0.0, 2.0, 3.0),
                stump(0, 0.0, 1.0, 3.0),
            ],
            LearningType::Classification,
            1,
            2,
        )
        .unwrap();

        // left: votes 2,1,2,1 -> tie between 1 and 2, lowest wins
        // right: votes 1,1,3,3 -> tie between 1 and 3
        let predictions = forest.predict(array![[-1.0], [1.0]].view()).unwrap();
        assert_eq!(predictions.to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_leaf_ids_and_index_subset() {
        let forest = Forest::from_trees(
            vec![stump(0, 0.0, 1.0, 2.0), stump(1, 5.0, 3.0, 4.0), stump(0, 9.0, 0.0, 0.0)],
            LearningType::Regression,
            2,
            1,
        )
        .unwrap();
        let queries = array![[-1.0, 6.0], [1.0, 0.0], [10.0, 10.0]];

        let ids = forest.predict_leaf_ids(queries.view()).unwrap();
        assert_eq!(ids.dim(), (3, 3));
        assert_eq!(ids.row(0).to_vec(), vec![1, 2, 2]);
        assert_eq!(ids.row(1).to_vec(), vec![2, 1, 2]);

        match forest.predict_with(queries.view(), Some(&[2, 0]), PredictionMode::LeafId).unwrap() {
            Predictions::LeafIds(subset) => {
                assert_eq!(subset.dim(), (3, 2));
                assert_eq!(subset.column(0), ids.column(2));
                assert_eq!(subset.column(1), ids.column(0));
            }
            other => panic!("unexpected {:?}", other),
        }

        match forest.predict_with(queries.view(), Some(&[1]), PredictionMode::Value).unwrap() {
            Predictions::Values(values) => assert_abs_diff_eq!(values[0], 5.0 / 3.0, epsilon = 1e-12),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_query_validation() {
        let forest =
            Forest::from_trees(vec![stump(0, 0.0, 1.0, 2.0)], LearningType::Regression, 2, 1).unwrap();

        let err = forest.predict(array![[1.0]].view()).unwrap_err();
        assert_eq!(err.category(), "dimension_mismatch");

        let err = forest
            .predict_with(array![[1.0, 2.0]].view(), Some(&[3]), PredictionMode::Value)
            .unwrap_err();
        assert_eq!(err.category(), "index_out_of_bounds");
    }

    #[test]
    fn test_forest_graft() {
        let mut forest =
            Forest::from_trees(vec![stump(0, 0.0, 1.0, 2.0)], LearningType::Regression, 1, 1).unwrap();
        forest.graft(0, &stump(0, -5.0, 7.0, 8.0), 1).unwrap();

        let predictions = forest.predict(array![[-6.0], [-1.0], [1.0]].view()).unwrap();
        assert_eq!(predictions.to_vec(), vec![7.0, 8.0, 2.0]);
        assert!(forest.graft(3, &Tree::new(), 0).is_err());
        assert_eq!(forest.num_nodes(), vec![5]);
    }

    #[test]
    fn test_graft_rejects_unknown_feature() {
        let mut forest =
            Forest::from_trees(vec![stump(0, 0.0, 1.0, 2.0)], LearningType::Regression, 1, 1).unwrap();

        let err = forest.graft(0, &stump(5, 0.0, 7.0, 8.0), 1).unwrap_err();
        assert_eq!(err.category(), "dimension_mismatch");
        assert_eq!(forest.num_nodes(), vec![3]);
        assert_eq!(forest.predict(array![[-1.0]].view()).unwrap().to_vec(), vec![1.0]);

        let err = Forest::from_trees(vec![stump(1, 0.0, 1.0, 2.0)], LearningType::Regression, 1, 1)
            .unwrap_err();
        assert_eq!(err.category(), "dimension_mismatch");
    }

    #[test]
    fn test_failed_graft_leaves_forest_unchanged() {
        let mut forest =
            Forest::from_trees(vec![stump(0, 0.0, 0.0, 1.0)], LearningType::Classification, 1, 1)
                .unwrap();
        let before = forest.tree(0).unwrap().clone();

        let err = forest.graft(0, &stump(0, -5.0, 0.5, 1.0), 1).unwrap_err();
        assert_eq!(err.category(), "data");
        assert_eq!(forest.num_nodes(), vec![3]);
        assert_eq!(forest.tree(0).unwrap(), &before);

        forest.graft(0, &stump(0, -5.0, 2.0, 1.0), 1).unwrap();
        assert_eq!(forest.num_nodes(), vec![5]);
        assert_eq!(forest.predict(array![[-6.0]].view()).unwrap().to_vec(), vec![2.0]);
    }

    #[test]
    fn test_fit_validates_labels() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 0.5];
        let data = Dataset::new(x.view(), y.view()).unwrap();

        let trainer = ForestTrainer::new(ForestConfig::default()).unwrap();
        assert_eq!(trainer.fit(&data).unwrap_err().category(), "data");
    }

    #[test]
    fn test_fit_with_samples_checks_count() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let data = Dataset::new(x.view(), y.view()).unwrap();

        let config = ConfigBuilder::new().n_estimators(2).build().unwrap();
        let trainer = ForestTrainer::new(config).unwrap();
        assert!(trainer.fit_with_samples(&data, vec![SampleSet::identity(2)]).is_err());

        let forest = trainer
            .fit_with_samples(&data, vec![SampleSet::identity(2), SampleSet::identity(2)])
            .unwrap();
        assert_eq!(forest.num_trees(), 2);
        assert_eq!(forest.predict(x.view()).unwrap().to_vec(), vec![0.0, 1.0]);
    }
}
