//! Growth of a single tree.
//!
//! Pending nodes wait in a [`WorkQueue`] as [`WorkItem`]s covering a range of
//! the tree's sample arrays. Popping an item runs the split search, then
//! either emits a leaf or emits an internal node, partitions the range and
//! schedules both children.

use crate::config::ForestConfig;
use crate::core::constants::*;
use crate::core::error::{Result, WoodError};
use crate::core::random::Random;
use crate::core::types::*;
use crate::dataset::Dataset;
use crate::tree::criterion::Criterion;
use crate::tree::partition::{partition_range, TreeSamples};
use crate::tree::queue::WorkQueue;
use crate::tree::split::{ConstantFeatures, SplitRecord, SplitSearch};
use crate::tree::tree::Tree;

/// Growth parameters of one tree, with the feature budget resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    pub criterion: SplitCriterion,
    pub lambda: f64,
    pub tree_type: TreeType,
    pub traversal_mode: TraversalMode,
    pub leaf_stopping_mode: LeafStoppingMode,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
}

impl TreeParams {
    pub fn from_config(config: &ForestConfig, num_features: usize) -> Self {
        TreeParams {
            criterion: config.criterion,
            lambda: config.lambda,
            tree_type: config.tree_type,
            traversal_mode: config.traversal_mode,
            leaf_stopping_mode: config.leaf_stopping_mode,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.resolve_max_features(num_features),
        }
    }

    fn leaf_policy(&self) -> LeafPolicy {
        LeafPolicy {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            stopping_mode: self.leaf_stopping_mode,
        }
    }
}

/// A node waiting to be expanded
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub start: usize,
    pub end: usize,
    pub depth: usize,
    /// `None` for the root
    pub parent: Option<NodeIndex>,
    pub is_left: bool,
    pub constant_features: ConstantFeatures,
}

impl WorkItem {
    fn root(num_samples: usize, num_features: usize) -> Self {
        WorkItem {
            start: 0,
            end: num_samples,
            depth: 0,
            parent: None,
            is_left: false,
            constant_features: ConstantFeatures::new(num_features),
        }
    }

    pub fn num_samples(&self) -> usize {
        self.end - self.start
    }
}

/// Decides when a node stops growing. Rules are checked in order and the
/// first one that applies names the leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafPolicy {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub stopping_mode: LeafStoppingMode,
}

impl LeafPolicy {
    /// Leaf criterion of a popped item, [`LeafCriterion::NoLeaf`] to split.
    pub fn check(&self, item: &WorkItem, split: &SplitRecord) -> LeafCriterion {
        if split.leaf_detected {
            return LeafCriterion::Detected;
        }
        if item.depth >= self.max_depth {
            return LeafCriterion::MaxDepth;
        }
        let size = self.check_size(item.num_samples());
        if size != LeafCriterion::NoLeaf {
            return size;
        }
        if self.impurity_stops(split.impurity) {
            return LeafCriterion::MinImpurity;
        }
        if split.feature.is_none() || split.pos <= item.start || split.pos >= item.end {
            return LeafCriterion::PositionNotAdvancing;
        }
        LeafCriterion::NoLeaf
    }

    /// Early check of a freshly split child with `n` samples.
    pub fn check_child(&self, n: usize, impurity: f64) -> LeafCriterion {
        let size = self.check_size(n);
        if size != LeafCriterion::NoLeaf {
            return size;
        }
        if self.impurity_stops(impurity) {
            return LeafCriterion::MinImpurity;
        }
        LeafCriterion::NoLeaf
    }

    fn check_size(&self, n: usize) -> LeafCriterion {
        if n < self.min_samples_split {
            LeafCriterion::MinSamplesSplit
        } else if n < 2 * self.min_samples_leaf {
            LeafCriterion::MinSamplesLeaf
        } else {
            LeafCriterion::NoLeaf
        }
    }

    fn impurity_stops(&self, impurity: f64) -> bool {
        impurity <= MIN_IMPURITY_SPLIT && self.stopping_mode != LeafStoppingMode::IgnoreImpurity
    }
}

/// One side of a split, ready to be emitted
struct Child {
    start: usize,
    end: usize,
    is_left: bool,
    priority: Priority,
    leaf: LeafCriterion,
}

/// Grows single trees
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    params: TreeParams,
}

impl TreeBuilder {
    pub fn new(params: TreeParams) -> Self {
        TreeBuilder { params }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Grows a tree over `samples`, reordering them in place.
    pub fn build(
        &self,
        dataset: &Dataset<'_>,
        mut samples: TreeSamples,
        rng: &mut Random,
    ) -> Result<Tree> {
        if samples.is_empty() {
            return Err(WoodError::data("cannot grow a tree without samples"));
        }

        let params = &self.params;
        let policy = params.leaf_policy();
        if params.criterion.is_regression() && samples.n_classes() > 0 {
            return Err(WoodError::config(format!(
                "criterion {} needs regression samples",
                params.criterion
            )));
        }
        let criterion = Criterion::new(params.criterion, params.lambda, samples.n_classes());
        criterion.check_labels(&samples.labels)?;
        let mut search = SplitSearch::new(
            criterion,
            params.tree_type,
            params.max_features,
            params.min_samples_leaf,
        );

        let mut tree = Tree::with_capacity(INITIAL_TREE_CAPACITY);
        let mut queue = WorkQueue::with_capacity(INITIAL_QUEUE_CAPACITY);
        queue.push(WorkItem::root(samples.len(), dataset.num_features()), 0);

        while let Some(mut item) = queue.pop() {
            let split = search.find_best_split(
                dataset,
                &samples,
                item.start,
                item.end,
                &mut item.constant_features,
                rng,
            );

            let leaf = policy.check(&item, &split);
            let feature = match split.feature {
                Some(feature) if leaf == LeafCriterion::NoLeaf => feature,
                _ => {
                    let value = leaf_value(&criterion, &samples, item.start, item.end);
                    tree.add_leaf(item.parent, item.is_left, value, leaf);
                    log::trace!(
                        "leaf [{}, {}) at depth {}: {}",
                        item.start,
                        item.end,
                        item.depth,
                        leaf
                    );
                    continue;
                }
            };

            let node = tree.add_internal(item.parent, item.is_left, feature, split.threshold);
            let pos = partition_range(
                dataset,
                &mut samples,
                item.start,
                item.end,
                feature,
                split.threshold,
            );
            if pos != split.pos {
                return Err(WoodError::tree_construction(format!(
                    "partition of [{}, {}) on feature {} ended at {}, split search reported {}",
                    item.start, item.end, feature, pos, split.pos
                )));
            }

            let (left_priority, right_priority) = self.child_priorities(&item, &split, pos);
            let left = Child {
                start: item.start,
                end: pos,
                is_left: true,
                priority: left_priority,
                leaf: policy.check_child(pos - item.start, split.impurity_left),
            };
            let right = Child {
                start: pos,
                end: item.end,
                is_left: false,
                priority: right_priority,
                leaf: policy.check_child(item.end - pos, split.impurity_right),
            };

            let order = if split.prob_left > split.prob_right {
                [left, right]
            } else {
                [right, left]
            };
            for child in order {
                if child.leaf != LeafCriterion::NoLeaf {
                    let value = leaf_value(&criterion, &samples, child.start, child.end);
                    tree.add_leaf(Some(node), child.is_left, value, child.leaf);
                } else {
                    queue.push(
                        WorkItem {
                            start: child.start,
                            end: child.end,
                            depth: item.depth + 1,
                            parent: Some(node),
                            is_left: child.is_left,
                            constant_features: item.constant_features.clone(),
                        },
                        child.priority,
                    );
                }
            }
        }

        log::debug!(
            "grew tree: {} nodes, {} leaves, depth {}, {} distinct samples",
            tree.num_nodes(),
            tree.num_leaves(),
            tree.depth(),
            samples.len()
        );
        Ok(tree)
    }

    fn child_priorities(&self, item: &WorkItem, split: &SplitRecord, pos: usize) -> (Priority, Priority) {
        let depth = item.depth as Priority;
        match self.params.traversal_mode {
            TraversalMode::DepthFirst => (-(depth + 1), -depth),
            TraversalMode::NodeSize => (
                -((pos - item.start) as Priority),
                -((item.end - pos) as Priority),
            ),
            TraversalMode::Probability => {
                if split.prob_left > split.prob_right {
                    (-(depth + 1), -depth)
                } else {
                    (-depth, -(depth + 1))
                }
            }
        }
    }
}

fn leaf_value(criterion: &Criterion, samples: &TreeSamples, start: usize, end: usize) -> Value {
    let value = criterion.leaf_value(samples.labels_in(start, end), samples.weights_in(start, end));
    samples.decode(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::sampling::SampleSet;
    use ndarray::{array, Array1, Array2};

    fn params(criterion: SplitCriterion) -> TreeParams {
        TreeParams {
            criterion,
            lambda: 0.0,
            tree_type: TreeType::Standard,
            traversal_mode: TraversalMode::DepthFirst,
            leaf_stopping_mode: LeafStoppingMode::All,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        }
    }

    fn grow(params: TreeParams, x: &Array2<f64>, y: &Array1<f64>, learning_type: LearningType) -> Tree {
        let data = Dataset::new(x.view(), y.view()).unwrap();
        let samples = TreeSamples::new(&data, &SampleSet::identity(data.num_samples()), learning_type).unwrap();
        TreeBuilder::new(params)
            .build(&data, samples, &mut Random::with_seed(17))
            .unwrap()
    }

    fn item(start: usize, end: usize, depth: usize) -> WorkItem {
        WorkItem {
            start,
            end,
            depth,
            parent: None,
            is_left: false,
            constant_features: ConstantFeatures::new(1),
        }
    }

    #[test]
    fn test_four_point_regression() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 1.0, 5.0, 5.0];
        let tree = grow(params(SplitCriterion::Mse), &x, &y, LearningType::Regression);

        assert_eq!(tree.num_nodes(), 3);
        let root = tree.node(0).unwrap();
        assert_eq!(root.split(), Some((0, 2.5)));
        assert_eq!(tree.node(root.left_id).unwrap().leaf_value(), Some(1.0));
        assert_eq!(tree.node(root.right_id).unwrap().leaf_value(), Some(5.0));
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_classification_leaves_hold_original_labels() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 9.0, 9.0];
        let tree = grow(params(SplitCriterion::Gini), &x, &y, LearningType::Classification);

        assert_eq!(tree.predict_value(&array![0.5].view()), 4.0);
        assert_eq!(tree.predict_value(&array![2.5].view()), 9.0);
    }

    #[test]
    fn test_max_depth_one() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(16, |i| (i * i) as f64);
        let mut p = params(SplitCriterion::Mse);
        p.max_depth = 1;
        let tree = grow(p, &x, &y, LearningType::Regression);

        assert_eq!(tree.num_nodes(), 3);
        assert_eq!(tree.depth(), 1);
        for id in tree.leaf_ids() {
            assert_eq!(tree.node(id).unwrap().leaf_criterion, LeafCriterion::MaxDepth);
        }
    }

    #[test]
    fn test_constant_data_gives_detected_leaf() {
        let x = Array2::from_elem((6, 2), 1.0);
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let tree = grow(params(SplitCriterion::Gini), &x, &y, LearningType::Classification);

        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.node(0).unwrap().leaf_criterion, LeafCriterion::Detected);
    }

    #[test]
    fn test_pure_node_stops_unless_ignored() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 1.0, 1.0, 1.0];
        let tree = grow(params(SplitCriterion::Gini), &x, &y, LearningType::Classification);
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.node(0).unwrap().leaf_criterion, LeafCriterion::MinImpurity);

        let mut p = params(SplitCriterion::Gini);
        p.leaf_stopping_mode = LeafStoppingMode::IgnoreImpurity;
        let tree = grow(p, &x, &y, LearningType::Classification);
        assert_eq!(tree.num_leaves(), 4);
    }

    #[test]
    fn test_leaf_policy_order() {
        let policy = LeafPolicy {
            max_depth: 3,
            min_samples_split: 4,
            min_samples_leaf: 3,
            stopping_mode: LeafStoppingMode::All,
        };
        let mut split = SplitRecord::new();
        split.feature = Some(0);
        split.pos = 5;
        split.impurity = 1.0;

        assert_eq!(policy.check(&item(0, 10, 0), &split), LeafCriterion::NoLeaf);
        assert_eq!(policy.check(&item(0, 10, 3), &split), LeafCriterion::MaxDepth);
        assert_eq!(policy.check(&item(0, 3, 0), &split), LeafCriterion::MinSamplesSplit);
        assert_eq!(policy.check(&item(0, 5, 0), &split), LeafCriterion::MinSamplesLeaf);
        assert_eq!(policy.check(&item(5, 15, 0), &split), LeafCriterion::PositionNotAdvancing);

        split.impurity = 0.0;
        assert_eq!(policy.check(&item(0, 10, 0), &split), LeafCriterion::MinImpurity);

        split.leaf_detected = true;
        assert_eq!(policy.check(&item(0, 10, 9), &split), LeafCriterion::Detected);

        assert_eq!(policy.check_child(2, 1.0), LeafCriterion::MinSamplesSplit);
        assert_eq!(policy.check_child(8, 0.0), LeafCriterion::MinImpurity);
        assert_eq!(policy.check_child(8, 0.5), LeafCriterion::NoLeaf);
    }

    #[test]
    fn test_traversal_modes_grow_valid_trees() {
        let x = Array2::from_shape_fn((64, 3), |(i, j)| ((i * (j + 3)) % 17) as f64);
        let y = Array1::from_shape_fn(64, |i| (i % 5) as f64);

        for mode in [TraversalMode::DepthFirst, TraversalMode::NodeSize, TraversalMode::Probability] {
            let mut p = params(SplitCriterion::Mse);
            p.traversal_mode = mode;
            p.max_features = 3;
            let tree = grow(p, &x, &y, LearningType::Regression);
            assert!(tree.validate().is_ok());
            assert!(tree.num_leaves() > 1);
            assert_eq!(tree.num_nodes(), 2 * tree.num_leaves() - 1);
        }
    }

    #[test]
    fn test_training_rows_reach_pure_leaves() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * 7 + j * 3) % 23) as f64 + j as f64 * 0.5);
        let y = Array1::from_shape_fn(40, |i| if (i * 7) % 23 < 11 { 0.0 } else { 1.0 });
        let mut p = params(SplitCriterion::Gini);
        p.max_features = 2;
        let tree = grow(p, &x, &y, LearningType::Classification);

        for i in 0..40 {
            assert_eq!(tree.predict_value(&x.row(i)), y[i]);
        }
    }

    #[test]
    fn test_criterion_must_match_samples() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0.0, 1.0, 1.0];
        let data = Dataset::new(x.view(), y.view()).unwrap();
        let set = SampleSet::identity(3);

        let regression = TreeSamples::new(&data, &set, LearningType::Regression).unwrap();
        let err = TreeBuilder::new(params(SplitCriterion::Gini))
            .build(&data, regression, &mut Random::with_seed(1))
            .unwrap_err();
        assert_eq!(err.category(), "config");

        let classes = TreeSamples::new(&data, &set, LearningType::Classification).unwrap();
        let err = TreeBuilder::new(params(SplitCriterion::Mse))
            .build(&data, classes, &mut Random::with_seed(1))
            .unwrap_err();
        assert_eq!(err.category(), "config");

        let mut tampered = TreeSamples::new(&data, &set, LearningType::Classification).unwrap();
        tampered.labels[2] = 5.0;
        let err = TreeBuilder::new(params(SplitCriterion::Gini))
            .build(&data, tampered, &mut Random::with_seed(1))
            .unwrap_err();
        assert_eq!(err.category(), "data");
    }

    #[test]
    fn test_empty_samples_rejected() {
        let x = array![[0.0]];
        let y = array![0.0];
        let data = Dataset::new(x.view(), y.view()).unwrap();
        let samples = TreeSamples::new(&data, &SampleSet::from_rows(vec![]), LearningType::Regression).unwrap();
        let result = TreeBuilder::new(params(SplitCriterion::Mse)).build(&data, samples, &mut Random::with_seed(1));
        assert!(result.is_err());
    }
}
