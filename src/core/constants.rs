//! System constants and configuration defaults for HugeWood.

use crate::core::types::*;

/// Default number of trees in the forest.
pub const DEFAULT_N_ESTIMATORS: usize = 10;

/// Default minimum number of samples required to split a node.
pub const DEFAULT_MIN_SAMPLES_SPLIT: usize = 2;

/// Default minimum number of samples in each child of a split.
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 1;

/// Default maximum tree depth.
/// Large enough that depth never binds for practical data sets.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Default number of worker threads.
/// 0 means use all available cores.
pub const DEFAULT_NUM_THREADS: usize = 1;

/// Default master random seed.
pub const DEFAULT_SEED: u64 = 0;

/// Default imbalance penalty for the even-split criteria.
pub const DEFAULT_LAMBDA: f64 = 0.0;

/// Default split criterion.
pub const DEFAULT_CRITERION: SplitCriterion = SplitCriterion::Gini;

/// Default work-item traversal order.
pub const DEFAULT_TRAVERSAL_MODE: TraversalMode = TraversalMode::DepthFirst;

/// Default tree type.
pub const DEFAULT_TREE_TYPE: TreeType = TreeType::Randomized;

/// Nodes whose impurity is at or below this value become leaves.
pub const MIN_IMPURITY_SPLIT: f64 = 1e-10;

/// Two feature values closer than this are treated as equal.
pub const FEATURE_THRESHOLD: f64 = 1e-10;

/// Squared distance under which a label counts as an integer class.
pub const CLASS_LABEL_TOLERANCE: f64 = 1e-4;

/// Largest class label accepted for classification.
/// Bounds the vote buffer used during prediction.
pub const MAX_CLASS_LABEL: usize = 1 << 20;

/// Id of the root node in every tree.
pub const TREE_ROOT_ID: NodeIndex = 0;

/// Child id meaning "no child". The root can never be a child.
pub const TREE_CHILD_ID_NOT_SET: NodeIndex = 0;

/// Node capacity of a freshly created tree.
pub const INITIAL_TREE_CAPACITY: usize = 128;

/// Requested capacity of the work queue when a tree build starts.
pub const INITIAL_QUEUE_CAPACITY: usize = 10;

/// The work queue never shrinks below this capacity.
pub const WORK_QUEUE_MIN_CAPACITY: usize = 64;

/// Partitions at or below this size are finished by insertion sort.
pub const INSERTION_SORT_THRESHOLD: usize = 16;

/// Largest value produced by the per-tree generator.
pub const RAND_R_MAX: u32 = 0x7FFF_FFFF;

/// Lower clamp of the automatic top-tree subset size.
pub const HUGE_AUTO_MIN_PATTERNS: usize = 100_000;

/// Upper clamp of the automatic top-tree subset size.
pub const HUGE_AUTO_MAX_PATTERNS: usize = 500_000;

/// Library version.
pub const HUGEWOOD_VERSION: &str = env!("CARGO_PKG_VERSION");
