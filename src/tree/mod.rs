//! Tree growing subsystem.
//!
//! Bottom-up: [`queue`] and [`sort`] are the containers, [`criterion`] scores
//! candidate splits, [`split`] searches them, [`partition`] and [`sampling`]
//! manage a tree's samples, [`builder`] drives node expansion and [`tree`]
//! stores the result.

pub mod builder;
pub mod criterion;
pub mod node;
pub mod partition;
pub mod queue;
pub mod sampling;
pub mod sort;
pub mod split;
pub mod tree;

pub use builder::{LeafPolicy, TreeBuilder, TreeParams, WorkItem};
pub use criterion::{Accumulator, Criterion, Sample, SplitStatistics};
pub use node::TreeNode;
pub use partition::{class_label, partition_range, TreeSamples};
pub use queue::WorkQueue;
pub use sampling::SampleSet;
pub use sort::{intro_sort_by_key, sort_pairs};
pub use split::{ConstantFeatures, SplitRecord, SplitSearch};
pub use tree::Tree;
