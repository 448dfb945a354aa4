//! Tree node record.

use crate::core::constants::TREE_CHILD_ID_NOT_SET;
use crate::core::types::{FeatureIndex, LeafCriterion, NodeIndex, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node of the flat tree array.
///
/// Internal nodes hold a split (`x[feature] <= threshold` goes left), leaves
/// hold their prediction in the same slot. A child id of
/// [`TREE_CHILD_ID_NOT_SET`] means "no child"; a node is a leaf iff its left
/// child is unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: FeatureIndex,
    /// Split threshold for internal nodes, prediction for leaves
    pub threshold_or_leaf: Value,
    pub left_id: NodeIndex,
    pub right_id: NodeIndex,
    pub leaf_criterion: LeafCriterion,
}

impl TreeNode {
    /// A fresh node with no children
    pub fn new() -> Self {
        TreeNode {
            feature: 0,
            threshold_or_leaf: 0.0,
            left_id: TREE_CHILD_ID_NOT_SET,
            right_id: TREE_CHILD_ID_NOT_SET,
            leaf_criterion: LeafCriterion::NoLeaf,
        }
    }

    /// Returns true if this node is a leaf node.
    pub fn is_leaf(&self) -> bool {
        self.left_id == TREE_CHILD_ID_NOT_SET
    }

    /// Prediction of a leaf
    pub fn leaf_value(&self) -> Option<Value> {
        self.is_leaf().then_some(self.threshold_or_leaf)
    }

    /// `(feature, threshold)` of an internal node
    pub fn split(&self) -> Option<(FeatureIndex, Value)> {
        (!self.is_leaf()).then_some((self.feature, self.threshold_or_leaf))
    }

    /// Child reached by a sample whose split feature equals `value`
    #[inline]
    pub fn next(&self, value: Value) -> NodeIndex {
        if value <= self.threshold_or_leaf {
            self.left_id
        } else {
            self.right_id
        }
    }
}

impl Default for TreeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            write!(
                f,
                "Leaf(value={:.4}, reason={})",
                self.threshold_or_leaf, self.leaf_criterion
            )
        } else {
            write!(
                f,
                "Split(feature={}, threshold={:.4})",
                self.feature, self.threshold_or_leaf
            )
        }
    }
}
