//! Flat decision tree storage.
//!
//! Nodes live in one array; children are referenced by position and node 0
//! is the root. Trees can be composed by grafting a separately grown subtree
//! onto a leaf.

use crate::core::constants::{INITIAL_TREE_CAPACITY, TREE_CHILD_ID_NOT_SET, TREE_ROOT_ID};
use crate::core::error::{Result, WoodError};
use crate::core::types::{FeatureIndex, LeafCriterion, NodeIndex, Value};
use crate::tree::node::TreeNode;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision tree structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Vector of tree nodes (index 0 is the root)
    nodes: Vec<TreeNode>,
    /// Logical node capacity, doubled when exhausted
    capacity: usize,
}

impl Tree {
    /// Creates an empty tree with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_TREE_CAPACITY)
    }

    /// Creates an empty tree able to hold `capacity` nodes before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Tree {
            nodes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the number of nodes in the tree.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the logical node capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a reference to the node at the given index.
    pub fn node(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// All nodes in id order
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Returns the number of leaf nodes.
    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Returns all leaf node indices.
    pub fn leaf_ids(&self) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| if node.is_leaf() { Some(i) } else { None })
            .collect()
    }

    /// Depth of the deepest leaf (a single root has depth 0).
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(TREE_ROOT_ID, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                deepest = deepest.max(depth);
            } else {
                stack.push((node.left_id, depth + 1));
                stack.push((node.right_id, depth + 1));
            }
        }
        deepest
    }

    /// Appends a node and links it to `parent` as its left or right child.
    pub fn add_node(&mut self, parent: Option<NodeIndex>, is_left: bool) -> NodeIndex {
        let id = self.push(TreeNode::new());
        if let Some(parent) = parent {
            let parent = &mut self.nodes[parent];
            if is_left {
                parent.left_id = id;
            } else {
                parent.right_id = id;
            }
        }
        id
    }

    /// Appends a leaf.
    pub fn add_leaf(
        &mut self,
        parent: Option<NodeIndex>,
        is_left: bool,
        value: Value,
        criterion: LeafCriterion,
    ) -> NodeIndex {
        let id = self.add_node(parent, is_left);
        let node = &mut self.nodes[id];
        node.threshold_or_leaf = value;
        node.leaf_criterion = criterion;
        id
    }

    /// Appends an internal node. It stays a leaf until its children are added.
    pub fn add_internal(
        &mut self,
        parent: Option<NodeIndex>,
        is_left: bool,
        feature: FeatureIndex,
        threshold: Value,
    ) -> NodeIndex {
        let id = self.add_node(parent, is_left);
        let node = &mut self.nodes[id];
        node.feature = feature;
        node.threshold_or_leaf = threshold;
        id
    }

    fn push(&mut self, node: TreeNode) -> NodeIndex {
        if self.nodes.len() >= self.capacity {
            self.capacity *= 2;
            self.nodes.reserve(self.capacity - self.nodes.len());
        }
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Id of the leaf reached by `row`.
    pub fn predict_leaf(&self, row: &ArrayView1<'_, Value>) -> NodeIndex {
        let mut id = TREE_ROOT_ID;
        loop {
            let node = &self.nodes[id];
            if node.is_leaf() {
                return id;
            }
            id = node.next(row[node.feature]);
        }
    }

    /// Value stored in the leaf reached by `row`.
    pub fn predict_value(&self, row: &ArrayView1<'_, Value>) -> Value {
        self.nodes[self.predict_leaf(row)].threshold_or_leaf
    }

    /// Replaces leaf `leaf_id` with a copy of `subtree`.
    ///
    /// The subtree's root is merged into the leaf and its remaining nodes are
    /// appended, so every host node id stays valid. Predictions for samples
    /// reaching the leaf become the subtree's predictions.
    pub fn graft(&mut self, subtree: &Tree, leaf_id: NodeIndex) -> Result<()> {
        if subtree.is_empty() {
            return Err(WoodError::tree_construction("cannot graft an empty subtree"));
        }
        if leaf_id >= self.nodes.len() {
            return Err(WoodError::index_out_of_bounds(leaf_id, self.nodes.len()));
        }
        if !self.nodes[leaf_id].is_leaf() {
            return Err(WoodError::tree_construction(format!(
                "node {} is not a leaf",
                leaf_id
            )));
        }

        let offset = self.nodes.len() - 1;
        let shift = |id: NodeIndex| {
            if id == TREE_CHILD_ID_NOT_SET {
                id
            } else {
                id + offset
            }
        };

        for node in &subtree.nodes[1..] {
            self.push(TreeNode {
                left_id: shift(node.left_id),
                right_id: shift(node.right_id),
                ..*node
            });
        }

        let root = &subtree.nodes[TREE_ROOT_ID];
        self.nodes[leaf_id] = TreeNode {
            left_id: shift(root.left_id),
            right_id: shift(root.right_id),
            ..*root
        };

        log::trace!(
            "grafted {} nodes onto leaf {}, tree now has {} nodes",
            subtree.num_nodes(),
            leaf_id,
            self.nodes.len()
        );
        Ok(())
    }

    /// Approximate memory held by the node array
    pub fn num_bytes(&self) -> usize {
        self.capacity * std::mem::size_of::<TreeNode>()
    }

    /// Returns a textual representation of the tree structure.
    pub fn to_string_representation(&self) -> String {
        if self.nodes.is_empty() {
            return "Empty tree".to_string();
        }

        let mut result = String::new();
        self.tree_to_string_recursive(TREE_ROOT_ID, "", true, &mut result);
        result
    }

    fn tree_to_string_recursive(
        &self,
        node_index: NodeIndex,
        prefix: &str,
        is_last: bool,
        result: &mut String,
    ) {
        let node = &self.nodes[node_index];
        let current_prefix = if is_last { "└── " } else { "├── " };
        result.push_str(&format!("{}{}[{}] {}\n", prefix, current_prefix, node_index, node));

        if !node.is_leaf() {
            let new_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            self.tree_to_string_recursive(node.left_id, &new_prefix, false, result);
            self.tree_to_string_recursive(node.right_id, &new_prefix, true, result);
        }
    }

    /// Validates the tree structure consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.nodes.is_empty() {
            return Err(anyhow::anyhow!("Tree has no nodes"));
        }
        if self.nodes.len() > self.capacity {
            return Err(anyhow::anyhow!(
                "Tree holds {} nodes but capacity is {}",
                self.nodes.len(),
                self.capacity
            ));
        }

        let mut parents = vec![0usize; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if node.right_id != TREE_CHILD_ID_NOT_SET {
                    return Err(anyhow::anyhow!("Leaf node {} has a right child", i));
                }
                continue;
            }

            if node.right_id == TREE_CHILD_ID_NOT_SET {
                return Err(anyhow::anyhow!("Internal node {} missing right child", i));
            }
            if node.leaf_criterion != LeafCriterion::NoLeaf {
                return Err(anyhow::anyhow!("Internal node {} carries a leaf criterion", i));
            }
            for child in [node.left_id, node.right_id] {
                if child >= self.nodes.len() {
                    return Err(anyhow::anyhow!("Node {} has invalid child index {}", i, child));
                }
                parents[child] += 1;
            }
        }

        for (i, &count) in parents.iter().enumerate().skip(1) {
            if count != 1 {
                return Err(anyhow::anyhow!("Node {} has {} parents", i, count));
            }
        }

        // every node must be reachable from the root
        let mut reached = 0;
        let mut stack = vec![TREE_ROOT_ID];
        while let Some(id) = stack.pop() {
            reached += 1;
            if reached > self.nodes.len() {
                return Err(anyhow::anyhow!("Tree contains a cycle"));
            }
            let node = &self.nodes[id];
            if !node.is_leaf() {
                stack.push(node.left_id);
                stack.push(node.right_id);
            }
        }
        if reached != self.nodes.len() {
            return Err(anyhow::anyhow!(
                "Only {} of {} nodes are reachable from the root",
                reached,
                self.nodes.len()
            ));
        }

        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tree(nodes={}, leaves={}, depth={})",
            self.num_nodes(),
            self.num_leaves(),
            self.depth()
        )
    }
}
