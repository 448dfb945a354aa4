//! Core data types for HugeWood.
//!
//! Every option enum carries a stable numeric code (`from_code`/`code`) and
//! a lowercase name used in configuration files and environment variables
//! (`FromStr`/`Display`).

use crate::core::error::WoodError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Feature and label value type.
pub type Value = f64;

/// Multiplicity of a sample within a bootstrap set.
pub type SampleWeight = u32;

/// Feature index type for identifying features in the dataset.
pub type FeatureIndex = usize;

/// Tree node identifier type. Stable position inside the node array.
pub type NodeIndex = usize;

/// Scheduling key of a pending work item; lower pops first.
pub type Priority = i64;

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal, $text:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Maps a numeric code to the option.
            pub fn from_code(code: u32) -> Result<Self, WoodError> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(WoodError::config(format!(
                        "unknown {} code: {}", $what, other
                    ))),
                }
            }

            /// Returns the numeric code of the option.
            pub fn code(self) -> u32 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Returns the lowercase name of the option.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }

        impl FromStr for $name {
            type Err = WoodError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => match other.parse::<u32>() {
                        Ok(code) => Self::from_code(code),
                        Err(_) => Err(WoodError::config(format!(
                            "unknown {}: {}", $what, other
                        ))),
                    },
                }
            }
        }
    };
}

coded_enum! {
    /// Impurity/improvement formula used to score candidate splits.
    SplitCriterion, "criterion" {
        /// Weighted variance
        Mse = 0, "mse";
        /// Gini impurity over mapped classes
        Gini = 1, "gini";
        /// Variance with an imbalance penalty
        EvenMse = 3, "even_mse";
        /// Gini with an imbalance penalty
        EvenGini = 4, "even_gini";
    }
}

impl SplitCriterion {
    /// True for the variance family.
    pub fn is_regression(self) -> bool {
        matches!(self, SplitCriterion::Mse | SplitCriterion::EvenMse)
    }

    /// True for the imbalance-penalized variants.
    pub fn is_even_split(self) -> bool {
        matches!(self, SplitCriterion::EvenMse | SplitCriterion::EvenGini)
    }
}

coded_enum! {
    /// Policy assigning scheduling priority to pending work items.
    TraversalMode, "traversal mode" {
        /// Deeper items first
        DepthFirst = 0, "dfs";
        /// Larger items first
        NodeSize = 1, "node_size";
        /// Item with the larger weight fraction first
        Probability = 2, "prob";
    }
}

coded_enum! {
    /// How thresholds are chosen for a tested feature.
    TreeType, "tree type" {
        /// Optimal threshold from a sorted sweep
        Standard = 0, "standard";
        /// Uniform random threshold in [min, max)
        Randomized = 1, "randomized";
    }
}

coded_enum! {
    /// Whether low-impurity nodes are forced to become leaves.
    LeafStoppingMode, "leaf stopping mode" {
        /// Apply every stopping rule
        All = 0, "all";
        /// Keep splitting nodes whose impurity vanished
        IgnoreImpurity = 1, "ignore_impurity";
    }
}

coded_enum! {
    /// Learning problem solved by the forest.
    LearningType, "learning type" {
        /// Continuous targets, mean aggregation
        Regression = 0, "regression";
        /// Integer class labels, majority vote
        Classification = 1, "classification";
    }
}

coded_enum! {
    /// Output of a forest query.
    PredictionMode, "prediction mode" {
        /// Leaf values aggregated over trees
        Value = 0, "value";
        /// Reached node ids, one per tree
        LeafId = 1, "leaf_id";
    }
}

coded_enum! {
    /// Reason recorded on a leaf node.
    LeafCriterion, "leaf criterion" {
        /// Internal node
        NoLeaf = 0, "no_leaf";
        /// Every tested feature was constant
        Detected = 1, "detected";
        /// Maximum depth reached
        MaxDepth = 2, "max_depth";
        /// Fewer samples than `min_samples_split`
        MinSamplesSplit = 3, "min_samples_split";
        /// Fewer samples than twice `min_samples_leaf`
        MinSamplesLeaf = 4, "min_samples_leaf";
        /// Impurity below the split threshold
        MinImpurity = 5, "min_impurity";
        /// Split position did not advance inside the range
        PositionNotAdvancing = 6, "position_not_advancing";
    }
}

impl Default for SplitCriterion {
    fn default() -> Self {
        SplitCriterion::Gini
    }
}

impl Default for TraversalMode {
    fn default() -> Self {
        TraversalMode::DepthFirst
    }
}

impl Default for TreeType {
    fn default() -> Self {
        TreeType::Randomized
    }
}

impl Default for LeafStoppingMode {
    fn default() -> Self {
        LeafStoppingMode::All
    }
}

impl Default for LearningType {
    fn default() -> Self {
        LearningType::Classification
    }
}

impl Default for PredictionMode {
    fn default() -> Self {
        PredictionMode::Value
    }
}

impl Default for LeafCriterion {
    fn default() -> Self {
        LeafCriterion::NoLeaf
    }
}
