//! # HugeWood
//!
//! Random forests for regression and classification, grown with a
//! priority-queue driven node expander over borrowed `ndarray` data.
//!
//! ## Features
//!
//! - **Traversal orders**: depth-first, node-size first or probability
//!   driven expansion, all through the same work queue.
//! - **Standard and randomized trees**: optimal midpoint thresholds or a
//!   single uniformly drawn threshold per feature.
//! - **Even-split criteria**: MSE and Gini penalised towards balanced
//!   splits, used for the top trees of two-stage forests.
//! - **Two-stage forests**: [`HugeWoodTrainer`] grows a top tree on a subset
//!   and grafts bottom trees grown on the rows reaching each of its leaves.
//! - **Subset forests**: [`SubsetTrainer`] grows every tree on its own random
//!   subset of rows.
//! - **Parallel training and prediction** on a dedicated Rayon pool, with
//!   results that only depend on the configured seed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hugewood::{ConfigBuilder, Dataset, ForestConfig, ForestTrainer};
//! use ndarray::{Array1, Array2};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let features = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0])?;
//! let labels = Array1::from_vec(vec![1.0, 1.0, 5.0, 5.0]);
//! let dataset = Dataset::new(features.view(), labels.view())?;
//!
//! let config = ConfigBuilder::from_config(ForestConfig::regression())
//!     .n_estimators(10)
//!     .seed(7)
//!     .build()?;
//! let forest = ForestTrainer::new(config)?.fit(&dataset)?;
//!
//! let predictions = forest.predict(features.view())?;
//! println!("Predictions: {}", predictions);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module - always available
pub mod core;

// Configuration management module
pub mod config;

// Borrowed training data
pub mod dataset;

// Tree growing
pub mod tree;

// Ensembles and prediction
pub mod forest;

// Two-stage training
pub mod huge;

// Forests on random subsets
pub mod subset;

// Re-export core functionality for convenience
pub use crate::core::{
    constants::*,
    error::{Result, WoodError},
    random::Random,
    types::*,
};

pub use config::{ConfigBuilder, ForestConfig, MaxFeatures};
pub use dataset::{Dataset, Layout};
pub use forest::{Forest, ForestTrainer, Predictions};
pub use huge::{HugeWoodConfig, HugeWoodTrainer, SubsetSize};
pub use subset::{SubsetConfig, SubsetTrainer};
pub use tree::{SampleSet, Tree, TreeNode};

// Version information
pub use crate::core::constants::HUGEWOOD_VERSION as VERSION;

/// Initialize the library.
///
/// Installs the `env_logger` backend. Training works without it, but log
/// records are dropped until a logger is installed.
///
/// # Examples
///
/// ```rust
/// fn main() -> hugewood::Result<()> {
///     hugewood::init()?;
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    crate::core::initialize_core()
}

/// Check if the library has been initialized.
pub fn is_initialized() -> bool {
    crate::core::is_core_initialized()
}
