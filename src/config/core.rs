//! Core configuration structures for HugeWood.
//!
//! [`ForestConfig`] is the read-only parameter record shared by every tree
//! worker. It is validated once, before anything is allocated.

use crate::core::constants::*;
use crate::core::error::{Result, WoodError};
use crate::core::types::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable prefix read by [`ForestConfig::load_from_environment`].
pub const ENV_PREFIX: &str = "HUGEWOOD_";

/// Number of candidate features tested per node before the search may stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature
    All,
    /// A fixed count, clamped to the number of features
    Count(usize),
    /// `floor(sqrt(d))`, at least 1
    Sqrt,
    /// `floor(log2(d))`, at least 1
    Log2,
}

impl Default for MaxFeatures {
    fn default() -> Self {
        MaxFeatures::All
    }
}

impl MaxFeatures {
    /// Resolves the budget against `num_features`.
    ///
    /// A count outside `1..=num_features` falls back to all features with a
    /// warning.
    pub fn resolve(self, num_features: usize) -> usize {
        match self {
            MaxFeatures::All => num_features,
            MaxFeatures::Count(count) if count >= 1 && count <= num_features => count,
            MaxFeatures::Count(count) => {
                log::warn!(
                    "max_features={} is not in [1, {}]; using all {} features",
                    count,
                    num_features,
                    num_features
                );
                num_features
            }
            MaxFeatures::Sqrt => ((num_features as f64).sqrt() as usize).max(1),
            MaxFeatures::Log2 => ((num_features as f64).log2() as usize).max(1),
        }
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeatures::All => write!(f, "all"),
            MaxFeatures::Count(count) => write!(f, "{}", count),
            MaxFeatures::Sqrt => write!(f, "sqrt"),
            MaxFeatures::Log2 => write!(f, "log2"),
        }
    }
}

impl FromStr for MaxFeatures {
    type Err = WoodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "none" => Ok(MaxFeatures::All),
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            other => other
                .parse::<usize>()
                .map(MaxFeatures::Count)
                .map_err(|_| WoodError::config(format!("invalid max_features: {}", other))),
        }
    }
}

/// Parameters of a forest build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Split criterion
    pub criterion: SplitCriterion,
    /// Order in which pending nodes are expanded
    pub traversal_mode: TraversalMode,
    /// Optimal or random thresholds
    pub tree_type: TreeType,
    /// Regression or classification
    pub learning_type: LearningType,
    /// Whether low-impurity nodes are forced to leaves
    pub leaf_stopping_mode: LeafStoppingMode,
    /// Maximum depth of a tree (root has depth 0)
    pub max_depth: usize,
    /// Minimum number of samples needed to split a node
    pub min_samples_split: usize,
    /// Minimum number of samples in each child
    pub min_samples_leaf: usize,
    /// Feature budget per node
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    /// Imbalance penalty of the even-split criteria, in [0, 1]
    pub lambda: f64,
    /// Number of worker threads (0 means all cores)
    pub num_threads: usize,
    /// Master random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_estimators: DEFAULT_N_ESTIMATORS,
            criterion: DEFAULT_CRITERION,
            traversal_mode: DEFAULT_TRAVERSAL_MODE,
            tree_type: DEFAULT_TREE_TYPE,
            learning_type: LearningType::Classification,
            leaf_stopping_mode: LeafStoppingMode::All,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            max_features: MaxFeatures::All,
            bootstrap: true,
            lambda: DEFAULT_LAMBDA,
            num_threads: DEFAULT_NUM_THREADS,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForestConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration for regression (MSE criterion)
    pub fn regression() -> Self {
        ForestConfig {
            criterion: SplitCriterion::Mse,
            learning_type: LearningType::Regression,
            ..Self::default()
        }
    }

    /// Default configuration for classification (Gini criterion)
    pub fn classification() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(WoodError::invalid_parameter(
                "n_estimators",
                "0",
                "must be at least 1",
            ));
        }

        if self.max_depth == 0 {
            return Err(WoodError::invalid_parameter(
                "max_depth",
                "0",
                "must be at least 1",
            ));
        }

        if self.min_samples_split == 0 {
            return Err(WoodError::invalid_parameter(
                "min_samples_split",
                "0",
                "must be at least 1",
            ));
        }

        if self.min_samples_leaf == 0 {
            return Err(WoodError::invalid_parameter(
                "min_samples_leaf",
                "0",
                "must be greater than zero",
            ));
        }

        if let MaxFeatures::Count(0) = self.max_features {
            return Err(WoodError::invalid_parameter(
                "max_features",
                "0",
                "must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(WoodError::invalid_parameter(
                "lambda",
                self.lambda.to_string(),
                "must be in range [0.0, 1.0]",
            ));
        }

        let regression = self.learning_type == LearningType::Regression;
        if self.criterion.is_regression() != regression {
            return Err(WoodError::invalid_parameter(
                "criterion",
                self.criterion.to_string(),
                format!("cannot be used for {}", self.learning_type),
            ));
        }

        if self.lambda > 0.0 && !self.criterion.is_even_split() {
            log::warn!(
                "lambda={} has no effect with criterion {}",
                self.lambda,
                self.criterion
            );
        }

        Ok(())
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: ForestConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(WoodError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            _ => {
                return Err(WoodError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from `HUGEWOOD_*` environment variables on top of
    /// the defaults
    pub fn load_from_environment() -> Result<Self> {
        let mut config = ForestConfig::default();
        config.apply_environment_overrides()?;
        Ok(config)
    }

    /// Apply `HUGEWOOD_*` environment variables to this configuration
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_value("N_ESTIMATORS") {
            self.n_estimators = parse_env("N_ESTIMATORS", &val)?;
        }
        if let Some(val) = env_value("CRITERION") {
            self.criterion = val.parse()?;
        }
        if let Some(val) = env_value("TRAVERSAL_MODE") {
            self.traversal_mode = val.parse()?;
        }
        if let Some(val) = env_value("TREE_TYPE") {
            self.tree_type = val.parse()?;
        }
        if let Some(val) = env_value("LEARNING_TYPE") {
            self.learning_type = val.parse()?;
        }
        if let Some(val) = env_value("LEAF_STOPPING_MODE") {
            self.leaf_stopping_mode = val.parse()?;
        }
        if let Some(val) = env_value("MAX_DEPTH") {
            self.max_depth = parse_env("MAX_DEPTH", &val)?;
        }
        if let Some(val) = env_value("MIN_SAMPLES_SPLIT") {
            self.min_samples_split = parse_env("MIN_SAMPLES_SPLIT", &val)?;
        }
        if let Some(val) = env_value("MIN_SAMPLES_LEAF") {
            self.min_samples_leaf = parse_env("MIN_SAMPLES_LEAF", &val)?;
        }
        if let Some(val) = env_value("MAX_FEATURES") {
            self.max_features = val.parse()?;
        }
        if let Some(val) = env_value("BOOTSTRAP") {
            self.bootstrap = parse_env("BOOTSTRAP", &val)?;
        }
        if let Some(val) = env_value("LAMBDA") {
            self.lambda = parse_env("LAMBDA", &val)?;
        }
        if let Some(val) = env_value("NUM_THREADS") {
            self.num_threads = parse_env("NUM_THREADS", &val)?;
        }
        if let Some(val) = env_value("SEED") {
            self.seed = parse_env("SEED", &val)?;
        }

        self.validate()
    }

    /// Get the effective number of threads (0 means use all available cores)
    pub fn effective_num_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Resolve the per-node feature budget for `num_features` features
    pub fn resolve_max_features(&self, num_features: usize) -> usize {
        self.max_features.resolve(num_features)
    }

    /// Flat name/value view of every parameter
    pub fn as_parameter_map(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("n_estimators", self.n_estimators.to_string());
        params.insert("criterion", self.criterion.to_string());
        params.insert("traversal_mode", self.traversal_mode.to_string());
        params.insert("tree_type", self.tree_type.to_string());
        params.insert("learning_type", self.learning_type.to_string());
        params.insert("leaf_stopping_mode", self.leaf_stopping_mode.to_string());
        params.insert("max_depth", self.max_depth.to_string());
        params.insert("min_samples_split", self.min_samples_split.to_string());
        params.insert("min_samples_leaf", self.min_samples_leaf.to_string());
        params.insert("max_features", self.max_features.to_string());
        params.insert("bootstrap", self.bootstrap.to_string());
        params.insert("lambda", self.lambda.to_string());
        params.insert("num_threads", self.num_threads.to_string());
        params.insert("seed", self.seed.to_string());
        params
    }

    /// Multi-line parameter summary, one `name: value` per line
    pub fn describe(&self) -> String {
        self.as_parameter_map()
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WoodError::config(format!("Invalid {}{}: {}", ENV_PREFIX, name, value)))
}

/// Configuration builder for fluent configuration creation
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: ForestConfig,
    validation_errors: Vec<String>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        ConfigBuilder {
            config: ForestConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: ForestConfig) -> Self {
        ConfigBuilder {
            config,
            validation_errors: Vec::new(),
        }
    }

    /// Set the number of trees
    pub fn n_estimators(mut self, n_estimators: usize) -> Self {
        if n_estimators == 0 {
            self.validation_errors
                .push("n_estimators must be at least 1".to_string());
        }
        self.config.n_estimators = n_estimators;
        self
    }

    /// Set the split criterion
    pub fn criterion(mut self, criterion: SplitCriterion) -> Self {
        self.config.criterion = criterion;
        self
    }

    /// Set the traversal mode
    pub fn traversal_mode(mut self, mode: TraversalMode) -> Self {
        self.config.traversal_mode = mode;
        self
    }

    /// Set the tree type
    pub fn tree_type(mut self, tree_type: TreeType) -> Self {
        self.config.tree_type = tree_type;
        self
    }

    /// Set the learning type
    pub fn learning_type(mut self, learning_type: LearningType) -> Self {
        self.config.learning_type = learning_type;
        self
    }

    /// Set the leaf stopping mode
    pub fn leaf_stopping_mode(mut self, mode: LeafStoppingMode) -> Self {
        self.config.leaf_stopping_mode = mode;
        self
    }

    /// Set the maximum tree depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        if depth == 0 {
            self.validation_errors
                .push("max_depth must be at least 1".to_string());
        }
        self.config.max_depth = depth;
        self
    }

    /// Set the minimum number of samples needed to split
    pub fn min_samples_split(mut self, min_samples: usize) -> Self {
        self.config.min_samples_split = min_samples;
        self
    }

    /// Set the minimum number of samples per child
    pub fn min_samples_leaf(mut self, min_samples: usize) -> Self {
        if min_samples == 0 {
            self.validation_errors
                .push("min_samples_leaf must be greater than zero".to_string());
        }
        self.config.min_samples_leaf = min_samples;
        self
    }

    /// Set the per-node feature budget
    pub fn max_features(mut self, max_features: MaxFeatures) -> Self {
        self.config.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.config.bootstrap = bootstrap;
        self
    }

    /// Set the imbalance penalty
    pub fn lambda(mut self, lambda: f64) -> Self {
        if !(0.0..=1.0).contains(&lambda) {
            self.validation_errors
                .push("lambda must be in range [0.0, 1.0]".to_string());
        }
        self.config.lambda = lambda;
        self
    }

    /// Set the number of worker threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set the master random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ForestConfig> {
        if !self.validation_errors.is_empty() {
            return Err(WoodError::config(format!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            )));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
