//! Common test utilities for HugeWood integration tests.
#![allow(dead_code)]

use hugewood::*;
use ndarray::{Array1, Array2};
use rand::prelude::*;

/// Create test features uniformly drawn from `[-5, 5)`
pub fn create_test_features_regression(num_samples: usize, num_features: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    Array2::from_shape_fn((num_samples, num_features), |_| rng.gen_range(-5.0..5.0))
}

/// Piecewise-constant target over the first two features
pub fn create_test_labels_regression(features: &Array2<f64>) -> Array1<f64> {
    Array1::from_shape_fn(features.nrows(), |i| {
        let mut label = if features[[i, 0]] > 0.0 { 10.0 } else { -10.0 };
        if features.ncols() > 1 && features[[i, 1]] > 2.5 {
            label += 5.0;
        }
        label
    })
}

/// Create test features for binary classification
pub fn create_test_features_binary(num_samples: usize, num_features: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(123);
    Array2::from_shape_fn((num_samples, num_features), |_| rng.gen_range(-3.0..3.0))
}

/// Class 1 iff the first feature is positive
pub fn create_test_labels_binary(features: &Array2<f64>) -> Array1<f64> {
    Array1::from_shape_fn(features.nrows(), |i| {
        if features[[i, 0]] > 0.0 {
            1.0
        } else {
            0.0
        }
    })
}

/// Classes `0..num_classes` by bands of the first feature, drawn from `[0, num_classes)`
pub fn create_test_features_multiclass(
    num_samples: usize,
    num_features: usize,
    num_classes: usize,
) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(7);
    Array2::from_shape_fn((num_samples, num_features), |_| {
        rng.gen_range(0.0..num_classes as f64)
    })
}

pub fn create_test_labels_multiclass(features: &Array2<f64>) -> Array1<f64> {
    Array1::from_shape_fn(features.nrows(), |i| features[[i, 0]].floor())
}

/// Small forest configuration with a fixed seed
pub fn create_test_config(learning_type: LearningType) -> Result<ForestConfig> {
    let criterion = match learning_type {
        LearningType::Regression => SplitCriterion::Mse,
        LearningType::Classification => SplitCriterion::Gini,
    };
    ConfigBuilder::new()
        .learning_type(learning_type)
        .criterion(criterion)
        .n_estimators(8)
        .num_threads(2)
        .seed(42)
        .build()
}

/// Fraction of equal entries
pub fn accuracy(predictions: &Array1<f64>, labels: &Array1<f64>) -> f64 {
    let hits = predictions
        .iter()
        .zip(labels.iter())
        .filter(|(p, y)| p == y)
        .count();
    hits as f64 / labels.len() as f64
}

/// Structural checks every grown tree must pass
pub fn validate_forest(forest: &Forest) {
    for tree in forest.trees() {
        tree.validate().expect("tree structure should be valid");
        assert_eq!(tree.num_nodes(), 2 * tree.num_leaves() - 1);
    }
}

/// Macro for creating test data
#[macro_export]
macro_rules! create_test_data {
    (regression, $samples:expr, $features:expr) => {{
        let features = common::create_test_features_regression($samples, $features);
        let labels = common::create_test_labels_regression(&features);
        (features, labels)
    }};

    (binary, $samples:expr, $features:expr) => {{
        let features = common::create_test_features_binary($samples, $features);
        let labels = common::create_test_labels_binary(&features);
        (features, labels)
    }};

    (multiclass, $samples:expr, $features:expr, $classes:expr) => {{
        let features = common::create_test_features_multiclass($samples, $features, $classes);
        let labels = common::create_test_labels_multiclass(&features);
        (features, labels)
    }};
}
