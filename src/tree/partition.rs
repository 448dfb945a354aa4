//! Per-tree sample arrays and in-place range partitioning.

use crate::core::constants::{CLASS_LABEL_TOLERANCE, MAX_CLASS_LABEL};
use crate::core::error::{Result, WoodError};
use crate::core::types::{FeatureIndex, LearningType, SampleWeight, Value};
use crate::dataset::Dataset;
use crate::tree::sampling::SampleSet;
use std::collections::HashMap;

/// Validates a classification label and returns it as a class id.
///
/// Labels must be non-negative integers (within a small tolerance) no larger
/// than [`MAX_CLASS_LABEL`].
pub fn class_label(value: Value) -> Result<usize> {
    let rounded = value.round();
    if (value - rounded).powi(2) > CLASS_LABEL_TOLERANCE {
        return Err(WoodError::data(format!(
            "class label {} is not an integer",
            value
        )));
    }
    if rounded < 0.0 || rounded > MAX_CLASS_LABEL as f64 {
        return Err(WoodError::data(format!(
            "class label {} is outside [0, {}]",
            value, MAX_CLASS_LABEL
        )));
    }
    Ok(rounded as usize)
}

/// The samples of one tree, stored as parallel arrays.
///
/// Every node owns a contiguous range `[start, end)` of these arrays; the
/// partitioner reorders a range so that the left child's samples come first.
/// For classification, `labels` holds class ids mapped to `0..n_classes` in
/// first-seen order and `classes` maps them back.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSamples {
    pub indices: Vec<usize>,
    pub weights: Vec<SampleWeight>,
    pub labels: Vec<Value>,
    classes: Vec<Value>,
}

impl TreeSamples {
    /// Gathers the labels of `set` and maps class labels.
    pub fn new(dataset: &Dataset<'_>, set: &SampleSet, learning_type: LearningType) -> Result<Self> {
        let mut labels = Vec::with_capacity(set.len());
        let mut classes = Vec::new();

        match learning_type {
            LearningType::Regression => {
                labels.extend(set.indices().iter().map(|&i| dataset.label(i)));
            }
            LearningType::Classification => {
                let mut mapping: HashMap<usize, usize> = HashMap::new();
                for &i in set.indices() {
                    let class = class_label(dataset.label(i))?;
                    let mapped = *mapping.entry(class).or_insert_with(|| {
                        classes.push(class as Value);
                        classes.len() - 1
                    });
                    labels.push(mapped as Value);
                }
            }
        }

        Ok(TreeSamples {
            indices: set.indices().to_vec(),
            weights: set.weights().to_vec(),
            labels,
            classes,
        })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of distinct classes (0 for regression)
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Maps a class id back to its label. Regression values pass through.
    pub fn decode(&self, value: Value) -> Value {
        if self.classes.is_empty() {
            value
        } else {
            self.classes[value as usize]
        }
    }

    pub fn labels_in(&self, start: usize, end: usize) -> &[Value] {
        &self.labels[start..end]
    }

    pub fn weights_in(&self, start: usize, end: usize) -> &[SampleWeight] {
        &self.weights[start..end]
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.indices.swap(a, b);
        self.weights.swap(a, b);
        self.labels.swap(a, b);
    }
}

/// Reorders `[start, end)` so samples with `x[feature] <= threshold` come
/// first and returns the first right-hand position.
pub fn partition_range(
    dataset: &Dataset<'_>,
    samples: &mut TreeSamples,
    start: usize,
    end: usize,
    feature: FeatureIndex,
    threshold: Value,
) -> usize {
    let mut p = start;
    let mut e = end;
    while p < e {
        if dataset.value(samples.indices[p], feature) <= threshold {
            p += 1;
        } else {
            e -= 1;
            samples.swap(p, e);
        }
    }
    p
}
