//! Training data view for HugeWood.
//!
//! A [`Dataset`] borrows a feature matrix and a label vector without copying.
//! The matrix may be stored sample-major (`n × d`) or feature-major
//! (`d × n`); both are exposed through the same `(sample, feature)` indexing.

use crate::core::error::{Result, WoodError};
use crate::core::types::{FeatureIndex, Value};
use ndarray::{ArrayView1, ArrayView2, Axis};

/// Memory orientation of the borrowed feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per sample
    SampleMajor,
    /// One row per feature
    FeatureMajor,
}

/// Borrowed training data.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    /// Logical `n × d` view, whatever the storage orientation
    features: ArrayView2<'a, Value>,
    labels: ArrayView1<'a, Value>,
    layout: Layout,
}

impl<'a> Dataset<'a> {
    /// Wraps an `n × d` feature matrix and `n` labels.
    pub fn new(features: ArrayView2<'a, Value>, labels: ArrayView1<'a, Value>) -> Result<Self> {
        Self::checked(features, labels, Layout::SampleMajor)
    }

    /// Wraps a `d × n` feature matrix and `n` labels.
    pub fn from_feature_major(
        features: ArrayView2<'a, Value>,
        labels: ArrayView1<'a, Value>,
    ) -> Result<Self> {
        Self::checked(features.reversed_axes(), labels, Layout::FeatureMajor)
    }

    fn checked(
        features: ArrayView2<'a, Value>,
        labels: ArrayView1<'a, Value>,
        layout: Layout,
    ) -> Result<Self> {
        let (num_samples, num_features) = features.dim();

        if num_samples == 0 {
            return Err(WoodError::data("dataset has no samples"));
        }
        if num_features == 0 {
            return Err(WoodError::data("dataset has no features"));
        }
        if labels.len() != num_samples {
            return Err(WoodError::dimension_mismatch(
                format!("{} labels", num_samples),
                format!("{} labels", labels.len()),
            ));
        }
        if let Some(position) = features.iter().position(|v| !v.is_finite()) {
            return Err(WoodError::data(format!(
                "non-finite feature value at flat position {}",
                position
            )));
        }
        if let Some(position) = labels.iter().position(|v| !v.is_finite()) {
            return Err(WoodError::data(format!(
                "non-finite label for sample {}",
                position
            )));
        }

        Ok(Dataset {
            features,
            labels,
            layout,
        })
    }

    /// Number of samples `n`
    pub fn num_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Number of features `d`
    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Storage orientation of the borrowed matrix
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Feature `feature` of sample `sample`
    #[inline]
    pub fn value(&self, sample: usize, feature: FeatureIndex) -> Value {
        self.features[[sample, feature]]
    }

    /// Label of sample `sample`
    #[inline]
    pub fn label(&self, sample: usize) -> Value {
        self.labels[sample]
    }

    /// All labels
    pub fn labels(&self) -> ArrayView1<'a, Value> {
        self.labels
    }

    /// Feature vector of one sample
    pub fn row(&self, sample: usize) -> ArrayView1<'_, Value> {
        self.features.index_axis(Axis(0), sample)
    }

    /// Logical `n × d` feature view
    pub fn features(&self) -> ArrayView2<'a, Value> {
        self.features
    }
}
