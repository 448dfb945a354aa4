//! Best-split search for a single node.

use crate::core::constants::FEATURE_THRESHOLD;
use crate::core::random::Random;
use crate::core::types::{FeatureIndex, TreeType, Value};
use crate::dataset::Dataset;
use crate::tree::criterion::{Criterion, Sample, SplitStatistics};
use crate::tree::partition::TreeSamples;
use crate::tree::sort::intro_sort_by_key;

/// Set of features known to be constant inside a node's sample range.
///
/// Children inherit a copy: a feature constant on a range stays constant on
/// every sub-range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantFeatures {
    words: Vec<u64>,
    count: usize,
}

impl ConstantFeatures {
    pub fn new(num_features: usize) -> Self {
        ConstantFeatures {
            words: vec![0; (num_features + 63) / 64],
            count: 0,
        }
    }

    /// Marks `feature` constant. Returns false if it already was.
    pub fn insert(&mut self, feature: FeatureIndex) -> bool {
        let (word, bit) = (feature / 64, feature % 64);
        let mask = 1u64 << bit;
        if self.words[word] & mask != 0 {
            return false;
        }
        self.words[word] |= mask;
        self.count += 1;
        true
    }

    pub fn contains(&self, feature: FeatureIndex) -> bool {
        self.words
            .get(feature / 64)
            .map_or(false, |word| word & (1u64 << (feature % 64)) != 0)
    }

    /// Number of features marked constant
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Best split found for a node
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRecord {
    /// `None` until some feature produced a split
    pub feature: Option<FeatureIndex>,
    pub threshold: Value,
    /// Absolute position of the first right-hand sample after partitioning
    pub pos: usize,
    /// Impurity of the node itself
    pub impurity: f64,
    pub impurity_left: f64,
    pub impurity_right: f64,
    pub improvement: f64,
    pub prob_left: f64,
    pub prob_right: f64,
    /// Every tested feature was constant
    pub leaf_detected: bool,
}

impl SplitRecord {
    pub fn new() -> Self {
        SplitRecord {
            feature: None,
            threshold: 0.0,
            pos: 0,
            impurity: 0.0,
            impurity_left: 0.0,
            impurity_right: 0.0,
            improvement: f64::MIN,
            prob_left: 0.0,
            prob_right: 0.0,
            leaf_detected: false,
        }
    }

    fn accept(&mut self, feature: FeatureIndex, threshold: Value, start: usize, stats: &SplitStatistics) {
        self.feature = Some(feature);
        self.threshold = threshold;
        self.pos = start + stats.pos;
        self.impurity_left = stats.impurity_left;
        self.impurity_right = stats.impurity_right;
        self.improvement = stats.improvement;
        self.prob_left = stats.prob_left;
        self.prob_right = stats.prob_right;
    }
}

impl Default for SplitRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-tree split search with reusable scratch buffers.
#[derive(Debug, Clone)]
pub struct SplitSearch {
    criterion: Criterion,
    tree_type: TreeType,
    max_features: usize,
    min_samples_leaf: usize,
    permutation: Vec<FeatureIndex>,
    buffer: Vec<Sample>,
}

impl SplitSearch {
    pub fn new(
        criterion: Criterion,
        tree_type: TreeType,
        max_features: usize,
        min_samples_leaf: usize,
    ) -> Self {
        SplitSearch {
            criterion,
            tree_type,
            max_features: max_features.max(1),
            min_samples_leaf,
            permutation: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Searches features of the range `[start, end)` in random order.
    ///
    /// The search stops once `max_features` positions of the permutation have
    /// been walked and at least one non-constant feature was tested, so
    /// constant features do not use up the budget.
    pub fn find_best_split(
        &mut self,
        dataset: &Dataset<'_>,
        samples: &TreeSamples,
        start: usize,
        end: usize,
        constant: &mut ConstantFeatures,
        rng: &mut Random,
    ) -> SplitRecord {
        let mut best = SplitRecord::new();
        best.impurity = self
            .criterion
            .node_impurity(samples.labels_in(start, end), samples.weights_in(start, end));

        let d = dataset.num_features();
        self.permutation.clear();
        self.permutation.extend(0..d);
        for i in 0..d {
            let r = i + rng.next_int(d - i);
            self.permutation.swap(i, r);
        }

        let mut non_constant_tested = 0;
        for j in 0..d {
            let feature = self.permutation[j];
            if self.test_feature(dataset, samples, start, end, feature, constant, rng, &mut best) {
                non_constant_tested += 1;
            }
            if j + 1 >= self.max_features && non_constant_tested > 0 {
                break;
            }
        }

        if non_constant_tested == 0 {
            best.leaf_detected = true;
        }

        log::trace!(
            "split search [{}, {}): feature={:?} threshold={} improvement={}",
            start,
            end,
            best.feature,
            best.threshold,
            best.improvement
        );
        best
    }

    /// Tests one feature. Returns false if the feature is constant.
    #[allow(clippy::too_many_arguments)]
    fn test_feature(
        &mut self,
        dataset: &Dataset<'_>,
        samples: &TreeSamples,
        start: usize,
        end: usize,
        feature: FeatureIndex,
        constant: &mut ConstantFeatures,
        rng: &mut Random,
        best: &mut SplitRecord,
    ) -> bool {
        if constant.contains(feature) {
            return false;
        }

        self.buffer.clear();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for k in start..end {
            let value = dataset.value(samples.indices[k], feature);
            min = min.min(value);
            max = max.max(value);
            self.buffer.push(Sample {
                value,
                label: samples.labels[k],
                weight: samples.weights[k],
            });
        }

        if max <= min + FEATURE_THRESHOLD {
            constant.insert(feature);
            return false;
        }

        let threshold = match self.tree_type {
            TreeType::Standard => self.optimal_threshold(),
            TreeType::Randomized => Some(rng.next_uniform(min, max)),
        };

        if let Some(threshold) = threshold {
            if let Some(stats) = self.criterion.evaluate_threshold(&self.buffer, threshold) {
                if stats.improvement > best.improvement {
                    best.accept(feature, threshold, start, &stats);
                }
            }
        }
        true
    }

    /// Sorted sweep over the gathered samples. `None` if no position leaves
    /// `min_samples_leaf` samples on both sides.
    fn optimal_threshold(&mut self) -> Option<Value> {
        intro_sort_by_key(&mut self.buffer, |s| s.value);

        let n = self.buffer.len();
        let mut acc = self.criterion.accumulator(&self.buffer);
        let mut best_improvement = f64::MIN;
        let mut threshold = None;

        let mut p = 0;
        while p < n {
            while p + 1 < n && self.buffer[p + 1].value <= self.buffer[p].value + FEATURE_THRESHOLD {
                p += 1;
            }
            p += 1;
            if p >= n {
                break;
            }
            if p < self.min_samples_leaf || n - p < self.min_samples_leaf {
                continue;
            }

            self.criterion.update(&mut acc, &self.buffer, p);
            if let Some(stats) = self.criterion.statistics(&acc) {
                if stats.improvement > best_improvement {
                    best_improvement = stats.improvement;
                    let (below, above) = (self.buffer[p - 1].value, self.buffer[p].value);
                    let mid = (below + above) / 2.0;
                    threshold = Some(if mid == above { below } else { mid });
                }
            }
        }

        threshold
    }
}
