//! Split criteria.
//!
//! Variance (MSE) for regression and Gini for classification, each with an
//! "even" variant that trades improvement against the weight imbalance of
//! the two children:
//!
//! ```text
//! improvement      = parent - fl * left - fr * right
//! even improvement = (1 - lambda) * improvement - lambda * |fl - fr|
//! ```
//!
//! Classification labels are expected to be mapped to `0..n_classes`.

use crate::core::error::{Result, WoodError};
use crate::core::types::{SampleWeight, SplitCriterion, Value};

/// One `(feature value, label, weight)` triple of the node being split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: Value,
    pub label: Value,
    pub weight: SampleWeight,
}

/// Impurities and weight fractions of a candidate split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitStatistics {
    /// Number of samples on the left side
    pub pos: usize,
    pub impurity: f64,
    pub impurity_left: f64,
    pub impurity_right: f64,
    pub improvement: f64,
    pub prob_left: f64,
    pub prob_right: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Statistics {
    Variance {
        sum_left: f64,
        squares_left: f64,
        sum_total: f64,
        squares_total: f64,
    },
    ClassCounts {
        left: Vec<f64>,
        total: Vec<f64>,
    },
}

/// Running left/right statistics of an incremental sweep.
///
/// Samples `[0, pos)` of the sorted slice are on the left.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pos: usize,
    weight_left: f64,
    weight_total: f64,
    stats: Statistics,
}

/// Criterion evaluator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criterion {
    kind: SplitCriterion,
    lambda: f64,
    n_classes: usize,
}

impl Criterion {
    /// `n_classes` is ignored by the variance criteria.
    pub fn new(kind: SplitCriterion, lambda: f64, n_classes: usize) -> Self {
        Criterion {
            kind,
            lambda,
            n_classes,
        }
    }

    pub fn kind(&self) -> SplitCriterion {
        self.kind
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Checks that `labels` suit this criterion. Class criteria need mapped
    /// labels in `0..n_classes`; labels outside that range are otherwise
    /// left out of the class counts.
    pub fn check_labels(&self, labels: &[Value]) -> Result<()> {
        if self.kind.is_regression() {
            return Ok(());
        }
        if self.n_classes == 0 {
            return Err(WoodError::config(format!(
                "criterion {} needs classification samples",
                self.kind
            )));
        }
        match labels
            .iter()
            .find(|&&y| !(y >= 0.0 && y.fract() == 0.0 && (y as usize) < self.n_classes))
        {
            Some(&y) => Err(WoodError::data(format!(
                "mapped class {} is outside [0, {})",
                y, self.n_classes
            ))),
            None => Ok(()),
        }
    }

    /// Starts a sweep with every sample on the right.
    pub fn accumulator(&self, samples: &[Sample]) -> Accumulator {
        let weight_total: f64 = samples.iter().map(|s| s.weight as f64).sum();
        let stats = if self.kind.is_regression() {
            let (sum_total, squares_total) = samples.iter().fold((0.0, 0.0), |(sum, sq), s| {
                let w = s.weight as f64;
                (sum + w * s.label, sq + w * s.label * s.label)
            });
            Statistics::Variance {
                sum_left: 0.0,
                squares_left: 0.0,
                sum_total,
                squares_total,
            }
        } else {
            let mut total = vec![0.0; self.n_classes];
            for s in samples {
                if let Some(count) = total.get_mut(s.label as usize) {
                    *count += s.weight as f64;
                }
            }
            Statistics::ClassCounts {
                left: vec![0.0; self.n_classes],
                total,
            }
        };

        Accumulator {
            pos: 0,
            weight_left: 0.0,
            weight_total,
            stats,
        }
    }

    /// Moves samples `[acc.pos, new_pos)` from the right to the left.
    pub fn update(&self, acc: &mut Accumulator, samples: &[Sample], new_pos: usize) {
        debug_assert!(new_pos >= acc.pos && new_pos <= samples.len());
        for s in &samples[acc.pos..new_pos] {
            let w = s.weight as f64;
            acc.weight_left += w;
            match &mut acc.stats {
                Statistics::Variance {
                    sum_left,
                    squares_left,
                    ..
                } => {
                    *sum_left += w * s.label;
                    *squares_left += w * s.label * s.label;
                }
                Statistics::ClassCounts { left, .. } => {
                    if let Some(count) = left.get_mut(s.label as usize) {
                        *count += w;
                    }
                }
            }
        }
        acc.pos = new_pos;
    }

    /// Scores the current position of `acc`. `None` if a side is empty.
    pub fn statistics(&self, acc: &Accumulator) -> Option<SplitStatistics> {
        let weight_right = acc.weight_total - acc.weight_left;
        if acc.weight_left <= 0.0 || weight_right <= 0.0 {
            return None;
        }

        let (impurity, impurity_left, impurity_right) = match &acc.stats {
            Statistics::Variance {
                sum_left,
                squares_left,
                sum_total,
                squares_total,
            } => (
                variance(*sum_total, *squares_total, acc.weight_total),
                variance(*sum_left, *squares_left, acc.weight_left),
                variance(
                    sum_total - sum_left,
                    squares_total - squares_left,
                    weight_right,
                ),
            ),
            Statistics::ClassCounts { left, total } => (
                gini(total.iter().copied(), acc.weight_total),
                gini(left.iter().copied(), acc.weight_left),
                gini(total.iter().zip(left).map(|(t, l)| t - l), weight_right),
            ),
        };

        let prob_left = acc.weight_left / acc.weight_total;
        let prob_right = weight_right / acc.weight_total;

        Some(SplitStatistics {
            pos: acc.pos,
            impurity,
            impurity_left,
            impurity_right,
            improvement: self.improvement(
                impurity,
                impurity_left,
                impurity_right,
                prob_left,
                prob_right,
            ),
            prob_left,
            prob_right,
        })
    }

    /// One-pass evaluation of `value <= threshold` going left.
    pub fn evaluate_threshold(&self, samples: &[Sample], threshold: Value) -> Option<SplitStatistics> {
        let mut acc = self.accumulator(samples);
        let mut pos = 0;
        for s in samples {
            if s.value <= threshold {
                let w = s.weight as f64;
                acc.weight_left += w;
                match &mut acc.stats {
                    Statistics::Variance {
                        sum_left,
                        squares_left,
                        ..
                    } => {
                        *sum_left += w * s.label;
                        *squares_left += w * s.label * s.label;
                    }
                    Statistics::ClassCounts { left, .. } => {
                        if let Some(count) = left.get_mut(s.label as usize) {
                            *count += w;
                        }
                    }
                }
                pos += 1;
            }
        }
        acc.pos = pos;
        self.statistics(&acc)
    }

    /// Weighted impurity of a whole node.
    pub fn node_impurity(&self, labels: &[Value], weights: &[SampleWeight]) -> f64 {
        let weight_total: f64 = weights.iter().map(|&w| w as f64).sum();
        if weight_total <= 0.0 {
            return 0.0;
        }
        if self.kind.is_regression() {
            let (sum, squares) = labels
                .iter()
                .zip(weights)
                .fold((0.0, 0.0), |(sum, sq), (&y, &w)| {
                    let w = w as f64;
                    (sum + w * y, sq + w * y * y)
                });
            variance(sum, squares, weight_total)
        } else {
            gini(self.class_counts(labels, weights).into_iter(), weight_total)
        }
    }

    /// Weighted mean for regression, or the mapped class with the largest
    /// weighted count (first maximum wins).
    pub fn leaf_value(&self, labels: &[Value], weights: &[SampleWeight]) -> Value {
        if self.kind.is_regression() {
            let (sum, weight) = labels
                .iter()
                .zip(weights)
                .fold((0.0, 0.0), |(sum, total), (&y, &w)| {
                    (sum + w as f64 * y, total + w as f64)
                });
            if weight > 0.0 {
                sum / weight
            } else {
                0.0
            }
        } else {
            let counts = self.class_counts(labels, weights);
            let mut best = 0;
            for (class, &count) in counts.iter().enumerate() {
                if count > counts[best] {
                    best = class;
                }
            }
            best as Value
        }
    }

    fn class_counts(&self, labels: &[Value], weights: &[SampleWeight]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for (&y, &w) in labels.iter().zip(weights) {
            if let Some(count) = counts.get_mut(y as usize) {
                *count += w as f64;
            }
        }
        counts
    }

    fn improvement(
        &self,
        impurity: f64,
        impurity_left: f64,
        impurity_right: f64,
        prob_left: f64,
        prob_right: f64,
    ) -> f64 {
        let improvement = impurity - prob_left * impurity_left - prob_right * impurity_right;
        if self.kind.is_even_split() {
            (1.0 - self.lambda) * improvement - self.lambda * (prob_left - prob_right).abs()
        } else {
            improvement
        }
    }
}

fn variance(sum: f64, squares: f64, weight: f64) -> f64 {
    let mean = sum / weight;
    (squares / weight - mean * mean).max(0.0)
}

fn gini<I: Iterator<Item = f64>>(counts: I, weight: f64) -> f64 {
    counts
        .map(|c| {
            let p = c / weight;
            p * (1.0 - p)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn samples(values: &[f64], labels: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .zip(labels)
            .map(|(&value, &label)| Sample {
                value,
                label,
                weight: 1,
            })
            .collect()
    }

    #[test]
    fn test_mse_four_points() {
        let criterion = Criterion::new(SplitCriterion::Mse, 0.0, 0);
        let data = samples(&[1.0, 2.0, 3.0, 4.0], &[1.0, 1.0, 5.0, 5.0]);

        let stats = criterion.evaluate_threshold(&data, 2.5).unwrap();
        assert_eq!(stats.pos, 2);
        assert_abs_diff_eq!(stats.impurity, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.impurity_left, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.impurity_right, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.improvement, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.prob_left, 0.5);
    }

    #[test]
    fn test_gini_pure_split() {
        let criterion = Criterion::new(SplitCriterion::Gini, 0.0, 2);
        let data = samples(&[0.0, 1.0, 2.0, 3.0], &[0.0, 0.0, 1.0, 1.0]);

        let stats = criterion.evaluate_threshold(&data, 1.0).unwrap();
        assert_eq!(stats.pos, 2);
        assert_abs_diff_eq!(stats.impurity, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.improvement, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_side_is_not_a_split() {
        let criterion = Criterion::new(SplitCriterion::Mse, 0.0, 0);
        let data = samples(&[1.0, 2.0], &[0.0, 1.0]);
        assert!(criterion.evaluate_threshold(&data, 5.0).is_none());
        assert!(criterion.evaluate_threshold(&data, 0.0).is_none());
    }

    #[test]
    fn test_even_penalty() {
        let plain = Criterion::new(SplitCriterion::Mse, 0.0, 0);
        let even = Criterion::new(SplitCriterion::EvenMse, 0.5, 0);
        let data = samples(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 10.0]);

        let a = plain.evaluate_threshold(&data, 3.0).unwrap();
        let b = even.evaluate_threshold(&data, 3.0).unwrap();
        let expected = 0.5 * a.improvement - 0.5 * (0.75f64 - 0.25).abs();
        assert_abs_diff_eq!(b.improvement, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_even_gini_uses_class_counts() {
        let even = Criterion::new(SplitCriterion::EvenGini, 1.0, 2);
        let data = samples(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.0, 0.0, 1.0]);

        // lambda = 1 leaves only the imbalance term
        let stats = even.evaluate_threshold(&data, 0.0).unwrap();
        assert_abs_diff_eq!(stats.improvement, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_check_labels() {
        let gini = Criterion::new(SplitCriterion::Gini, 0.0, 2);
        assert!(gini.check_labels(&[0.0, 1.0, 1.0]).is_ok());
        assert_eq!(gini.check_labels(&[0.0, 2.0]).unwrap_err().category(), "data");
        assert_eq!(gini.check_labels(&[0.5]).unwrap_err().category(), "data");

        let unmapped = Criterion::new(SplitCriterion::EvenGini, 0.0, 0);
        assert_eq!(unmapped.check_labels(&[3.7]).unwrap_err().category(), "config");
        assert!(Criterion::new(SplitCriterion::Mse, 0.0, 0).check_labels(&[3.7]).is_ok());

        // out-of-range classes are not counted instead of indexing past the end
        let data = [
            Sample { value: 0.0, label: 0.0, weight: 1 },
            Sample { value: 1.0, label: 7.0, weight: 1 },
        ];
        let mut acc = gini.accumulator(&data);
        gini.update(&mut acc, &data, 1);
        assert_eq!(gini.statistics(&acc).unwrap().pos, 1);
        assert_eq!(gini.leaf_value(&[7.0, 1.0], &[5, 1]), 1.0);
    }

    #[test]
    fn test_leaf_values() {
        let regression = Criterion::new(SplitCriterion::Mse, 0.0, 0);
        assert_abs_diff_eq!(regression.leaf_value(&[1.0, 4.0], &[2, 1]), 2.0);

        let classification = Criterion::new(SplitCriterion::Gini, 0.0, 3);
        assert_eq!(classification.leaf_value(&[2.0, 1.0, 1.0], &[1, 1, 1]), 1.0);
        // ties go to the lowest class
        assert_eq!(classification.leaf_value(&[2.0, 0.0], &[1, 1]), 0.0);
    }

    #[test]
    fn test_node_impurity_matches_statistics() {
        let criterion = Criterion::new(SplitCriterion::Gini, 0.0, 2);
        let data = samples(&[0.0, 1.0, 2.0], &[0.0, 1.0, 1.0]);
        let labels: Vec<f64> = data.iter().map(|s| s.label).collect();
        let weights: Vec<u32> = data.iter().map(|s| s.weight).collect();

        let stats = criterion.evaluate_threshold(&data, 0.5).unwrap();
        assert_abs_diff_eq!(criterion.node_impurity(&labels, &weights), stats.impurity);
    }

    proptest! {
        #[test]
        fn prop_incremental_matches_one_pass(
            labels in proptest::collection::vec(0u8..3, 2..60),
            weights in proptest::collection::vec(1u32..4, 60),
            regression in any::<bool>(),
        ) {
            let kind = if regression { SplitCriterion::EvenMse } else { SplitCriterion::EvenGini };
            let criterion = Criterion::new(kind, 0.3, 3);
            let data: Vec<Sample> = labels
                .iter()
                .enumerate()
                .map(|(i, &y)| Sample { value: i as f64, label: y as f64, weight: weights[i] })
                .collect();

            let mut acc = criterion.accumulator(&data);
            for p in 1..data.len() {
                criterion.update(&mut acc, &data, p);
                let incremental = criterion.statistics(&acc).unwrap();
                let direct = criterion.evaluate_threshold(&data, p as f64 - 0.5).unwrap();
                prop_assert_eq!(incremental.pos, direct.pos);
                prop_assert!((incremental.improvement - direct.improvement).abs() < 1e-9);
                prop_assert!((incremental.impurity_left - direct.impurity_left).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_stepwise_update_matches_single_update(
            labels in proptest::collection::vec(0u8..3, 2..60),
            weights in proptest::collection::vec(1u32..4, 60),
            cuts in proptest::collection::vec(0usize..60, 0..10),
            regression in any::<bool>(),
        ) {
            let kind = if regression { SplitCriterion::Mse } else { SplitCriterion::Gini };
            let criterion = Criterion::new(kind, 0.0, 3);
            let data: Vec<Sample> = labels
                .iter()
                .enumerate()
                .map(|(i, &y)| Sample { value: i as f64, label: y as f64, weight: weights[i] })
                .collect();
            let target = data.len() - 1;

            let mut stops: Vec<usize> = cuts.into_iter().map(|c| c % data.len()).collect();
            stops.push(target);
            stops.sort_unstable();

            let mut stepped = criterion.accumulator(&data);
            for &stop in &stops {
                criterion.update(&mut stepped, &data, stop);
            }
            let mut single = criterion.accumulator(&data);
            criterion.update(&mut single, &data, target);

            prop_assert_eq!(&stepped, &single);
            prop_assert_eq!(criterion.statistics(&stepped), criterion.statistics(&single));
        }
    }
}
