//! ROC analysis for threshold calibration.

use serde::{Deserialize, Serialize};

/// Receiver operating characteristic of a scored binary labelling.
///
/// Index 0 is the origin (nothing predicted positive, threshold +inf);
/// every further point corresponds to one distinct observed score, in
/// descending order, predicting positive when `score >= threshold`.
#[derive(Clone, Debug, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Build the curve. `None` when either class has no members.
    pub fn new(labels: &[bool], scores: &[f64]) -> Option<Self> {
        let positives = labels.iter().filter(|l| **l).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 || labels.len() != scores.len() {
            return None;
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut curve = Self {
            fpr: vec![0.0],
            tpr: vec![0.0],
            thresholds: vec![f64::INFINITY],
        };
        let (mut tp, mut fp) = (0usize, 0usize);
        let mut i = 0;
        while i < order.len() {
            let threshold = scores[order[i]];
            while i < order.len() && scores[order[i]] == threshold {
                if labels[order[i]] {
                    tp += 1;
                } else {
                    fp += 1;
                }
                i += 1;
            }
            curve.fpr.push(fp as f64 / negatives as f64);
            curve.tpr.push(tp as f64 / positives as f64);
            curve.thresholds.push(threshold);
        }
        Some(curve)
    }

    /// Area under the curve by the trapezoidal rule.
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }

    /// Index and threshold maximizing Youden's J = TPR - FPR over the
    /// observed scores. The first maximum wins.
    pub fn youden(&self) -> (usize, f64) {
        let mut best = (1, f64::NEG_INFINITY);
        for i in 1..self.thresholds.len() {
            let j = self.tpr[i] - self.fpr[i];
            if j > best.1 {
                best = (i, j);
            }
        }
        (best.0, self.thresholds[best.0])
    }
}

/// How well a threshold separates observed edges from sampled non-edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Probability threshold chosen by Youden's J
    pub threshold: f64,
    /// Area under the ROC curve; NaN when undefined
    pub auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    /// Observed edges scored
    pub positives: usize,
    /// Non-edges scored
    pub negatives: usize,
}

impl CalibrationReport {
    /// Score `score >= threshold` predictions against labels.
    ///
    /// Precision and recall are 0 when their denominators are.
    pub fn evaluate(labels: &[bool], scores: &[f64], threshold: f64, auc: f64) -> Self {
        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        for (&label, &score) in labels.iter().zip(scores) {
            match (label, score >= threshold) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        Self {
            threshold,
            auc,
            accuracy: ratio(tp + tn, labels.len()),
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
            positives: tp + fn_,
            negatives: tn + fp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_separation() {
        let labels = [true, true, false, false];
        let scores = [0.9, 0.8, 0.3, 0.1];
        let roc = RocCurve::new(&labels, &scores).unwrap();

        assert_eq!(roc.thresholds[0], f64::INFINITY);
        assert_eq!(roc.thresholds[1..], [0.9, 0.8, 0.3, 0.1]);
        assert!((roc.auc() - 1.0).abs() < 1e-12);

        let (idx, threshold) = roc.youden();
        assert_eq!(idx, 2);
        assert_eq!(threshold, 0.8);

        let report = CalibrationReport::evaluate(&labels, &scores, threshold, roc.auc());
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.precision, 1.0);
        assert_eq!(report.recall, 1.0);
        assert_eq!((report.positives, report.negatives), (2, 2));
    }

    #[test]
    fn test_ties_collapse_to_one_point() {
        let labels = [true, false, true, false];
        let scores = [0.5, 0.5, 0.5, 0.5];
        let roc = RocCurve::new(&labels, &scores).unwrap();
        assert_eq!(roc.fpr, vec![0.0, 1.0]);
        assert_eq!(roc.tpr, vec![0.0, 1.0]);
        assert!((roc.auc() - 0.5).abs() < 1e-12);
        assert_eq!(roc.youden(), (1, 0.5));
    }

    #[test]
    fn test_youden_inside_observed_range() {
        let labels = [true, false, true, false, true, false];
        let scores = [0.7, 0.65, 0.4, 0.2, 0.9, 0.5];
        let roc = RocCurve::new(&labels, &scores).unwrap();
        let (idx, threshold) = roc.youden();

        assert!(scores.contains(&threshold));
        let best_j = roc.tpr[idx] - roc.fpr[idx];
        for i in 1..roc.tpr.len() {
            assert!(roc.tpr[i] - roc.fpr[i] <= best_j);
        }
    }

    #[test]
    fn test_auc_matches_pair_counting() {
        let labels = [true, false, true, false, false];
        let scores = [0.8, 0.6, 0.5, 0.55, 0.1];
        let roc = RocCurve::new(&labels, &scores).unwrap();
        // positive > negative pairs: 0.8 beats all 3, 0.5 beats 0.1 -> 4 / 6
        assert!((roc.auc() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_undefined() {
        assert!(RocCurve::new(&[true, true], &[0.2, 0.3]).is_none());
        assert!(RocCurve::new(&[false], &[0.2]).is_none());
        assert!(RocCurve::new(&[], &[]).is_none());
    }

    #[test]
    fn test_evaluate_no_predicted_positives() {
        let report = CalibrationReport::evaluate(&[true, false], &[0.1, 0.2], 0.9, 0.5);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.accuracy, 0.5);
    }
}
