// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for the fake/real classifier
//!
//! The fake class is the positive class throughout.

use crate::datasets::Label;
use serde::{Deserialize, Serialize};

/// Binary confusion matrix, fake = positive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Fake predicted as fake
    pub tp: usize,
    /// Real predicted as real
    pub tn: usize,
    /// Real predicted as fake
    pub fp: usize,
    /// Fake predicted as real
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        debug_assert_eq!(predictions.len(), ground_truth.len());

        let mut matrix = Self::default();
        for (pred, truth) in predictions.iter().zip(ground_truth) {
            match (pred, truth) {
                (Label::Fake, Label::Fake) => matrix.tp += 1,
                (Label::Real, Label::Real) => matrix.tn += 1,
                (Label::Fake, Label::Real) => matrix.fp += 1,
                (Label::Real, Label::Fake) => matrix.fn_ += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        safe_div(self.tp + self.tn, self.total())
    }

    /// TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        safe_div(self.tp, self.tp + self.fp)
    }

    /// TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        safe_div(self.tp, self.tp + self.fn_)
    }

    /// TN / (TN + FP), the recall of the real class
    pub fn specificity(&self) -> f64 {
        safe_div(self.tn, self.tn + self.fp)
    }

    /// TN / (TN + FN), the precision of the real class
    pub fn negative_predictive_value(&self) -> f64 {
        safe_div(self.tn, self.tn + self.fn_)
    }

    pub fn f1_score(&self) -> f64 {
        harmonic_mean(self.precision(), self.recall())
    }

    /// Matthews correlation coefficient, in [-1, 1]
    pub fn mcc(&self) -> f64 {
        let tp = self.tp as f64;
        let tn = self.tn as f64;
        let fp = self.fp as f64;
        let fn_ = self.fn_ as f64;

        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denominator == 0.0 {
            return 0.0;
        }
        (tp * tn - fp * fn_) / denominator
    }
}

fn safe_div(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b == 0.0 {
        0.0
    } else {
        2.0 * a * b / (a + b)
    }
}

/// Per-class precision/recall/F1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Summary of one evaluated model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1_score: f64,
    pub mcc: f64,
    /// Present when probability scores were supplied
    pub auc_roc: Option<f64>,
    /// Real first, then fake
    pub per_class: Vec<ClassMetrics>,
}

impl EvaluationMetrics {
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        let cm = ConfusionMatrix::from_predictions(predictions, ground_truth);

        let real = ClassMetrics {
            label: Label::Real,
            precision: cm.negative_predictive_value(),
            recall: cm.specificity(),
            f1_score: harmonic_mean(cm.negative_predictive_value(), cm.specificity()),
            support: cm.tn + cm.fp,
        };
        let fake = ClassMetrics {
            label: Label::Fake,
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
            support: cm.tp + cm.fn_,
        };

        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            specificity: cm.specificity(),
            f1_score: cm.f1_score(),
            mcc: cm.mcc(),
            auc_roc: None,
            per_class: vec![real, fake],
            confusion_matrix: cm,
        }
    }

    /// `probabilities` are P(fake), aligned with `ground_truth`
    pub fn from_predictions_with_probs(
        predictions: &[Label],
        ground_truth: &[Label],
        probabilities: &[f64],
    ) -> Self {
        let mut metrics = Self::from_predictions(predictions, ground_truth);
        metrics.auc_roc = Some(auc_roc(ground_truth, probabilities));
        metrics
    }

    /// Plain-text report in the familiar precision/recall/f1/support layout
    pub fn classification_report(&self) -> String {
        let mut output = format!(
            "{:>12} {:>10} {:>10} {:>10} {:>10}\n\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for class in &self.per_class {
            output.push_str(&format!(
                "{:>12} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
                class.label.as_str(),
                class.precision,
                class.recall,
                class.f1_score,
                class.support
            ));
        }

        let support = self.confusion_matrix.total();
        output.push_str(&format!(
            "\n{:>12} {:>10} {:>10} {:>10.4} {:>10}\n",
            "accuracy", "", "", self.accuracy, support
        ));

        let n_classes = self.per_class.len().max(1) as f64;
        let macro_avg = |f: fn(&ClassMetrics) -> f64| self.per_class.iter().map(f).sum::<f64>() / n_classes;
        output.push_str(&format!(
            "{:>12} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
            "macro avg",
            macro_avg(|c| c.precision),
            macro_avg(|c| c.recall),
            macro_avg(|c| c.f1_score),
            support
        ));
        output
    }

    /// Confusion matrix with actual classes as rows
    pub fn format_confusion_matrix(&self) -> String {
        let cm = &self.confusion_matrix;
        format!(
            "                 Predicted\n                 Real     Fake\nActual Real   {:>6}   {:>6}\n       Fake   {:>6}   {:>6}\n",
            cm.tn, cm.fp, cm.fn_, cm.tp
        )
    }

    pub fn format(&self) -> String {
        let mut output = self.classification_report();
        output.push_str(&format!("\nMCC:         {:.4}\n", self.mcc));
        output.push_str(&format!("Specificity: {:.4}\n", self.specificity));
        if let Some(auc) = self.auc_roc {
            output.push_str(&format!("AUC-ROC:     {:.4}\n", auc));
        }
        output.push('\n');
        output.push_str(&self.format_confusion_matrix());
        output
    }
}

/// Area under the ROC curve via the rank statistic; tied scores share their
/// average rank. Returns 0.5 when either class is absent.
pub fn auc_roc(ground_truth: &[Label], probabilities: &[f64]) -> f64 {
    let mut pairs: Vec<(f64, Label)> = probabilities
        .iter()
        .copied()
        .zip(ground_truth.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n_pos = pairs.iter().filter(|(_, l)| *l == Label::Fake).count() as f64;
    let n_neg = pairs.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return 0.5;
    }

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < pairs.len() {
        let mut end = start;
        while end + 1 < pairs.len() && pairs[end + 1].0 == pairs[start].0 {
            end += 1;
        }
        // ranks are 1-based
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        let positives = pairs[start..=end].iter().filter(|(_, l)| *l == Label::Fake).count();
        positive_rank_sum += average_rank * positives as f64;
        start = end + 1;
    }

    (positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Label::{Fake, Real};

    #[test]
    fn test_confusion_matrix_perfect() {
        let predictions = vec![Fake, Fake, Real, Real];
        let cm = ConfusionMatrix::from_predictions(&predictions, &predictions);

        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (2, 2, 0, 0));
        assert!((cm.accuracy() - 1.0).abs() < 1e-6);
        assert!((cm.f1_score() - 1.0).abs() < 1e-6);
        assert!((cm.mcc() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_confusion_matrix_worst() {
        let predictions = vec![Real, Real, Fake, Fake];
        let ground_truth = vec![Fake, Fake, Real, Real];
        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth);

        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (0, 0, 2, 2));
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.f1_score(), 0.0);
        assert!((cm.mcc() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_precision_recall() {
        // 3 fake, 5 real; model flags 4 as fake, 2 of them correctly
        let ground_truth = vec![Fake, Fake, Fake, Real, Real, Real, Real, Real];
        let predictions = vec![Fake, Fake, Real, Fake, Fake, Real, Real, Real];
        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth);

        assert!((cm.precision() - 0.5).abs() < 1e-12);
        assert!((cm.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.specificity() - 0.6).abs() < 1e-12);
        assert!((cm.f1_score() - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_roc_perfect_and_inverted() {
        let truth = vec![Fake, Fake, Real, Real];
        assert!((auc_roc(&truth, &[0.9, 0.8, 0.2, 0.1]) - 1.0).abs() < 1e-12);
        assert!(auc_roc(&truth, &[0.1, 0.2, 0.8, 0.9]).abs() < 1e-12);
    }

    #[test]
    fn test_auc_roc_ties_count_half() {
        let truth = vec![Fake, Real];
        assert!((auc_roc(&truth, &[0.5, 0.5]) - 0.5).abs() < 1e-12);

        let truth = vec![Fake, Fake, Real, Real];
        // one positive beats both negatives, the other ties with one of them
        let auc = auc_roc(&truth, &[0.9, 0.4, 0.4, 0.1]);
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_auc_roc_single_class() {
        assert_eq!(auc_roc(&[Fake, Fake], &[0.2, 0.9]), 0.5);
    }

    #[test]
    fn test_classification_report_layout() {
        let predictions = vec![Fake, Fake, Real, Real];
        let ground_truth = vec![Fake, Real, Real, Real];
        let metrics = EvaluationMetrics::from_predictions_with_probs(
            &predictions,
            &ground_truth,
            &[0.9, 0.7, 0.3, 0.2],
        );

        assert_eq!(metrics.per_class[0].support, 3);
        assert_eq!(metrics.per_class[1].support, 1);
        let report = metrics.format();
        assert!(report.contains("precision"));
        assert!(report.contains("macro avg"));
        assert!(report.contains("AUC-ROC"));
        assert!(report.contains("Actual Real"));
    }
}
