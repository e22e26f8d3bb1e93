// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Classifier family used by the detector
//!
//! Implements:
//! - Logistic regression (linear, native probabilities)
//! - Linear SVC (linear, probabilities from the sigmoid of the margin)
//! - Random forest (tree ensemble with impurity-based importances)
//! - Gradient boosting (additive regression trees on the log-odds scale)
//!
//! Every model maps a [`SparseVector`] to `P(fake)`. Fitting is only used
//! by the offline trainer; inference never mutates a model.

pub mod boosting;
pub mod forest;
pub mod linear;

pub use boosting::{BoostingParams, GradientBoosting, RegressionNode, RegressionTree};
pub use forest::{DecisionTree, ForestParams, RandomForest, TreeNode};
pub use linear::{LinearParams, LinearSvc, LogisticRegression};

use crate::datasets::Label;
use crate::error::{DetectorError, Result, Stage};
use crate::explain::Explainer;
use crate::vectorizer::SparseVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Class probability pair, `real + fake == 1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub real: f64,
    pub fake: f64,
}

impl ClassProbabilities {
    pub fn from_fake(fake: f64) -> Self {
        let fake = fake.clamp(0.0, 1.0);
        Self {
            real: 1.0 - fake,
            fake,
        }
    }

    /// "fake" only when strictly above one half; a tie resolves to "real"
    pub fn label(&self) -> Label {
        if self.fake > 0.5 {
            Label::Fake
        } else {
            Label::Real
        }
    }

    /// Distance from the decision boundary rescaled to [0, 1]
    pub fn confidence(&self) -> f64 {
        ((self.fake - 0.5).abs() * 2.0).min(1.0)
    }
}

/// Common interface of every fitted classifier
pub trait Classifier: Send + Sync {
    /// Short model identifier
    fn name(&self) -> &str;

    /// Input width the model was trained on
    fn n_features(&self) -> usize;

    /// Probability of the fake class for an input of the expected width
    fn fake_probability(&self, features: &SparseVector) -> f64;

    /// Consistency check for deserialized parameters
    fn validate(&self) -> std::result::Result<(), String>;
}

/// Persisted classifier, tagged by model type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierModel {
    LogisticRegression(LogisticRegression),
    LinearSvc(LinearSvc),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl ClassifierModel {
    pub fn as_classifier(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::LogisticRegression(model) => model,
            ClassifierModel::LinearSvc(model) => model,
            ClassifierModel::RandomForest(model) => model,
            ClassifierModel::GradientBoosting(model) => model,
        }
    }

    pub fn name(&self) -> &str {
        self.as_classifier().name()
    }

    pub fn n_features(&self) -> usize {
        self.as_classifier().n_features()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        self.as_classifier().validate()
    }

    /// Class probabilities for one vector. The vector width must match the
    /// width the model was trained on.
    pub fn predict_probabilities(&self, features: &SparseVector) -> Result<ClassProbabilities> {
        let expected = self.n_features();
        if features.dim() != expected {
            return Err(DetectorError::DimensionMismatch {
                stage: Stage::Classify,
                expected,
                actual: features.dim(),
            });
        }

        let fake = self.as_classifier().fake_probability(features);
        if !fake.is_finite() {
            return Err(DetectorError::pipeline(
                Stage::Classify,
                format!("{} produced a non-finite probability", self.name()),
            ));
        }
        Ok(ClassProbabilities::from_fake(fake))
    }

    /// Explanation capability, decided from what the model exposes
    pub fn explainer(&self) -> Explainer {
        match self {
            ClassifierModel::LogisticRegression(model) => {
                Explainer::Linear(Arc::from(model.coef()))
            }
            ClassifierModel::LinearSvc(model) => Explainer::Linear(Arc::from(model.coef())),
            ClassifierModel::RandomForest(model) => {
                if model.feature_importances().is_empty() {
                    Explainer::Unsupported
                } else {
                    Explainer::TreeEnsemble(Arc::from(model.feature_importances()))
                }
            }
            ClassifierModel::GradientBoosting(model) => {
                if model.feature_importances().is_empty() {
                    Explainer::Unsupported
                } else {
                    Explainer::TreeEnsemble(Arc::from(model.feature_importances()))
                }
            }
        }
    }
}

/// Something that can fit a [`ClassifierModel`] from labelled vectors
pub trait Learner: Send + Sync {
    /// Identifier used in reports and on the command line
    fn name(&self) -> &str;

    fn fit(&self, features: &[SparseVector], labels: &[Label]) -> anyhow::Result<ClassifierModel>;
}

/// Balanced class weights: `n_samples / (2 * n_class)`
pub(crate) fn balanced_class_weights(labels: &[Label]) -> (f64, f64) {
    let n = labels.len() as f64;
    let n_fake = labels.iter().filter(|l| **l == Label::Fake).count() as f64;
    let n_real = n - n_fake;
    let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 0.0 };
    (weight(n_real), weight(n_fake))
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_rule_boundary() {
        assert_eq!(ClassProbabilities::from_fake(0.5).label(), Label::Real);
        assert_eq!(ClassProbabilities::from_fake(0.500001).label(), Label::Fake);
        assert_eq!(ClassProbabilities::from_fake(0.2).label(), Label::Real);
    }

    #[test]
    fn test_confidence_monotonic() {
        assert_eq!(ClassProbabilities::from_fake(0.5).confidence(), 0.0);
        assert!((ClassProbabilities::from_fake(1.0).confidence() - 1.0).abs() < 1e-12);
        assert!((ClassProbabilities::from_fake(0.0).confidence() - 1.0).abs() < 1e-12);

        let near = ClassProbabilities::from_fake(0.6).confidence();
        let far = ClassProbabilities::from_fake(0.9).confidence();
        assert!(far > near);
        let near_low = ClassProbabilities::from_fake(0.4).confidence();
        let far_low = ClassProbabilities::from_fake(0.05).confidence();
        assert!(far_low > near_low);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        for p in [0.0, 0.13, 0.5, 0.77, 1.0] {
            let probs = ClassProbabilities::from_fake(p);
            assert!((probs.real + probs.fake - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dimension_mismatch_is_structured() {
        let model = ClassifierModel::LogisticRegression(LogisticRegression::new(vec![0.5, -0.5, 1.0], 0.0));
        let err = model
            .predict_probabilities(&SparseVector::zeros(5))
            .unwrap_err();
        match err {
            DetectorError::DimensionMismatch { expected, actual, .. } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_serde_tagging() {
        let model = ClassifierModel::LinearSvc(LinearSvc::new(vec![1.0, 2.0], -0.5));
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["type"], "linear_svc");
        assert_eq!(json["intercept"], -0.5);

        let back: ClassifierModel = serde_json::from_value(json).unwrap();
        assert_eq!(back.name(), "linear_svc");
        assert_eq!(back.n_features(), 2);
    }

    #[test]
    fn test_explainer_selection() {
        let linear = ClassifierModel::LogisticRegression(LogisticRegression::new(vec![1.0], 0.0));
        assert!(matches!(linear.explainer(), Explainer::Linear(_)));

        let forest = ClassifierModel::RandomForest(RandomForest::from_parts(
            1,
            vec![DecisionTree::leaf(0.7)],
            vec![1.0],
        ));
        assert!(matches!(forest.explainer(), Explainer::TreeEnsemble(_)));

        let bare = ClassifierModel::RandomForest(RandomForest::from_parts(
            1,
            vec![DecisionTree::leaf(0.7)],
            vec![],
        ));
        assert!(matches!(bare.explainer(), Explainer::Unsupported));

        let boosted = ClassifierModel::GradientBoosting(GradientBoosting::from_parts(
            1,
            0.0,
            0.1,
            vec![RegressionTree::leaf(0.3)],
            vec![1.0],
        ));
        assert!(matches!(boosted.explainer(), Explainer::TreeEnsemble(_)));
    }

    #[test]
    fn test_balanced_class_weights() {
        let labels = [Label::Fake, Label::Real, Label::Real, Label::Real];
        let (real, fake) = balanced_class_weights(&labels);
        assert!((real - 4.0 / 6.0).abs() < 1e-12);
        assert!((fake - 2.0).abs() < 1e-12);
    }
}
