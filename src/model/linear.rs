// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Linear classifiers over sparse vectors
//!
//! Both models score `w·x + b`. Logistic regression is fitted on the log
//! loss, the SVC on the squared hinge loss; both with L2 regularization and
//! balanced class weights, by full-batch gradient descent with a step size
//! derived from the data's Lipschitz bound.

use super::{balanced_class_weights, sigmoid, Classifier, ClassifierModel, Learner};
use crate::datasets::Label;
use crate::vectorizer::SparseVector;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Logistic regression: `P(fake) = σ(w·x + b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    coef: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Self {
        Self { coef, intercept }
    }

    pub fn coef(&self) -> &[f64] {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn decision_function(&self, features: &SparseVector) -> f64 {
        features.dot(&self.coef) + self.intercept
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn fake_probability(&self, features: &SparseVector) -> f64 {
        sigmoid(self.decision_function(features))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        check_finite(&self.coef, self.intercept)
    }
}

/// Linear support vector classifier. The margin has no probabilistic meaning
/// of its own; it is squashed through a sigmoid so that `P(fake) > 0.5`
/// exactly when the margin is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvc {
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearSvc {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Self {
        Self { coef, intercept }
    }

    pub fn coef(&self) -> &[f64] {
        &self.coef
    }

    pub fn decision_function(&self, features: &SparseVector) -> f64 {
        features.dot(&self.coef) + self.intercept
    }
}

impl Classifier for LinearSvc {
    fn name(&self) -> &str {
        "linear_svc"
    }

    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn fake_probability(&self, features: &SparseVector) -> f64 {
        sigmoid(self.decision_function(features))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        check_finite(&self.coef, self.intercept)
    }
}

fn check_finite(coef: &[f64], intercept: f64) -> std::result::Result<(), String> {
    if coef.is_empty() {
        return Err("empty coefficient vector".to_string());
    }
    if let Some(idx) = coef.iter().position(|c| !c.is_finite()) {
        return Err(format!("coefficient {} is not finite", idx));
    }
    if !intercept.is_finite() {
        return Err("intercept is not finite".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearLoss {
    Logistic,
    SquaredHinge,
}

/// Hyperparameters for the linear learners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearParams {
    pub loss: LinearLoss,
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the gradient's infinity norm drops below this
    pub tol: f64,
    pub balanced: bool,
}

impl LinearParams {
    pub fn logistic_regression() -> Self {
        Self {
            loss: LinearLoss::Logistic,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            balanced: true,
        }
    }

    pub fn linear_svc() -> Self {
        Self {
            loss: LinearLoss::SquaredHinge,
            max_iter: 10_000,
            ..Self::logistic_regression()
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Minimize `mean_i(sw_i * loss_i) + ||w||² / (2·C·n)`
    fn optimize(&self, features: &[SparseVector], labels: &[Label]) -> Result<(Vec<f64>, f64)> {
        if features.is_empty() || features.len() != labels.len() {
            bail!(
                "need matching, non-empty features and labels (got {} and {})",
                features.len(),
                labels.len()
            );
        }
        if self.c <= 0.0 {
            bail!("regularization parameter C must be positive");
        }

        let dim = features[0].dim();
        let n = features.len() as f64;
        let (w_real, w_fake) = if self.balanced {
            balanced_class_weights(labels)
        } else {
            (1.0, 1.0)
        };
        let sample_weight = |label: Label| match label {
            Label::Fake => w_fake,
            Label::Real => w_real,
        };
        let reg = 1.0 / (self.c * n);

        // Lipschitz bound of the averaged loss gradient (intercept column included)
        let curvature = match self.loss {
            LinearLoss::Logistic => 0.25,
            LinearLoss::SquaredHinge => 2.0,
        };
        let max_sq_norm = features
            .iter()
            .zip(labels)
            .map(|(x, y)| sample_weight(*y) * (x.l2_norm().powi(2) + 1.0))
            .fold(0.0, f64::max);
        let step = 1.0 / (curvature * max_sq_norm + reg);

        let mut coef = vec![0.0; dim];
        let mut intercept = 0.0;
        let mut grad = vec![0.0; dim];

        for iteration in 0..self.max_iter {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (x, label) in features.iter().zip(labels) {
                let y = match label {
                    Label::Fake => 1.0,
                    Label::Real => -1.0,
                };
                let margin = x.dot(&coef) + intercept;
                let dloss = match self.loss {
                    // d/dz log(1 + exp(-y z)) = -y σ(-y z)
                    LinearLoss::Logistic => -y * sigmoid(-y * margin),
                    LinearLoss::SquaredHinge => {
                        let slack = 1.0 - y * margin;
                        if slack > 0.0 {
                            -2.0 * y * slack
                        } else {
                            0.0
                        }
                    }
                };
                let scale = sample_weight(*label) * dloss / n;
                if scale != 0.0 {
                    for (idx, value) in x.iter() {
                        grad[idx] += scale * value;
                    }
                    grad_b += scale;
                }
            }

            let mut max_grad = grad_b.abs();
            for (g, w) in grad.iter_mut().zip(coef.iter()) {
                *g += reg * w;
                max_grad = max_grad.max(g.abs());
            }
            if max_grad < self.tol {
                tracing::debug!(iteration, "linear model converged");
                break;
            }

            for (w, g) in coef.iter_mut().zip(grad.iter()) {
                *w -= step * g;
            }
            intercept -= step * grad_b;
        }

        Ok((coef, intercept))
    }
}

impl Learner for LinearParams {
    fn name(&self) -> &str {
        match self.loss {
            LinearLoss::Logistic => "logistic_regression",
            LinearLoss::SquaredHinge => "linear_svc",
        }
    }

    fn fit(&self, features: &[SparseVector], labels: &[Label]) -> Result<ClassifierModel> {
        let (coef, intercept) = self.optimize(features, labels)?;
        Ok(match self.loss {
            LinearLoss::Logistic => {
                ClassifierModel::LogisticRegression(LogisticRegression::new(coef, intercept))
            }
            LinearLoss::SquaredHinge => ClassifierModel::LinearSvc(LinearSvc::new(coef, intercept)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feature 0 fires on fake samples, feature 1 on real ones, feature 2 on both
    fn separable() -> (Vec<SparseVector>, Vec<Label>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let noise = 0.1 * (i % 3) as f64;
            if i % 2 == 0 {
                x.push(SparseVector::from_entries(3, vec![(0, 1.0), (2, 0.5 + noise)]));
                y.push(Label::Fake);
            } else {
                x.push(SparseVector::from_entries(3, vec![(1, 1.0), (2, 0.5 + noise)]));
                y.push(Label::Real);
            }
        }
        (x, y)
    }

    #[test]
    fn test_logistic_probability() {
        let model = LogisticRegression::new(vec![2.0, -1.0], 0.0);
        let x = SparseVector::from_entries(2, vec![(0, 1.0), (1, 2.0)]);
        assert!((model.fake_probability(&x) - 0.5).abs() < 1e-12);

        let x = SparseVector::from_entries(2, vec![(0, 1.0)]);
        assert!((model.fake_probability(&x) - sigmoid(2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_fit_logistic_regression_separates() {
        let (x, y) = separable();
        let model = LinearParams::logistic_regression().fit(&x, &y).unwrap();
        let ClassifierModel::LogisticRegression(ref lr) = model else {
            panic!("expected logistic regression");
        };
        assert!(lr.coef()[0] > 0.0);
        assert!(lr.coef()[1] < 0.0);

        for (xi, yi) in x.iter().zip(&y) {
            let p = lr.fake_probability(xi);
            assert_eq!(p > 0.5, *yi == Label::Fake);
        }
    }

    #[test]
    fn test_fit_linear_svc_separates() {
        let (x, y) = separable();
        let model = LinearParams::linear_svc().with_max_iter(2000).fit(&x, &y).unwrap();
        assert_eq!(model.name(), "linear_svc");
        for (xi, yi) in x.iter().zip(&y) {
            let p = model.as_classifier().fake_probability(xi);
            assert_eq!(p > 0.5, *yi == Label::Fake);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable();
        let a = LinearParams::logistic_regression().with_max_iter(50).fit(&x, &y).unwrap();
        let b = LinearParams::logistic_regression().with_max_iter(50).fit(&x, &y).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        assert!(LogisticRegression::new(vec![1.0, f64::NAN], 0.0).validate().is_err());
        assert!(LinearSvc::new(vec![], 0.0).validate().is_err());
        assert!(LinearSvc::new(vec![1.0], 0.2).validate().is_ok());
    }
}
