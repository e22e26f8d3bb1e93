// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Gradient-boosted regression trees
//!
//! Log-loss boosting for the fake class. The raw score starts at the prior
//! log-odds; every stage fits a shallow least-squares tree to the residuals
//! `y - p` and sets each leaf with a single Newton step
//! `sum(residual) / sum(p * (1 - p))`.

use super::{sigmoid, Classifier, ClassifierModel, Learner};
use crate::datasets::Label;
use crate::vectorizer::SparseVector;
use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressionNode {
    /// `x[feature] <= threshold` goes left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// One boosting stage; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    pub fn from_nodes(nodes: Vec<RegressionNode>) -> Self {
        Self { nodes }
    }

    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![RegressionNode::Leaf { value }],
        }
    }

    pub fn nodes(&self) -> &[RegressionNode] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(RegressionNode::Split { left, right, .. }) = self.nodes.get(idx) {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }

    pub fn predict(&self, features: &SparseVector) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(RegressionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if features.get(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Some(RegressionNode::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                RegressionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {} splits on feature {} of {}", idx, feature, n_features));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", idx));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= len {
                            return Err(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                }
                RegressionNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} has a non-finite value", idx));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Additive ensemble of regression trees on the log-odds scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_features: usize,
    /// Prior log-odds of the fake class
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    /// Mean squared-error decrease per feature, summing to 1; empty when unknown
    #[serde(default)]
    feature_importances: Vec<f64>,
}

impl GradientBoosting {
    pub fn from_parts(
        n_features: usize,
        init: f64,
        learning_rate: f64,
        trees: Vec<RegressionTree>,
        feature_importances: Vec<f64>,
    ) -> Self {
        Self {
            n_features,
            init,
            learning_rate,
            trees,
            feature_importances,
        }
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Raw log-odds score
    pub fn decision_function(&self, features: &SparseVector) -> f64 {
        let boost: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        self.init + self.learning_rate * boost
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &str {
        "gradient_boosting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn fake_probability(&self, features: &SparseVector) -> f64 {
        sigmoid(self.decision_function(features))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.init.is_finite() {
            return Err("non-finite initial score".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(format!("invalid learning rate {}", self.learning_rate));
        }
        if self.trees.is_empty() {
            return Err("ensemble has no trees".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|reason| format!("tree {}: {}", idx, reason))?;
        }
        if !self.feature_importances.is_empty() && self.feature_importances.len() != self.n_features {
            return Err(format!(
                "{} importances for {} features",
                self.feature_importances.len(),
                self.n_features
            ));
        }
        Ok(())
    }
}

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Fraction of rows drawn (without replacement) for each stage
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl BoostingParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }
}

impl Learner for BoostingParams {
    fn name(&self) -> &str {
        "gradient_boosting"
    }

    fn fit(&self, features: &[SparseVector], labels: &[Label]) -> Result<ClassifierModel> {
        if features.is_empty() || features.len() != labels.len() {
            bail!(
                "need matching, non-empty features and labels (got {} and {})",
                features.len(),
                labels.len()
            );
        }
        if self.n_estimators == 0 {
            bail!("boosting needs at least one stage");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            bail!("learning rate must be positive (got {})", self.learning_rate);
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            bail!("subsample must be in (0, 1] (got {})", self.subsample);
        }

        let n = features.len();
        let n_features = features[0].dim();
        let targets: Vec<f64> = labels.iter().map(|label| label.to_binary() as f64).collect();

        let prior = (targets.iter().sum::<f64>() / n as f64).clamp(1e-15, 1.0 - 1e-15);
        let init = (prior / (1.0 - prior)).ln();
        let mut raw = vec![init; n];

        let builder = RegressionTreeBuilder {
            features,
            n_features,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split.max(2),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n).collect();
        let stage_rows = ((n as f64 * self.subsample).round() as usize).clamp(1, n);

        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; n_features];
        for _ in 0..self.n_estimators {
            let probabilities: Vec<f64> = raw.iter().map(|&score| sigmoid(score)).collect();
            let residuals: Vec<f64> = targets.iter().zip(&probabilities).map(|(y, p)| y - p).collect();
            let hessians: Vec<f64> = probabilities.iter().map(|p| p * (1.0 - p)).collect();

            let rows = if stage_rows < n {
                order.shuffle(&mut rng);
                let mut rows = order[..stage_rows].to_vec();
                rows.sort_unstable();
                rows
            } else {
                order.clone()
            };

            let (tree, tree_importances) = builder.build(rows, &residuals, &hessians);
            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&tree_importances) {
                    *acc += value / total;
                }
            }
            for (score, x) in raw.iter_mut().zip(features) {
                *score += self.learning_rate * tree.predict(x);
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        tracing::debug!(
            stages = trees.len(),
            init,
            "gradient boosting fitted"
        );

        Ok(ClassifierModel::GradientBoosting(GradientBoosting::from_parts(
            n_features,
            init,
            self.learning_rate,
            trees,
            importances,
        )))
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct RegressionTreeBuilder<'a> {
    features: &'a [SparseVector],
    n_features: usize,
    max_depth: usize,
    min_samples_split: usize,
}

impl RegressionTreeBuilder<'_> {
    /// Grow one least-squares tree over `root` rows. Returns the tree and the
    /// unnormalized squared-error decrease per feature.
    fn build(&self, root: Vec<usize>, residuals: &[f64], hessians: &[f64]) -> (RegressionTree, Vec<f64>) {
        let mut nodes = vec![RegressionNode::Leaf { value: 0.0 }];
        let mut importances = vec![0.0; self.n_features];
        let mut stack = vec![(0usize, root, 0usize)];

        while let Some((node_idx, rows, depth)) = stack.pop() {
            let split = if depth >= self.max_depth || rows.len() < self.min_samples_split {
                None
            } else {
                self.best_split(&rows, residuals)
            };

            let Some(split) = split else {
                nodes[node_idx] = RegressionNode::Leaf {
                    value: newton_step(&rows, residuals, hessians),
                };
                continue;
            };

            let (left, right): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&row| self.features[row].get(split.feature) <= split.threshold);

            let left_idx = nodes.len();
            let right_idx = left_idx + 1;
            nodes.push(RegressionNode::Leaf { value: 0.0 });
            nodes.push(RegressionNode::Leaf { value: 0.0 });
            nodes[node_idx] = RegressionNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_idx,
                right: right_idx,
            };
            importances[split.feature] += split.decrease;

            stack.push((right_idx, right, depth + 1));
            stack.push((left_idx, left, depth + 1));
        }

        (RegressionTree::from_nodes(nodes), importances)
    }

    /// Largest squared-error decrease over every feature present in the node;
    /// ties keep the lower feature index
    fn best_split(&self, rows: &[usize], residuals: &[f64]) -> Option<SplitCandidate> {
        let count = rows.len() as f64;
        let total: f64 = rows.iter().map(|&row| residuals[row]).sum();
        let parent_score = total * total / count;

        let present: BTreeSet<usize> = rows
            .iter()
            .flat_map(|&row| self.features[row].iter().map(|(idx, _)| idx))
            .collect();

        let mut best: Option<SplitCandidate> = None;
        for feature in present {
            let mut column: Vec<(f64, f64)> = rows
                .iter()
                .map(|&row| (self.features[row].get(feature), residuals[row]))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_count = 0.0;
            for pos in 0..column.len() - 1 {
                let (value, residual) = column[pos];
                left_sum += residual;
                left_count += 1.0;
                let next = column[pos + 1].0;
                if next <= value {
                    continue;
                }

                let right_sum = total - left_sum;
                let right_count = count - left_count;
                let decrease =
                    left_sum * left_sum / left_count + right_sum * right_sum / right_count - parent_score;

                if decrease > 1e-12 && best.map_or(true, |b| decrease > b.decrease) {
                    let mut threshold = (value + next) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

fn newton_step(rows: &[usize], residuals: &[f64], hessians: &[f64]) -> f64 {
    let numerator: f64 = rows.iter().map(|&row| residuals[row]).sum();
    let denominator: f64 = rows.iter().map(|&row| hessians[row]).sum();
    if denominator.abs() < 1e-150 {
        0.0
    } else {
        numerator / denominator
    }
}
