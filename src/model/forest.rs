// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Random forest over sparse vectors
//!
//! CART trees with weighted Gini impurity, bootstrap sampling and a random
//! feature subset per split. Trees are stored as flat node arrays; a split
//! always points forward to its children, so prediction terminates on any
//! validated tree.

use super::{balanced_class_weights, Classifier, ClassifierModel, Learner};
use crate::datasets::Label;
use crate::vectorizer::SparseVector;
use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// `x[feature] <= threshold` goes left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        fake_fraction: f64,
    },
}

/// One fitted decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// A single-leaf tree predicting a constant
    pub fn leaf(fake_fraction: f64) -> Self {
        Self {
            nodes: vec![TreeNode::Leaf { fake_fraction }],
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(TreeNode::Split { left, right, .. }) = self.nodes.get(idx) {
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
                Some(TreeNode::Split {
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
                Some(TreeNode::Leaf { fake_fraction }) => return *fake_fraction,
                None => return 0.5,
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
                TreeNode::Split {
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
                TreeNode::Leaf { fake_fraction } => {
                    if !(0.0..=1.0).contains(fake_fraction) {
                        return Err(format!("leaf {} has fraction {}", idx, fake_fraction));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
    /// Mean impurity decrease per feature, summing to 1; empty when unknown
    #[serde(default)]
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn from_parts(n_features: usize, trees: Vec<DecisionTree>, feature_importances: Vec<f64>) -> Self {
        Self {
            n_features,
            trees,
            feature_importances,
        }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn fake_probability(&self, features: &SparseVector) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
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

/// Random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Unlimited when `None`
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features examined per split; `None` means `sqrt(n_features)`
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub balanced: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            bootstrap: true,
            balanced: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn features_per_split(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().round() as usize)
            .clamp(1, n_features.max(1))
    }
}

impl Learner for ForestParams {
    fn name(&self) -> &str {
        "random_forest"
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
            bail!("a forest needs at least one tree");
        }

        let n_features = features[0].dim();
        let (w_real, w_fake) = if self.balanced {
            balanced_class_weights(labels)
        } else {
            (1.0, 1.0)
        };
        let class_weight: Vec<f64> = labels
            .iter()
            .map(|label| match label {
                Label::Fake => w_fake,
                Label::Real => w_real,
            })
            .collect();

        let builder = TreeBuilder {
            features,
            labels,
            n_features,
            mtry: self.features_per_split(n_features),
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split.max(2),
        };

        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; n_features];
        for tree_idx in 0..self.n_estimators {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));

            let mut multiplicity = vec![0usize; features.len()];
            if self.bootstrap {
                for _ in 0..features.len() {
                    multiplicity[rng.gen_range(0..features.len())] += 1;
                }
            } else {
                multiplicity.iter_mut().for_each(|m| *m = 1);
            }
            let samples: Vec<WeightedSample> = multiplicity
                .iter()
                .enumerate()
                .filter(|(_, &m)| m > 0)
                .map(|(idx, &m)| WeightedSample {
                    index: idx,
                    weight: m as f64 * class_weight[idx],
                })
                .collect();

            let (tree, tree_importances) = builder.build(samples, &mut rng);
            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&tree_importances) {
                    *acc += value / total;
                }
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        tracing::debug!(
            trees = trees.len(),
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "random forest fitted"
        );

        Ok(ClassifierModel::RandomForest(RandomForest::from_parts(
            n_features, trees, importances,
        )))
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedSample {
    index: usize,
    weight: f64,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct TreeBuilder<'a> {
    features: &'a [SparseVector],
    labels: &'a [Label],
    n_features: usize,
    mtry: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
}

impl TreeBuilder<'_> {
    /// Grow one tree with an explicit work stack. Returns the tree and the
    /// unnormalized impurity decrease per feature.
    fn build(&self, root: Vec<WeightedSample>, rng: &mut ChaCha8Rng) -> (DecisionTree, Vec<f64>) {
        let mut nodes = vec![TreeNode::Leaf { fake_fraction: 0.5 }];
        let mut importances = vec![0.0; self.n_features];
        let mut stack = vec![(0usize, root, 0usize)];

        while let Some((node_idx, samples, depth)) = stack.pop() {
            let (fake_weight, total_weight) = self.class_totals(&samples);
            let fake_fraction = if total_weight > 0.0 {
                fake_weight / total_weight
            } else {
                0.5
            };

            let depth_exhausted = self.max_depth.is_some_and(|max| depth >= max);
            let pure = fake_weight <= 0.0 || fake_weight >= total_weight;
            let split = if depth_exhausted || pure || samples.len() < self.min_samples_split {
                None
            } else {
                self.best_split(&samples, rng)
            };

            let Some(split) = split else {
                nodes[node_idx] = TreeNode::Leaf { fake_fraction };
                continue;
            };

            let (left, right): (Vec<_>, Vec<_>) = samples
                .into_iter()
                .partition(|s| self.features[s.index].get(split.feature) <= split.threshold);

            let left_idx = nodes.len();
            let right_idx = left_idx + 1;
            nodes.push(TreeNode::Leaf { fake_fraction });
            nodes.push(TreeNode::Leaf { fake_fraction });
            nodes[node_idx] = TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_idx,
                right: right_idx,
            };
            importances[split.feature] += split.decrease;

            stack.push((right_idx, right, depth + 1));
            stack.push((left_idx, left, depth + 1));
        }

        (DecisionTree::from_nodes(nodes), importances)
    }

    fn class_totals(&self, samples: &[WeightedSample]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(fake, total), s| {
            let is_fake = self.labels[s.index] == Label::Fake;
            (fake + if is_fake { s.weight } else { 0.0 }, total + s.weight)
        })
    }

    /// Best Gini split among a random subset of the features present in the
    /// node. Keeps drawing past `mtry` until at least one valid split is found.
    fn best_split(&self, samples: &[WeightedSample], rng: &mut ChaCha8Rng) -> Option<SplitCandidate> {
        let (fake_total, weight_total) = self.class_totals(samples);
        let parent_impurity = weight_total * gini(fake_total, weight_total);

        let present: BTreeSet<usize> = samples
            .iter()
            .flat_map(|s| self.features[s.index].iter().map(|(idx, _)| idx))
            .collect();
        let mut candidates: Vec<usize> = present.into_iter().collect();
        candidates.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        for (tried, &feature) in candidates.iter().enumerate() {
            if tried >= self.mtry && best.is_some() {
                break;
            }

            let mut column: Vec<(f64, f64, bool)> = samples
                .iter()
                .map(|s| {
                    (
                        self.features[s.index].get(feature),
                        s.weight,
                        self.labels[s.index] == Label::Fake,
                    )
                })
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_fake = 0.0;
            let mut left_weight = 0.0;
            for pos in 0..column.len() - 1 {
                let (value, weight, is_fake) = column[pos];
                left_weight += weight;
                if is_fake {
                    left_fake += weight;
                }
                let next = column[pos + 1].0;
                if next <= value {
                    continue;
                }

                let right_weight = weight_total - left_weight;
                let right_fake = fake_total - left_fake;
                let child_impurity = left_weight * gini(left_fake, left_weight)
                    + right_weight * gini(right_fake, right_weight);
                let decrease = parent_impurity - child_impurity;

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

fn gini(fake_weight: f64, total_weight: f64) -> f64 {
    if total_weight <= 0.0 {
        return 0.0;
    }
    let p = fake_weight / total_weight;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}
