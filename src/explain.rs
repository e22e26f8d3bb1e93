// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Term-level explanations for a single prediction
//!
//! The explanation strategy is picked once, when a bundle is assembled, from
//! what the classifier exposes:
//! - tree ensembles contribute their global feature importance for every
//!   term present in the input
//! - linear models contribute `coefficient × value`, signed, so negative
//!   weights point towards "real"
//!
//! Anything else (or a bundle without feature names) explains nothing.

use crate::vectorizer::SparseVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of terms reported per prediction
pub const DEFAULT_TOP_TERMS: usize = 10;

/// Explanation capability of a loaded classifier
#[derive(Debug, Clone)]
pub enum Explainer {
    /// Global feature importances, indexed by vocabulary position
    TreeEnsemble(Arc<[f64]>),
    /// Coefficients of the fake-class decision function
    Linear(Arc<[f64]>),
    Unsupported,
}

/// One vocabulary term and its signed contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermContribution {
    pub term: String,
    pub weight: f64,
}

impl Explainer {
    pub fn kind(&self) -> &'static str {
        match self {
            Explainer::TreeEnsemble(_) => "tree_ensemble",
            Explainer::Linear(_) => "linear",
            Explainer::Unsupported => "unsupported",
        }
    }

    /// Top `top_n` contributing terms, ordered by descending absolute weight.
    ///
    /// Equal magnitudes keep ascending vocabulary-index order. Indices without
    /// a name or a weight are skipped. Never fails: missing names or an
    /// unsupported model give an empty list.
    pub fn rank(
        &self,
        vector: &SparseVector,
        feature_names: Option<&[String]>,
        top_n: usize,
    ) -> Vec<TermContribution> {
        let Some(names) = feature_names else {
            return Vec::new();
        };

        let mut contributions: Vec<TermContribution> = match self {
            Explainer::Unsupported => return Vec::new(),
            Explainer::TreeEnsemble(importances) => vector
                .iter()
                .filter_map(|(idx, _)| {
                    let term = names.get(idx)?;
                    let weight = *importances.get(idx)?;
                    Some(TermContribution {
                        term: term.clone(),
                        weight,
                    })
                })
                .collect(),
            Explainer::Linear(coef) => vector
                .iter()
                .filter_map(|(idx, value)| {
                    let term = names.get(idx)?;
                    let weight = coef.get(idx)? * value;
                    Some(TermContribution {
                        term: term.clone(),
                        weight,
                    })
                })
                .collect(),
        };

        contributions.retain(|c| c.weight.is_finite());
        // sort_by is stable, so ties stay in index order
        contributions.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        contributions.truncate(top_n);
        contributions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["bombshell".to_string(), "official".to_string(), "report".to_string()]
    }

    #[test]
    fn test_linear_fixture_exact_output() {
        let explainer = Explainer::Linear(Arc::from(vec![2.0, -1.5, 0.25]));
        let vector = SparseVector::from_entries(3, vec![(0, 0.5), (1, 0.75), (2, 0.2)]);
        let names = names();

        let ranked = explainer.rank(&vector, Some(names.as_slice()), 10);
        assert_eq!(
            ranked,
            vec![
                TermContribution { term: "official".to_string(), weight: -1.125 },
                TermContribution { term: "bombshell".to_string(), weight: 1.0 },
                TermContribution { term: "report".to_string(), weight: 0.05 },
            ]
        );
    }

    #[test]
    fn test_tree_importance_ignores_vector_value() {
        let explainer = Explainer::TreeEnsemble(Arc::from(vec![0.1, 0.6, 0.3]));
        let vector = SparseVector::from_entries(3, vec![(0, 5.0), (2, 0.01)]);
        let names = names();

        let ranked = explainer.rank(&vector, Some(names.as_slice()), 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].term, "report");
        assert_eq!(ranked[0].weight, 0.3);
        assert_eq!(ranked[1].term, "bombshell");
        assert_eq!(ranked[1].weight, 0.1);
    }

    #[test]
    fn test_ties_keep_index_order() {
        let explainer = Explainer::Linear(Arc::from(vec![1.0, -1.0, 1.0]));
        let vector = SparseVector::from_entries(3, vec![(0, 1.0), (1, 1.0), (2, 1.0)]);
        let names = names();

        let ranked = explainer.rank(&vector, Some(names.as_slice()), 10);
        let terms: Vec<&str> = ranked.iter().map(|c| c.term.as_str()).collect();
        assert_eq!(terms, vec!["bombshell", "official", "report"]);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let dim = 25;
        let coef: Vec<f64> = (0..dim).map(|i| i as f64).collect();
        let names: Vec<String> = (0..dim).map(|i| format!("term{}", i)).collect();
        let vector = SparseVector::from_entries(dim, (0..dim).map(|i| (i, 1.0)).collect());

        let ranked = Explainer::Linear(Arc::from(coef)).rank(&vector, Some(names.as_slice()), DEFAULT_TOP_TERMS);
        assert_eq!(ranked.len(), DEFAULT_TOP_TERMS);
        assert_eq!(ranked[0].term, "term24");
        for pair in ranked.windows(2) {
            assert!(pair[0].weight.abs() >= pair[1].weight.abs());
        }
    }

    #[test]
    fn test_degrades_to_empty() {
        let vector = SparseVector::from_entries(3, vec![(0, 1.0)]);
        let names = names();

        assert!(Explainer::Unsupported.rank(&vector, Some(names.as_slice()), 10).is_empty());
        assert!(Explainer::Linear(Arc::from(vec![1.0, 1.0, 1.0]))
            .rank(&vector, None, 10)
            .is_empty());
        assert!(Explainer::Linear(Arc::from(vec![1.0, 1.0, 1.0]))
            .rank(&SparseVector::zeros(3), Some(names.as_slice()), 10)
            .is_empty());
    }
}
