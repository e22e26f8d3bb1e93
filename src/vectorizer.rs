// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Bag-of-words / TF-IDF vectorization over a fixed vocabulary
//!
//! A fitted [`TextVectorizer`] is immutable: `transform` only reads the
//! vocabulary and idf weights, and terms outside the vocabulary are dropped.
//! `fit` exists for offline training only.

use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

/// Tokens are runs of two or more word characters
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Sparse feature vector with strictly increasing indices and no zero entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Build from arbitrary (index, value) pairs. Duplicate indices are summed,
    /// zeros dropped, indices at or beyond `dim` discarded.
    pub fn from_entries(dim: usize, mut entries: Vec<(usize, f64)>) -> Self {
        entries.retain(|(idx, _)| *idx < dim);
        entries.sort_by_key(|(idx, _)| *idx);

        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (idx, value) in entries {
            match merged.last_mut() {
                Some((last, acc)) if *last == idx => *acc += value,
                _ => merged.push((idx, value)),
            }
        }
        merged.retain(|(_, value)| *value != 0.0);

        Self { dim, entries: merged }
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Non-zero entries in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |(idx, _)| *idx)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Dot product with a dense weight vector; indices beyond `weights` count as zero
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|(idx, value)| weights.get(*idx).map(|w| w * value))
            .sum()
    }

    pub fn l2_norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizerKind {
    Tfidf,
    Count,
}

impl VectorizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorizerKind::Tfidf => "tfidf",
            VectorizerKind::Count => "count",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "tfidf" | "tf-idf" => Some(VectorizerKind::Tfidf),
            "count" => Some(VectorizerKind::Count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    L2,
}

/// Hyperparameters used when fitting a vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerParams {
    pub kind: VectorizerKind,
    pub max_features: Option<usize>,
    /// Minimum number of documents a term must appear in
    pub min_df: usize,
    /// Maximum fraction of documents a term may appear in
    pub max_df: f64,
    pub ngram_range: (usize, usize),
    pub sublinear_tf: bool,
    pub binary: bool,
    pub norm: Option<Norm>,
}

impl VectorizerParams {
    pub fn tfidf() -> Self {
        Self {
            kind: VectorizerKind::Tfidf,
            max_features: Some(5000),
            min_df: 5,
            max_df: 0.7,
            ngram_range: (1, 2),
            sublinear_tf: false,
            binary: false,
            norm: Some(Norm::L2),
        }
    }

    pub fn count() -> Self {
        Self {
            kind: VectorizerKind::Count,
            norm: None,
            ..Self::tfidf()
        }
    }

    pub fn for_kind(kind: VectorizerKind) -> Self {
        match kind {
            VectorizerKind::Tfidf => Self::tfidf(),
            VectorizerKind::Count => Self::count(),
        }
    }

    pub fn with_min_df(mut self, min_df: usize) -> Self {
        self.min_df = min_df;
        self
    }

    pub fn with_max_df(mut self, max_df: f64) -> Self {
        self.max_df = max_df;
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_ngram_range(mut self, min_n: usize, max_n: usize) -> Self {
        let min_n = min_n.max(1);
        self.ngram_range = (min_n, max_n.max(min_n));
        self
    }
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self::tfidf()
    }
}

/// A fitted vectorizer: vocabulary, optional idf weights and transform settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextVectorizer {
    kind: VectorizerKind,
    vocabulary: BTreeMap<String, usize>,
    #[serde(default)]
    idf: Option<Vec<f64>>,
    ngram_range: (usize, usize),
    #[serde(default)]
    norm: Option<Norm>,
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default)]
    binary: bool,
}

impl TextVectorizer {
    /// Assemble a vectorizer from already-fitted parts
    pub fn from_parts(
        kind: VectorizerKind,
        vocabulary: BTreeMap<String, usize>,
        idf: Option<Vec<f64>>,
        ngram_range: (usize, usize),
        norm: Option<Norm>,
    ) -> Self {
        Self {
            kind,
            vocabulary,
            idf,
            ngram_range,
            norm,
            sublinear_tf: false,
            binary: false,
        }
    }

    pub fn kind(&self) -> VectorizerKind {
        self.kind
    }

    /// Output dimensionality (vocabulary cardinality)
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Vocabulary terms ordered by their column index
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec![String::new(); self.vocabulary.len()];
        for (term, &idx) in &self.vocabulary {
            if let Some(slot) = names.get_mut(idx) {
                *slot = term.clone();
            }
        }
        names
    }

    /// Check internal consistency of a deserialized vectorizer
    pub fn validate(&self) -> std::result::Result<(), String> {
        let dim = self.vocabulary.len();
        let mut seen = HashSet::with_capacity(dim);
        for (term, &idx) in &self.vocabulary {
            if idx >= dim {
                return Err(format!("term '{}' has index {} outside 0..{}", term, idx, dim));
            }
            if !seen.insert(idx) {
                return Err(format!("index {} assigned to more than one term", idx));
            }
        }
        if let Some(ref idf) = self.idf {
            if idf.len() != dim {
                return Err(format!("idf has {} weights for {} terms", idf.len(), dim));
            }
        }
        if self.kind == VectorizerKind::Tfidf && self.idf.is_none() {
            return Err("tfidf vectorizer without idf weights".to_string());
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || max_n < min_n {
            return Err(format!("invalid ngram range ({}, {})", min_n, max_n));
        }
        Ok(())
    }

    /// Map text to a sparse vector over the fitted vocabulary
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in ngrams(text, self.ngram_range) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, count)| {
                let mut tf = if self.binary { 1.0 } else { count };
                if self.sublinear_tf {
                    tf = 1.0 + tf.ln();
                }
                let weight = match self.idf {
                    Some(ref idf) => tf * idf[idx],
                    None => tf,
                };
                (idx, weight)
            })
            .collect();

        if self.norm == Some(Norm::L2) {
            let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, value) in entries.iter_mut() {
                    *value /= norm;
                }
            }
        }

        SparseVector::from_entries(self.dimension(), entries)
    }

    /// Fit vocabulary (and idf weights for TF-IDF) on a corpus
    pub fn fit(documents: &[String], params: &VectorizerParams) -> Result<Self> {
        let n_docs = documents.len();
        if n_docs == 0 {
            bail!("cannot fit a vectorizer on an empty corpus");
        }

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let mut seen = HashSet::new();
            for term in ngrams(doc, params.ngram_range) {
                *term_freq.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.clone()) {
                    *doc_freq.entry(term).or_insert(0) += 1;
                }
            }
        }

        let max_doc_count = params.max_df * n_docs as f64;
        if max_doc_count < params.min_df as f64 {
            bail!(
                "max_df={} leaves fewer documents ({:.1}) than min_df={}",
                params.max_df,
                max_doc_count,
                params.min_df
            );
        }

        let mut kept: Vec<(String, usize)> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= params.min_df && df as f64 <= max_doc_count)
            .map(|(term, _)| (term.clone(), term_freq[term]))
            .collect();

        if let Some(limit) = params.max_features {
            // Most frequent terms first; alphabetical among equals keeps it deterministic
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(limit);
        }

        if kept.is_empty() {
            bail!("vocabulary is empty after pruning; lower min_df or raise max_df");
        }

        let mut terms: Vec<String> = kept.into_iter().map(|(term, _)| term).collect();
        terms.sort();
        let vocabulary: BTreeMap<String, usize> =
            terms.into_iter().enumerate().map(|(idx, term)| (term, idx)).collect();

        let idf = match params.kind {
            VectorizerKind::Tfidf => {
                let mut weights = vec![0.0; vocabulary.len()];
                for (term, &idx) in &vocabulary {
                    let df = doc_freq[term] as f64;
                    weights[idx] = ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0;
                }
                Some(weights)
            }
            VectorizerKind::Count => None,
        };

        tracing::debug!(
            kind = params.kind.as_str(),
            vocabulary = vocabulary.len(),
            documents = n_docs,
            "vectorizer fitted"
        );

        Ok(Self {
            kind: params.kind,
            vocabulary,
            idf,
            ngram_range: params.ngram_range,
            norm: params.norm,
            sublinear_tf: params.sublinear_tf,
            binary: params.binary,
        })
    }
}

fn ngrams(text: &str, (min_n, max_n): (usize, usize)) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_PATTERN.find_iter(&lowered).map(|m| m.as_str()).collect();

    let mut grams = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n > tokens.len() {
            break;
        }
        grams.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    grams
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "shocking secret revealed".to_string(),
            "official report published".to_string(),
            "shocking report".to_string(),
        ]
    }

    #[test]
    fn test_sparse_vector_from_entries() {
        let v = SparseVector::from_entries(5, vec![(3, 1.0), (1, 2.0), (3, 0.5), (4, 0.0), (9, 1.0)]);
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![(1, 2.0), (3, 1.5)]);
        assert_eq!(v.dim(), 5);
        assert_eq!(v.get(3), 1.5);
        assert_eq!(v.get(0), 0.0);
        assert_eq!(v.dot(&[1.0, 1.0, 1.0, 2.0, 1.0]), 5.0);
    }

    #[test]
    fn test_fit_sorted_vocabulary() {
        let params = VectorizerParams::tfidf()
            .with_min_df(1)
            .with_max_df(1.0)
            .with_ngram_range(1, 1);
        let vectorizer = TextVectorizer::fit(&corpus(), &params).unwrap();

        assert_eq!(
            vectorizer.feature_names(),
            vec!["official", "published", "report", "revealed", "secret", "shocking"]
        );
        assert!(vectorizer.validate().is_ok());
    }

    #[test]
    fn test_smoothed_idf() {
        let params = VectorizerParams::tfidf()
            .with_min_df(1)
            .with_max_df(1.0)
            .with_ngram_range(1, 1);
        let vectorizer = TextVectorizer::fit(&corpus(), &params).unwrap();
        let idf = vectorizer.idf.as_ref().unwrap();

        // "shocking" appears in 2 of 3 documents, "secret" in 1
        let shocking = vectorizer.index_of("shocking").unwrap();
        let secret = vectorizer.index_of("secret").unwrap();
        assert!((idf[shocking] - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
        assert!((idf[secret] - ((4.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_transform_l2_normalized_and_drops_oov() {
        let params = VectorizerParams::tfidf()
            .with_min_df(1)
            .with_max_df(1.0)
            .with_ngram_range(1, 1);
        let vectorizer = TextVectorizer::fit(&corpus(), &params).unwrap();

        let v = vectorizer.transform("shocking unicorn report");
        assert_eq!(v.nnz(), 2);
        assert_eq!(v.dim(), vectorizer.dimension());
        assert!((v.l2_norm() - 1.0).abs() < 1e-12);

        assert_eq!(vectorizer.transform("unicorn").nnz(), 0);
    }

    #[test]
    fn test_count_vectorizer_with_bigrams() {
        let params = VectorizerParams::count()
            .with_min_df(1)
            .with_max_df(1.0)
            .with_ngram_range(1, 2);
        let vectorizer = TextVectorizer::fit(&corpus(), &params).unwrap();

        let v = vectorizer.transform("shocking report shocking report");
        let bigram = vectorizer.index_of("shocking report").unwrap();
        let unigram = vectorizer.index_of("shocking").unwrap();
        assert_eq!(v.get(bigram), 2.0);
        assert_eq!(v.get(unigram), 2.0);
    }

    #[test]
    fn test_min_df_and_max_features() {
        let params = VectorizerParams::count()
            .with_min_df(2)
            .with_max_df(1.0)
            .with_ngram_range(1, 1);
        let vectorizer = TextVectorizer::fit(&corpus(), &params).unwrap();
        assert_eq!(vectorizer.feature_names(), vec!["report", "shocking"]);

        let params = VectorizerParams::count()
            .with_min_df(1)
            .with_max_df(1.0)
            .with_ngram_range(1, 1)
            .with_max_features(Some(1));
        let vectorizer = TextVectorizer::fit(&corpus(), &params).unwrap();
        // report and shocking tie on frequency; alphabetical order breaks the tie
        assert_eq!(vectorizer.feature_names(), vec!["report"]);
    }

    #[test]
    fn test_empty_vocabulary_is_error() {
        let params = VectorizerParams::tfidf().with_min_df(10).with_max_df(1.0);
        assert!(TextVectorizer::fit(&corpus(), &params).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let vocabulary: BTreeMap<String, usize> =
            [("alpha".to_string(), 0), ("beta".to_string(), 0)].into_iter().collect();
        let vectorizer =
            TextVectorizer::from_parts(VectorizerKind::Count, vocabulary, None, (1, 1), None);
        assert!(vectorizer.validate().is_err());
    }
}
