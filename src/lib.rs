// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fake news detector
//!
//! This crate provides:
//! - Text normalization (cleaning, stopwords, lemmatization)
//! - Stylistic features (exclamations, caps, clickbait, emotional language)
//! - TF-IDF / count vectorization over a trained vocabulary
//! - Linear and tree-ensemble classifiers with term-level explanations
//! - Model bundles persisted as JSON
//! - Training and model selection with seeded randomness
//! - An HTTP API serving predictions

pub mod analyzer;
pub mod bundle;
pub mod config;
pub mod datasets;
pub mod error;
pub mod explain;
pub mod features;
pub mod lemmatizer;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod server;
pub mod stopwords;
pub mod training;
pub mod vectorizer;

pub use analyzer::{Analyzer, PredictionResult};
pub use bundle::{BundleMetadata, ModelBundle};
pub use config::{ServerConfig, TrainingConfig};
pub use datasets::{Dataset, Label, Sample};
pub use error::{BundleError, DetectorError, Stage};
pub use explain::{Explainer, TermContribution};
pub use features::StylisticFeatures;
pub use metrics::{ConfusionMatrix, EvaluationMetrics};
pub use model::{Classifier, ClassifierModel, ClassProbabilities};
pub use normalize::TextNormalizer;
pub use training::{TrainingOutcome, TrainingPipeline, TrainingResults};
pub use vectorizer::{SparseVector, TextVectorizer, VectorizerKind};
