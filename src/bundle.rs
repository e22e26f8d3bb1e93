// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model bundle: fitted classifier, fitted vectorizer and vocabulary names
//!
//! On disk a bundle is a directory of JSON files:
//! - `model.json` (required)
//! - `vectorizer.json` (required)
//! - `feature_names.json` (optional; without it explanations are empty)
//! - `metadata.json` (optional; training provenance)
//!
//! A bundle is immutable once assembled and is shared read-only between
//! requests.

use crate::error::BundleError;
use crate::explain::Explainer;
use crate::metrics::EvaluationMetrics;
use crate::model::ClassifierModel;
use crate::vectorizer::TextVectorizer;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "model.json";
pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Provenance recorded by the trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub model_name: String,
    pub vectorizer_name: String,
    pub trained_at: DateTime<Utc>,
    pub dataset: String,
    pub dataset_sha256: String,
    pub seed: u64,
    pub train_samples: usize,
    pub test_samples: usize,
    #[serde(default)]
    pub metrics: Option<EvaluationMetrics>,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ModelBundle {
    classifier: ClassifierModel,
    vectorizer: TextVectorizer,
    feature_names: Option<Vec<String>>,
    explainer: Explainer,
    metadata: Option<BundleMetadata>,
}

impl ModelBundle {
    /// Assemble a bundle from in-memory parts, checking that the classifier
    /// accepts exactly the vectors the vectorizer produces.
    ///
    /// Feature names that do not cover the vocabulary are discarded with a
    /// warning; explanations then degrade to an empty list.
    pub fn from_parts(
        classifier: ClassifierModel,
        vectorizer: TextVectorizer,
        feature_names: Option<Vec<String>>,
    ) -> Result<Self, BundleError> {
        classifier.validate().map_err(|reason| BundleError::Invalid {
            path: PathBuf::from(MODEL_FILE),
            reason,
        })?;
        vectorizer.validate().map_err(|reason| BundleError::Invalid {
            path: PathBuf::from(VECTORIZER_FILE),
            reason,
        })?;

        let expected = classifier.n_features();
        let actual = vectorizer.dimension();
        if expected != actual {
            return Err(BundleError::Incompatible { expected, actual });
        }

        let feature_names = match feature_names {
            Some(names) if names.len() != actual => {
                tracing::warn!(
                    names = names.len(),
                    vocabulary = actual,
                    "feature names do not match the vocabulary; explanations disabled"
                );
                None
            }
            other => other,
        };

        let explainer = classifier.explainer();
        Ok(Self {
            classifier,
            vectorizer,
            feature_names,
            explainer,
            metadata: None,
        })
    }

    pub fn with_metadata(mut self, metadata: BundleMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Load a bundle directory
    pub fn load(dir: &Path) -> Result<Self, BundleError> {
        let classifier: ClassifierModel = read_json(&dir.join(MODEL_FILE))?;
        let vectorizer: TextVectorizer = read_json(&dir.join(VECTORIZER_FILE))?;

        let names_path = dir.join(FEATURE_NAMES_FILE);
        let feature_names = if names_path.exists() {
            Some(read_json::<Vec<String>>(&names_path)?)
        } else {
            tracing::warn!(
                "{} not found in {}; explanations will be empty",
                FEATURE_NAMES_FILE,
                dir.display()
            );
            None
        };

        let metadata_path = dir.join(METADATA_FILE);
        let metadata = if metadata_path.exists() {
            match read_json::<BundleMetadata>(&metadata_path) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable bundle metadata: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut bundle = Self::from_parts(classifier, vectorizer, feature_names)?;
        bundle.metadata = metadata;

        tracing::info!(
            model = bundle.classifier.name(),
            vectorizer = bundle.vectorizer.kind().as_str(),
            features = bundle.dimension(),
            explainer = bundle.explainer.kind(),
            "Loaded model bundle from {}",
            dir.display()
        );
        Ok(bundle)
    }

    /// Write the bundle as JSON files into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<(), BundleError> {
        fs::create_dir_all(dir).map_err(|source| BundleError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        write_json(&dir.join(MODEL_FILE), &self.classifier)?;
        write_json(&dir.join(VECTORIZER_FILE), &self.vectorizer)?;
        if let Some(ref names) = self.feature_names {
            write_json(&dir.join(FEATURE_NAMES_FILE), names)?;
        }
        if let Some(ref metadata) = self.metadata {
            write_json(&dir.join(METADATA_FILE), metadata)?;
        }

        tracing::info!("Saved model bundle to {}", dir.display());
        Ok(())
    }

    pub fn classifier(&self) -> &ClassifierModel {
        &self.classifier
    }

    pub fn vectorizer(&self) -> &TextVectorizer {
        &self.vectorizer
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn explainer(&self) -> &Explainer {
        &self.explainer
    }

    pub fn metadata(&self) -> Option<&BundleMetadata> {
        self.metadata.as_ref()
    }

    /// Feature-vector width shared by vectorizer and classifier
    pub fn dimension(&self) -> usize {
        self.vectorizer.dimension()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BundleError> {
    if !path.exists() {
        return Err(BundleError::Missing {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| BundleError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), BundleError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| BundleError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })
}
