// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Runtime configuration for the server and the trainer

use crate::explain::DEFAULT_TOP_TERMS;
use crate::model::{BoostingParams, ForestParams, LinearParams, Learner};
use crate::vectorizer::{VectorizerKind, VectorizerParams};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the model bundle
    pub model_dir: PathBuf,
    /// Terms reported per prediction
    pub top_terms: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_dir: PathBuf::from("models"),
            top_terms: DEFAULT_TOP_TERMS,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        match addr.parse() {
            Ok(addr) => Ok(addr),
            Err(_) => bail!("invalid listen address: {}", addr),
        }
    }
}

/// Model names accepted by the trainer
pub const MODEL_NAMES: &[&str] = &["logistic_regression", "random_forest", "gradient_boosting", "linear_svc"];

/// Offline training settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Random seed for splitting and stochastic learners
    pub seed: u64,
    /// "csv" or "synthetic"
    pub dataset_id: String,
    /// CSV file (required for the csv dataset)
    pub dataset_path: Option<PathBuf>,
    /// Size of the synthetic dataset
    pub synthetic_size: usize,
    pub test_fraction: f64,
    /// Where the best bundle is written
    pub output_dir: PathBuf,
    /// Where comparison tables and the report go
    pub results_dir: PathBuf,
    /// Vectorizers to try (empty = all)
    pub vectorizers: Vec<String>,
    /// Models to try (empty = all)
    pub models: Vec<String>,
    pub n_estimators: usize,
    /// Vectorizer document-frequency bounds
    pub min_df: usize,
    pub max_df: f64,
    pub max_features: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dataset_id: "synthetic".to_string(),
            dataset_path: None,
            synthetic_size: 1000,
            test_fraction: 0.2,
            output_dir: PathBuf::from("models"),
            results_dir: PathBuf::from("results"),
            vectorizers: vec![],
            models: vec![],
            n_estimators: 100,
            min_df: 5,
            max_df: 0.7,
            max_features: 5000,
        }
    }
}

impl TrainingConfig {
    /// Vectorizer settings selected for the grid, in grid order
    pub fn vectorizer_params(&self) -> Result<Vec<VectorizerParams>> {
        let kinds = if self.vectorizers.is_empty() {
            vec![VectorizerKind::Tfidf, VectorizerKind::Count]
        } else {
            self.vectorizers
                .iter()
                .map(|name| match VectorizerKind::parse(name) {
                    Some(kind) => Ok(kind),
                    None => bail!("unknown vectorizer '{}' (expected tfidf or count)", name),
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(kinds
            .into_iter()
            .map(|kind| {
                VectorizerParams::for_kind(kind)
                    .with_min_df(self.min_df)
                    .with_max_df(self.max_df)
                    .with_max_features(Some(self.max_features))
            })
            .collect())
    }

    /// Learners selected for the grid, in grid order
    pub fn learners(&self) -> Result<Vec<Box<dyn Learner>>> {
        let names: Vec<&str> = if self.models.is_empty() {
            MODEL_NAMES.to_vec()
        } else {
            self.models.iter().map(String::as_str).collect()
        };

        names
            .into_iter()
            .map(|name| -> Result<Box<dyn Learner>> {
                match name {
                    "logistic_regression" => Ok(Box::new(LinearParams::logistic_regression())),
                    "linear_svc" => Ok(Box::new(LinearParams::linear_svc())),
                    "random_forest" => Ok(Box::new(
                        ForestParams::default()
                            .with_n_estimators(self.n_estimators)
                            .with_seed(self.seed),
                    )),
                    "gradient_boosting" => Ok(Box::new(
                        BoostingParams::default()
                            .with_n_estimators(self.n_estimators)
                            .with_seed(self.seed),
                    )),
                    other => bail!(
                        "unknown model '{}' (expected one of: {})",
                        other,
                        MODEL_NAMES.join(", ")
                    ),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.top_terms, 10);
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn test_full_grid_by_default() {
        let config = TrainingConfig::default();
        let vectorizers = config.vectorizer_params().unwrap();
        assert_eq!(vectorizers.len(), 2);
        assert_eq!(vectorizers[0].kind, VectorizerKind::Tfidf);
        assert_eq!(vectorizers[0].min_df, 5);

        let names: Vec<String> = config.learners().unwrap().iter().map(|l| l.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["logistic_regression", "random_forest", "gradient_boosting", "linear_svc"]
        );
    }

    #[test]
    fn test_selection_and_unknown_names() {
        let config = TrainingConfig {
            vectorizers: vec!["count".to_string()],
            models: vec!["linear_svc".to_string()],
            ..TrainingConfig::default()
        };
        assert_eq!(config.vectorizer_params().unwrap().len(), 1);
        assert_eq!(config.learners().unwrap()[0].name(), "linear_svc");

        let config = TrainingConfig {
            models: vec!["naive_bayes".to_string()],
            ..TrainingConfig::default()
        };
        assert!(config.learners().is_err());
    }
}
