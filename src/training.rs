// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Offline training and model selection
//!
//! Orchestrates:
//! - Dataset loading and normalization
//! - Stratified train/test split
//! - A grid of vectorizers × learners, each scored on the test split
//! - Selection of the best cell by F1
//! - Comparison table, markdown report and the bundle of the winner

use crate::bundle::{BundleMetadata, ModelBundle};
use crate::config::TrainingConfig;
use crate::datasets::{Dataset, Label, Sample};
use crate::metrics::EvaluationMetrics;
use crate::model::ClassifierModel;
use crate::normalize::TextNormalizer;
use crate::vectorizer::{SparseVector, TextVectorizer};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const COMPARISON_FILE: &str = "model_comparison.csv";
pub const REPORT_FILE: &str = "training_report.md";
pub const RESULTS_FILE: &str = "training_results.json";

/// One row of the comparison table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellResult {
    pub model_name: String,
    pub vectorizer_name: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc_roc: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    pub source: String,
    pub sha256: String,
    pub total_samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub label_distribution: BTreeMap<String, usize>,
}

/// Everything a training run produced, minus the bundle itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResults {
    pub config: TrainingConfig,
    pub dataset_info: DatasetInfo,
    pub cells: Vec<CellResult>,
    pub best_model: String,
    pub best_vectorizer: String,
    pub best_metrics: EvaluationMetrics,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

pub struct TrainingOutcome {
    pub results: TrainingResults,
    pub bundle: ModelBundle,
}

struct BestCell {
    f1: f64,
    classifier: ClassifierModel,
    vectorizer: TextVectorizer,
    metrics: EvaluationMetrics,
}

pub struct TrainingPipeline {
    config: TrainingConfig,
    normalizer: TextNormalizer,
    progress: ProgressBar,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            normalizer: TextNormalizer::new(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report one tick per trained grid cell on `bar`
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn load_dataset(&self) -> Result<Dataset> {
        match self.config.dataset_id.as_str() {
            "synthetic" => {
                tracing::info!("Loading synthetic dataset with seed {}", self.config.seed);
                Ok(Dataset::load_synthetic(self.config.synthetic_size, self.config.seed))
            }
            "csv" => {
                let Some(ref path) = self.config.dataset_path else {
                    bail!("the csv dataset requires a path");
                };
                tracing::info!("Loading dataset from {}", path.display());
                Dataset::load_csv(path)
            }
            other => bail!("unknown dataset '{}' (expected csv or synthetic)", other),
        }
    }

    /// Run the full grid on a freshly loaded dataset
    pub fn run(&self) -> Result<TrainingOutcome> {
        let dataset = self.load_dataset()?;
        self.run_on(&dataset)
    }

    pub fn run_on(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        let distribution = Dataset::label_distribution(&dataset.samples);
        tracing::info!(
            "Dataset loaded: {} rows (real={}, fake={})",
            dataset.len(),
            distribution.get(&Label::Real).copied().unwrap_or(0),
            distribution.get(&Label::Fake).copied().unwrap_or(0)
        );

        let split = dataset.train_test_split(self.config.test_fraction, self.config.seed)?;
        tracing::info!("Training set: {} samples", split.train.len());
        tracing::info!("Test set: {} samples", split.test.len());

        tracing::info!("Preprocessing text data...");
        let train_texts = self.normalize_all(&split.train);
        let test_texts = self.normalize_all(&split.test);
        let train_labels: Vec<Label> = split.train.iter().map(|s| s.label).collect();
        let test_labels: Vec<Label> = split.test.iter().map(|s| s.label).collect();

        let vectorizer_grid = self.config.vectorizer_params()?;
        let learners = self.config.learners()?;
        self.progress
            .set_length((vectorizer_grid.len() * learners.len()) as u64);

        let mut cells = Vec::new();
        let mut best: Option<BestCell> = None;

        for params in &vectorizer_grid {
            let vec_name = params.kind.as_str();
            tracing::info!("Vectorizing with {}...", vec_name);
            let vectorizer = TextVectorizer::fit(&train_texts, params)
                .with_context(|| format!("Failed to fit {} vectorizer", vec_name))?;
            let x_train: Vec<SparseVector> = train_texts.iter().map(|t| vectorizer.transform(t)).collect();
            let x_test: Vec<SparseVector> = test_texts.iter().map(|t| vectorizer.transform(t)).collect();

            for learner in &learners {
                let model_name = learner.name().to_string();
                self.progress.set_message(format!("{} + {}", model_name, vec_name));
                tracing::info!("Training {} with {} vectorizer...", model_name, vec_name);

                let classifier = learner
                    .fit(&x_train, &train_labels)
                    .with_context(|| format!("Failed to train {}", model_name))?;
                let metrics = evaluate(&classifier, &x_test, &test_labels)?;

                tracing::info!(
                    "{} with {} - Accuracy: {:.4}, F1: {:.4}",
                    model_name,
                    vec_name,
                    metrics.accuracy,
                    metrics.f1_score
                );

                cells.push(CellResult {
                    model_name,
                    vectorizer_name: vec_name.to_string(),
                    accuracy: metrics.accuracy,
                    precision: metrics.precision,
                    recall: metrics.recall,
                    f1: metrics.f1_score,
                    auc_roc: metrics.auc_roc,
                });

                if best.as_ref().map_or(true, |b| metrics.f1_score > b.f1) {
                    best = Some(BestCell {
                        f1: metrics.f1_score,
                        classifier,
                        vectorizer: vectorizer.clone(),
                        metrics,
                    });
                }
                self.progress.inc(1);
            }
        }
        self.progress.finish_and_clear();

        let Some(best) = best else {
            bail!("no vectorizer/model combination was trained");
        };
        let best_model = best.classifier.name().to_string();
        let best_vectorizer = best.vectorizer.kind().as_str().to_string();
        tracing::info!(
            "Best model: {} with {} vectorizer (F1: {:.4})",
            best_model,
            best_vectorizer,
            best.f1
        );

        let timestamp = Utc::now();
        let version = env!("CARGO_PKG_VERSION").to_string();
        let metadata = BundleMetadata {
            model_name: best_model.clone(),
            vectorizer_name: best_vectorizer.clone(),
            trained_at: timestamp,
            dataset: dataset.name.clone(),
            dataset_sha256: dataset.fingerprint.clone(),
            seed: self.config.seed,
            train_samples: split.train.len(),
            test_samples: split.test.len(),
            metrics: Some(best.metrics.clone()),
            version: version.clone(),
        };
        let feature_names = best.vectorizer.feature_names();
        let bundle = ModelBundle::from_parts(best.classifier, best.vectorizer, Some(feature_names))?
            .with_metadata(metadata);

        let dataset_info = DatasetInfo {
            name: dataset.name.clone(),
            source: dataset.source.clone(),
            sha256: dataset.fingerprint.clone(),
            total_samples: dataset.len(),
            train_samples: split.train.len(),
            test_samples: split.test.len(),
            label_distribution: distribution
                .iter()
                .map(|(label, count)| (label.as_str().to_string(), *count))
                .collect(),
        };

        Ok(TrainingOutcome {
            results: TrainingResults {
                config: self.config.clone(),
                dataset_info,
                cells,
                best_model,
                best_vectorizer,
                best_metrics: best.metrics,
                timestamp,
                version,
            },
            bundle,
        })
    }

    fn normalize_all(&self, samples: &[Sample]) -> Vec<String> {
        samples.iter().map(|s| self.normalizer.normalize(&s.text)).collect()
    }

    /// Write the comparison CSV, JSON results and markdown report into
    /// `results_dir`, and the winning bundle into `output_dir`
    pub fn save_outputs(outcome: &TrainingOutcome, results_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(results_dir)
            .with_context(|| format!("Failed to create {}", results_dir.display()))?;

        let csv_path = results_dir.join(COMPARISON_FILE);
        let mut writer = csv::Writer::from_path(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        for cell in &outcome.results.cells {
            writer.serialize(cell)?;
        }
        writer.flush()?;

        let json_path = results_dir.join(RESULTS_FILE);
        std::fs::write(&json_path, serde_json::to_string_pretty(&outcome.results)?)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;

        let report_path = results_dir.join(REPORT_FILE);
        std::fs::write(&report_path, Self::generate_report(&outcome.results))
            .with_context(|| format!("Failed to write {}", report_path.display()))?;

        outcome
            .bundle
            .save(output_dir)
            .with_context(|| format!("Failed to save model bundle to {}", output_dir.display()))?;

        tracing::info!("Results saved to {}", results_dir.display());
        Ok(vec![csv_path, json_path, report_path, output_dir.to_path_buf()])
    }

    pub fn generate_report(results: &TrainingResults) -> String {
        let mut report = String::new();

        report.push_str("# Fake News Detector Training Report\n\n");
        report.push_str(&format!("**Generated:** {}\n\n", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("**Version:** {}\n\n", results.version));

        let info = &results.dataset_info;
        report.push_str("## Dataset\n\n");
        report.push_str(&format!("- **Name:** {}\n", info.name));
        report.push_str(&format!("- **Source:** {}\n", info.source));
        report.push_str(&format!("- **SHA-256:** `{}`\n", info.sha256));
        report.push_str(&format!("- **Total Samples:** {}\n", info.total_samples));
        report.push_str(&format!(
            "- **Split Sizes:** Train={}, Test={}\n",
            info.train_samples, info.test_samples
        ));
        for (label, count) in &info.label_distribution {
            report.push_str(&format!("- **{}:** {}\n", label, count));
        }

        report.push_str("\n## Model Comparison\n\n");
        report.push_str("| Model | Vectorizer | Accuracy | Precision | Recall | F1 | AUC-ROC |\n");
        report.push_str("|-------|------------|----------|-----------|--------|----|---------|\n");
        for cell in &results.cells {
            let auc = cell.auc_roc.map_or("-".to_string(), |v| format!("{:.4}", v));
            report.push_str(&format!(
                "| {} | {} | {:.4} | {:.4} | {:.4} | {:.4} | {} |\n",
                cell.model_name, cell.vectorizer_name, cell.accuracy, cell.precision, cell.recall, cell.f1, auc
            ));
        }

        report.push_str(&format!(
            "\n## Best Model\n\n**{}** with **{}** vectorizer (F1={:.4})\n\n",
            results.best_model, results.best_vectorizer, results.best_metrics.f1_score
        ));
        report.push_str(&format!("```\n{}```\n\n", results.best_metrics.format()));

        report.push_str("## Configuration\n\n");
        report.push_str(&format!(
            "```json\n{}\n```\n",
            serde_json::to_string_pretty(&results.config).unwrap_or_default()
        ));

        report
    }
}

fn evaluate(classifier: &ClassifierModel, x_test: &[SparseVector], y_test: &[Label]) -> Result<EvaluationMetrics> {
    let mut predictions = Vec::with_capacity(x_test.len());
    let mut probabilities = Vec::with_capacity(x_test.len());
    for x in x_test {
        let probs = classifier.predict_probabilities(x)?;
        predictions.push(probs.label());
        probabilities.push(probs.fake);
    }
    Ok(EvaluationMetrics::from_predictions_with_probs(&predictions, y_test, &probabilities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use std::sync::Arc;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            synthetic_size: 300,
            models: vec![
                "logistic_regression".to_string(),
                "random_forest".to_string(),
                "gradient_boosting".to_string(),
            ],
            n_estimators: 10,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_grid_on_synthetic_data() {
        let outcome = TrainingPipeline::new(small_config()).run().unwrap();
        let results = &outcome.results;

        assert_eq!(results.cells.len(), 6);
        assert_eq!(results.cells[0].vectorizer_name, "tfidf");
        assert_eq!(results.cells[0].model_name, "logistic_regression");
        assert!(results.best_metrics.f1_score > 0.8);
        assert_eq!(results.dataset_info.total_samples, 300);
        assert_eq!(results.dataset_info.sha256.len(), 64);

        let best = results
            .cells
            .iter()
            .map(|c| c.f1)
            .fold(f64::MIN, f64::max);
        assert_eq!(results.best_metrics.f1_score, best);
        assert!(outcome.bundle.feature_names().is_some());
    }

    #[test]
    fn test_save_outputs_and_reload() {
        let outcome = TrainingPipeline::new(TrainingConfig {
            models: vec!["logistic_regression".to_string()],
            vectorizers: vec!["tfidf".to_string()],
            ..small_config()
        })
        .run()
        .unwrap();

        let results_dir = tempfile::tempdir().unwrap();
        let model_dir = tempfile::tempdir().unwrap();
        TrainingPipeline::save_outputs(&outcome, results_dir.path(), model_dir.path()).unwrap();

        let csv = std::fs::read_to_string(results_dir.path().join(COMPARISON_FILE)).unwrap();
        assert!(csv.starts_with("model_name,vectorizer_name,accuracy,precision,recall,f1,auc_roc"));
        assert_eq!(csv.lines().count(), 2);

        let report = std::fs::read_to_string(results_dir.path().join(REPORT_FILE)).unwrap();
        assert!(report.contains("Model Comparison"));
        assert!(report.contains("Best Model"));

        let bundle = ModelBundle::load(model_dir.path()).unwrap();
        assert_eq!(bundle.metadata().unwrap().model_name, "logistic_regression");

        let analyzer = Analyzer::new(Arc::new(bundle));
        let result = analyzer
            .analyze("BREAKING: This miracle cure doctors hate is unbelievable! Share before it is deleted!")
            .unwrap();
        assert_eq!(result.label, Label::Fake);
    }

    #[test]
    fn test_unknown_dataset_is_error() {
        let pipeline = TrainingPipeline::new(TrainingConfig {
            dataset_id: "liar".to_string(),
            ..TrainingConfig::default()
        });
        assert!(pipeline.run().is_err());

        let pipeline = TrainingPipeline::new(TrainingConfig {
            dataset_id: "csv".to_string(),
            dataset_path: None,
            ..TrainingConfig::default()
        });
        assert!(pipeline.load_dataset().is_err());
    }
}
