// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model training and selection CLI
//!
//! Usage:
//!   train-model --dataset csv --path ./data/news.csv
//!   train-model --dataset synthetic --seed 7 --models logistic_regression,linear_svc

use anyhow::Result;
use clap::Parser;
use fakenews_detector::config::TrainingConfig;
use fakenews_detector::training::TrainingPipeline;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "train-model")]
#[command(about = "Train fake news classifiers and keep the best one")]
#[command(version)]
struct Args {
    /// Dataset to train on (csv, synthetic)
    #[arg(short, long, default_value = "synthetic")]
    dataset: String,

    /// CSV file with `text` and `label` columns
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Number of samples for the synthetic dataset
    #[arg(short, long, default_value_t = 1000)]
    num_samples: usize,

    /// Fraction of each class held out for evaluation
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,

    /// Vectorizers to try (comma-separated, empty = all)
    #[arg(long)]
    vectorizers: Option<String>,

    /// Models to try (comma-separated, empty = all)
    #[arg(short, long)]
    models: Option<String>,

    /// Trees in the random forest and stages of gradient boosting
    #[arg(long, default_value_t = 100)]
    n_estimators: usize,

    /// Minimum document frequency of a vocabulary term
    #[arg(long, default_value_t = 5)]
    min_df: usize,

    /// Maximum document fraction of a vocabulary term
    #[arg(long, default_value_t = 0.7)]
    max_df: f64,

    /// Vocabulary size cap
    #[arg(long, default_value_t = 5000)]
    max_features: usize,

    /// Directory for the best model bundle
    #[arg(short, long, default_value = "models")]
    output: PathBuf,

    /// Directory for comparison tables and the report
    #[arg(short, long, default_value = "results")]
    results: PathBuf,
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Fake News Detector Training");
    tracing::info!("===========================");
    tracing::info!("Dataset: {}", args.dataset);
    tracing::info!("Seed: {}", args.seed);

    let config = TrainingConfig {
        seed: args.seed,
        dataset_id: args.dataset,
        dataset_path: args.path,
        synthetic_size: args.num_samples,
        test_fraction: args.test_size,
        output_dir: args.output,
        results_dir: args.results,
        vectorizers: split_list(args.vectorizers),
        models: split_list(args.models),
        n_estimators: args.n_estimators,
        min_df: args.min_df,
        max_df: args.max_df,
        max_features: args.max_features,
    };

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let pipeline = TrainingPipeline::new(config).with_progress(progress);
    let outcome = pipeline.run()?;
    let results = &outcome.results;

    println!("\n{}", "=".repeat(70));
    println!("TRAINING SUMMARY");
    println!("{}", "=".repeat(70));
    println!(
        "\nBest Model: {} with {} (F1={:.4})",
        results.best_model, results.best_vectorizer, results.best_metrics.f1_score
    );
    println!("\nModel Comparison:");
    println!("{:-<70}", "");
    println!(
        "{:<20} {:>8} {:>10} {:>10} {:>8} {:>8}",
        "Model", "Vector", "Accuracy", "Precision", "Recall", "F1"
    );
    println!("{:-<70}", "");
    for cell in &results.cells {
        println!(
            "{:<20} {:>8} {:>10.4} {:>10.4} {:>8.4} {:>8.4}",
            cell.model_name, cell.vectorizer_name, cell.accuracy, cell.precision, cell.recall, cell.f1
        );
    }
    println!("{:-<70}", "");
    println!("\n{}", results.best_metrics.format());

    let config = pipeline.config();
    let saved = TrainingPipeline::save_outputs(&outcome, &config.results_dir, &config.output_dir)?;
    for path in saved {
        println!("Saved: {}", path.display());
    }

    println!("\nTraining complete!");
    Ok(())
}
