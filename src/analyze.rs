// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! One-shot analysis of an article from a file or stdin
//!
//! Prints the same JSON document the HTTP API returns.

use anyhow::{Context, Result};
use clap::Parser;
use fakenews_detector::analyzer::Analyzer;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "analyze-text")]
#[command(about = "Classify one article as fake or real")]
#[command(version)]
struct Args {
    /// Article file; reads stdin when omitted
    input: Option<PathBuf>,

    /// Model bundle directory
    #[arg(short, long, env = "MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    /// Number of contributing terms to report
    #[arg(long, default_value_t = 10)]
    top_terms: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let text = match args.input {
        Some(ref path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let analyzer = Analyzer::from_dir(&args.model_dir)
        .with_context(|| format!("Failed to load model bundle from {}", args.model_dir.display()))?
        .with_top_terms(args.top_terms);

    let result = analyzer.analyze(&text)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
