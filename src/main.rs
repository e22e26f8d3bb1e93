// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! HTTP server for the fake news detector
//!
//! Usage:
//!   fakenews-server --model-dir ./models --port 5000
//!   PORT=8080 MODEL_DIR=/srv/models fakenews-server

use anyhow::{Context, Result};
use clap::Parser;
use fakenews_detector::analyzer::Analyzer;
use fakenews_detector::bundle::ModelBundle;
use fakenews_detector::config::ServerConfig;
use fakenews_detector::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fakenews-server")]
#[command(about = "Serve fake news predictions over HTTP")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Directory containing model.json, vectorizer.json and feature_names.json
    #[arg(short, long, env = "MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    /// Number of contributing terms returned per prediction
    #[arg(long, default_value_t = 10)]
    top_terms: usize,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            model_dir: args.model_dir,
            top_terms: args.top_terms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from(Args::parse());

    // The server never starts without a model
    let bundle = ModelBundle::load(&config.model_dir)
        .with_context(|| format!("Failed to load model bundle from {}", config.model_dir.display()))?;
    let analyzer = Analyzer::new(Arc::new(bundle)).with_top_terms(config.top_terms);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, server::router(Arc::new(analyzer)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
