// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! HTTP boundary
//!
//! - `POST /api/analyze` with `{"text": string}`
//! - `GET /api/health`
//!
//! The analyzer is injected as shared state; analysis runs on the blocking
//! pool because it is CPU-bound.

use crate::analyzer::Analyzer;
use crate::error::DetectorError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Error body: `{"error": string}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Request-level failures with their HTTP status
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::InvalidInput { reason, .. } => ApiError::BadRequest(reason),
            other => {
                tracing::error!(stage = other.stage().as_str(), "Analysis failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub model_loaded: bool,
}

/// Build the API router around a shared analyzer
pub fn router(analyzer: Arc<Analyzer>) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(analyzer)
}

async fn analyze(State(analyzer): State<Arc<Analyzer>>, body: Bytes) -> Result<Response, ApiError> {
    let request: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Request body must be a JSON object".to_string()))?;
    if !request.is_object() {
        return Err(ApiError::BadRequest("Request body must be a JSON object".to_string()));
    }

    let result = tokio::task::spawn_blocking(move || analyzer.analyze_request(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("analysis task failed: {}", e)))??;

    Ok(Json(result).into_response())
}

async fn health(State(analyzer): State<Arc<Analyzer>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        model_loaded: analyzer.is_ready(),
    })
}
