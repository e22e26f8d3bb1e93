// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error taxonomy for the inference pipeline
//!
//! Every error names the pipeline stage it came from. Messages never carry
//! article text, only sizes and identifiers.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage an error originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Request,
    Vectorize,
    Classify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Request => "request",
            Stage::Vectorize => "vectorize",
            Stage::Classify => "classify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by [`crate::analyzer::Analyzer`] and the adapters it drives
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("invalid input at {stage}: {reason}")]
    InvalidInput { stage: Stage, reason: String },

    #[error("model bundle not loaded (stage: {stage})")]
    ModelNotLoaded {
        stage: Stage,
        #[source]
        source: Option<BundleError>,
    },

    #[error("dimension mismatch at {stage}: classifier expects {expected} features, vector has {actual}")]
    DimensionMismatch {
        stage: Stage,
        expected: usize,
        actual: usize,
    },

    #[error("pipeline failure at {stage}: {message}")]
    Pipeline { stage: Stage, message: String },
}

impl DetectorError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        DetectorError::InvalidInput {
            stage: Stage::Request,
            reason: reason.into(),
        }
    }

    pub fn pipeline(stage: Stage, message: impl Into<String>) -> Self {
        DetectorError::Pipeline {
            stage,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            DetectorError::InvalidInput { stage, .. }
            | DetectorError::ModelNotLoaded { stage, .. }
            | DetectorError::DimensionMismatch { stage, .. }
            | DetectorError::Pipeline { stage, .. } => *stage,
        }
    }

    /// Client errors are recoverable at the boundary; everything else is internal
    pub fn is_client_error(&self) -> bool {
        matches!(self, DetectorError::InvalidInput { .. })
    }
}

/// Errors while loading or saving a model bundle
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("bundle file missing: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid content in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("incompatible bundle: classifier expects {expected} features, vectorizer produces {actual}")]
    Incompatible { expected: usize, actual: usize },
}

impl From<BundleError> for DetectorError {
    fn from(err: BundleError) -> Self {
        DetectorError::ModelNotLoaded {
            stage: Stage::Load,
            source: Some(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, DetectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_stage() {
        let err = DetectorError::DimensionMismatch {
            stage: Stage::Classify,
            expected: 3,
            actual: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("classify"));
        assert!(msg.contains("expects 3"));
        assert_eq!(err.stage(), Stage::Classify);
    }

    #[test]
    fn test_client_error_classification() {
        assert!(DetectorError::invalid_input("No text provided").is_client_error());
        assert!(!DetectorError::ModelNotLoaded {
            stage: Stage::Vectorize,
            source: None,
        }
        .is_client_error());
        assert!(!DetectorError::pipeline(Stage::Classify, "boom").is_client_error());
    }

    #[test]
    fn test_bundle_error_surfaces_as_model_not_loaded() {
        use std::error::Error;

        let err: DetectorError = BundleError::Missing {
            path: PathBuf::from("models/model.json"),
        }
        .into();
        assert!(matches!(
            err,
            DetectorError::ModelNotLoaded {
                stage: Stage::Load,
                source: Some(BundleError::Missing { .. })
            }
        ));
        assert_eq!(err.stage(), Stage::Load);

        // the load failure stays reachable through the error chain
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("models/model.json"));
    }
}
