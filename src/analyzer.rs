// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Inference orchestration
//!
//! One call runs, in order: normalization, stylistic features (on the raw
//! text), vectorization, classification and explanation. The analyzer holds
//! only a shared, read-only bundle, so it can serve concurrent requests
//! without locking.

use crate::bundle::ModelBundle;
use crate::datasets::Label;
use crate::error::{DetectorError, Result, Stage};
use crate::explain::{TermContribution, DEFAULT_TOP_TERMS};
use crate::features::StylisticFeatures;
use crate::normalize::TextNormalizer;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Outcome of analyzing one article
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: Label,
    /// P(fake)
    pub probability: f64,
    pub confidence: f64,
    /// Most influential vocabulary terms, strongest first
    pub terms: Vec<TermContribution>,
    pub stylistic: StylisticFeatures,
}

/// Serializes as the HTTP response body:
/// `{prediction, confidence, probability, features, additional_features}`
impl Serialize for PredictionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("prediction", &self.label)?;
        map.serialize_entry("confidence", &self.confidence)?;
        map.serialize_entry("probability", &self.probability)?;
        map.serialize_entry("features", &RankedTerms(&self.terms))?;
        map.serialize_entry("additional_features", &self.stylistic)?;
        map.end()
    }
}

/// Term list as a JSON object, keys in rank order
struct RankedTerms<'a>(&'a [TermContribution]);

impl Serialize for RankedTerms<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for contribution in self.0 {
            map.serialize_entry(&contribution.term, &contribution.weight)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    bundle: Option<Arc<ModelBundle>>,
    normalizer: TextNormalizer,
    top_terms: usize,
}

impl Analyzer {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self {
            bundle: Some(bundle),
            normalizer: TextNormalizer::new(),
            top_terms: DEFAULT_TOP_TERMS,
        }
    }

    /// Load the bundle in `dir`; a load failure surfaces as `ModelNotLoaded`
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let bundle = ModelBundle::load(dir)?;
        Ok(Self::new(Arc::new(bundle)))
    }

    /// An analyzer without a model; every analysis fails with `ModelNotLoaded`
    pub fn unloaded() -> Self {
        Self {
            bundle: None,
            normalizer: TextNormalizer::new(),
            top_terms: DEFAULT_TOP_TERMS,
        }
    }

    pub fn with_top_terms(mut self, top_terms: usize) -> Self {
        self.top_terms = top_terms;
        self
    }

    pub fn bundle(&self) -> Option<&ModelBundle> {
        self.bundle.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.bundle.is_some()
    }

    /// Validate a request body and analyze its `text` field
    pub fn analyze_request(&self, body: &Value) -> Result<PredictionResult> {
        match body.get("text") {
            None | Some(Value::Null) => Err(DetectorError::invalid_input("No text provided")),
            Some(Value::String(text)) => self.analyze(text),
            Some(_) => Err(DetectorError::invalid_input("Field 'text' must be a string")),
        }
    }

    /// Analyze one article. Empty or whitespace-only text is rejected.
    pub fn analyze(&self, raw: &str) -> Result<PredictionResult> {
        if raw.trim().is_empty() {
            return Err(DetectorError::invalid_input("Text must not be empty"));
        }
        let chars = raw.chars().count();

        let normalized = self.normalizer.normalize(raw);
        let stylistic = StylisticFeatures::extract(raw);

        let bundle = self
            .bundle
            .as_deref()
            .ok_or(DetectorError::ModelNotLoaded {
                stage: Stage::Vectorize,
                source: None,
            })?;

        let vector = bundle.vectorizer().transform(&normalized);
        tracing::debug!(chars, nnz = vector.nnz(), "text vectorized");

        let probabilities = bundle.classifier().predict_probabilities(&vector)?;
        let terms = bundle
            .explainer()
            .rank(&vector, bundle.feature_names(), self.top_terms);

        let result = PredictionResult {
            label: probabilities.label(),
            probability: probabilities.fake,
            confidence: probabilities.confidence(),
            terms,
            stylistic,
        };

        tracing::info!(
            chars,
            prediction = result.label.as_str(),
            confidence = result.confidence,
            "Analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::fixture_bundle;
    use crate::model::sigmoid;
    use serde_json::json;

    fn analyzer() -> Analyzer {
        Analyzer::new(Arc::new(fixture_bundle()))
    }

    #[test]
    fn test_sensational_headline_features() {
        let result = analyzer()
            .analyze("BREAKING: You won't believe this SHOCKING secret!!!")
            .unwrap();

        assert!(result.stylistic.sensationalist_word_count >= 2);
        assert_eq!(result.stylistic.exclamation_count, 3);
        assert!(result.stylistic.clickbait_pattern_count >= 1);
        assert!(result.stylistic.all_caps_count >= 1);
        // no vocabulary term present: only the intercept remains
        assert!(result.terms.is_empty());
        assert!((result.probability - sigmoid(-0.1)).abs() < 1e-12);
        assert_eq!(result.label, Label::Real);
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fixture_bundle().save(dir.path()).unwrap();
        let loaded = Analyzer::from_dir(dir.path()).unwrap();
        assert!(loaded.is_ready());

        let missing = Analyzer::from_dir(&dir.path().join("absent")).unwrap_err();
        assert_eq!(missing.stage(), Stage::Load);
        match missing {
            DetectorError::ModelNotLoaded { source: Some(cause), .. } => {
                assert!(cause.to_string().contains("model.json"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shared_analyzer_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analyzer>();

        let analyzer = Arc::new(analyzer());
        let texts = [
            "Official report: a bombshell report",
            "BREAKING: You won't believe this SHOCKING secret!!!",
            "The official statement was published on Monday.",
            "Bombshell! Another bombshell report surfaces",
        ];
        let expected: Vec<PredictionResult> = texts.iter().map(|t| analyzer.analyze(t).unwrap()).collect();

        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let analyzer = Arc::clone(&analyzer);
                    let (texts, expected) = (&texts, &expected);
                    scope.spawn(move || {
                        for round in 0..25 {
                            let idx = (worker + round) % texts.len();
                            assert_eq!(analyzer.analyze(texts[idx]).unwrap(), expected[idx]);
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        });
    }

    #[test]
    fn test_empty_text_is_invalid_input() {
        for text in ["", "   \n\t"] {
            let err = analyzer().analyze(text).unwrap_err();
            assert!(matches!(err, DetectorError::InvalidInput { stage: Stage::Request, .. }));
        }
    }

    #[test]
    fn test_fixture_bundle_exact_explanation() {
        let result = analyzer().analyze("Official report: a bombshell report").unwrap();

        // counts: bombshell 1, official 1, report 2
        let expected_z: f64 = 2.0 - 1.5 + 0.5 - 0.1;
        assert!((result.probability - sigmoid(expected_z)).abs() < 1e-12);
        assert_eq!(result.label, Label::Fake);
        assert!((result.confidence - (sigmoid(expected_z) - 0.5) * 2.0).abs() < 1e-12);

        let terms: Vec<(&str, f64)> = result.terms.iter().map(|t| (t.term.as_str(), t.weight)).collect();
        assert_eq!(terms, vec![("bombshell", 2.0), ("official", -1.5), ("report", 0.5)]);
    }

    #[test]
    fn test_unloaded_analyzer_reports_stage() {
        let err = Analyzer::unloaded().analyze("Some article").unwrap_err();
        assert!(matches!(err, DetectorError::ModelNotLoaded { stage: Stage::Vectorize, .. }));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_analyze_request_validation() {
        let analyzer = analyzer();
        assert!(matches!(
            analyzer.analyze_request(&json!({})),
            Err(DetectorError::InvalidInput { .. })
        ));
        assert!(matches!(
            analyzer.analyze_request(&json!({"text": 42})),
            Err(DetectorError::InvalidInput { .. })
        ));
        assert!(analyzer.analyze_request(&json!({"text": "official report"})).is_ok());
    }

    #[test]
    fn test_top_terms_limit() {
        let result = analyzer()
            .with_top_terms(1)
            .analyze("official bombshell report")
            .unwrap();
        assert_eq!(result.terms.len(), 1);
        assert_eq!(result.terms[0].term, "bombshell");
    }

    #[test]
    fn test_response_shape() {
        let result = analyzer().analyze("official report, official bombshell!").unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert!(json["prediction"] == "fake" || json["prediction"] == "real");
        assert!(json["confidence"].as_f64().unwrap() <= 1.0);
        assert_eq!(json["additional_features"].as_object().unwrap().len(), 17);
        assert_eq!(json["additional_features"]["exclamation_count"], 1.0);

        let text = serde_json::to_string(&result).unwrap();
        // features keep rank order: official (-3.0), bombshell (2.0), report (0.25)
        let official = text.find("\"official\"").unwrap();
        let bombshell = text.find("\"bombshell\"").unwrap();
        let report = text.find("\"report\"").unwrap();
        assert!(official < bombshell && bombshell < report);
    }

    #[test]
    fn test_repeated_analysis_is_deterministic() {
        let analyzer = analyzer();
        let a = analyzer.analyze("A bombshell official report").unwrap();
        let b = analyzer.analyze("A bombshell official report").unwrap();
        assert_eq!(a, b);
    }
}
