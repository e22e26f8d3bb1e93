// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Deterministic text normalization for vectorization
//!
//! Pipeline, in order:
//! 1. lowercase
//! 2. strip URLs (`http(s)://...` and `www....`)
//! 3. strip HTML tags
//! 4. drop everything except ASCII letters, whitespace and `.,!?`
//! 5. tokenize into letter runs and single punctuation marks
//! 6. remove English stopwords
//! 7. lemmatize each token as a noun
//! 8. join with single spaces
//!
//! Sentence punctuation survives as standalone tokens. The vectorizer's token
//! pattern ignores them, so they never reach the vocabulary.

use crate::lemmatizer::Lemmatizer;
use crate::stopwords::StopwordFilter;
use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").unwrap());
static DISALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z\s.,!?]").unwrap());
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]+|[.,!?]").unwrap());

/// Canonicalizes raw article text into a space-separated lemma sequence
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    stopwords: StopwordFilter,
    lemmatizer: Lemmatizer,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize raw text. Never fails; empty input yields an empty string.
    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let text = raw.to_lowercase();
        let text = URL_PATTERN.replace_all(&text, "");
        let text = HTML_TAG.replace_all(&text, "");
        let text = DISALLOWED_CHARS.replace_all(&text, "");

        self.tokens(&text).join(" ")
    }

    /// Same as [`normalize`](Self::normalize) for optional input; `None` yields an empty string
    pub fn normalize_opt(&self, raw: Option<&str>) -> String {
        raw.map(|text| self.normalize(text)).unwrap_or_default()
    }

    fn tokens(&self, cleaned: &str) -> Vec<String> {
        TOKEN
            .find_iter(cleaned)
            .map(|m| m.as_str())
            .filter(|token| !self.stopwords.is_stopword(token))
            .map(|token| self.lemmatizer.lemmatize(token).into_owned())
            .collect()
    }
}
