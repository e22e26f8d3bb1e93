// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Stylistic feature extraction
//!
//! Works on the raw article text: casing and punctuation are the signal here,
//! and normalization would destroy both. Every ratio is guarded against an
//! empty word count, so an empty text yields all zeros.

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::LazyLock;

/// Marker words typical of sensationalist headlines
pub const SENSATIONALIST_WORDS: &[&str] = &[
    "shocking",
    "bombshell",
    "explosive",
    "stunning",
    "unbelievable",
    "outrageous",
    "scandal",
    "secret",
    "breaking",
    "exclusive",
    "urgent",
];

/// Affect-laden words
pub const EMOTIONAL_WORDS: &[&str] = &[
    "angry",
    "furious",
    "outraged",
    "devastated",
    "thrilled",
    "excited",
    "terrified",
    "scared",
    "afraid",
    "happy",
    "sad",
    "disgusted",
    "hate",
    "love",
];

/// Multi-word clickbait phrases, matched as substrings of the lowercased text
pub const CLICKBAIT_PATTERNS: &[&str] = &[
    "you won't believe",
    "mind blowing",
    "what happens next",
    "this is why",
    "here's why",
    "find out",
    "the truth about",
    "will shock you",
];

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());
static ALL_CAPS_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}\b").unwrap());
static CAPITALIZED_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+").unwrap());
static SENTENCE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").unwrap());

/// Counts and ratios describing the writing style of one article
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylisticFeatures {
    pub text_length: usize,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
    pub word_count: usize,
    pub avg_word_length: f64,
    pub exclamation_count: usize,
    pub question_count: usize,
    pub comma_count: usize,
    pub period_count: usize,
    pub capitalized_word_count: usize,
    pub all_caps_count: usize,
    pub sensationalist_word_count: usize,
    pub emotional_word_count: usize,
    pub clickbait_pattern_count: usize,
    pub sensationalist_ratio: f64,
    pub emotional_ratio: f64,
    pub all_caps_ratio: f64,
}

impl StylisticFeatures {
    /// Extract every feature from raw (non-normalized) text
    pub fn extract(raw: &str) -> Self {
        let text_length = raw.chars().count();
        let sentence_count = count_sentences(raw);

        let lowered = fold_apostrophes(&raw.to_lowercase());
        let words: Vec<&str> = WORD.find_iter(&lowered).map(|m| m.as_str()).collect();
        let word_count = words.len();
        let total_word_chars: usize = words.iter().map(|w| w.chars().count()).sum();

        let sensationalist_word_count = words
            .iter()
            .filter(|w| SENSATIONALIST_WORDS.contains(*w))
            .count();
        let emotional_word_count = words.iter().filter(|w| EMOTIONAL_WORDS.contains(*w)).count();
        let clickbait_pattern_count = CLICKBAIT_PATTERNS
            .iter()
            .filter(|pattern| lowered.contains(**pattern))
            .count();
        let all_caps_count = ALL_CAPS_WORD.find_iter(raw).count();

        Self {
            text_length,
            sentence_count,
            avg_sentence_length: ratio(text_length, sentence_count),
            word_count,
            avg_word_length: ratio(total_word_chars, word_count),
            exclamation_count: raw.matches('!').count(),
            question_count: raw.matches('?').count(),
            comma_count: raw.matches(',').count(),
            period_count: raw.matches('.').count(),
            capitalized_word_count: count_mid_sentence_capitalized(raw),
            all_caps_count,
            sensationalist_word_count,
            emotional_word_count,
            clickbait_pattern_count,
            sensationalist_ratio: ratio(sensationalist_word_count, word_count),
            emotional_ratio: ratio(emotional_word_count, word_count),
            all_caps_ratio: ratio(all_caps_count, word_count),
        }
    }

    /// Feature name/value pairs in their fixed reporting order
    pub fn entries(&self) -> [(&'static str, f64); 17] {
        [
            ("text_length", self.text_length as f64),
            ("sentence_count", self.sentence_count as f64),
            ("avg_sentence_length", self.avg_sentence_length),
            ("word_count", self.word_count as f64),
            ("avg_word_length", self.avg_word_length),
            ("exclamation_count", self.exclamation_count as f64),
            ("question_count", self.question_count as f64),
            ("comma_count", self.comma_count as f64),
            ("period_count", self.period_count as f64),
            ("capitalized_word_count", self.capitalized_word_count as f64),
            ("all_caps_count", self.all_caps_count as f64),
            ("sensationalist_word_count", self.sensationalist_word_count as f64),
            ("emotional_word_count", self.emotional_word_count as f64),
            ("clickbait_pattern_count", self.clickbait_pattern_count as f64),
            ("sensationalist_ratio", self.sensationalist_ratio),
            ("emotional_ratio", self.emotional_ratio),
            ("all_caps_ratio", self.all_caps_ratio),
        ]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

impl Serialize for StylisticFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in entries {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn fold_apostrophes(text: &str) -> String {
    text.replace(['\u{2018}', '\u{2019}'], "'")
}

/// Sentences end at a run of `.!?` followed by whitespace or the end of text.
/// Fragments without any alphanumeric character are not sentences.
fn count_sentences(text: &str) -> usize {
    SENTENCE_BOUNDARY
        .split(text)
        .filter(|fragment| fragment.chars().any(char::is_alphanumeric))
        .count()
}

/// Capitalized words that do not open a sentence
fn count_mid_sentence_capitalized(text: &str) -> usize {
    CAPITALIZED_WORD
        .find_iter(text)
        .filter(|m| !opens_sentence(&text[..m.start()]))
        .count()
}

fn opens_sentence(preceding: &str) -> bool {
    match preceding.trim_end().chars().last() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?'),
    }
}
