// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dictionary-free noun lemmatizer
//!
//! Reduces plural nouns to their singular base form with the suffix rules
//! of WordNet's noun morphology, an irregular-plural exception table, and a
//! set of guards for words that merely end in "s" (adjectives in -ous,
//! Latin singulars in -us/-is, mass nouns in -ics, ...).
//!
//! The output is a fixed point: lemmatizing a lemma returns it unchanged
//! for every word the tables cover.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static IRREGULAR: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("gentlemen", "gentleman"),
        ("businessmen", "businessman"),
        ("chairmen", "chairman"),
        ("congressmen", "congressman"),
        ("policemen", "policeman"),
        ("spokesmen", "spokesman"),
        ("firemen", "fireman"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("data", "datum"),
        ("media", "medium"),
        ("criteria", "criterion"),
        ("phenomena", "phenomenon"),
        ("analyses", "analysis"),
        ("crises", "crisis"),
        ("theses", "thesis"),
        ("hypotheses", "hypothesis"),
        ("diagnoses", "diagnosis"),
        ("wolves", "wolf"),
        ("lives", "life"),
        ("wives", "wife"),
        ("knives", "knife"),
        ("leaves", "leaf"),
        ("halves", "half"),
        ("selves", "self"),
        ("thieves", "thief"),
        ("shelves", "shelf"),
        ("quizzes", "quiz"),
        ("aches", "ache"),
        ("headaches", "headache"),
        ("niches", "niche"),
        ("caches", "cache"),
        ("cliches", "cliche"),
        ("avalanches", "avalanche"),
        ("movies", "movie"),
        ("cookies", "cookie"),
        ("zombies", "zombie"),
        ("calories", "calorie"),
        ("rookies", "rookie"),
        ("selfies", "selfie"),
        ("goalies", "goalie"),
    ]
    .into_iter()
    .collect()
});

static INVARIANT: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "news", "series", "species", "means", "always", "perhaps", "whereas",
        "afterwards", "sometimes", "besides", "towards", "backwards", "forwards",
        "nowadays", "overseas", "headquarters", "thanks", "whereabouts", "chaos",
        "bias", "alias", "atlas", "canvas", "christmas", "texas", "kansas",
        "arkansas", "lens", "pants", "sports",
    ]
    .into_iter()
    .collect()
});

/// Endings that look plural but belong to singular words
const SINGULAR_ENDINGS: &[&str] = &["ss", "us", "is", "ous", "ics"];

/// Upper bound on repeated reductions of one word
const MAX_PASSES: usize = 4;

/// Plural suffixes rewritten to a replacement, tried in order
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("shes", "sh"),
    ("ches", "ch"),
    ("xes", "x"),
    ("ies", "y"),
    ("s", ""),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Lemmatizer;

impl Lemmatizer {
    pub fn new() -> Self {
        Self
    }

    /// Lemmatize a lowercase ASCII token as a noun
    ///
    /// Reduction repeats until the word stops changing, so a stripped
    /// possessive that exposes an irregular plural ("womens" -> "women")
    /// still lands on its base form.
    pub fn lemmatize<'a>(&self, word: &'a str) -> Cow<'a, str> {
        let mut lemma = Self::reduce(word);
        for _ in 0..MAX_PASSES {
            let next = Self::reduce(&lemma);
            if next == lemma {
                break;
            }
            let next = next.into_owned();
            lemma = Cow::Owned(next);
        }
        lemma
    }

    fn reduce(word: &str) -> Cow<'_, str> {
        if let Some(base) = IRREGULAR.get(word) {
            return Cow::Borrowed(*base);
        }
        if word.len() <= 3 || INVARIANT.contains(word) {
            return Cow::Borrowed(word);
        }
        if SINGULAR_ENDINGS.iter().any(|end| word.ends_with(end)) {
            return Cow::Borrowed(word);
        }

        for (suffix, replacement) in SUFFIX_RULES {
            let Some(stem) = word.strip_suffix(suffix) else {
                continue;
            };
            // "ties", "lies", "dies": only the plural "s" goes
            if *suffix == "ies" && stem.len() <= 1 {
                return Cow::Owned(format!("{stem}ie"));
            }
            return Cow::Owned(format!("{stem}{replacement}"));
        }

        Cow::Borrowed(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemma(word: &str) -> String {
        Lemmatizer::new().lemmatize(word).into_owned()
    }

    #[test]
    fn test_regular_plurals() {
        assert_eq!(lemma("secrets"), "secret");
        assert_eq!(lemma("studies"), "study");
        assert_eq!(lemma("churches"), "church");
        assert_eq!(lemma("boxes"), "box");
        assert_eq!(lemma("classes"), "class");
        assert_eq!(lemma("houses"), "house");
        assert_eq!(lemma("ties"), "tie");
    }

    #[test]
    fn test_irregular_plurals() {
        assert_eq!(lemma("children"), "child");
        assert_eq!(lemma("women"), "woman");
        assert_eq!(lemma("media"), "medium");
        assert_eq!(lemma("crises"), "crisis");
    }

    #[test]
    fn test_singular_lookalikes_untouched() {
        for word in ["news", "virus", "crisis", "famous", "politics", "glass", "bus", "bias"] {
            assert_eq!(lemma(word), word);
        }
    }

    #[test]
    fn test_possessive_of_irregular_plural() {
        // apostrophes are gone by the time tokens reach the lemmatizer
        assert_eq!(lemma("womens"), "woman");
        assert_eq!(lemma("childrens"), "child");
        assert_eq!(lemma("mens"), "man");
    }

    #[test]
    fn test_lemma_is_fixed_point() {
        for word in [
            "secrets", "studies", "churches", "children", "analyses", "wolves", "lives", "womens",
            "childrens", "spokesmens",
        ] {
            let once = lemma(word);
            assert_eq!(lemma(&once), once, "{word} -> {once}");
        }
    }
}
