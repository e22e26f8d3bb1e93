// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Labelled news datasets for offline training

use anyhow::{bail, Context, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Binary news label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Real => "real",
            Label::Fake => "fake",
        }
    }

    /// Numeric value used for metrics (1 = fake)
    pub fn to_binary(&self) -> u8 {
        match self {
            Label::Real => 0,
            Label::Fake => 1,
        }
    }

    pub fn from_binary(value: u8) -> Self {
        if value == 0 {
            Label::Real
        } else {
            Label::Fake
        }
    }

    /// Parse a dataset label. Numbers map 0 to real and anything else to fake;
    /// the words real/true and fake/false are accepted in any case.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<f64>() {
            return Some(if value == 0.0 { Label::Real } else { Label::Fake });
        }
        match trimmed.to_lowercase().as_str() {
            "real" | "true" | "reliable" => Some(Label::Real),
            "fake" | "false" | "unreliable" => Some(Label::Fake),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single labelled article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub text: String,
    pub label: Label,
}

/// A loaded dataset with its provenance
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub source: String,
    /// SHA-256 of the source file, or of the generated content
    pub fingerprint: String,
    pub samples: Vec<Sample>,
}

/// Train/test partition of a dataset
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<Sample>,
    pub test: Vec<Sample>,
}

impl Dataset {
    /// Load a CSV file with `text` and `label` columns (any order, extra
    /// columns ignored). Rows with an empty text or label are dropped.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dataset file: {}", path.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header in {}", path.display()))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let (Some(text_col), Some(label_col)) = (column("text"), column("label")) else {
            bail!(
                "Dataset {} must contain 'text' and 'label' columns",
                path.display()
            );
        };

        let mut samples = Vec::new();
        let mut dropped = 0usize;
        for (idx, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("Failed to read record {} in {}", idx, path.display()))?;

            let text = record.get(text_col).unwrap_or("").trim();
            let raw_label = record.get(label_col).unwrap_or("").trim();
            if text.is_empty() || raw_label.is_empty() {
                dropped += 1;
                continue;
            }
            let Some(label) = Label::parse(raw_label) else {
                tracing::warn!("Skipping record {} in {}: unrecognised label", idx, path.display());
                dropped += 1;
                continue;
            };

            samples.push(Sample {
                id: format!("row_{}", idx),
                text: text.to_string(),
                label,
            });
        }

        if samples.is_empty() {
            bail!("Dataset {} contains no usable rows", path.display());
        }
        if dropped > 0 {
            tracing::info!("Dropped {} incomplete rows from {}", dropped, path.display());
        }

        let fingerprint = fingerprint_file(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string());

        Ok(Self {
            name,
            source: path.display().to_string(),
            fingerprint,
            samples,
        })
    }

    /// Seeded synthetic dataset for development and tests
    pub fn load_synthetic(size: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let fake_phrases = [
            "BREAKING: Scientists confirm shocking discovery!",
            "You won't believe what happened next!!",
            "The government doesn't want you to know this secret.",
            "This miracle cure doctors hate is unbelievable!",
            "Secret conspiracy revealed exclusively, share before it is deleted!",
        ];

        let real_phrases = [
            "According to official reports released on Monday,",
            "Research published in a peer-reviewed journal found",
            "A statement from a verified spokesperson confirmed",
            "Data analysis shows consistent trends over the decade.",
            "Expert consensus indicates gradual improvement.",
        ];

        let topics = [
            "the regional election results",
            "new climate policy",
            "hospital funding",
            "the national economy",
            "local school budgets",
        ];

        let samples: Vec<Sample> = (0..size)
            .map(|i| {
                let is_fake = rng.gen_bool(0.5);
                let phrases = if is_fake { &fake_phrases } else { &real_phrases };
                let first = phrases[rng.gen_range(0..phrases.len())];
                let second = phrases[rng.gen_range(0..phrases.len())];
                let topic = topics[rng.gen_range(0..topics.len())];

                Sample {
                    id: format!("synthetic_{}", i),
                    text: format!("{} {} The story concerns {}.", first, second, topic),
                    label: if is_fake { Label::Fake } else { Label::Real },
                }
            })
            .collect();

        let mut hasher = Sha256::new();
        for sample in &samples {
            hasher.update(sample.text.as_bytes());
            hasher.update([sample.label.to_binary()]);
        }

        Self {
            name: "synthetic".to_string(),
            source: "generated".to_string(),
            fingerprint: hex::encode(hasher.finalize()),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Stratified, seeded split: each class contributes `test_fraction` of
    /// its samples (rounded) to the test set.
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<Split> {
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            bail!("test fraction must be in (0, 1), got {}", test_fraction);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for label in [Label::Real, Label::Fake] {
            let mut class: Vec<&Sample> = self.samples.iter().filter(|s| s.label == label).collect();
            class.shuffle(&mut rng);

            let n_test = (class.len() as f64 * test_fraction).round() as usize;
            let (class_test, class_train) = class.split_at(n_test.min(class.len()));
            test.extend(class_test.iter().map(|s| (*s).clone()));
            train.extend(class_train.iter().map(|s| (*s).clone()));
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);

        if train.is_empty() || test.is_empty() {
            bail!(
                "split of {} samples left an empty partition (train {}, test {})",
                self.samples.len(),
                train.len(),
                test.len()
            );
        }

        Ok(Split { train, test })
    }

    pub fn label_distribution(samples: &[Sample]) -> HashMap<Label, usize> {
        let mut dist = HashMap::new();
        for sample in samples {
            *dist.entry(sample.label).or_insert(0) += 1;
        }
        dist
    }
}

/// Hex-encoded SHA-256 of a file's contents
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_label_parsing() {
        assert_eq!(Label::parse("0"), Some(Label::Real));
        assert_eq!(Label::parse("1"), Some(Label::Fake));
        assert_eq!(Label::parse("3"), Some(Label::Fake));
        assert_eq!(Label::parse(" FAKE "), Some(Label::Fake));
        assert_eq!(Label::parse("True"), Some(Label::Real));
        assert_eq!(Label::parse("maybe"), None);
        assert_eq!(Label::from_binary(Label::Fake.to_binary()), Label::Fake);
    }

    #[test]
    fn test_label_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Label::Fake).unwrap(), "\"fake\"");
        let label: Label = serde_json::from_str("\"real\"").unwrap();
        assert_eq!(label, Label::Real);
    }

    #[test]
    fn test_load_csv_drops_incomplete_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,title,text,label").unwrap();
        writeln!(file, "1,a,\"Officials, in a statement, confirmed the plan\",0").unwrap();
        writeln!(file, "2,b,SHOCKING secret revealed,1").unwrap();
        writeln!(file, "3,c,,1").unwrap();
        writeln!(file, "4,d,No label here,").unwrap();
        writeln!(file, "5,e,Another bombshell,fake").unwrap();
        file.flush().unwrap();

        let dataset = Dataset::load_csv(file.path()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.samples[0].text, "Officials, in a statement, confirmed the plan");
        assert_eq!(dataset.samples[0].label, Label::Real);
        assert_eq!(dataset.samples[2].label, Label::Fake);
        assert_eq!(dataset.fingerprint.len(), 64);
    }

    #[test]
    fn test_load_csv_requires_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "body,class").unwrap();
        writeln!(file, "hello,1").unwrap();
        file.flush().unwrap();

        assert!(Dataset::load_csv(file.path()).is_err());
    }

    #[test]
    fn test_synthetic_dataset_is_seeded() {
        let a = Dataset::load_synthetic(50, 42);
        let b = Dataset::load_synthetic(50, 42);
        let c = Dataset::load_synthetic(50, 7);

        assert_eq!(a.len(), 50);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_stratified_split() {
        let dataset = Dataset::load_synthetic(1000, 42);
        let split = dataset.train_test_split(0.2, 42).unwrap();
        assert_eq!(split.train.len() + split.test.len(), 1000);

        let full = Dataset::label_distribution(&dataset.samples);
        let test = Dataset::label_distribution(&split.test);
        for label in [Label::Real, Label::Fake] {
            let expected = (full[&label] as f64 * 0.2).round() as usize;
            assert_eq!(test[&label], expected);
        }
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let dataset = Dataset::load_synthetic(20, 1);
        assert!(dataset.train_test_split(0.0, 1).is_err());
        assert!(dataset.train_test_split(1.0, 1).is_err());
    }
}
