//! Offline fitting of a [`ModelArtifact`] from a labeled corpus.
//!
//! The corpus layout is one `label<TAB>message` sample per line. The
//! fitted artifact uses the same [`TextNormalizer`] as serving, so the
//! vocabulary lines up with what the analysis engine tokenizes at runtime.

use crate::classifier::NaiveBayesClassifier;
use crate::model::{
    Label, ModelArtifact, ModelError, PerClass, SpamModel, TfNorm, TrainingMetadata,
    ARTIFACT_FORMAT_VERSION,
};
use crate::normalization::TextNormalizer;
use crate::vectorizer::Vectorizer;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_MAX_FEATURES: usize = 3000;
pub const DEFAULT_ALPHA: f64 = 1.0;

/// Every `TEST_STRIDE`th sample of each class is held out.
const TEST_STRIDE: usize = 5;
const MIN_TOKEN_LEN: usize = 2;

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("cannot read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("corpus has no {0} samples")]
    MissingClass(Label),

    #[error("training set produced an empty vocabulary")]
    EmptyVocabulary,

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label: Label,
    pub text: String,
}

pub fn parse_corpus(content: &str) -> Result<Vec<Sample>, TrainingError> {
    let mut seen = HashSet::new();
    let mut samples = Vec::new();

    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (label, text) = line.split_once('\t').ok_or_else(|| TrainingError::Parse {
            line: number + 1,
            message: "expected label<TAB>message".to_string(),
        })?;
        let label = Label::parse(label).ok_or_else(|| TrainingError::Parse {
            line: number + 1,
            message: format!("unknown label '{}'", label.trim()),
        })?;

        if seen.insert((label, text.to_string())) {
            samples.push(Sample {
                label,
                text: text.to_string(),
            });
        }
    }

    let duplicates = content.lines().filter(|l| !l.trim().is_empty()).count() - samples.len();
    if duplicates > 0 {
        log::debug!("Dropped {} duplicate samples", duplicates);
    }
    Ok(samples)
}

pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<Sample>, TrainingError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| TrainingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_corpus(&content)
}

/// Deterministic per-class holdout: positions 4, 9, 14, ... of each class
/// go to the test set.
pub fn split_corpus(samples: &[Sample]) -> (Vec<&Sample>, Vec<&Sample>) {
    let mut position: HashMap<Label, usize> = HashMap::new();
    let mut train = Vec::new();
    let mut test = Vec::new();

    for sample in samples {
        let seen = position.entry(sample.label).or_insert(0);
        if *seen % TEST_STRIDE == TEST_STRIDE - 1 {
            test.push(sample);
        } else {
            train.push(sample);
        }
        *seen += 1;
    }
    (train, test)
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub artifact: ModelArtifact,
    pub metadata: TrainingMetadata,
}

impl TrainingReport {
    pub fn into_model(self) -> Result<SpamModel, ModelError> {
        SpamModel::from_artifact(self.artifact)
    }
}

pub struct Trainer {
    max_features: usize,
    alpha: f64,
    normalizer: TextNormalizer,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FEATURES, DEFAULT_ALPHA)
    }
}

impl Trainer {
    pub fn new(max_features: usize, alpha: f64) -> Self {
        Self {
            max_features,
            alpha,
            normalizer: TextNormalizer::new(),
        }
    }

    pub fn train(&self, samples: &[Sample]) -> Result<TrainingReport, TrainingError> {
        let (train, test) = split_corpus(samples);
        for label in [Label::Ham, Label::Spam] {
            if !train.iter().any(|s| s.label == label) {
                return Err(TrainingError::MissingClass(label));
            }
        }

        let documents: Vec<(Label, Vec<String>)> = train
            .iter()
            .map(|s| (s.label, self.tokens(&s.text)))
            .collect();

        let vocabulary = self.select_vocabulary(&documents);
        if vocabulary.is_empty() {
            return Err(TrainingError::EmptyVocabulary);
        }
        let index: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, w)| (w.as_str(), i))
            .collect();

        let idf = smooth_idf(&documents, &index, vocabulary.len());
        let (class_log_prior, feature_log_prob) =
            self.fit_naive_bayes(&documents, &index, &idf);

        let mut artifact = ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            norm: TfNorm::L2,
            vocabulary,
            idf,
            class_log_prior,
            feature_log_prob,
            metadata: None,
        };

        let model = Arc::new(SpamModel::from_artifact(artifact.clone())?);
        let metadata = TrainingMetadata {
            train_accuracy: self.accuracy(&model, &train),
            test_accuracy: self.accuracy(&model, &test),
            train_samples: train.len(),
            test_samples: test.len(),
        };
        log::info!(
            "Trained on {} samples ({} held out), vocabulary {}: train accuracy {:.3}, test accuracy {:.3}",
            metadata.train_samples,
            metadata.test_samples,
            model.len(),
            metadata.train_accuracy,
            metadata.test_accuracy
        );

        artifact.metadata = Some(metadata.clone());
        Ok(TrainingReport { artifact, metadata })
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        self.normalizer
            .normalize(text)
            .into_iter()
            .filter(|t| t.len() >= MIN_TOKEN_LEN)
            .collect()
    }

    /// Most frequent terms across the training set, ties broken by word,
    /// returned in alphabetical order.
    fn select_vocabulary(&self, documents: &[(Label, Vec<String>)]) -> Vec<String> {
        let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, tokens) in documents {
            for token in tokens {
                *frequency.entry(token.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let mut vocabulary: Vec<String> = ranked.into_iter().map(|(w, _)| w.to_string()).collect();
        vocabulary.sort();
        vocabulary
    }

    fn fit_naive_bayes(
        &self,
        documents: &[(Label, Vec<String>)],
        index: &HashMap<&str, usize>,
        idf: &[f64],
    ) -> (PerClass<f64>, PerClass<Vec<f64>>) {
        let features = idf.len();
        let mut weights = PerClass {
            ham: vec![0.0; features],
            spam: vec![0.0; features],
        };
        let mut counts = PerClass { ham: 0usize, spam: 0usize };

        for (label, tokens) in documents {
            let row = tfidf_row(tokens, index, idf);
            let target = match label {
                Label::Ham => {
                    counts.ham += 1;
                    &mut weights.ham
                }
                Label::Spam => {
                    counts.spam += 1;
                    &mut weights.spam
                }
            };
            for (j, w) in row {
                target[j] += w;
            }
        }

        let total = documents.len() as f64;
        let priors = PerClass {
            ham: (counts.ham as f64 / total).ln(),
            spam: (counts.spam as f64 / total).ln(),
        };
        let log_probs = PerClass {
            ham: self.smoothed_log_probs(&weights.ham),
            spam: self.smoothed_log_probs(&weights.spam),
        };
        (priors, log_probs)
    }

    fn smoothed_log_probs(&self, weights: &[f64]) -> Vec<f64> {
        let denominator = weights.iter().sum::<f64>() + self.alpha * weights.len() as f64;
        weights
            .iter()
            .map(|w| ((w + self.alpha) / denominator).ln())
            .collect()
    }

    fn accuracy(&self, model: &Arc<SpamModel>, samples: &[&Sample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let vectorizer = Vectorizer::new(model.clone());
        let classifier = NaiveBayesClassifier::new(model.clone());
        let correct = samples
            .iter()
            .filter(|s| {
                let vector = vectorizer.vectorize(&self.normalizer.normalize(&s.text));
                classifier.classify(&vector).label == s.label
            })
            .count();
        correct as f64 / samples.len() as f64
    }
}

/// `ln((1 + n) / (1 + df)) + 1` per vocabulary word.
fn smooth_idf(
    documents: &[(Label, Vec<String>)],
    index: &HashMap<&str, usize>,
    features: usize,
) -> Vec<f64> {
    let mut document_frequency = vec![0usize; features];
    for (_, tokens) in documents {
        let present: HashSet<usize> = tokens
            .iter()
            .filter_map(|t| index.get(t.as_str()).copied())
            .collect();
        for j in present {
            document_frequency[j] += 1;
        }
    }

    let n = documents.len() as f64;
    document_frequency
        .into_iter()
        .map(|df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
        .collect()
}

/// L2-normalized TF-IDF weights of one training document.
fn tfidf_row(tokens: &[String], index: &HashMap<&str, usize>, idf: &[f64]) -> Vec<(usize, f64)> {
    let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
    for token in tokens {
        if let Some(&j) = index.get(token.as_str()) {
            *counts.entry(j).or_insert(0.0) += 1.0;
        }
    }

    let mut row: Vec<(usize, f64)> = counts.into_iter().map(|(j, tf)| (j, tf * idf[j])).collect();
    let length = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if length > 0.0 {
        for (_, w) in &mut row {
            *w /= length;
        }
    }
    row
}


#[cfg(test)]
mod tests {
    use super::fixture::SAMPLE_CORPUS;
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn samples(lines: &[(&str, &str)]) -> Vec<Sample> {
        lines
            .iter()
            .map(|(label, text)| Sample {
                label: Label::parse(label).unwrap(),
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_parse_corpus_skips_blanks_and_duplicates() {
        let corpus = "spam\tWin a prize now\n\nham\tLunch at noon\nSPAM\tWin a prize now\nHam\tsee you soon\n";
        let parsed = parse_corpus(corpus).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].label, Label::Spam);
        assert_eq!(parsed[2].label, Label::Ham);
        assert_eq!(parsed[2].text, "see you soon");
    }

    #[test]
    fn test_parse_corpus_names_bad_line() {
        let err = parse_corpus("spam\tok\nphish\tbad label\n").unwrap_err();
        assert!(matches!(err, TrainingError::Parse { line: 2, .. }));
        assert!(err.to_string().contains("line 2"));

        let err = parse_corpus("ham\tok\n\nno tab here\n").unwrap_err();
        assert!(matches!(err, TrainingError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_load_corpus_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "spam\tclaim cash").unwrap();
        writeln!(file, "ham\tsee you").unwrap();
        assert_eq!(load_corpus(file.path()).unwrap().len(), 2);

        let err = load_corpus("/nonexistent/corpus.tsv").unwrap_err();
        assert!(matches!(err, TrainingError::Io { .. }));
    }

    #[test]
    fn test_split_is_stratified() {
        let mut lines = Vec::new();
        for i in 0..10 {
            lines.push(("spam", format!("spam message {}", i)));
            lines.push(("ham", format!("ham message {}", i)));
        }
        let corpus: Vec<Sample> = lines
            .iter()
            .map(|(l, t)| Sample {
                label: Label::parse(l).unwrap(),
                text: t.clone(),
            })
            .collect();
        let (train, test) = split_corpus(&corpus);
        assert_eq!(train.len(), 16);
        assert_eq!(test.len(), 4);
        let held_out: Vec<&str> = test.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            held_out,
            vec!["spam message 4", "ham message 4", "spam message 9", "ham message 9"]
        );
    }

    #[test]
    fn test_missing_class_is_an_error() {
        let corpus = samples(&[("spam", "win cash"), ("spam", "claim prize")]);
        let err = Trainer::default().train(&corpus).unwrap_err();
        assert!(matches!(err, TrainingError::MissingClass(Label::Ham)));
    }

    #[test]
    fn test_vocabulary_is_sorted_and_capped() {
        let corpus = samples(&[
            ("spam", "prize prize prize claim claim cash"),
            ("ham", "lunch lunch noon"),
        ]);
        let report = Trainer::new(3, 1.0).train(&corpus).unwrap();
        // prize(3), claim(2), lunch(2) beat cash(1) and noon(1)
        assert_eq!(report.artifact.vocabulary, vec!["claim", "lunch", "prize"]);
    }

    #[test]
    fn test_single_letter_tokens_are_excluded() {
        let corpus = samples(&[("spam", "x claim"), ("ham", "b lunch")]);
        let report = Trainer::default().train(&corpus).unwrap();
        assert_eq!(report.artifact.vocabulary, vec!["claim", "lunch"]);
    }

    #[test]
    fn test_fitted_parameters() {
        let corpus = samples(&[("spam", "claim"), ("ham", "lunch")]);
        let report = Trainer::default().train(&corpus).unwrap();
        let artifact = &report.artifact;

        // each word appears in one of two documents
        let idf = (3.0f64 / 2.0).ln() + 1.0;
        assert!(artifact.idf.iter().all(|v| (v - idf).abs() < 1e-12));
        assert!((artifact.class_log_prior.spam - 0.5f64.ln()).abs() < 1e-12);

        // unit row weight 1.0 plus alpha over 1 + 2 * alpha
        let spam = &artifact.feature_log_prob.spam;
        assert!((spam[0] - (2.0f64 / 3.0).ln()).abs() < 1e-12);
        assert!((spam[1] - (1.0f64 / 3.0).ln()).abs() < 1e-12);
        assert_eq!(artifact.norm, TfNorm::L2);
    }

    #[test]
    fn test_sample_corpus_trains_accurately() {
        let samples = parse_corpus(SAMPLE_CORPUS).unwrap();
        let report = Trainer::default().train(&samples).unwrap();
        let metadata = &report.metadata;
        assert_eq!(metadata.train_samples + metadata.test_samples, samples.len());
        assert_eq!(metadata.test_samples, 8);
        assert!(metadata.train_accuracy >= 0.9, "{:?}", metadata);
        assert_eq!(report.artifact.metadata.as_ref(), Some(metadata));
        assert!(report.into_model().is_ok());
    }

    #[test]
    fn test_artifact_round_trips_through_file() {
        let samples = parse_corpus(SAMPLE_CORPUS).unwrap();
        let report = Trainer::default().train(&samples).unwrap();
        let file = NamedTempFile::new().unwrap();
        report.artifact.to_file(file.path()).unwrap();

        let loaded = SpamModel::load(file.path()).unwrap();
        assert_eq!(loaded.len(), report.artifact.vocabulary.len());
        assert_eq!(loaded.metadata(), Some(&report.metadata));
    }
}
