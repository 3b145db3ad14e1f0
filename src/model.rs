//! Trained model data: vocabulary, IDF weights and per-class log-probabilities.
//!
//! A [`SpamModel`] is built once from a serialized [`ModelArtifact`] and is
//! never mutated afterwards. The classifier, vectorizer and explainer share
//! it through an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("cannot read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model: {0}")]
    Invalid(String),
}

/// The two classes the classifier decides between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Ham,
    Spam,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ham => "ham",
            Label::Spam => "spam",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ham" => Some(Label::Ham),
            "spam" => Some(Label::Spam),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value held once per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClass<T> {
    pub ham: T,
    pub spam: T,
}

impl<T> PerClass<T> {
    pub fn get(&self, label: Label) -> &T {
        match label {
            Label::Ham => &self.ham,
            Label::Spam => &self.spam,
        }
    }
}

/// Row normalization applied to TF-IDF vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TfNorm {
    #[default]
    L2,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub train_samples: usize,
    pub test_samples: usize,
}

/// On-disk representation of a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    #[serde(default)]
    pub norm: TfNorm,
    pub vocabulary: Vec<String>,
    pub idf: Vec<f64>,
    pub class_log_prior: PerClass<f64>,
    pub feature_log_prob: PerClass<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrainingMetadata>,
}

impl ModelArtifact {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Immutable, validated model shared by every analysis call.
#[derive(Debug)]
pub struct SpamModel {
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
    norm: TfNorm,
    class_log_prior: PerClass<f64>,
    feature_log_prob: PerClass<Vec<f64>>,
    metadata: Option<TrainingMetadata>,
}

impl SpamModel {
    /// Load and validate a model artifact. Any failure here is fatal for a
    /// serving process.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let model = Self::from_artifact(ModelArtifact::from_file(path)?)?;
        log::info!(
            "Loaded model from {} ({} features, norm {:?})",
            path.display(),
            model.len(),
            model.norm
        );
        Ok(model)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelError::Invalid(format!(
                "unsupported format version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }

        let size = artifact.vocabulary.len();
        if size == 0 {
            return Err(ModelError::Invalid("vocabulary is empty".to_string()));
        }
        if artifact.idf.len() != size {
            return Err(ModelError::Invalid(format!(
                "idf has {} entries for {} vocabulary words",
                artifact.idf.len(),
                size
            )));
        }
        for (name, row) in [
            ("ham", &artifact.feature_log_prob.ham),
            ("spam", &artifact.feature_log_prob.spam),
        ] {
            if row.len() != size {
                return Err(ModelError::Invalid(format!(
                    "{} log-probabilities have {} entries for {} vocabulary words",
                    name,
                    row.len(),
                    size
                )));
            }
            if let Some(bad) = row.iter().find(|v| !v.is_finite() || **v > 0.0) {
                return Err(ModelError::Invalid(format!(
                    "{} log-probability {} is not a finite value <= 0",
                    name, bad
                )));
            }
        }
        if let Some(bad) = artifact.idf.iter().find(|v| !v.is_finite() || **v <= 0.0) {
            return Err(ModelError::Invalid(format!("idf weight {} is not positive", bad)));
        }
        for prior in [artifact.class_log_prior.ham, artifact.class_log_prior.spam] {
            if !prior.is_finite() || prior > 0.0 {
                return Err(ModelError::Invalid(format!(
                    "class log prior {} is not a finite value <= 0",
                    prior
                )));
            }
        }

        let mut index = HashMap::with_capacity(size);
        for (i, word) in artifact.vocabulary.iter().enumerate() {
            if index.insert(word.clone(), i).is_some() {
                return Err(ModelError::Invalid(format!(
                    "duplicate vocabulary word '{}'",
                    word
                )));
            }
        }

        Ok(Self {
            vocabulary: artifact.vocabulary,
            index,
            idf: artifact.idf,
            norm: artifact.norm,
            class_log_prior: artifact.class_log_prior,
            feature_log_prob: artifact.feature_log_prob,
            metadata: artifact.metadata,
        })
    }

    pub fn to_artifact(&self) -> ModelArtifact {
        ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            norm: self.norm,
            vocabulary: self.vocabulary.clone(),
            idf: self.idf.clone(),
            class_log_prior: self.class_log_prior.clone(),
            feature_log_prob: self.feature_log_prob.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    pub fn feature_index(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn word(&self, index: usize) -> &str {
        &self.vocabulary[index]
    }

    pub fn idf(&self, index: usize) -> f64 {
        self.idf[index]
    }

    pub fn norm(&self) -> TfNorm {
        self.norm
    }

    pub fn log_prior(&self, label: Label) -> f64 {
        *self.class_log_prior.get(label)
    }

    pub fn log_prob(&self, label: Label, index: usize) -> f64 {
        self.feature_log_prob.get(label)[index]
    }

    pub fn metadata(&self) -> Option<&TrainingMetadata> {
        self.metadata.as_ref()
    }
}
