use crate::model::{Label, SpamModel};
use crate::vectorizer::FeatureVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Posterior of the winning class as a percentage, always >= 50.
    pub confidence: f64,
    pub spam_probability: f64,
    pub ham_probability: f64,
}

impl ClassificationResult {
    /// Verdict used when there is nothing to classify on.
    pub fn neutral() -> Self {
        Self {
            label: Label::Ham,
            confidence: 50.0,
            spam_probability: 0.5,
            ham_probability: 0.5,
        }
    }

    pub fn is_spam(&self) -> bool {
        self.label == Label::Spam
    }
}

/// Multinomial naive Bayes over TF-IDF features, read-only.
pub struct NaiveBayesClassifier {
    model: Arc<SpamModel>,
}

impl NaiveBayesClassifier {
    pub fn new(model: Arc<SpamModel>) -> Self {
        Self { model }
    }

    /// Joint log-likelihood of the vector under one class.
    pub fn log_score(&self, vector: &FeatureVector, label: Label) -> f64 {
        vector.iter().fold(self.model.log_prior(label), |acc, entry| {
            acc + entry.weight * self.model.log_prob(label, entry.index)
        })
    }

    pub fn classify(&self, vector: &FeatureVector) -> ClassificationResult {
        if vector.is_empty() {
            return ClassificationResult::neutral();
        }

        let spam_score = self.log_score(vector, Label::Spam);
        let ham_score = self.log_score(vector, Label::Ham);

        // shift by the max before exponentiating so neither term underflows to 0/0
        let max = spam_score.max(ham_score);
        let spam_exp = (spam_score - max).exp();
        let ham_exp = (ham_score - max).exp();
        let total = spam_exp + ham_exp;
        let spam_probability = spam_exp / total;
        let ham_probability = ham_exp / total;

        let (label, winner) = if spam_probability > ham_probability {
            (Label::Spam, spam_probability)
        } else {
            (Label::Ham, ham_probability)
        };

        ClassificationResult {
            label,
            confidence: winner * 100.0,
            spam_probability,
            ham_probability,
        }
    }
}
