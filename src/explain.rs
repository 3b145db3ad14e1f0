//! Attribution of a verdict to the vocabulary features that drove it.

use crate::classifier::ClassificationResult;
use crate::model::{Label, SpamModel};
use crate::vectorizer::FeatureVector;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub word: String,
    pub contribution: f64,
    /// TF-IDF weight of the word in the analysed text.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub top_features: Vec<FeatureContribution>,
    pub suspicious_words: Vec<String>,
    pub narrative: String,
    pub confidence_reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExplanationConfig {
    pub top_features: usize,
    pub suspicious_words: usize,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            top_features: 10,
            suspicious_words: 5,
        }
    }
}

const NARRATIVE_KEYWORDS: usize = 3;

pub struct Explainer {
    model: Arc<SpamModel>,
    config: ExplanationConfig,
}

impl Explainer {
    pub fn new(model: Arc<SpamModel>, config: ExplanationConfig) -> Self {
        Self { model, config }
    }

    pub fn explain(&self, vector: &FeatureVector, result: &ClassificationResult) -> Explanation {
        let top_features = self.top_features(vector, result.label);
        let suspicious_words = top_features
            .iter()
            .take(self.config.suspicious_words)
            .map(|f| f.word.clone())
            .collect();

        Explanation {
            narrative: narrative(result.label, result.confidence, &top_features),
            confidence_reasoning: confidence_reasoning(result.confidence).to_string(),
            top_features,
            suspicious_words,
        }
    }

    /// Features ranked by `weight * P(word | label)`, highest first.
    pub fn top_features(&self, vector: &FeatureVector, label: Label) -> Vec<FeatureContribution> {
        let mut contributions: Vec<FeatureContribution> = vector
            .iter()
            .map(|entry| FeatureContribution {
                word: self.model.word(entry.index).to_string(),
                contribution: entry.weight * self.model.log_prob(label, entry.index).exp(),
                weight: entry.weight,
            })
            .collect();

        // sort_by is stable: equal contributions keep feature-index order
        contributions.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
        contributions.truncate(self.config.top_features);
        contributions
    }
}

fn narrative(label: Label, confidence: f64, top_features: &[FeatureContribution]) -> String {
    let base = match (label, confidence) {
        (Label::Spam, c) if c >= 90.0 => "This email is HIGHLY LIKELY spam.",
        (Label::Spam, c) if c >= 70.0 => "This email appears to be spam.",
        (Label::Spam, _) => "This email shows some spam characteristics.",
        (Label::Ham, c) if c >= 90.0 => "This email is HIGHLY LIKELY legitimate.",
        (Label::Ham, c) if c >= 70.0 => "This email appears to be legitimate.",
        (Label::Ham, _) => "This email shows characteristics of legitimate mail.",
    };

    let closing = match label {
        Label::Spam => "These words are commonly found in spam messages.",
        Label::Ham => "The content and language patterns match normal communication.",
    };

    if top_features.is_empty() {
        return match label {
            Label::Spam => format!("{} Overall text pattern matches spam emails.", base),
            Label::Ham => format!("{} {}", base, closing),
        };
    }

    let keywords: Vec<&str> = top_features
        .iter()
        .take(NARRATIVE_KEYWORDS)
        .map(|f| f.word.as_str())
        .collect();
    format!("{} Key indicators: {}. {}", base, keywords.join(", "), closing)
}

pub fn confidence_reasoning(confidence: f64) -> &'static str {
    if confidence >= 95.0 {
        "Very High Confidence - The model is almost certain about this classification."
    } else if confidence >= 85.0 {
        "High Confidence - Strong indicators support this classification."
    } else if confidence >= 70.0 {
        "Moderate Confidence - Clear patterns support this classification."
    } else if confidence >= 60.0 {
        "Low-Moderate Confidence - Some patterns support this classification."
    } else {
        "Low Confidence - The classification is uncertain. Manual review recommended."
    }
}

/// Wrap case-insensitive occurrences of `words` in `text` with markers.
/// Longer words are applied first so a word never splits a longer match.
pub fn highlight(text: &str, words: &[String], open: &str, close: &str) -> String {
    let mut words: Vec<&str> = words
        .iter()
        .map(|w| w.as_str())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return text.to_string();
    }
    words.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    words.dedup();

    let pattern = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re
            .replace_all(text, |caps: &regex::Captures| format!("{}{}{}", open, &caps[0], close))
            .into_owned(),
        Err(e) => {
            log::warn!("Could not build highlight pattern: {}", e);
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelArtifact, PerClass, TfNorm, ARTIFACT_FORMAT_VERSION};
    use crate::vectorizer::Vectorizer;

    fn model() -> Arc<SpamModel> {
        let artifact = ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            norm: TfNorm::None,
            vocabulary: ["cash", "claim", "free", "lunch", "prize", "winner"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            idf: vec![1.0; 6],
            class_log_prior: PerClass {
                ham: (0.5f64).ln(),
                spam: (0.5f64).ln(),
            },
            feature_log_prob: PerClass {
                ham: vec![-4.0, -4.0, -4.0, -1.0, -4.0, -4.0],
                spam: vec![-2.0, -1.5, -3.0, -5.0, -1.0, -2.0],
            },
            metadata: None,
        };
        Arc::new(SpamModel::from_artifact(artifact).unwrap())
    }

    fn spam_verdict(confidence: f64) -> ClassificationResult {
        ClassificationResult {
            label: Label::Spam,
            confidence,
            spam_probability: confidence / 100.0,
            ham_probability: 1.0 - confidence / 100.0,
        }
    }

    #[test]
    fn test_ranks_by_contribution() {
        let model = model();
        let vector = Vectorizer::new(model.clone()).vectorize(&["free", "prize", "claim", "cash"]);
        let explainer = Explainer::new(model, ExplanationConfig::default());
        let features = explainer.top_features(&vector, Label::Spam);
        let words: Vec<&str> = features.iter().map(|f| f.word.as_str()).collect();
        assert_eq!(words, vec!["prize", "claim", "cash", "free"]);
        assert!((features[0].contribution - (-1.0f64).exp()).abs() < 1e-12);
        assert_eq!(features[0].weight, 1.0);
    }

    #[test]
    fn test_ties_keep_vectorizer_order() {
        let model = model();
        // cash and winner share the same spam log-probability and weight
        let vector = Vectorizer::new(model.clone()).vectorize(&["winner", "cash"]);
        let explainer = Explainer::new(model, ExplanationConfig::default());
        let words: Vec<String> = explainer
            .top_features(&vector, Label::Spam)
            .into_iter()
            .map(|f| f.word)
            .collect();
        assert_eq!(words, vec!["cash", "winner"]);
    }

    #[test]
    fn test_contribution_uses_label_row() {
        let model = model();
        let vector = Vectorizer::new(model.clone()).vectorize(&["lunch", "prize"]);
        let explainer = Explainer::new(model, ExplanationConfig::default());
        assert_eq!(explainer.top_features(&vector, Label::Ham)[0].word, "lunch");
        assert_eq!(explainer.top_features(&vector, Label::Spam)[0].word, "prize");
    }

    #[test]
    fn test_limits_top_and_suspicious_counts() {
        let model = model();
        let vector = Vectorizer::new(model.clone())
            .vectorize(&["cash", "claim", "free", "lunch", "prize", "winner"]);
        let explainer = Explainer::new(
            model,
            ExplanationConfig {
                top_features: 4,
                suspicious_words: 2,
            },
        );
        let explanation = explainer.explain(&vector, &spam_verdict(95.0));
        assert_eq!(explanation.top_features.len(), 4);
        assert_eq!(explanation.suspicious_words, vec!["prize", "claim"]);
    }

    #[test]
    fn test_spam_narrative_names_three_words() {
        let model = model();
        let vector =
            Vectorizer::new(model.clone()).vectorize(&["free", "prize", "claim", "cash"]);
        let explanation =
            Explainer::new(model, ExplanationConfig::default()).explain(&vector, &spam_verdict(92.0));
        assert_eq!(
            explanation.narrative,
            "This email is HIGHLY LIKELY spam. Key indicators: prize, claim, cash. \
             These words are commonly found in spam messages."
        );
        assert!(explanation.confidence_reasoning.starts_with("High Confidence"));
    }

    #[test]
    fn test_empty_vector_falls_back() {
        let model = model();
        let explainer = Explainer::new(model, ExplanationConfig::default());
        let explanation = explainer.explain(&FeatureVector::default(), &ClassificationResult::neutral());
        assert!(explanation.top_features.is_empty());
        assert!(explanation.suspicious_words.is_empty());
        assert_eq!(
            explanation.narrative,
            "This email shows characteristics of legitimate mail. \
             The content and language patterns match normal communication."
        );
        assert!(explanation.confidence_reasoning.starts_with("Low Confidence"));

        let spam = explainer.explain(&FeatureVector::default(), &spam_verdict(75.0));
        assert_eq!(
            spam.narrative,
            "This email appears to be spam. Overall text pattern matches spam emails."
        );
    }

    #[test]
    fn test_narrative_buckets() {
        let features = vec![FeatureContribution {
            word: "lunch".to_string(),
            contribution: 0.3,
            weight: 1.0,
        }];
        assert!(narrative(Label::Ham, 90.0, &features).starts_with("This email is HIGHLY LIKELY legitimate."));
        assert!(narrative(Label::Ham, 89.9, &features).starts_with("This email appears to be legitimate."));
        assert!(narrative(Label::Spam, 69.9, &features)
            .starts_with("This email shows some spam characteristics."));
        assert!(narrative(Label::Ham, 70.0, &features).contains("Key indicators: lunch."));
    }

    #[test]
    fn test_confidence_reasoning_buckets() {
        assert!(confidence_reasoning(99.0).starts_with("Very High"));
        assert!(confidence_reasoning(95.0).starts_with("Very High"));
        assert!(confidence_reasoning(85.0).starts_with("High"));
        assert!(confidence_reasoning(70.0).starts_with("Moderate"));
        assert!(confidence_reasoning(60.0).starts_with("Low-Moderate"));
        assert!(confidence_reasoning(50.0).starts_with("Low Confidence"));
    }

    #[test]
    fn test_highlight_is_case_insensitive() {
        let words = vec!["prize".to_string(), "claim".to_string()];
        let marked = highlight("Claim your PRIZE today", &words, "[", "]");
        assert_eq!(marked, "[Claim] your [PRIZE] today");
    }

    #[test]
    fn test_highlight_prefers_longer_words() {
        let words = vec!["win".to_string(), "winner".to_string()];
        assert_eq!(highlight("Winner!", &words, "<", ">"), "<Winner>!");
        assert_eq!(highlight("no words", &[], "<", ">"), "no words");
    }
}
