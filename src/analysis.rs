//! The analysis engine: one immutable bundle of the normalizer, vectorizer,
//! classifier, explainer and URL scorer, safe to share across threads.

use crate::classifier::{ClassificationResult, NaiveBayesClassifier};
use crate::config::Config;
use crate::explain::{Explainer, FeatureContribution};
use crate::model::{ModelError, SpamModel};
use crate::normalization::TextNormalizer;
use crate::phishing::{PhishingResult, UrlRiskScorer};
use crate::vectorizer::Vectorizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub classification: ClassificationResult,
    pub phishing: PhishingResult,
    pub top_features: Vec<FeatureContribution>,
    pub suspicious_words: Vec<String>,
    pub narrative: String,
    pub confidence_reasoning: String,
}

/// A message as handed over by a mailbox fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
    pub sender: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl MailMessage {
    pub fn analysis_text(&self) -> String {
        format!("{} {}", self.subject, self.body).trim().to_string()
    }
}

pub struct AnalysisEngine {
    normalizer: TextNormalizer,
    vectorizer: Vectorizer,
    classifier: NaiveBayesClassifier,
    explainer: Explainer,
    scorer: UrlRiskScorer,
    model: Arc<SpamModel>,
}

impl AnalysisEngine {
    pub fn new(model: Arc<SpamModel>, config: &Config) -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            vectorizer: Vectorizer::new(model.clone()),
            classifier: NaiveBayesClassifier::new(model.clone()),
            explainer: Explainer::new(model.clone(), config.explanation.clone()),
            scorer: UrlRiskScorer::from_config(&config.phishing),
            model,
        }
    }

    /// Load the model named by `config.model_path` and build the engine.
    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        let model = SpamModel::load(&config.model_path)?;
        Ok(Self::new(Arc::new(model), config))
    }

    pub fn model(&self) -> &SpamModel {
        &self.model
    }

    /// Full verdict for one text. Total over every input, including empty.
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        let tokens = self.normalizer.normalize(text);
        let vector = self.vectorizer.vectorize(&tokens);
        let classification = self.classifier.classify(&vector);
        let explanation = self.explainer.explain(&vector, &classification);
        let phishing = self.scorer.score_urls(text);

        log::debug!(
            "Verdict {} ({:.1}%), phishing score {:.2} over {} URL(s)",
            classification.label,
            classification.confidence,
            phishing.score,
            phishing.url_count
        );

        AnalysisResult {
            classification,
            phishing,
            top_features: explanation.top_features,
            suspicious_words: explanation.suspicious_words,
            narrative: explanation.narrative,
            confidence_reasoning: explanation.confidence_reasoning,
        }
    }

    pub fn analyze_message(&self, message: &MailMessage) -> AnalysisResult {
        self.analyze(&message.analysis_text())
    }

    pub fn preprocess(&self, text: &str) -> String {
        self.normalizer.preprocess(text)
    }

    pub fn classify_text(&self, text: &str) -> ClassificationResult {
        let tokens = self.normalizer.normalize(text);
        self.classifier.classify(&self.vectorizer.vectorize(&tokens))
    }

    pub fn classify_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<ClassificationResult> {
        texts.iter().map(|t| self.classify_text(t.as_ref())).collect()
    }

    pub fn score_urls(&self, text: &str) -> PhishingResult {
        self.scorer.score_urls(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Label;
    use crate::phishing::RiskLevel;
    use crate::training::fixture::sample_model;

    const URGENT: &str = "URGENT! You have won a $5000 prize. Click here: http://bit.ly/claim now!";
    const LUNCH: &str = "Hey, confirming lunch tomorrow at noon, see you then.";

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(sample_model(), &Config::default())
    }

    #[test]
    fn test_urgent_prize_with_shortener() {
        let result = engine().analyze(URGENT);
        assert_eq!(result.classification.label, Label::Spam);
        assert!(result.classification.confidence > 70.0, "{:?}", result.classification);
        assert_eq!(result.phishing.url_count, 1);
        assert!(result
            .phishing
            .suspicious_findings
            .iter()
            .any(|f| f.reasons.iter().any(|r| r.contains("Uses URL shortener"))));
        assert!(matches!(
            result.phishing.risk_level,
            RiskLevel::Medium | RiskLevel::High
        ));
        assert!(!result.suspicious_words.is_empty());
        assert!(result.narrative.contains("Key indicators:"));
    }

    #[test]
    fn test_lunch_is_legitimate() {
        let result = engine().analyze(LUNCH);
        assert_eq!(result.classification.label, Label::Ham);
        assert_eq!(result.phishing.url_count, 0);
        assert_eq!(result.phishing.score, 0.0);
        assert_eq!(result.phishing.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_empty_text_is_neutral() {
        let result = engine().analyze("");
        assert_eq!(result.classification.label, Label::Ham);
        assert_eq!(result.classification.confidence, 50.0);
        assert_eq!(result.phishing.score, 0.0);
        assert!(result.top_features.is_empty());
        assert!(result.suspicious_words.is_empty());
    }

    #[test]
    fn test_out_of_vocabulary_text_is_neutral() {
        let result = engine().analyze("zzqx qwvv");
        assert_eq!(result.classification, ClassificationResult::neutral());
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let engine = engine();
        let first = serde_json::to_string(&engine.analyze(URGENT)).unwrap();
        let second = serde_json::to_string(&engine.analyze(URGENT)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_classify_batch_matches_single_calls() {
        let engine = engine();
        let texts = vec![URGENT, LUNCH, ""];
        let batch = engine.classify_batch(&texts);
        assert_eq!(batch.len(), 3);
        for (text, result) in texts.iter().zip(&batch) {
            assert_eq!(&engine.classify_text(text), result);
        }
        assert!(engine.classify_batch::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_analyze_message_joins_subject_and_body() {
        let engine = engine();
        let message = MailMessage {
            subject: "  URGENT! You have won a $5000 prize.".to_string(),
            body: "Click here: http://bit.ly/claim now!  ".to_string(),
            sender: "promo@example.com".to_string(),
            labels: vec!["INBOX".to_string()],
        };
        assert_eq!(message.analysis_text(), URGENT);
        assert_eq!(engine.analyze_message(&message), engine.analyze(URGENT));

        let empty = MailMessage::default();
        assert_eq!(empty.analysis_text(), "");
    }

    #[test]
    fn test_preprocess_matches_normalizer() {
        let engine = engine();
        assert_eq!(engine.preprocess(LUNCH), TextNormalizer::new().preprocess(LUNCH));
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnalysisEngine>();

        let engine = engine();
        let expected = engine.analyze(URGENT);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| engine.analyze(URGENT)))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let config = Config {
            model_path: "/nonexistent/model.json".into(),
            ..Config::default()
        };
        assert!(matches!(
            AnalysisEngine::from_config(&config),
            Err(ModelError::Io { .. })
        ));
    }
}
