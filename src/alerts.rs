use crate::analysis::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Spam,
    Phishing,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Spam => f.write_str("spam"),
            AlertKind::Phishing => f.write_str("phishing"),
        }
    }
}

/// Thresholds a monitoring loop uses to raise a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPolicy {
    /// Minimum spam confidence, as a percentage.
    pub spam_confidence: f64,
    /// Minimum phishing score, 0 to 100.
    pub phishing_score: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            spam_confidence: 80.0,
            phishing_score: 70.0,
        }
    }
}

impl AlertPolicy {
    /// Phishing outranks spam when both thresholds are met.
    pub fn evaluate(&self, result: &AnalysisResult) -> Option<AlertKind> {
        if result.phishing.score >= self.phishing_score {
            Some(AlertKind::Phishing)
        } else if result.classification.is_spam()
            && result.classification.confidence >= self.spam_confidence
        {
            Some(AlertKind::Spam)
        } else {
            None
        }
    }

    pub fn message(&self, kind: AlertKind, result: &AnalysisResult) -> String {
        match kind {
            AlertKind::Phishing => format!(
                "Phishing alert: risk score {:.1}/100 ({})",
                result.phishing.score, result.phishing.risk_level
            ),
            AlertKind::Spam => format!(
                "Spam alert: {:.1}% confidence",
                result.classification.confidence
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationResult;
    use crate::model::Label;
    use crate::phishing::{PhishingResult, RiskLevel};

    fn result(label: Label, confidence: f64, phishing_score: f64) -> AnalysisResult {
        let mut phishing = PhishingResult::no_urls();
        phishing.score = phishing_score;
        phishing.risk_level = RiskLevel::from_score(phishing_score);
        AnalysisResult {
            classification: ClassificationResult {
                label,
                confidence,
                spam_probability: 0.0,
                ham_probability: 0.0,
            },
            phishing,
            top_features: Vec::new(),
            suspicious_words: Vec::new(),
            narrative: String::new(),
            confidence_reasoning: String::new(),
        }
    }

    #[test]
    fn test_confident_spam_alerts() {
        let policy = AlertPolicy::default();
        assert_eq!(policy.evaluate(&result(Label::Spam, 80.0, 0.0)), Some(AlertKind::Spam));
        assert_eq!(policy.evaluate(&result(Label::Spam, 79.9, 0.0)), None);
    }

    #[test]
    fn test_confident_ham_never_alerts_as_spam() {
        let policy = AlertPolicy::default();
        assert_eq!(policy.evaluate(&result(Label::Ham, 99.0, 10.0)), None);
    }

    #[test]
    fn test_phishing_takes_precedence() {
        let policy = AlertPolicy::default();
        assert_eq!(
            policy.evaluate(&result(Label::Spam, 95.0, 70.0)),
            Some(AlertKind::Phishing)
        );
        assert_eq!(
            policy.evaluate(&result(Label::Ham, 60.0, 85.0)),
            Some(AlertKind::Phishing)
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let policy = AlertPolicy {
            spam_confidence: 60.0,
            phishing_score: 40.0,
        };
        assert_eq!(policy.evaluate(&result(Label::Spam, 65.0, 0.0)), Some(AlertKind::Spam));
        assert_eq!(
            policy.evaluate(&result(Label::Ham, 50.0, 45.0)),
            Some(AlertKind::Phishing)
        );
    }

    #[test]
    fn test_alert_message() {
        let policy = AlertPolicy::default();
        let r = result(Label::Spam, 91.34, 0.0);
        assert_eq!(policy.message(AlertKind::Spam, &r), "Spam alert: 91.3% confidence");
    }
}
