pub mod alerts;
pub mod analysis;
pub mod classifier;
pub mod config;
pub mod explain;
pub mod history;
pub mod model;
pub mod normalization;
pub mod phishing;
pub mod training;
pub mod vectorizer;

pub use alerts::{AlertKind, AlertPolicy};
pub use analysis::{AnalysisEngine, AnalysisResult, MailMessage};
pub use classifier::{ClassificationResult, NaiveBayesClassifier};
pub use config::Config;
pub use explain::{Explainer, Explanation, FeatureContribution};
pub use history::{AnalysisHistory, HistoryEntry, HistorySummary};
pub use model::{Label, ModelArtifact, ModelError, SpamModel};
pub use normalization::TextNormalizer;
pub use phishing::{PhishingResult, RiskLevel, UrlFinding, UrlRiskScorer};
pub use training::{Trainer, TrainingError, TrainingReport};
pub use vectorizer::{FeatureVector, Vectorizer};
