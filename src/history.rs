use crate::alerts::AlertKind;
use crate::analysis::AnalysisResult;
use crate::model::Label;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub label: Label,
    pub confidence: f64,
    pub phishing_score: f64,
    pub alert: Option<AlertKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total: usize,
    pub spam: usize,
    pub ham: usize,
    pub spam_percentage: f64,
    pub alerts: usize,
}

/// Session log of verdicts, owned by whoever drives the analysis calls.
#[derive(Debug, Clone, Default)]
pub struct AnalysisHistory {
    entries: Vec<HistoryEntry>,
}

impl AnalysisHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &AnalysisResult, alert: Option<AlertKind>) -> &HistoryEntry {
        self.entries.push(HistoryEntry {
            label: result.classification.label,
            confidence: result.classification.confidence,
            phishing_score: result.phishing.score,
            alert,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&HistoryEntry> {
        self.entries.iter().rev().take(limit).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn summary(&self) -> HistorySummary {
        let total = self.entries.len();
        let spam = self.entries.iter().filter(|e| e.label == Label::Spam).count();
        let spam_percentage = if total == 0 {
            0.0
        } else {
            spam as f64 / total as f64 * 100.0
        };
        HistorySummary {
            total,
            spam,
            ham: total - spam,
            spam_percentage,
            alerts: self.entries.iter().filter(|e| e.alert.is_some()).count(),
        }
    }
}
