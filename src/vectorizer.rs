use crate::model::{SpamModel, TfNorm};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureEntry {
    pub index: usize,
    pub weight: f64,
}

/// Sparse TF-IDF vector for one text, ordered by feature index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<FeatureEntry>,
}

impl FeatureVector {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.entries
            .binary_search_by_key(&index, |e| e.index)
            .ok()
            .map(|pos| self.entries[pos].weight)
    }
}

pub struct Vectorizer {
    model: Arc<SpamModel>,
}

impl Vectorizer {
    pub fn new(model: Arc<SpamModel>) -> Self {
        Self { model }
    }

    pub fn vectorize<S: AsRef<str>>(&self, tokens: &[S]) -> FeatureVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            // out-of-vocabulary tokens carry no signal
            if let Some(index) = self.model.feature_index(token.as_ref()) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<FeatureEntry> = counts
            .into_iter()
            .map(|(index, tf)| FeatureEntry {
                index,
                weight: tf * self.model.idf(index),
            })
            .collect();

        if self.model.norm() == TfNorm::L2 {
            let length = entries.iter().map(|e| e.weight * e.weight).sum::<f64>().sqrt();
            if length > 0.0 {
                for entry in &mut entries {
                    entry.weight /= length;
                }
            }
        }

        FeatureVector { entries }
    }
}
