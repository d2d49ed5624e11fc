//! TF-IDF term weights over one small corpus.
//!
//! Document 0 is always the job description, 1..N the candidates in corpus
//! order. Weights use a log-scaled term frequency:
//!
//! ```text
//! weight(t, d) = (1 + ln tf(t, d)) × ln(N / df(t))     for tf(t, d) > 0
//! ```
//!
//! A term present in every document has idf 0 and therefore weight 0
//! everywhere. Zero weights are never stored; `weight` reports them as 0.

use std::collections::{BTreeMap, HashMap};

use crate::ranking::preprocess::Document;

#[derive(Debug, Clone, Default)]
pub struct TermVectors {
    document_count: usize,
    /// term → number of documents containing it
    document_frequency: BTreeMap<String, usize>,
    /// term → (document index → non-zero weight)
    weights: BTreeMap<String, BTreeMap<usize, f64>>,
}

impl TermVectors {
    pub fn build(documents: &[Document]) -> Self {
        let term_frequencies: Vec<HashMap<&str, usize>> = documents
            .iter()
            .map(|doc| {
                let mut tf = HashMap::new();
                for token in doc.tokens() {
                    *tf.entry(token.as_str()).or_insert(0) += 1;
                }
                tf
            })
            .collect();

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for tf in &term_frequencies {
            for term in tf.keys() {
                *document_frequency.entry((*term).to_string()).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f64;
        let mut weights: BTreeMap<String, BTreeMap<usize, f64>> = BTreeMap::new();
        for (doc_index, tf) in term_frequencies.iter().enumerate() {
            for (term, &count) in tf {
                let df = document_frequency[*term] as f64;
                let weight = (1.0 + (count as f64).ln()) * (n / df).ln();
                if weight != 0.0 {
                    weights
                        .entry((*term).to_string())
                        .or_default()
                        .insert(doc_index, weight);
                }
            }
        }

        Self {
            document_count: documents.len(),
            document_frequency,
            weights,
        }
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Number of distinct terms across the corpus, weighted or not.
    pub fn vocabulary_size(&self) -> usize {
        self.document_frequency.len()
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    pub fn weight(&self, term: &str, doc: usize) -> f64 {
        self.weights
            .get(term)
            .and_then(|w| w.get(&doc))
            .copied()
            .unwrap_or(0.0)
    }

    /// Euclidean norm of one document's weight vector.
    pub fn norm(&self, doc: usize) -> f64 {
        self.weights
            .values()
            .filter_map(|w| w.get(&doc))
            .map(|w| w * w)
            .sum::<f64>()
            .sqrt()
    }

    /// Cosine similarity between two documents, 0 when either has a zero vector.
    pub fn cosine(&self, a: usize, b: usize) -> f64 {
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;

        for w in self.weights.values() {
            let wa = w.get(&a);
            let wb = w.get(&b);
            if let (Some(x), Some(y)) = (wa, wb) {
                dot += x * y;
            }
            if let Some(x) = wa {
                norm_a += x * x;
            }
            if let Some(y) = wb {
                norm_b += y * y;
            }
        }

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
    }
}
