//! Okapi BM25 ranking structure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f64,
    /// Document length normalization.
    pub b: f64,
    /// Floor for negative idf values, as a fraction of the mean idf.
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// BM25 statistics over a tokenized corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25 {
    params: Bm25Params,
    doc_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<u32>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

impl Bm25 {
    /// Build the statistics for `corpus` (one token list per document).
    pub fn new(corpus: &[Vec<String>], params: Bm25Params) -> Self {
        let mut doc_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut containing: HashMap<String, u32> = HashMap::new();
        let mut total_len: u64 = 0;

        for tokens in corpus {
            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *containing.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(tokens.len() as u32);
            total_len += tokens.len() as u64;
            doc_freqs.push(freqs);
        }

        let avg_doc_len = if corpus.is_empty() {
            0.0
        } else {
            total_len as f64 / corpus.len() as f64
        };

        let idf = Self::compute_idf(corpus.len(), &containing, params.epsilon);

        Self {
            params,
            doc_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    fn compute_idf(
        corpus_size: usize,
        containing: &HashMap<String, u32>,
        epsilon: f64,
    ) -> HashMap<String, f64> {
        let n = corpus_size as f64;
        let mut idf = HashMap::with_capacity(containing.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();

        // Float addition is order dependent; sum in term order
        let mut terms: Vec<(&String, u32)> = containing.iter().map(|(t, &c)| (t, c)).collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

        for (term, count) in terms {
            let count = count as f64;
            let value = (n - count + 0.5).ln() - (count + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }

        if !idf.is_empty() {
            let floor = epsilon * idf_sum / idf.len() as f64;
            for term in negative {
                idf.insert(term, floor);
            }
        }

        idf
    }

    /// Number of documents in the corpus.
    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// Score every document against the query tokens.
    ///
    /// Repeated query tokens contribute once per occurrence.
    pub fn scores(&self, query: &[String]) -> Vec<f64> {
        let Bm25Params { k1, b, .. } = self.params;
        let avg_len = if self.avg_doc_len > 0.0 { self.avg_doc_len } else { 1.0 };
        let mut scores = vec![0.0; self.doc_lens.len()];

        for token in query {
            let Some(&idf) = self.idf.get(token) else {
                continue;
            };
            for (doc, freqs) in self.doc_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(token) else {
                    continue;
                };
                let tf = tf as f64;
                let norm = 1.0 - b + b * self.doc_lens[doc] as f64 / avg_len;
                scores[doc] += idf * (tf * (k1 + 1.0)) / (tf + k1 * norm);
            }
        }

        scores
    }
}
