/// BM25 inverted index over message text
use super::tokenizer::tokenize;
use crate::config::LexicalConfig;
use crate::corpus::{Corpus, MessageId};
use crate::error::{LexicaError, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (term, doc) occurrence count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: MessageId,
    pub tf: u32,
}

/// Corpus-wide statistics, recomputed on every build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    #[serde(rename = "N")]
    pub n: usize,
    pub avg_len: f64,
    pub k1: f64,
    pub b: f64,
}

/// Ranked lexical match
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub id: MessageId,
    pub score: f64,
}

/// Inverse document frequency, never negative
///
/// `ln((N - df + 0.5) / (df + 0.5) + 1)`
pub fn idf(n: usize, df: usize) -> f64 {
    let n = n as f64;
    let df = df as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln().max(0.0)
}

/// In-memory BM25 index
///
/// Ordered maps keep the serialized artifact byte-stable across rebuilds of
/// an unchanged corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalIndex {
    postings: BTreeMap<String, Vec<Posting>>,
    idf: BTreeMap<String, f64>,
    doclen: BTreeMap<MessageId, u32>,
    stats: IndexStats,
}

impl LexicalIndex {
    /// Build the index from every message of the corpus
    pub fn build(corpus: &Corpus, params: &LexicalConfig) -> Result<Self> {
        if corpus.is_empty() {
            return Err(LexicaError::EmptyCorpus);
        }

        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut doclen = BTreeMap::new();
        let mut total_len = 0usize;

        for message in corpus.messages() {
            let tokens = tokenize(&message.text);
            total_len += tokens.len();
            doclen.insert(message.id, tokens.len() as u32);

            let mut tf: BTreeMap<String, u32> = BTreeMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for (term, count) in tf {
                postings.entry(term).or_default().push(Posting {
                    doc_id: message.id,
                    tf: count,
                });
            }
        }

        let n = corpus.len();
        let idf = postings
            .iter()
            .map(|(term, list)| (term.clone(), idf(n, list.len())))
            .collect();

        let stats = IndexStats {
            n,
            avg_len: total_len as f64 / n.max(1) as f64,
            k1: params.k1,
            b: params.b,
        };

        tracing::debug!(
            "Built lexical index: {} terms, {} docs, avg_len {:.2}",
            postings.len(),
            n,
            stats.avg_len
        );

        Ok(Self {
            postings,
            idf,
            doclen,
            stats,
        })
    }

    /// Search with the k1/b the index was built with
    pub fn search(&self, query: &str, topk: usize) -> Vec<LexicalHit> {
        self.search_with(query, topk, self.stats.k1, self.stats.b)
    }

    /// Score every document sharing a term with the query
    ///
    /// Sorted by score descending, ties by ascending id. No matching term
    /// yields an empty list.
    pub fn search_with(&self, query: &str, topk: usize, k1: f64, b: f64) -> Vec<LexicalHit> {
        if query.trim().is_empty() || topk == 0 {
            return Vec::new();
        }

        let avg_len = self.stats.avg_len;
        let mut scores: AHashMap<MessageId, f64> = AHashMap::new();

        for term in tokenize(query) {
            let Some(list) = self.postings.get(&term) else {
                continue;
            };
            let term_idf = self.idf.get(&term).copied().unwrap_or(0.0);
            if term_idf <= 0.0 {
                continue;
            }

            for posting in list {
                let dl = self.doclen.get(&posting.doc_id).copied().unwrap_or(0);
                if dl == 0 {
                    continue;
                }
                let tf = posting.tf as f64;
                let denom = tf + k1 * (1.0 - b + b * (dl as f64 / avg_len));
                *scores.entry(posting.doc_id).or_insert(0.0) +=
                    term_idf * (tf * (k1 + 1.0)) / denom.max(1e-9);
            }
        }

        let mut hits: Vec<LexicalHit> = scores
            .into_iter()
            .map(|(id, score)| LexicalHit { id, score })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(topk);
        hits
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.postings.get(term).map(Vec::as_slice)
    }

    pub fn doc_len(&self, id: MessageId) -> Option<u32> {
        self.doclen.get(&id).copied()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn doc_count(&self) -> usize {
        self.stats.n
    }
}
