//! Dense vector store with brute-force dot-product search
use super::hasher::{dot, embed};
use crate::corpus::{Corpus, MessageId};
use crate::error::{LexicaError, Result};
use serde::{Deserialize, Serialize};

/// Semantic match with its dot-product score
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticHit {
    pub id: MessageId,
    pub score: f32,
}

/// One hashed-trigram vector per message, ids ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingStore {
    dims: usize,
    count: usize,
    ids: Vec<MessageId>,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingStore {
    /// Embed every message of the corpus
    pub fn build(corpus: &Corpus, dims: usize) -> Result<Self> {
        if corpus.is_empty() {
            return Err(LexicaError::EmptyCorpus);
        }

        let (ids, vectors): (Vec<_>, Vec<_>) = corpus
            .messages()
            .iter()
            .map(|m| (m.id, embed(&m.text, dims)))
            .unzip();

        tracing::debug!("Embedded {} messages at {} dims", ids.len(), dims);

        Ok(Self {
            dims,
            count: ids.len(),
            ids,
            vectors,
        })
    }

    /// Check a deserialized store before use
    ///
    /// Every vector must have exactly `dims` entries; nothing is padded or cut.
    pub fn validate(&self) -> Result<()> {
        if self.ids.len() != self.vectors.len() || self.count != self.ids.len() {
            return Err(LexicaError::Other(anyhow::anyhow!(
                "embedding artifact is inconsistent: {} ids, {} vectors, count {}",
                self.ids.len(),
                self.vectors.len(),
                self.count
            )));
        }
        if !self.ids.windows(2).all(|w| w[0] < w[1]) {
            return Err(LexicaError::Other(anyhow::anyhow!(
                "embedding artifact ids are not strictly ascending"
            )));
        }
        if let Some(bad) = self.vectors.iter().find(|v| v.len() != self.dims) {
            return Err(LexicaError::DimensionMismatch {
                expected: self.dims,
                actual: bad.len(),
            });
        }
        Ok(())
    }

    /// Embed the query with the store's dimension and search
    pub fn search(&self, query: &str, topk: usize) -> Result<Vec<SemanticHit>> {
        let query_vector = embed(query, self.dims);
        self.search_vector(&query_vector, topk)
    }

    /// Top-k by dot product, descending, ties by ascending id
    pub fn search_vector(&self, query: &[f32], topk: usize) -> Result<Vec<SemanticHit>> {
        if query.len() != self.dims {
            return Err(LexicaError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut hits: Vec<SemanticHit> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .map(|(&id, v)| {
                if v.len() != self.dims {
                    return Err(LexicaError::DimensionMismatch {
                        expected: self.dims,
                        actual: v.len(),
                    });
                }
                Ok(SemanticHit {
                    id,
                    score: dot(v, query),
                })
            })
            .collect::<Result<_>>()?;

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(topk);
        Ok(hits)
    }

    pub fn vector(&self, id: MessageId) -> Option<&[f32]> {
        self.ids
            .binary_search(&id)
            .ok()
            .map(|idx| self.vectors[idx].as_slice())
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Message, Role};

    fn corpus(texts: &[&str]) -> Corpus {
        Corpus::from_messages(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| Message {
                    id: i as MessageId,
                    conv_id: "c".to_string(),
                    title: None,
                    ts: String::new(),
                    role: Role::Assistant,
                    text: text.to_string(),
                    has_code: false,
                })
                .collect(),
        )
    }

    #[test]
    fn test_build_and_search() {
        let store = EmbeddingStore::build(
            &corpus(&["parse json with serde", "bake bread at home", ""]),
            512,
        )
        .unwrap();

        assert_eq!(store.len(), 3);
        assert!(store.validate().is_ok());

        let hits = store.search("json parsing", 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, 0);
        // the empty message has a zero vector
        let empty = hits.iter().find(|h| h.id == 2).unwrap();
        assert_eq!(empty.score, 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let store = EmbeddingStore::build(&corpus(&["hello"]), 64).unwrap();
        let result = store.search_vector(&[1.0; 32], 5);
        assert!(matches!(
            result,
            Err(LexicaError::DimensionMismatch {
                expected: 64,
                actual: 32
            })
        ));
    }

    #[test]
    fn test_validate_catches_bad_vector() {
        let mut store = EmbeddingStore::build(&corpus(&["a", "b"]), 16).unwrap();
        store.vectors[1].pop();
        assert!(matches!(
            store.validate(),
            Err(LexicaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_vector_lookup() {
        let store = EmbeddingStore::build(&corpus(&["x", "y"]), 16).unwrap();
        assert!(store.vector(1).is_some());
        assert!(store.vector(7).is_none());
    }
}
