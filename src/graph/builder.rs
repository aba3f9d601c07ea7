//! Reply-chain and same-topic edge construction

use super::{Edge, EdgeType, MessageGraph};
use crate::config::GraphConfig;
use crate::corpus::{Corpus, Message};
use crate::embedding::{cosine, EmbeddingStore};

/// Weight of every reply edge
pub const REPLY_WEIGHT: f64 = 2.0;

/// Builds the message graph from a corpus and optional embeddings
pub struct GraphBuilder {
    same_topic_k: usize,
    same_topic_min_cos: f32,
}

impl GraphBuilder {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            same_topic_k: config.same_topic_k,
            same_topic_min_cos: config.same_topic_min_cos,
        }
    }

    /// Reply edges for every conversation, then same-topic edges when
    /// embeddings are available. Without embeddings the graph is reply-only.
    pub fn build(&self, corpus: &Corpus, embeddings: Option<&EmbeddingStore>) -> MessageGraph {
        let conversations = corpus.conversations();
        let mut edges = Vec::new();

        for thread in conversations.values() {
            edges.extend(reply_edges(thread));
        }

        let reply_count = edges.len();

        match embeddings {
            Some(store) if self.same_topic_k > 0 => {
                for thread in conversations.values() {
                    edges.extend(self.same_topic_edges(thread, store));
                }
            }
            Some(_) => {}
            None => tracing::debug!("No embeddings available, building reply-only graph"),
        }

        tracing::debug!(
            "Built graph: {} reply edges, {} same-topic edges over {} conversations",
            reply_count,
            edges.len() - reply_count,
            conversations.len()
        );

        MessageGraph::new(edges)
    }

    /// Top-k most similar messages of the same conversation above the floor
    fn same_topic_edges(&self, thread: &[&Message], store: &EmbeddingStore) -> Vec<Edge> {
        let vectors: Vec<_> = thread
            .iter()
            .filter_map(|m| store.vector(m.id).map(|v| (m.id, v)))
            .collect();

        let mut edges = Vec::new();
        for &(src, v) in &vectors {
            let mut sims: Vec<_> = vectors
                .iter()
                .filter(|(dst, _)| *dst != src)
                .map(|&(dst, w)| (dst, cosine(v, w)))
                .filter(|&(_, sim)| sim >= self.same_topic_min_cos)
                .collect();

            sims.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            sims.truncate(self.same_topic_k);

            edges.extend(sims.into_iter().map(|(dst, sim)| Edge {
                src,
                dst,
                weight: 1.0 + sim as f64,
                kind: EdgeType::SameTopic,
            }));
        }
        edges
    }
}

/// One edge per consecutive pair of a timestamp-ordered thread
fn reply_edges<'a>(thread: &'a [&'a Message]) -> impl Iterator<Item = Edge> + 'a {
    thread.windows(2).map(|pair| Edge {
        src: pair[0].id,
        dst: pair[1].id,
        weight: REPLY_WEIGHT,
        kind: EdgeType::Reply,
    })
}
