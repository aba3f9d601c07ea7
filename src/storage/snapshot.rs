use super::{ArtifactKind, CorpusStore};
use crate::corpus::{Corpus, MetaMap};
use crate::embedding::EmbeddingStore;
use crate::error::{LexicaError, Result};
use crate::graph::{GlobalScores, MessageGraph};
use crate::lexical::LexicalIndex;
use std::sync::Arc;

/// Immutable view of a corpus and its artifacts for querying
///
/// Rows, metadata and the lexical index are required. Embeddings, the graph
/// and global authority are optional capabilities; missing ones contribute a
/// zero signal.
#[derive(Debug)]
pub struct CorpusSnapshot {
    pub corpus_id: String,
    pub corpus: Corpus,
    pub meta: MetaMap,
    pub lexical: LexicalIndex,
    pub embeddings: Option<EmbeddingStore>,
    pub graph: Option<MessageGraph>,
    pub global: Option<GlobalScores>,
}

impl CorpusSnapshot {
    /// Load every artifact of the live generation of `store` once
    ///
    /// The manifest is resolved a single time, so a build committing
    /// meanwhile cannot mix its artifacts into this snapshot.
    pub fn load(store: &CorpusStore) -> Result<Arc<Self>> {
        let view = store.view()?;
        let corpus = view.load_corpus()?;
        let meta: MetaMap = view.require(ArtifactKind::Meta)?;
        let lexical: LexicalIndex = view.require(ArtifactKind::Lexical)?;

        let embeddings: Option<EmbeddingStore> = view.load(ArtifactKind::Vectors)?;
        if let Some(store) = &embeddings {
            store.validate()?;
        }
        let graph: Option<MessageGraph> = view.load(ArtifactKind::Graph)?;
        let global: Option<GlobalScores> = view.load(ArtifactKind::Authority)?;

        tracing::debug!(
            "Loaded snapshot of {} generation {}: {} messages, vectors={}, graph={}, authority={}",
            store.id(),
            view.generation().unwrap_or("-"),
            corpus.len(),
            embeddings.is_some(),
            graph.is_some(),
            global.is_some()
        );

        Ok(Arc::new(Self {
            corpus_id: store.id().to_string(),
            corpus,
            meta,
            lexical,
            embeddings,
            graph,
            global,
        }))
    }

    /// Snapshot assembled in memory, without touching disk
    pub fn from_parts(
        corpus_id: impl Into<String>,
        corpus: Corpus,
        meta: MetaMap,
        lexical: LexicalIndex,
    ) -> Self {
        Self {
            corpus_id: corpus_id.into(),
            corpus,
            meta,
            lexical,
            embeddings: None,
            graph: None,
            global: None,
        }
    }

    pub fn with_embeddings(mut self, embeddings: EmbeddingStore) -> Result<Self> {
        embeddings.validate()?;
        self.embeddings = Some(embeddings);
        Ok(self)
    }

    pub fn with_graph(mut self, graph: MessageGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Global authority of one message, 0 when unknown
    pub fn global_score(&self, id: crate::corpus::MessageId) -> f64 {
        self.global
            .as_ref()
            .and_then(|g| g.get(&id).copied())
            .unwrap_or(0.0)
    }

    /// Fail with `NotBuilt` when `kind` is absent from this snapshot
    pub fn require(&self, kind: ArtifactKind) -> Result<()> {
        let present = match kind {
            ArtifactKind::Rows | ArtifactKind::Meta | ArtifactKind::Lexical => true,
            ArtifactKind::Vectors => self.embeddings.is_some(),
            ArtifactKind::Graph => self.graph.is_some(),
            ArtifactKind::Authority => self.global.is_some(),
        };
        if present {
            Ok(())
        } else {
            Err(LexicaError::not_built(&self.corpus_id, kind.name()))
        }
    }
}
