//! Offline build pipeline
//!
//! Each stage reads the stored rows (and earlier artifacts it depends on)
//! from the live generation, computes its artifact in memory and stages it in
//! a new generation that is committed only once every write succeeded.

use crate::config::Config;
use crate::corpus::{build_meta, Corpus, MetaMap};
use crate::embedding::EmbeddingStore;
use crate::error::{LexicaError, Result};
use crate::graph::{GlobalAuthority, GlobalScores, GraphBuilder, MessageGraph};
use crate::lexical::LexicalIndex;
use crate::storage::{ArtifactKind, CorpusStore, GenerationView, Publication};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Which artifacts a build produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Meta,
    Lexical,
    Vectors,
    Graph,
    Authority,
    All,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildStage::Meta => "meta",
            BuildStage::Lexical => "lexical",
            BuildStage::Vectors => "vectors",
            BuildStage::Graph => "graph",
            BuildStage::Authority => "authority",
            BuildStage::All => "all",
        })
    }
}

/// One artifact written by a build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedArtifact {
    pub artifact: String,
    pub records: usize,
}

/// Outcome of a build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub corpus_id: String,
    pub stage: BuildStage,
    pub messages: usize,
    pub published: Vec<PublishedArtifact>,
    pub elapsed_ms: u64,
}

/// Artifacts computed by a full build before any is written
struct Staged {
    meta: MetaMap,
    lexical: LexicalIndex,
    vectors: EmbeddingStore,
    graph: MessageGraph,
    global: GlobalScores,
}

/// Runs build stages for one corpus under its build lock
pub struct Indexer<'a> {
    config: &'a Config,
}

impl<'a> Indexer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Build `stage` for `store`
    ///
    /// Fails with `BuildInProgress` when another build holds the lock.
    pub fn build(
        &self,
        store: &CorpusStore,
        stage: BuildStage,
        now: DateTime<Utc>,
    ) -> Result<BuildReport> {
        let started = Instant::now();
        let lock = store.lock()?;
        let current = store.view()?;

        let corpus = current.load_corpus()?;
        if corpus.is_empty() {
            return Err(LexicaError::EmptyCorpus);
        }

        tracing::info!(
            "Building {} for corpus {} ({} messages)",
            stage,
            store.id(),
            corpus.len()
        );

        let mut publication = store.begin(&lock)?;
        match stage {
            BuildStage::Meta => {
                let meta = build_meta(&corpus);
                publication.write(ArtifactKind::Meta, &meta, meta.len())?;
            }
            BuildStage::Lexical => {
                let index = self.lexical(&corpus)?;
                publication.write(ArtifactKind::Lexical, &index, index.term_count())?;
            }
            BuildStage::Vectors => {
                let vectors = self.vectors(&corpus)?;
                publication.write(ArtifactKind::Vectors, &vectors, vectors.len())?;
            }
            BuildStage::Graph => {
                let vectors = self.stored_vectors(store.id(), &current)?;
                let graph = self.graph(&corpus, vectors.as_ref());
                publication.write(ArtifactKind::Graph, &graph, graph.edge_count())?;
            }
            BuildStage::Authority => {
                let graph: Option<MessageGraph> = current.load(ArtifactKind::Graph)?;
                let meta: Option<MetaMap> = current.load(ArtifactKind::Meta)?;
                let global = self.authority(graph.as_ref(), meta.as_ref(), now)?;
                publication.write(ArtifactKind::Authority, &global, global.len())?;
            }
            BuildStage::All => {
                let staged = self.stage_all(&corpus, now)?;
                self.write_all(&mut publication, &staged)?;
            }
        }

        let published = publication
            .written()
            .iter()
            .map(|(kind, records)| PublishedArtifact {
                artifact: kind.name().to_string(),
                records: *records,
            })
            .collect();
        publication.commit()?;

        let report = BuildReport {
            corpus_id: store.id().to_string(),
            stage,
            messages: corpus.len(),
            published,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Built {} for corpus {} in {} ms",
            stage,
            store.id(),
            report.elapsed_ms
        );
        Ok(report)
    }

    fn stage_all(&self, corpus: &Corpus, now: DateTime<Utc>) -> Result<Staged> {
        let meta = build_meta(corpus);
        let lexical = self.lexical(corpus)?;
        let vectors = self.vectors(corpus)?;
        let graph = self.graph(corpus, Some(&vectors));
        let global = self.authority(Some(&graph), Some(&meta), now)?;
        Ok(Staged {
            meta,
            lexical,
            vectors,
            graph,
            global,
        })
    }

    fn write_all(&self, publication: &mut Publication<'_>, staged: &Staged) -> Result<()> {
        publication.write(ArtifactKind::Meta, &staged.meta, staged.meta.len())?;
        publication.write(
            ArtifactKind::Lexical,
            &staged.lexical,
            staged.lexical.term_count(),
        )?;
        publication.write(ArtifactKind::Vectors, &staged.vectors, staged.vectors.len())?;
        publication.write(ArtifactKind::Graph, &staged.graph, staged.graph.edge_count())?;
        publication.write(ArtifactKind::Authority, &staged.global, staged.global.len())
    }

    fn lexical(&self, corpus: &Corpus) -> Result<LexicalIndex> {
        LexicalIndex::build(corpus, &self.config.lexical)
    }

    fn vectors(&self, corpus: &Corpus) -> Result<EmbeddingStore> {
        EmbeddingStore::build(corpus, self.config.embedding.dims)
    }

    /// Stored embeddings, validated; `None` when never built
    fn stored_vectors(&self, corpus_id: &str, current: &GenerationView) -> Result<Option<EmbeddingStore>> {
        let vectors: Option<EmbeddingStore> = current.load(ArtifactKind::Vectors)?;
        if let Some(v) = &vectors {
            v.validate()?;
        } else {
            tracing::warn!(
                "No vectors for corpus {}; graph will have reply edges only",
                corpus_id
            );
        }
        Ok(vectors)
    }

    fn graph(&self, corpus: &Corpus, vectors: Option<&EmbeddingStore>) -> MessageGraph {
        GraphBuilder::new(&self.config.graph).build(corpus, vectors)
    }

    fn authority(
        &self,
        graph: Option<&MessageGraph>,
        meta: Option<&MetaMap>,
        now: DateTime<Utc>,
    ) -> Result<GlobalScores> {
        GlobalAuthority::new(&self.config.authority).rank(graph, meta, now)
    }
}
