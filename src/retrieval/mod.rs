//! Query-time retrieval
//!
//! Three modes share one query type: `hybrid` runs the full fusion reranker,
//! `snippets` is filtered BM25 with excerpts, `basic` is raw BM25 top-k.

mod filter;
mod fusion;
mod hybrid;
mod lexical;
mod ppr;
mod snippet;

pub use filter::SearchFilters;
pub use fusion::{
    content_prior, freshness, fused_score, seed_weight, z_normalize, SignalBreakdown, ZScores,
    W_BM25, W_FRESHNESS, W_GLOBAL, W_PPR, W_PRIOR, W_SEMANTIC,
};
pub use hybrid::HybridSearcher;
pub use lexical::{LexicalSearcher, SNIPPET_RECALL_DEPTH};
pub use ppr::MiniPpr;
pub use snippet::make_snippet;

use crate::config::FusionConfig;
use crate::corpus::{MessageId, MessageMeta, Role};
use crate::error::Result;
use crate::storage::CorpusSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How a query is answered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Snippets,
    Basic,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::Hybrid => "hybrid",
            SearchMode::Snippets => "snippets",
            SearchMode::Basic => "basic",
        })
    }
}

/// Search query with optional filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Maximum number of results
    pub limit: usize,

    pub mode: SearchMode,

    pub filters: SearchFilters,

    /// Attach raw signal values to every hit
    pub explain: bool,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            mode: SearchMode::default(),
            filters: SearchFilters::default(),
            explain: false,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }
}

/// One ranked message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: MessageId,
    pub score: f64,
    pub conv_id: String,
    pub title: String,
    pub role: Role,
    pub ts: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub explain: Option<SignalBreakdown>,
}

impl SearchHit {
    pub fn new(id: MessageId, score: f64, meta: &MessageMeta, snippet: String) -> Self {
        Self {
            id,
            score,
            conv_id: meta.conv_id.clone(),
            title: meta.title.clone(),
            role: meta.role,
            ts: meta.ts.clone(),
            snippet,
            explain: None,
        }
    }
}

/// Entry point for queries against one corpus snapshot
///
/// Holds the snapshot for its whole lifetime, so a concurrent rebuild never
/// changes what an in-flight query reads.
pub struct Searcher {
    snapshot: Arc<CorpusSnapshot>,
    config: FusionConfig,
}

impl Searcher {
    pub fn new(snapshot: Arc<CorpusSnapshot>, config: FusionConfig) -> Self {
        Self { snapshot, config }
    }

    pub fn snapshot(&self) -> &CorpusSnapshot {
        &self.snapshot
    }

    pub fn search(&self, query: &SearchQuery, now: DateTime<Utc>) -> Result<Vec<SearchHit>> {
        if query.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match query.mode {
            SearchMode::Hybrid => HybridSearcher::new(&self.snapshot, &self.config).search(query, now),
            SearchMode::Snippets => {
                LexicalSearcher::new(&self.snapshot, &self.config).search_snippets(query)
            }
            SearchMode::Basic => LexicalSearcher::new(&self.snapshot, &self.config).search_basic(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        use clap::ValueEnum;
        assert_eq!(SearchMode::from_str("basic", true).unwrap(), SearchMode::Basic);
        assert!(SearchMode::from_str("vector", true).is_err());
        assert_eq!(SearchMode::Snippets.to_string(), "snippets");
    }

    #[test]
    fn test_explain_only_serialized_when_present() {
        let meta = MessageMeta {
            conv_id: "c1".to_string(),
            title: "Parsing".to_string(),
            ts: "2024-01-01T00:00:00Z".to_string(),
            role: Role::Assistant,
            has_code: false,
            length: 3,
        };
        let mut hit = SearchHit::new(4, 1.5, &meta, "use serde".to_string());
        let json = serde_json::to_value(&hit).unwrap();
        assert!(json.get("explain").is_none());
        assert_eq!(json["role"], "assistant");

        hit.explain = Some(SignalBreakdown::default());
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["explain"]["bm25"], 0.0);
    }
}
