use super::snippet::make_snippet;
use super::{SearchHit, SearchQuery};
use crate::config::FusionConfig;
use crate::error::Result;
use crate::lexical::LexicalHit;
use crate::storage::CorpusSnapshot;

/// BM25 recall depth before filtering in snippets mode
pub const SNIPPET_RECALL_DEPTH: usize = 200;

/// Plain BM25 search with metadata and snippets
pub struct LexicalSearcher<'a> {
    snapshot: &'a CorpusSnapshot,
    config: &'a FusionConfig,
}

impl<'a> LexicalSearcher<'a> {
    pub fn new(snapshot: &'a CorpusSnapshot, config: &'a FusionConfig) -> Self {
        Self { snapshot, config }
    }

    /// Filtered BM25: recall 200, keep matching rows until `limit` is reached
    pub fn search_snippets(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let recall_depth = SNIPPET_RECALL_DEPTH.max(query.limit);
        let base = self.snapshot.lexical.search(&query.text, recall_depth);

        let hits: Vec<SearchHit> = base
            .iter()
            .filter_map(|hit| self.hydrate(hit, &query.text))
            .filter(|hit| {
                self.snapshot
                    .meta
                    .get(&hit.id)
                    .is_some_and(|meta| query.filters.matches(meta))
            })
            .take(query.limit)
            .collect();

        tracing::debug!(
            "Snippet search for '{}': {} recalled, {} returned",
            query.text,
            base.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// Raw BM25 top-k; filters are not applied
    pub fn search_basic(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        Ok(self
            .snapshot
            .lexical
            .search(&query.text, query.limit)
            .iter()
            .filter_map(|hit| self.hydrate(hit, &query.text))
            .collect())
    }

    fn hydrate(&self, hit: &LexicalHit, query: &str) -> Option<SearchHit> {
        let meta = self.snapshot.meta.get(&hit.id)?;
        let text = self
            .snapshot
            .corpus
            .get(hit.id)
            .map(|m| m.text.as_str())
            .unwrap_or_default();
        Some(SearchHit::new(
            hit.id,
            hit.score,
            meta,
            make_snippet(text, query, self.config.snippet_chars),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LexicalConfig;
    use crate::corpus::{build_meta, Corpus, Message, Role};
    use crate::lexical::LexicalIndex;
    use crate::retrieval::SearchFilters;

    fn snapshot() -> CorpusSnapshot {
        let messages = (0..30)
            .map(|i| Message {
                id: i,
                conv_id: format!("c{}", i % 3),
                title: None,
                ts: if i == 7 {
                    "broken".to_string()
                } else {
                    format!("2024-01-{:02}T00:00:00Z", i + 1)
                },
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                text: format!("tokio runtime question number {}", i),
                has_code: i % 5 == 0,
            })
            .collect();
        let corpus = Corpus::from_messages(messages);
        let meta = build_meta(&corpus);
        let lexical = LexicalIndex::build(&corpus, &LexicalConfig::default()).unwrap();
        CorpusSnapshot::from_parts("t", corpus, meta, lexical)
    }

    #[test]
    fn test_snippets_mode_filters_until_limit() {
        let snap = snapshot();
        let config = FusionConfig::default();
        let mut query = SearchQuery::new("tokio runtime", 4);
        query.filters = SearchFilters {
            conv_id: Some("c1".to_string()),
            role: Some(Role::Assistant),
            ..SearchFilters::default()
        };

        let hits = LexicalSearcher::new(&snap, &config).search_snippets(&query).unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|h| h.conv_id == "c1" && h.role == Role::Assistant));
        assert!(hits.iter().all(|h| h.snippet.contains("tokio")));
    }

    #[test]
    fn test_unparseable_timestamp_passes_date_filter() {
        let snap = snapshot();
        let config = FusionConfig::default();
        let mut query = SearchQuery::new("tokio", 50);
        query.filters = SearchFilters::parse(None, None, Some("2024-01-20"), None, None).unwrap();

        let hits = LexicalSearcher::new(&snap, &config).search_snippets(&query).unwrap();
        let ids: Vec<u32> = hits.iter().map(|h| h.id).collect();
        assert!(ids.contains(&7));
        assert!(ids.contains(&25));
        assert!(!ids.contains(&3));
    }

    #[test]
    fn test_basic_mode_ignores_filters() {
        let snap = snapshot();
        let config = FusionConfig::default();
        let mut query = SearchQuery::new("tokio", 5);
        query.filters.conv_id = Some("nowhere".to_string());

        let hits = LexicalSearcher::new(&snap, &config).search_basic(&query).unwrap();
        assert_eq!(hits.len(), 5);
    }
}
