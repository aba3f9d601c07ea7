use super::fusion::{
    content_prior, freshness, fused_score, seed_weight, z_normalize, SignalBreakdown, ZScores,
};
use super::ppr::MiniPpr;
use super::snippet::make_snippet;
use super::{SearchHit, SearchQuery};
use crate::config::FusionConfig;
use crate::corpus::{MessageId, MessageMeta};
use crate::error::Result;
use crate::storage::CorpusSnapshot;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Hybrid searcher fusing lexical, semantic, graph and content signals
///
/// Embeddings, graph and global authority are read from the snapshot when
/// present; an absent capability contributes a zero signal.
pub struct HybridSearcher<'a> {
    snapshot: &'a CorpusSnapshot,
    config: &'a FusionConfig,
}

struct Candidate<'a> {
    id: MessageId,
    meta: &'a MessageMeta,
    snippet: String,
    signals: SignalBreakdown,
}

impl<'a> HybridSearcher<'a> {
    pub fn new(snapshot: &'a CorpusSnapshot, config: &'a FusionConfig) -> Self {
        Self { snapshot, config }
    }

    /// Rank candidates from both recall lists
    ///
    /// Filters apply after fusion and before truncation to `query.limit`.
    /// Ties keep ascending id order.
    pub fn search(&self, query: &SearchQuery, now: DateTime<Utc>) -> Result<Vec<SearchHit>> {
        if query.text.trim().is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }
        let depth = self.config.recall_depth;

        let lexical = self.snapshot.lexical.search(&query.text, depth);
        let semantic = match &self.snapshot.embeddings {
            Some(store) => store.search(&query.text, depth)?,
            None => Vec::new(),
        };

        let bm25: AHashMap<MessageId, f64> = lexical.iter().map(|h| (h.id, h.score)).collect();
        let cos: AHashMap<MessageId, f64> =
            semantic.iter().map(|h| (h.id, h.score as f64)).collect();

        let ids: BTreeSet<MessageId> = bm25.keys().chain(cos.keys()).copied().collect();
        let mut candidates: Vec<Candidate<'_>> = ids
            .into_iter()
            .filter_map(|id| self.candidate(id, &query.text))
            .collect();

        tracing::debug!(
            "Hybrid recall for '{}': {} lexical, {} semantic, {} candidates",
            query.text,
            lexical.len(),
            semantic.len(),
            candidates.len()
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        for c in candidates.iter_mut() {
            c.signals.bm25 = bm25.get(&c.id).copied().unwrap_or(0.0);
            c.signals.cos = cos.get(&c.id).copied().unwrap_or(0.0);
            c.signals.pr_global = self.snapshot.global_score(c.id);
            c.signals.fresh = freshness(c.meta, now, self.config.freshness_half_life_days);
            c.signals.prior = content_prior(c.meta, c.snippet.chars().count());
        }

        let ids: Vec<MessageId> = candidates.iter().map(|c| c.id).collect();
        let seeds: Vec<f64> = candidates
            .iter()
            .map(|c| seed_weight(c.signals.bm25, c.signals.cos, self.config.beta, self.config.gamma))
            .collect();
        let ppr = MiniPpr::new(self.config.ppr_alpha, self.config.ppr_iterations).rank(
            &ids,
            self.snapshot.graph.as_ref(),
            &seeds,
        );
        for (c, score) in candidates.iter_mut().zip(&ppr) {
            c.signals.ppr = *score;
        }

        let column = |f: fn(&SignalBreakdown) -> f64| -> Vec<f64> {
            candidates.iter().map(|c| f(&c.signals)).collect()
        };
        let z_bm25 = z_normalize(&column(|s| s.bm25));
        let z_cos = z_normalize(&column(|s| s.cos));
        let z_global = z_normalize(&column(|s| s.pr_global));
        let z_ppr = z_normalize(&column(|s| s.ppr));

        let mut scored: Vec<(f64, Candidate<'_>)> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let z = ZScores {
                    bm25: z_bm25[i],
                    cos: z_cos[i],
                    global: z_global[i],
                    ppr: z_ppr[i],
                };
                (fused_score(&z, c.signals.prior, c.signals.fresh), c)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .filter(|(_, c)| query.filters.matches(c.meta))
            .take(query.limit)
            .map(|(score, c)| {
                tracing::trace!("hit {} score={:.4} signals={:?}", c.id, score, c.signals);
                let mut hit = SearchHit::new(c.id, score, c.meta, c.snippet);
                if query.explain {
                    hit.explain = Some(c.signals);
                }
                hit
            })
            .collect();

        Ok(hits)
    }

    fn candidate(&self, id: MessageId, query: &str) -> Option<Candidate<'a>> {
        let message = self.snapshot.corpus.get(id)?;
        let Some(meta) = self.snapshot.meta.get(&id) else {
            tracing::warn!("Message {} has no metadata, dropping candidate", id);
            return None;
        };
        Some(Candidate {
            id,
            meta,
            snippet: make_snippet(&message.text, query, self.config.snippet_chars),
            signals: SignalBreakdown::default(),
        })
    }
}
