//! Offline personalized PageRank over the full message graph

use super::MessageGraph;
use crate::config::AuthorityConfig;
use crate::corpus::{decay, MessageId, MessageMeta, MetaMap, Role};
use crate::error::{LexicaError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Global authority per graph node; values sum to 1
pub type GlobalScores = BTreeMap<MessageId, f64>;

const BASE_WEIGHT: f64 = 1e-6;
const ASSISTANT_BONUS: f64 = 0.05;
const CODE_BONUS: f64 = 0.05;

/// Unnormalized teleport weight of one message
///
/// `1e-6 + recency + 0.05 [assistant] + 0.05 [has_code]`, with recency a
/// half-life decay of the message age (0 for unparseable timestamps).
pub fn personalization_weight(meta: &MessageMeta, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let mut weight = BASE_WEIGHT + decay(meta.timestamp(), now, half_life_days);
    if meta.role == Role::Assistant {
        weight += ASSISTANT_BONUS;
    }
    if meta.has_code {
        weight += CODE_BONUS;
    }
    weight
}

/// Personalized PageRank with recency, role and code biased teleports
pub struct GlobalAuthority {
    alpha: f64,
    half_life_days: f64,
    iterations: usize,
}

impl GlobalAuthority {
    pub fn new(config: &AuthorityConfig) -> Self {
        Self {
            alpha: config.alpha.clamp(0.0, 1.0),
            half_life_days: config.half_life_days,
            iterations: config.iterations,
        }
    }

    /// Rank every node of the graph
    ///
    /// `alpha` is the teleport probability; `1 - alpha` follows weighted
    /// out-edges. Mass sitting on nodes without out-edges is redistributed by
    /// the personalization vector, so the result stays a distribution. Always
    /// returns after the fixed iteration budget.
    pub fn rank(
        &self,
        graph: Option<&MessageGraph>,
        meta: Option<&MetaMap>,
        now: DateTime<Utc>,
    ) -> Result<GlobalScores> {
        let graph = graph.ok_or(LexicaError::MissingEdges)?;
        let meta = meta.ok_or(LexicaError::MissingMeta)?;

        let nodes: Vec<MessageId> = graph.nodes().into_iter().collect();
        if nodes.is_empty() {
            tracing::debug!("Graph has no edges, global authority is empty");
            return Ok(GlobalScores::new());
        }
        let n = nodes.len();
        let index: BTreeMap<MessageId, usize> =
            nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let teleport = self.personalization(&nodes, meta, now);

        let mut out_weight = vec![0.0f64; n];
        let edges: Vec<(usize, usize, f64)> = graph
            .edges
            .iter()
            .map(|e| (index[&e.src], index[&e.dst], e.weight.max(0.0)))
            .collect();
        for &(src, _, w) in &edges {
            out_weight[src] += w;
        }

        let follow = 1.0 - self.alpha;
        let mut rank = vec![1.0 / n as f64; n];

        for _ in 0..self.iterations {
            let dangling: f64 = rank
                .iter()
                .zip(&out_weight)
                .filter(|(_, w)| **w <= 0.0)
                .map(|(r, _)| *r)
                .sum();

            let mut next: Vec<f64> = teleport
                .iter()
                .map(|p| (self.alpha + follow * dangling) * p)
                .collect();
            for &(src, dst, w) in &edges {
                if out_weight[src] > 0.0 {
                    next[dst] += follow * rank[src] * w / out_weight[src];
                }
            }
            rank = next;
        }

        let total: f64 = rank.iter().sum();
        let scores: GlobalScores = nodes
            .iter()
            .zip(rank)
            .map(|(&id, r)| (id, if total > 0.0 { r / total } else { 1.0 / n as f64 }))
            .collect();

        tracing::debug!(
            "Global authority over {} nodes, {} edges",
            n,
            graph.edge_count()
        );
        Ok(scores)
    }

    /// Teleport distribution over graph nodes; uniform when every weight is zero
    fn personalization(&self, nodes: &[MessageId], meta: &MetaMap, now: DateTime<Utc>) -> Vec<f64> {
        let weights: Vec<f64> = nodes
            .iter()
            .map(|id| {
                meta.get(id)
                    .map(|m| personalization_weight(m, now, self.half_life_days))
                    .unwrap_or(0.0)
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.into_iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / nodes.len() as f64; nodes.len()]
        }
    }
}
