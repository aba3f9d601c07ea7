//! Signal normalization and the fixed fusion formula

use crate::corpus::{decay, MessageMeta, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const W_BM25: f64 = 1.00;
pub const W_SEMANTIC: f64 = 0.55;
pub const W_PRIOR: f64 = 0.20;
pub const W_FRESHNESS: f64 = 0.10;
pub const W_GLOBAL: f64 = 0.20;
pub const W_PPR: f64 = 0.25;

const MIN_STD: f64 = 1e-9;
const PRIOR_LENGTH_CAP: usize = 800;

/// Raw per-candidate signal values, reported in explain mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub bm25: f64,
    pub cos: f64,
    pub pr_global: f64,
    pub ppr: f64,
    pub fresh: f64,
    pub prior: f64,
}

/// z-scores of one signal across the candidate set
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZScores {
    pub bm25: f64,
    pub cos: f64,
    pub global: f64,
    pub ppr: f64,
}

/// Population z-normalization
///
/// A signal whose standard deviation is below 1e-9 carries no ranking
/// information and collapses to 0 for every candidate.
pub fn z_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    if std < MIN_STD {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / (std + MIN_STD)).collect()
}

/// Query-independent content prior
///
/// `0.30 [assistant] + 0.40 [has_code] + 0.30 min(snippet_len, 800) / 800`
pub fn content_prior(meta: &MessageMeta, snippet_len: usize) -> f64 {
    let mut prior = 0.0;
    if meta.role == Role::Assistant {
        prior += 0.30;
    }
    if meta.has_code {
        prior += 0.40;
    }
    prior + 0.30 * snippet_len.min(PRIOR_LENGTH_CAP) as f64 / PRIOR_LENGTH_CAP as f64
}

/// Recency decay of a message, 0 for unparseable timestamps
pub fn freshness(meta: &MessageMeta, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    decay(meta.timestamp(), now, half_life_days)
}

/// Seed weight of the query-biased PageRank
///
/// `max(0, bm25)^beta * (cos if cos > 0 else max(0, bm25))^gamma`
pub fn seed_weight(bm25: f64, cos: f64, beta: f64, gamma: f64) -> f64 {
    let b = bm25.max(0.0);
    let semantic = if cos > 0.0 { cos } else { b };
    b.powf(beta) * semantic.powf(gamma)
}

/// Weighted sum of normalized and raw signals
pub fn fused_score(z: &ZScores, prior: f64, fresh: f64) -> f64 {
    W_BM25 * z.bm25
        + W_SEMANTIC * z.cos
        + W_PRIOR * prior
        + W_FRESHNESS * fresh
        + W_GLOBAL * z.global
        + W_PPR * z.ppr
}
