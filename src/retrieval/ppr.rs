//! Query-biased PageRank restricted to the candidate set

use crate::corpus::MessageId;
use crate::graph::MessageGraph;
use ahash::AHashMap;

pub struct MiniPpr {
    alpha: f64,
    iterations: usize,
}

impl MiniPpr {
    pub fn new(alpha: f64, iterations: usize) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            iterations,
        }
    }

    /// Score candidates by a seed-personalized walk over their induced subgraph
    ///
    /// Only edges with both endpoints among `candidates` count. Each source
    /// column is normalized by its out-weight; a column with no out-weight
    /// keeps divisor 1, so its mass leaks rather than being redistributed.
    /// Without any internal edge every candidate scores 0. Seeds are clamped
    /// at 0 and normalized, uniform when they sum to 0.
    pub fn rank(
        &self,
        candidates: &[MessageId],
        graph: Option<&MessageGraph>,
        seeds: &[f64],
    ) -> Vec<f64> {
        let n = candidates.len();
        let zeros = vec![0.0; n];
        let Some(graph) = graph else {
            return zeros;
        };
        if n == 0 || graph.is_empty() {
            return zeros;
        }

        let index: AHashMap<MessageId, usize> =
            candidates.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut out_weight = vec![0.0f64; n];
        let mut edges: Vec<(usize, usize, f64)> = Vec::new();
        for edge in &graph.edges {
            if let (Some(&src), Some(&dst)) = (index.get(&edge.src), index.get(&edge.dst)) {
                edges.push((src, dst, edge.weight));
                out_weight[src] += edge.weight;
            }
        }

        if edges.is_empty() || out_weight.iter().sum::<f64>() == 0.0 {
            return zeros;
        }

        for w in out_weight.iter_mut() {
            if *w == 0.0 {
                *w = 1.0;
            }
        }
        let transitions: Vec<(usize, usize, f64)> = edges
            .into_iter()
            .map(|(src, dst, w)| (src, dst, w / out_weight[src]))
            .collect();

        let mut teleport: Vec<f64> = (0..n)
            .map(|i| seeds.get(i).copied().unwrap_or(0.0).max(0.0))
            .collect();
        let total: f64 = teleport.iter().sum();
        if total > 0.0 {
            teleport.iter_mut().for_each(|v| *v /= total);
        } else {
            teleport.iter_mut().for_each(|v| *v = 1.0 / n as f64);
        }

        let mut rank = teleport.clone();
        for _ in 0..self.iterations {
            let mut walked = vec![0.0f64; n];
            for &(src, dst, p) in &transitions {
                walked[dst] += p * rank[src];
            }
            rank = teleport
                .iter()
                .zip(walked)
                .map(|(v, w)| self.alpha * v + (1.0 - self.alpha) * w)
                .collect();
        }

        rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeType};

    fn edge(src: MessageId, dst: MessageId, weight: f64) -> Edge {
        Edge {
            src,
            dst,
            weight,
            kind: EdgeType::Reply,
        }
    }

    #[test]
    fn test_no_graph_or_no_internal_edges() {
        let ppr = MiniPpr::new(0.2, 20);
        assert_eq!(ppr.rank(&[1, 2], None, &[1.0, 1.0]), vec![0.0, 0.0]);

        // the only edge leaves the candidate set
        let graph = MessageGraph::new(vec![edge(1, 9, 2.0)]);
        assert_eq!(ppr.rank(&[1, 2], Some(&graph), &[1.0, 1.0]), vec![0.0, 0.0]);

        assert!(ppr.rank(&[], Some(&graph), &[]).is_empty());
    }

    #[test]
    fn test_single_edge_closed_form() {
        // r0 = alpha*v0 (no in-edges); r1 = alpha*v1 + (1-alpha)*r0
        let graph = MessageGraph::new(vec![edge(0, 1, 2.0)]);
        let scores = MiniPpr::new(0.2, 20).rank(&[0, 1], Some(&graph), &[1.0, 1.0]);

        assert!((scores[0] - 0.1).abs() < 1e-12);
        assert!((scores[1] - (0.1 + 0.8 * 0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_seeds_fall_back_to_uniform() {
        let graph = MessageGraph::new(vec![edge(0, 1, 1.0), edge(1, 0, 1.0)]);
        let ppr = MiniPpr::new(0.2, 20);
        let zero = ppr.rank(&[0, 1], Some(&graph), &[0.0, 0.0]);
        let uniform = ppr.rank(&[0, 1], Some(&graph), &[3.0, 3.0]);
        assert_eq!(zero, uniform);
        assert!((zero[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_seed_bias() {
        let graph = MessageGraph::new(vec![
            edge(0, 1, 1.0),
            edge(1, 0, 1.0),
            edge(1, 2, 1.0),
            edge(2, 1, 1.0),
        ]);
        let scores = MiniPpr::new(0.2, 20).rank(&[0, 1, 2], Some(&graph), &[5.0, 0.0, 0.0]);
        assert!(scores[0] > scores[2]);
    }
}
