//! Message graph and graph-derived authority
//!
//! Edges connect messages of the same conversation only: consecutive replies
//! and same-topic neighbours found through embedding similarity. Global
//! authority is a personalized PageRank over the whole graph.

mod authority;
mod builder;

pub use authority::{personalization_weight, GlobalAuthority, GlobalScores};
pub use builder::{GraphBuilder, REPLY_WEIGHT};

use crate::corpus::MessageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why two messages are linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Reply,
    SameTopic,
}

/// Directed weighted edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src: MessageId,
    pub dst: MessageId,
    pub weight: f64,
    #[serde(rename = "type")]
    pub kind: EdgeType,
}

/// Ordered edge list; parallel edges of different types are kept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageGraph {
    pub edges: Vec<Edge>,
}

impl MessageGraph {
    pub fn new(edges: Vec<Edge>) -> Self {
        Self { edges }
    }

    /// Every message touched by at least one edge, ascending
    pub fn nodes(&self) -> BTreeSet<MessageId> {
        self.edges
            .iter()
            .flat_map(|e| [e.src, e.dst])
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn count_of(&self, kind: EdgeType) -> usize {
        self.edges.iter().filter(|e| e.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_wire_format() {
        let edge = Edge {
            src: 1,
            dst: 2,
            weight: 2.0,
            kind: EdgeType::SameTopic,
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["type"], "same_topic");
        assert_eq!(json["src"], 1);
    }

    #[test]
    fn test_nodes() {
        let graph = MessageGraph::new(vec![
            Edge {
                src: 3,
                dst: 1,
                weight: 1.0,
                kind: EdgeType::Reply,
            },
            Edge {
                src: 1,
                dst: 3,
                weight: 1.0,
                kind: EdgeType::SameTopic,
            },
        ]);
        assert_eq!(graph.nodes().into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(graph.count_of(EdgeType::Reply), 1);
    }
}
