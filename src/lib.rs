//! Lexica - hybrid ranking over chat transcripts
//!
//! Builds a BM25 index, hashed-trigram embeddings, a reply/same-topic message
//! graph and a global personalized PageRank for each imported corpus, then
//! answers queries by fusing those signals with a query-biased PageRank.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod lexical;
pub mod retrieval;
pub mod storage;

pub use error::{LexicaError, Result};
