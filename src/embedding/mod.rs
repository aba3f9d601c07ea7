//! Semantic signal
//!
//! Deterministic hashed character-trigram vectors stand in for a learned
//! embedding model. Vectors are unit length (or zero for empty text), so a
//! dot product is a valid cosine proxy.
mod hasher;
mod store;

pub use hasher::{cosine, dot, embed, normalize, DEFAULT_DIMS};
pub use store::{EmbeddingStore, SemanticHit};
