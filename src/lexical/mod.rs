//! Lexical retrieval: code-aware tokenizer and an in-memory BM25 index

mod bm25;
mod tokenizer;

pub use bm25::{idf, IndexStats, LexicalHit, LexicalIndex, Posting};
pub use tokenizer::{is_stopword, split_identifier, tokenize};
