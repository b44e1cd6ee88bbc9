//! Retrieval configuration.
//!
//! A single [`RetrievalConfig`] value is threaded through chunking, embedding
//! and search, and a snapshot of it is embedded in every persisted evaluation
//! report so that results can always be traced back to the settings that
//! produced them.

use serde::{Deserialize, Serialize};

/// Tunable parameters for the retrieval pipeline.
///
/// Defaults match the production settings the engine ships with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum estimated tokens per chunk before a section is split.
    pub chunk_max_tokens: usize,

    /// Trailing sentences carried from a just-closed chunk into the next one.
    pub chunk_overlap_sentences: usize,

    /// Characters per token for the cheap token estimate.
    pub chars_per_token: usize,

    /// Expected embedding vector dimension.
    pub embedding_dimension: usize,

    /// Texts per embedding request.
    pub embedding_batch_size: usize,

    /// Seconds to wait before the single retry after a rate-limit error.
    pub rate_limit_retry_secs: u64,

    /// Default number of results returned by a search.
    pub top_k: usize,

    /// Blend keyword (BM25) scores into vector scores when true.
    pub hybrid_search: bool,

    /// Weight on the vector score in hybrid fusion; `1 - alpha` goes to
    /// the keyword score. Only meaningful when `hybrid_search` is on.
    pub hybrid_alpha: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_max_tokens: 800,
            chunk_overlap_sentences: 2,
            chars_per_token: 4,
            embedding_dimension: 1536,
            embedding_batch_size: 100,
            rate_limit_retry_secs: 60,
            top_k: 10,
            hybrid_search: true,
            hybrid_alpha: 0.6,
        }
    }
}

impl RetrievalConfig {
    /// Estimates the token count of `text` as `chars / chars_per_token`.
    ///
    /// Deliberately crude: chunk budgets only need to be in the right
    /// ballpark, and this keeps chunking free of any tokenizer dependency.
    pub fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_token.max(1)
    }
}
