//! Search result types and multi-query merging.

mod merge;

pub use merge::{merge_multi_query, multi_search};

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkMetadata;

/// One ranked search hit.
///
/// `score` is what the ranking sorted on: raw cosine similarity for pure
/// vector search, the alpha blend for hybrid search. The component scores
/// are carried unmodified for display and diagnostics; either may be absent
/// when the corresponding side did not surface the chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
    /// Which sub-query produced this hit in a multi-query search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_query: Option<String>,
    pub metadata: ChunkMetadata,
}
