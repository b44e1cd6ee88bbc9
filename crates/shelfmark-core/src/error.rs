//! Error types for the retrieval engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing persisted index artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// A required artifact file does not exist.
    #[error("missing artifact: {0} (run ingest first)")]
    Missing(PathBuf),

    /// An artifact exists but its contents are not usable.
    #[error("malformed artifact {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },

    /// Underlying filesystem failure.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by an embedding provider implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the request due to rate limiting.
    /// Batch embedding retries this exactly once after a fixed delay.
    #[error("embedding provider rate limited")]
    RateLimited,

    /// The request itself failed (network, auth, server error).
    #[error("embedding request failed: {0}")]
    Request(String),

    /// The provider answered but the payload was unusable.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by the in-memory search indexes.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query vector has zero norm, so cosine similarity is undefined.
    #[error("query vector has zero norm; cosine similarity is undefined")]
    EmptyVector,

    /// `search` was called before `build`.
    #[error("index not built; call build() first")]
    IndexNotBuilt,

    /// Query or row dimension does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Chunk ids and rows/token lists are not position-aligned.
    #[error("corpus mismatch: {ids} chunk ids for {rows} rows")]
    CorpusMismatch { ids: usize, rows: usize },
}

/// Umbrella error for retrieval operations that cross component boundaries.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Search(#[from] SearchError),
}
