//! Hybrid retrieval engine for document search.
//!
//! Shelfmark turns documents into retrievable chunks and searches them with a
//! blend of exhaustive cosine similarity over dense embeddings and BM25
//! keyword matching. The library is deliberately synchronous and
//! single-threaded; the only external capability is an [`embedding::EmbeddingProvider`]
//! implementation injected by the caller.
//!
//! # Pipeline
//!
//! 1. [`chunking`] splits a document into chunks via a strategy cascade
//!    (markdown headings, then heuristic structural headings, then a
//!    paragraph fallback).
//! 2. [`embedding::embed_chunks`] produces one vector per chunk through the
//!    injected provider.
//! 3. [`storage`] persists chunks, embeddings and the tokenized keyword
//!    corpus under a data directory.
//! 4. [`retriever::Retriever`] loads the artifacts, rebuilds both indexes and
//!    serves (multi-query) hybrid search.
//! 5. [`evaluation`] measures retrieval quality against a ground-truth
//!    testset and diagnoses failure modes.

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod retriever;
pub mod search;
pub mod storage;

pub use config::RetrievalConfig;
pub use error::{ArtifactError, ProviderError, RetrievalError, SearchError};
pub use retriever::{Ranker, Retriever};
pub use search::SearchResult;
