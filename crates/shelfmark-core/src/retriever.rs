//! Query-time retrieval.
//!
//! A [`Retriever`] owns the loaded chunk list, both indexes and the embedding
//! provider, and serves hybrid or pure-vector search depending on
//! configuration. Indexes are rebuilt from artifacts at load time and never
//! mutated afterwards.

use std::collections::HashMap;

use tracing::{info, instrument};

use crate::chunking::Chunk;
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::index::{tokenize, KeywordIndex, VectorIndex};
use crate::search::SearchResult;
use crate::storage::{self, ArtifactPaths};

/// Anything that can turn a query string into a ranked result list.
///
/// [`Retriever`] is the production implementation; evaluation accepts any
/// `Ranker` so that metric code can be tested against scripted rankings.
pub trait Ranker {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, RetrievalError>;
}

pub struct Retriever<P> {
    config: RetrievalConfig,
    provider: P,
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
    vector: VectorIndex,
    keyword: Option<KeywordIndex>,
}

impl<P: EmbeddingProvider> Retriever<P> {
    /// Loads all artifacts from `paths` and rebuilds the indexes.
    ///
    /// Fails fast on any missing or malformed artifact. The keyword corpus
    /// is only required when hybrid search is enabled.
    pub fn load(
        paths: &ArtifactPaths,
        config: RetrievalConfig,
        provider: P,
    ) -> Result<Self, RetrievalError> {
        let chunks = storage::load_chunks(paths)?;
        let embeddings =
            storage::load_embeddings(paths, config.embedding_dimension, chunks.len())?;
        let ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();

        let mut vector = VectorIndex::new();
        vector.build(embeddings, ids)?;

        let keyword = if config.hybrid_search {
            let corpus = storage::load_keyword_corpus(paths)?;
            let mut index = KeywordIndex::new();
            index.build(corpus.corpus_tokens, corpus.chunk_ids)?;
            Some(index)
        } else {
            None
        };

        info!(
            chunks = chunks.len(),
            hybrid = keyword.is_some(),
            "loaded retriever"
        );
        Ok(Self::assemble(config, provider, chunks, vector, keyword))
    }

    /// Builds a retriever from in-memory parts, tokenizing the chunk texts
    /// for the keyword index. Used by tests and by callers that have just
    /// ingested and do not want to round-trip through disk.
    pub fn from_parts(
        config: RetrievalConfig,
        provider: P,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, RetrievalError> {
        let ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();

        let mut vector = VectorIndex::new();
        vector.build(embeddings, ids.clone())?;

        let keyword = if config.hybrid_search {
            let corpus: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();
            let mut index = KeywordIndex::new();
            index.build(corpus, ids)?;
            Some(index)
        } else {
            None
        };

        Ok(Self::assemble(config, provider, chunks, vector, keyword))
    }

    fn assemble(
        config: RetrievalConfig,
        provider: P,
        chunks: Vec<Chunk>,
        vector: VectorIndex,
        keyword: Option<KeywordIndex>,
    ) -> Self {
        let by_id = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.chunk_id.clone(), i))
            .collect();
        Self {
            config,
            provider,
            chunks,
            by_id,
            vector,
            keyword,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    #[instrument(skip_all, fields(query = %query, top_k))]
    fn run_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        let embedding = self.provider.embed(query)?;
        match &self.keyword {
            Some(keyword) => self.hybrid_search(query, &embedding, keyword, top_k),
            None => self.vector_search(&embedding, top_k),
        }
    }

    fn vector_search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        let hits = self.vector.search(embedding, top_k)?;
        let mut results = Vec::with_capacity(hits.len());
        for (chunk_id, score) in hits {
            if let Some(result) = self.result_for(&chunk_id, score, Some(score), None) {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Alpha-blended fusion of vector and keyword rankings.
    ///
    /// Both sides contribute a `2 * top_k` candidate pool. Keyword scores are
    /// normalized by the pool maximum into `[0, 1]`; vector scores are used
    /// as-is in `[-1, 1]`, so the two scales are not strictly comparable and
    /// the keyword side carries slightly more weight at equal alpha.
    fn hybrid_search(
        &self,
        query: &str,
        embedding: &[f32],
        keyword: &KeywordIndex,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        let pool = top_k * 2;
        let vector_hits = self.vector.search(embedding, pool)?;
        let keyword_hits = keyword.search(query, pool)?;

        let keyword_max = keyword_hits.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);

        let mut order: Vec<String> = Vec::with_capacity(vector_hits.len() + keyword_hits.len());
        let mut vector_scores: HashMap<String, f32> = HashMap::new();
        let mut keyword_scores: HashMap<String, f32> = HashMap::new();
        for (chunk_id, score) in vector_hits {
            vector_scores.insert(chunk_id.clone(), score);
            order.push(chunk_id);
        }
        for (chunk_id, score) in keyword_hits {
            if !vector_scores.contains_key(&chunk_id) {
                order.push(chunk_id.clone());
            }
            keyword_scores.insert(chunk_id, score);
        }

        let alpha = self.config.hybrid_alpha;
        let mut results = Vec::with_capacity(order.len());
        for chunk_id in order {
            let vector_score = vector_scores.get(&chunk_id).copied();
            let keyword_score = keyword_scores.get(&chunk_id).copied();
            let keyword_norm = match keyword_score {
                Some(s) if keyword_max > 0.0 => s / keyword_max,
                _ => 0.0,
            };
            let combined = alpha * vector_score.unwrap_or(0.0) + (1.0 - alpha) * keyword_norm;
            if let Some(result) = self.result_for(&chunk_id, combined, vector_score, keyword_score)
            {
                results.push(result);
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    fn result_for(
        &self,
        chunk_id: &str,
        score: f32,
        vector_score: Option<f32>,
        keyword_score: Option<f32>,
    ) -> Option<SearchResult> {
        let &index = self.by_id.get(chunk_id)?;
        let chunk = &self.chunks[index];
        Some(SearchResult {
            chunk_id: chunk.chunk_id.clone(),
            text: chunk.text.clone(),
            score,
            vector_score,
            keyword_score,
            matched_query: None,
            metadata: chunk.metadata.clone(),
        })
    }
}

impl<P: EmbeddingProvider> Ranker for Retriever<P> {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        self.run_search(query, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMetadata;
    use crate::error::{ProviderError, SearchError};

    /// Maps known query strings to fixed vectors.
    struct StubProvider {
        queries: HashMap<String, Vec<f32>>,
    }

    impl StubProvider {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                queries: entries
                    .iter()
                    .map(|(q, v)| (q.to_string(), v.clone()))
                    .collect(),
            }
        }
    }

    impl EmbeddingProvider for StubProvider {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            texts
                .iter()
                .map(|t| {
                    self.queries
                        .get(t)
                        .cloned()
                        .ok_or_else(|| ProviderError::Request(format!("unknown text: {t}")))
                })
                .collect()
        }
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            token_estimate: text.len() / 4,
            metadata: ChunkMetadata::default(),
        }
    }

    fn corpus() -> (Vec<Chunk>, Vec<Vec<f32>>) {
        let chunks = vec![
            chunk("chunk_0001", "the cat sat on the mat"),
            chunk("chunk_0002", "dogs chase the ball in the park"),
            chunk("chunk_0003", "a treatise on feline behavior"),
        ];
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.9, 0.1, 0.0],
        ];
        (chunks, embeddings)
    }

    fn config(alpha: f32, hybrid: bool) -> RetrievalConfig {
        RetrievalConfig {
            embedding_dimension: 3,
            hybrid_alpha: alpha,
            hybrid_search: hybrid,
            ..RetrievalConfig::default()
        }
    }

    #[test]
    fn alpha_one_reproduces_vector_ranking() {
        let (chunks, embeddings) = corpus();
        let provider = StubProvider::new(&[("cat", vec![1.0, 0.0, 0.0])]);
        let retriever =
            Retriever::from_parts(config(1.0, true), provider, chunks, embeddings).unwrap();

        let results = retriever.search("cat", 3).unwrap();
        assert_eq!(results[0].chunk_id, "chunk_0001");
        assert_eq!(results[1].chunk_id, "chunk_0003");
        // Pure vector order: chunk 1 (cos 1.0), chunk 3 (cos ~0.99), chunk 2.
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn alpha_zero_reproduces_keyword_ranking() {
        let (chunks, embeddings) = corpus();
        // Query vector points away from the keyword match.
        let provider = StubProvider::new(&[("cat sat mat", vec![0.0, 1.0, 0.0])]);
        let retriever =
            Retriever::from_parts(config(0.0, true), provider, chunks, embeddings).unwrap();

        let results = retriever.search("cat sat mat", 3).unwrap();
        // Only chunk 1 contains the query terms; with alpha = 0 the vector
        // preference for chunk 2 is ignored entirely.
        assert_eq!(results[0].chunk_id, "chunk_0001");
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hybrid_blends_both_sides() {
        let (chunks, embeddings) = corpus();
        let provider = StubProvider::new(&[("feline cat", vec![0.9, 0.1, 0.0])]);
        let retriever =
            Retriever::from_parts(config(0.6, true), provider, chunks, embeddings).unwrap();

        let results = retriever.search("feline cat", 3).unwrap();
        assert_eq!(results.len(), 3);
        let top = &results[0];
        assert!(top.vector_score.is_some());
        assert!(top.keyword_score.is_some());
        // Fused score is alpha * vector + (1 - alpha) * normalized keyword.
        let expected = 0.6 * top.vector_score.unwrap()
            + 0.4 * top.keyword_score.unwrap()
                / results
                    .iter()
                    .filter_map(|r| r.keyword_score)
                    .fold(0.0f32, f32::max);
        assert!((top.score - expected).abs() < 1e-5);
    }

    #[test]
    fn disabled_hybrid_uses_pure_vector_search() {
        let (chunks, embeddings) = corpus();
        let provider = StubProvider::new(&[("anything", vec![0.0, 1.0, 0.0])]);
        let retriever =
            Retriever::from_parts(config(0.6, false), provider, chunks, embeddings).unwrap();

        let results = retriever.search("anything", 2).unwrap();
        assert_eq!(results[0].chunk_id, "chunk_0002");
        assert!(results[0].keyword_score.is_none());
        assert_eq!(results[0].vector_score, Some(results[0].score));
    }

    #[test]
    fn zero_query_vector_surfaces_empty_vector_error() {
        let (chunks, embeddings) = corpus();
        let provider = StubProvider::new(&[("void", vec![0.0, 0.0, 0.0])]);
        let retriever =
            Retriever::from_parts(config(0.6, true), provider, chunks, embeddings).unwrap();

        match retriever.search("void", 3) {
            Err(RetrievalError::Search(SearchError::EmptyVector)) => {}
            other => panic!("expected EmptyVector, got {other:?}"),
        }
    }

    #[test]
    fn results_carry_chunk_text_and_metadata() {
        let (chunks, embeddings) = corpus();
        let provider = StubProvider::new(&[("cat", vec![1.0, 0.0, 0.0])]);
        let retriever =
            Retriever::from_parts(config(0.6, true), provider, chunks, embeddings).unwrap();

        let results = retriever.search("cat", 1).unwrap();
        assert_eq!(results[0].text, "the cat sat on the mat");
    }
}
