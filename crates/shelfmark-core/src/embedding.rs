//! Embedding provider seam.
//!
//! The engine never talks to a model directly; callers inject an
//! [`EmbeddingProvider`] (an HTTP client in production, a deterministic stub
//! in tests). Everything here is synchronous and sequential.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::chunking::Chunk;
use crate::config::RetrievalConfig;
use crate::error::ProviderError;

/// Produces one embedding vector per input text.
pub trait EmbeddingProvider {
    /// Embeds a batch of texts, preserving order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("provider returned no vectors".into()))
    }
}

/// Text actually sent to the provider for a chunk: the heading is prefixed
/// so that a chunk's embedding carries its section context.
pub fn embedding_text(chunk: &Chunk) -> String {
    match chunk.metadata.heading.as_deref() {
        Some(heading) => format!("{heading}\n\n{}", chunk.text),
        None => chunk.text.clone(),
    }
}

/// Embeds all chunks in fixed-size batches.
///
/// A [`ProviderError::RateLimited`] batch is retried exactly once after
/// `rate_limit_retry_secs`; a second rate limit, or any other error, aborts
/// the run.
pub fn embed_chunks<P: EmbeddingProvider>(
    provider: &P,
    chunks: &[Chunk],
    config: &RetrievalConfig,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let texts: Vec<String> = chunks.iter().map(embedding_text).collect();
    let batch_size = config.embedding_batch_size.max(1);
    let total_batches = texts.len().div_ceil(batch_size);

    let mut embeddings = Vec::with_capacity(texts.len());
    for (i, batch) in texts.chunks(batch_size).enumerate() {
        info!(
            batch = i + 1,
            total_batches,
            size = batch.len(),
            "embedding batch"
        );
        let vectors = match provider.embed_batch(batch) {
            Ok(vectors) => vectors,
            Err(ProviderError::RateLimited) => {
                warn!(
                    retry_after_secs = config.rate_limit_retry_secs,
                    "rate limited, retrying once"
                );
                thread::sleep(Duration::from_secs(config.rate_limit_retry_secs));
                provider.embed_batch(batch)?
            }
            Err(e) => return Err(e),
        };
        if vectors.len() != batch.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        embeddings.extend(vectors);
    }
    Ok(embeddings)
}
