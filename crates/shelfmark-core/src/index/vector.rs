//! Exhaustive cosine similarity index.
//!
//! Embeddings are normalized once at build time so that a search is a single
//! dot product per row. The scan is deliberately exhaustive: corpora here are
//! book-sized (thousands of chunks, not millions) and an exact, deterministic
//! ranking is worth more than sub-millisecond lookups.

use tracing::debug;

use crate::error::SearchError;

use super::validate_dimension;

/// Dense vector index over unit-normalized embeddings.
pub struct VectorIndex {
    built: Option<Built>,
}

struct Built {
    /// Unit-normalized rows; zero-norm rows are stored as-is and score 0
    /// against every query.
    rows: Vec<Vec<f32>>,
    chunk_ids: Vec<String>,
    dimension: usize,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self { built: None }
    }

    /// Builds the index from position-aligned embeddings and chunk ids.
    ///
    /// Rows are normalized to unit length; rows with an exactly zero norm are
    /// left unmodified rather than rejected, so a degenerate embedding can
    /// never rank above a real match.
    pub fn build(
        &mut self,
        mut embeddings: Vec<Vec<f32>>,
        chunk_ids: Vec<String>,
    ) -> Result<(), SearchError> {
        if embeddings.len() != chunk_ids.len() {
            return Err(SearchError::CorpusMismatch {
                ids: chunk_ids.len(),
                rows: embeddings.len(),
            });
        }
        let dimension = embeddings.first().map_or(0, Vec::len);
        for row in &mut embeddings {
            validate_dimension(dimension, row.len())?;
            let norm = l2_norm(row);
            if norm > 0.0 {
                for v in row.iter_mut() {
                    *v /= norm;
                }
            }
        }
        debug!(rows = embeddings.len(), dimension, "built vector index");
        self.built = Some(Built {
            rows: embeddings,
            chunk_ids,
            dimension,
        });
        Ok(())
    }

    /// Returns up to `k` `(chunk_id, cosine)` pairs, best first.
    ///
    /// Ties keep insertion order. Scores stay in `[-1, 1]`; they are not
    /// rescaled here or anywhere downstream.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>, SearchError> {
        let built = self.built.as_ref().ok_or(SearchError::IndexNotBuilt)?;

        let norm = l2_norm(query);
        if norm == 0.0 {
            return Err(SearchError::EmptyVector);
        }
        if built.rows.is_empty() {
            return Ok(Vec::new());
        }
        validate_dimension(built.dimension, query.len())?;

        let query: Vec<f32> = query.iter().map(|v| v / norm).collect();
        let mut scored: Vec<(usize, f32)> = built
            .rows
            .iter()
            .map(|row| row.iter().zip(&query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();
        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (built.chunk_ids[i].clone(), score))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("chunk_{i:04}")).collect()
    }

    fn built(embeddings: Vec<Vec<f32>>) -> VectorIndex {
        let n = embeddings.len();
        let mut index = VectorIndex::new();
        index.build(embeddings, ids(n)).unwrap();
        index
    }

    #[test]
    fn search_before_build_fails() {
        let index = VectorIndex::new();
        assert!(matches!(
            index.search(&[1.0, 0.0], 5),
            Err(SearchError::IndexNotBuilt)
        ));
    }

    #[test]
    fn exact_match_scores_one() {
        let index = built(vec![vec![3.0, 0.0], vec![0.0, 2.0]]);
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, "chunk_0001");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert!(results[1].1.abs() < 1e-6);
    }

    #[test]
    fn returns_min_of_k_and_corpus_size() {
        let index = built(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = built(vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![0.5, 0.0],
            vec![0.0, 1.0],
        ]);
        let results = index.search(&[1.0, 0.0], 4).unwrap();
        // The first three normalize to the same unit vector.
        assert_eq!(results[0].0, "chunk_0001");
        assert_eq!(results[1].0, "chunk_0002");
        assert_eq!(results[2].0, "chunk_0003");
        assert_eq!(results[3].0, "chunk_0004");
    }

    #[test]
    fn zero_norm_query_is_an_error() {
        let index = built(vec![vec![1.0, 0.0]]);
        assert!(matches!(
            index.search(&[0.0, 0.0], 5),
            Err(SearchError::EmptyVector)
        ));
    }

    #[test]
    fn zero_norm_row_never_outranks_real_matches() {
        let index = built(vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
        let results = index.search(&[1.0, 1.0], 2).unwrap();
        assert_eq!(results[0].0, "chunk_0002");
        assert!(results[1].1.abs() < 1e-6);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let index = built(vec![vec![1.0, 0.0]]);
        let err = index.search(&[1.0, 0.0, 0.0], 5).unwrap_err();
        assert!(matches!(
            err,
            SearchError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn misaligned_ids_are_rejected_at_build() {
        let mut index = VectorIndex::new();
        let err = index
            .build(vec![vec![1.0, 0.0]], ids(2))
            .unwrap_err();
        assert!(matches!(err, SearchError::CorpusMismatch { ids: 2, rows: 1 }));
    }

    #[test]
    fn negative_similarity_is_preserved() {
        let index = built(vec![vec![-1.0, 0.0]]);
        let results = index.search(&[1.0, 0.0], 1).unwrap();
        assert!((results[0].1 + 1.0).abs() < 1e-6);
    }
}
