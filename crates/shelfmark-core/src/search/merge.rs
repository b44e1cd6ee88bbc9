//! Multi-query result merging.
//!
//! A user question is often expanded into several sub-queries. Merging their
//! result lists naively by score would let one broad sub-query crowd out the
//! others, so the merge runs in two phases:
//!
//! 1. **Guarantee**: each sub-query, in input order, contributes up to `m`
//!    of its not-yet-seen results in rank order.
//! 2. **Backfill**: everything still unseen is pooled and appended in global
//!    score order.
//!
//! The merged list is truncated to `cap` and never repeats a chunk id.

use std::collections::HashSet;

use tracing::debug;

use crate::error::RetrievalError;
use crate::retriever::Ranker;

use super::SearchResult;

/// Merges per-query result lists. `per_query_min` is the guarantee `m`;
/// `cap` bounds the merged list.
pub fn merge_multi_query(
    per_query: Vec<Vec<SearchResult>>,
    per_query_min: usize,
    cap: usize,
) -> Vec<SearchResult> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<SearchResult> = Vec::new();
    let mut leftovers: Vec<SearchResult> = Vec::new();

    for results in per_query {
        let mut taken = 0usize;
        for result in results {
            if seen.contains(&result.chunk_id) {
                continue;
            }
            if taken < per_query_min {
                seen.insert(result.chunk_id.clone());
                merged.push(result);
                taken += 1;
            } else {
                leftovers.push(result);
            }
        }
    }

    leftovers.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for result in leftovers {
        if merged.len() >= cap {
            break;
        }
        if seen.insert(result.chunk_id.clone()) {
            merged.push(result);
        }
    }

    merged.truncate(cap);
    debug!(merged = merged.len(), "merged multi-query results");
    merged
}

/// Runs `ranker` once per query, tags each hit with the sub-query that
/// produced it, and merges the lists.
pub fn multi_search<R: Ranker + ?Sized>(
    ranker: &R,
    queries: &[String],
    per_query_min: usize,
    cap: usize,
) -> Result<Vec<SearchResult>, RetrievalError> {
    let mut per_query = Vec::with_capacity(queries.len());
    for query in queries {
        let mut results = ranker.search(query, cap)?;
        for result in &mut results {
            result.matched_query = Some(query.clone());
        }
        per_query.push(results);
    }
    Ok(merge_multi_query(per_query, per_query_min, cap))
}
