//! Ground-truth remapping.
//!
//! Chunk ids are not stable across ingestion runs, so a testset built
//! against an older index needs its labels moved to the chunks that now hold
//! the same content. Matching is lexical: count how many n-grams of the
//! answer (falling back to the question) appear verbatim in each chunk,
//! case-insensitively, trying window sizes 4, 3 and 2 and stopping at the
//! first size that matches anywhere.

use std::collections::HashMap;

use tracing::info;

use crate::chunking::Chunk;

use super::testset::TestsetItem;

const NGRAM_WINDOWS: [usize; 3] = [4, 3, 2];

/// Re-labels `items` against the current `chunks`.
///
/// A label is kept when its chunk still exists and contains at least one
/// 4-gram of the answer. Otherwise the best-matching chunk wins (first
/// occurrence on ties, so the scan is deterministic); remapped items record
/// their previous id in `original_chunk_id`. Items that match nothing are
/// left untouched. This never fails.
pub fn remap_ground_truth(
    items: Vec<TestsetItem>,
    chunks: &[Chunk],
) -> (Vec<TestsetItem>, usize) {
    let lowered: Vec<(&str, String)> = chunks
        .iter()
        .map(|c| (c.chunk_id.as_str(), c.text.to_lowercase()))
        .collect();
    let by_id: HashMap<&str, usize> = lowered
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (*id, i))
        .collect();

    let mut remapped = 0usize;
    let mut out = Vec::with_capacity(items.len());
    for mut item in items {
        if let Some(&i) = by_id.get(item.chunk_id.as_str()) {
            if contains_any_ngram(&lowered[i].1, &item.answer, 4) {
                out.push(item);
                continue;
            }
        }

        let target = best_chunk(&lowered, &item.answer)
            .or_else(|| best_chunk(&lowered, &item.question));
        match target {
            Some(id) if id != item.chunk_id => {
                item.original_chunk_id = Some(std::mem::replace(&mut item.chunk_id, id));
                remapped += 1;
                out.push(item);
            }
            _ => out.push(item),
        }
    }

    if remapped > 0 {
        info!(remapped, total = out.len(), "remapped ground-truth labels");
    }
    (out, remapped)
}

/// Highest n-gram hit count wins; windows are tried largest first and the
/// first window with any match decides.
fn best_chunk(lowered: &[(&str, String)], text: &str) -> Option<String> {
    let words: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    for n in NGRAM_WINDOWS {
        if words.len() < n {
            continue;
        }
        let grams: Vec<String> = (0..=words.len() - n).map(|i| words[i..i + n].join(" ")).collect();

        let mut best: Option<(&str, usize)> = None;
        for (id, chunk_text) in lowered {
            let score = grams.iter().filter(|g| chunk_text.contains(g.as_str())).count();
            if score > 0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((id, score));
            }
        }
        if let Some((id, _)) = best {
            return Some(id.to_string());
        }
    }
    None
}

fn contains_any_ngram(chunk_text_lower: &str, text: &str, n: usize) -> bool {
    let words: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if words.len() < n {
        return false;
    }
    (0..=words.len() - n).any(|i| chunk_text_lower.contains(&words[i..i + n].join(" ")))
}
