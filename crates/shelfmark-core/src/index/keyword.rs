//! BM25 keyword index.
//!
//! Okapi BM25 over a deliberately simple tokenizer: lowercase, every
//! non-word character becomes a space, split on whitespace. The exact same
//! tokenizer runs at build and query time; the tokenized corpus is what gets
//! persisted, and all corpus statistics are recomputed from it on load.

use std::collections::HashMap;

use tracing::debug;

use crate::error::SearchError;

const K1: f64 = 1.5;
const B: f64 = 0.75;
/// Negative IDFs (terms in more than half the corpus) are floored to
/// `EPSILON` times the mean IDF instead of penalizing matches.
const EPSILON: f64 = 0.25;

/// Lowercases, maps non-word characters (anything not alphanumeric or `_`)
/// to spaces, and splits on whitespace.
///
/// `tokenize("Hello, World!")` and `tokenize("hello world")` are identical.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// BM25 index over a tokenized corpus.
pub struct KeywordIndex {
    built: Option<Built>,
}

struct Built {
    chunk_ids: Vec<String>,
    term_freqs: Vec<HashMap<String, usize>>,
    idf: HashMap<String, f64>,
    doc_lens: Vec<usize>,
    avgdl: f64,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self { built: None }
    }

    /// Builds the index from a pre-tokenized corpus and position-aligned
    /// chunk ids. This is the load path: the persisted artifact stores token
    /// lists, never statistics.
    pub fn build(
        &mut self,
        corpus_tokens: Vec<Vec<String>>,
        chunk_ids: Vec<String>,
    ) -> Result<(), SearchError> {
        if corpus_tokens.len() != chunk_ids.len() {
            return Err(SearchError::CorpusMismatch {
                ids: chunk_ids.len(),
                rows: corpus_tokens.len(),
            });
        }

        let doc_lens: Vec<usize> = corpus_tokens.iter().map(Vec::len).collect();
        let total: usize = doc_lens.iter().sum();
        let avgdl = if doc_lens.is_empty() {
            0.0
        } else {
            total as f64 / doc_lens.len() as f64
        };

        let mut term_freqs: Vec<HashMap<String, usize>> = Vec::with_capacity(corpus_tokens.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in &corpus_tokens {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let n = corpus_tokens.len() as f64;
        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, df) in doc_freq {
            let value = (n - df as f64 + 0.5).ln() - (df as f64 + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }
        if !idf.is_empty() {
            let floor = EPSILON * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        debug!(docs = chunk_ids.len(), terms = idf.len(), "built keyword index");
        self.built = Some(Built {
            chunk_ids,
            term_freqs,
            idf,
            doc_lens,
            avgdl,
        });
        Ok(())
    }

    /// Scores every document against `query` and returns the top `k`
    /// `(chunk_id, score)` pairs, best first. Ties keep corpus order; zero
    /// scores are not filtered out.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>, SearchError> {
        let built = self.built.as_ref().ok_or(SearchError::IndexNotBuilt)?;
        if built.chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query_tokens = tokenize(query);
        let mut scored: Vec<(usize, f64)> = Vec::with_capacity(built.chunk_ids.len());
        for (i, freqs) in built.term_freqs.iter().enumerate() {
            let dl = built.doc_lens[i] as f64;
            let mut score = 0.0;
            for token in &query_tokens {
                let Some(idf) = built.idf.get(token) else {
                    continue;
                };
                let tf = freqs.get(token).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    continue;
                }
                let denom = tf + K1 * (1.0 - B + B * dl / built.avgdl);
                score += idf * tf * (K1 + 1.0) / denom;
            }
            scored.push((i, score));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (built.chunk_ids[i].clone(), score as f32))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.chunk_ids.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(texts: &[&str]) -> KeywordIndex {
        let corpus: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t)).collect();
        let ids = (1..=texts.len())
            .map(|i| format!("chunk_{i:04}"))
            .collect();
        let mut index = KeywordIndex::new();
        index.build(corpus, ids).unwrap();
        index
    }

    #[test]
    fn tokenizer_normalizes_punctuation_and_case() {
        assert_eq!(tokenize("Hello, World!"), tokenize("hello world"));
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
        assert_eq!(tokenize("snake_case stays"), vec!["snake_case", "stays"]);
        assert_eq!(tokenize("a-b c.d"), vec!["a", "b", "c", "d"]);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn search_before_build_fails() {
        let index = KeywordIndex::new();
        assert!(matches!(
            index.search("anything", 5),
            Err(SearchError::IndexNotBuilt)
        ));
    }

    #[test]
    fn rare_term_outranks_common_term() {
        let index = index_of(&[
            "the cat sat on the mat",
            "the dog sat on the log",
            "the zeppelin flew over the town",
        ]);
        let results = index.search("zeppelin", 3).unwrap();
        assert_eq!(results[0].0, "chunk_0003");
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn query_tokenization_matches_build_tokenization() {
        let index = index_of(&["hello world of search", "unrelated text entirely"]);
        let punctuated = index.search("Hello, World!", 2).unwrap();
        let plain = index.search("hello world", 2).unwrap();
        assert_eq!(punctuated, plain);
        assert_eq!(punctuated[0].0, "chunk_0001");
    }

    #[test]
    fn ties_keep_corpus_order() {
        let index = index_of(&["same words here", "same words here", "other thing"]);
        let results = index.search("same words", 3).unwrap();
        assert_eq!(results[0].0, "chunk_0001");
        assert_eq!(results[1].0, "chunk_0002");
    }

    #[test]
    fn zero_scores_are_included_up_to_k() {
        let index = index_of(&["alpha beta", "gamma delta"]);
        let results = index.search("alpha", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].1 > 0.0);
        assert_eq!(results[1].1, 0.0);
    }

    #[test]
    fn ubiquitous_terms_still_score_nonnegative() {
        // "the" appears in every document; its raw IDF is negative and must
        // be floored, not allowed to subtract from the score.
        let index = index_of(&[
            "the cat sat",
            "the dog ran",
            "the bird flew",
            "the fish swam",
        ]);
        let results = index.search("the cat", 4).unwrap();
        assert_eq!(results[0].0, "chunk_0001");
        for (_, score) in &results {
            assert!(*score >= 0.0);
        }
    }

    #[test]
    fn misaligned_ids_are_rejected_at_build() {
        let mut index = KeywordIndex::new();
        let err = index
            .build(vec![tokenize("a b")], vec!["x".into(), "y".into()])
            .unwrap_err();
        assert!(matches!(err, SearchError::CorpusMismatch { ids: 2, rows: 1 }));
    }
}
