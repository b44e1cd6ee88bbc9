//! Hit rate / MRR evaluation and report comparison.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::retriever::Ranker;

use super::testset::TestsetItem;

/// Cutoffs reported by default.
pub const DEFAULT_K_VALUES: [usize; 4] = [1, 3, 5, 10];

/// A found rank above this counts as a ranking problem, not a clean hit.
pub const LOW_RANK_THRESHOLD: usize = 5;

/// How many retrieved ids each record keeps for later diagnostics.
const RETRIEVED_IDS_KEPT: usize = 10;

/// Outcome of one evaluated question. `rank` is 1-based; 0 means the
/// expected chunk was not retrieved at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub expected_chunk_id: String,
    pub rank: usize,
    pub found: bool,
    pub retrieved_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_result_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// Aggregate metrics over a testset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub total_questions: usize,
    /// `k -> fraction of questions whose expected chunk ranked within k`.
    pub hit_rate: BTreeMap<usize, f64>,
    pub mrr: f64,
    /// Questions whose expected chunk was not retrieved.
    pub failures: usize,
    /// Questions found but ranked below [`LOW_RANK_THRESHOLD`].
    pub low_rank_count: usize,
}

/// A full evaluation run: metrics, per-question details and the exact
/// configuration that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub timestamp: String,
    pub k_values: Vec<usize>,
    pub config: RetrievalConfig,
    pub metrics: EvalMetrics,
    pub details: Vec<EvalRecord>,
}

/// Ranks every testset question through `ranker` and aggregates metrics.
///
/// Each question is searched once at `k = max(k_values)`; all hit rates are
/// derived from that single ranking. Runs strictly sequentially.
pub fn evaluate<R: Ranker + ?Sized>(
    ranker: &R,
    testset: &[TestsetItem],
    k_values: &[usize],
    config: &RetrievalConfig,
) -> Result<EvalReport, RetrievalError> {
    let max_k = k_values.iter().copied().max().unwrap_or(10);

    let mut details = Vec::with_capacity(testset.len());
    for (i, item) in testset.iter().enumerate() {
        let results = ranker.search(&item.question, max_k)?;
        let rank = results
            .iter()
            .position(|r| r.chunk_id == item.chunk_id)
            .map_or(0, |p| p + 1);
        debug!(question = i + 1, total = testset.len(), rank, "evaluated");

        details.push(EvalRecord {
            question: item.question.clone(),
            expected_chunk_id: item.chunk_id.clone(),
            rank,
            found: rank > 0,
            retrieved_ids: results
                .iter()
                .take(RETRIEVED_IDS_KEPT)
                .map(|r| r.chunk_id.clone())
                .collect(),
            top_result_score: results.first().map(|r| r.score),
            heading: item.heading.clone(),
        });
    }

    let metrics = compute_metrics(&details, k_values);
    info!(
        questions = metrics.total_questions,
        mrr = metrics.mrr,
        failures = metrics.failures,
        "evaluation complete"
    );

    Ok(EvalReport {
        timestamp: Utc::now().to_rfc3339(),
        k_values: k_values.to_vec(),
        config: config.clone(),
        metrics,
        details,
    })
}

fn compute_metrics(details: &[EvalRecord], k_values: &[usize]) -> EvalMetrics {
    let total = details.len();

    let mut hit_rate = BTreeMap::new();
    for &k in k_values {
        let hits = details.iter().filter(|d| d.rank >= 1 && d.rank <= k).count();
        let rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        hit_rate.insert(k, rate);
    }

    let mrr = if total == 0 {
        0.0
    } else {
        details
            .iter()
            .map(|d| if d.rank > 0 { 1.0 / d.rank as f64 } else { 0.0 })
            .sum::<f64>()
            / total as f64
    };

    EvalMetrics {
        total_questions: total,
        hit_rate,
        mrr,
        failures: details.iter().filter(|d| d.rank == 0).count(),
        low_rank_count: details
            .iter()
            .filter(|d| d.rank > LOW_RANK_THRESHOLD)
            .count(),
    }
}

/// One metric's movement between two reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub before: f64,
    pub after: f64,
    pub change: f64,
    pub improved: bool,
}

/// Compares two reports metric by metric. Keys are `hit_rate@k` for every k
/// present in either report, plus `mrr`, `failures` and `low_rank_count`
/// (for the last two, down is an improvement).
pub fn metric_deltas(before: &EvalReport, after: &EvalReport) -> BTreeMap<String, MetricDelta> {
    let mut deltas = BTreeMap::new();

    let ks: std::collections::BTreeSet<usize> = before
        .metrics
        .hit_rate
        .keys()
        .chain(after.metrics.hit_rate.keys())
        .copied()
        .collect();
    for k in ks {
        let b = before.metrics.hit_rate.get(&k).copied().unwrap_or(0.0);
        let a = after.metrics.hit_rate.get(&k).copied().unwrap_or(0.0);
        deltas.insert(format!("hit_rate@{k}"), delta(b, a, true));
    }
    deltas.insert(
        "mrr".to_string(),
        delta(before.metrics.mrr, after.metrics.mrr, true),
    );
    deltas.insert(
        "failures".to_string(),
        delta(
            before.metrics.failures as f64,
            after.metrics.failures as f64,
            false,
        ),
    );
    deltas.insert(
        "low_rank_count".to_string(),
        delta(
            before.metrics.low_rank_count as f64,
            after.metrics.low_rank_count as f64,
            false,
        ),
    );
    deltas
}

fn delta(before: f64, after: f64, up_is_good: bool) -> MetricDelta {
    let change = after - before;
    MetricDelta {
        before,
        after,
        change,
        improved: if up_is_good { change > 0.0 } else { change < 0.0 },
    }
}

/// Questions that flipped between found and missed across two reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailureDiff {
    pub fixed: Vec<String>,
    pub regressed: Vec<String>,
}

pub fn failure_diff(before: &EvalReport, after: &EvalReport) -> FailureDiff {
    let missed_before: HashSet<&str> = before
        .details
        .iter()
        .filter(|d| !d.found)
        .map(|d| d.question.as_str())
        .collect();
    let mut diff = FailureDiff::default();
    for record in &after.details {
        if record.found && missed_before.contains(record.question.as_str()) {
            diff.fixed.push(record.question.clone());
        }
        if !record.found && !missed_before.contains(record.question.as_str()) {
            diff.regressed.push(record.question.clone());
        }
    }
    // Keep only questions present in both runs on the regressed side.
    let before_questions: HashSet<&str> = before
        .details
        .iter()
        .map(|d| d.question.as_str())
        .collect();
    diff.regressed
        .retain(|q| before_questions.contains(q.as_str()));
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMetadata;
    use crate::search::SearchResult;
    use std::collections::HashMap;

    /// Scripted ranker: a fixed result list per question.
    struct FakeRanker {
        rankings: HashMap<String, Vec<String>>,
    }

    impl FakeRanker {
        fn new(entries: &[(&str, &[&str])]) -> Self {
            Self {
                rankings: entries
                    .iter()
                    .map(|(q, ids)| {
                        (
                            q.to_string(),
                            ids.iter().map(|s| s.to_string()).collect(),
                        )
                    })
                    .collect(),
            }
        }
    }

    impl Ranker for FakeRanker {
        fn search(
            &self,
            query: &str,
            top_k: usize,
        ) -> Result<Vec<SearchResult>, RetrievalError> {
            let ids = self.rankings.get(query).cloned().unwrap_or_default();
            Ok(ids
                .into_iter()
                .take(top_k)
                .enumerate()
                .map(|(i, chunk_id)| SearchResult {
                    chunk_id,
                    text: String::new(),
                    score: 1.0 - i as f32 * 0.1,
                    vector_score: None,
                    keyword_score: None,
                    matched_query: None,
                    metadata: ChunkMetadata::default(),
                })
                .collect())
        }
    }

    fn item(question: &str, chunk_id: &str) -> TestsetItem {
        TestsetItem {
            chunk_id: chunk_id.to_string(),
            question: question.to_string(),
            answer: String::new(),
            heading: None,
            original_chunk_id: None,
        }
    }

    #[test]
    fn half_found_at_rank_one_gives_half_hit_rate_and_mrr() {
        // 10 questions: 5 found at rank 1, 5 not found at all.
        let testset: Vec<TestsetItem> = (0..10)
            .map(|i| item(&format!("q{i}"), &format!("chunk_{i:04}")))
            .collect();
        let ranker = FakeRanker {
            rankings: (0..10)
                .map(|i| {
                    let ids = if i < 5 {
                        vec![format!("chunk_{i:04}")]
                    } else {
                        vec!["chunk_9999".to_string()]
                    };
                    (format!("q{i}"), ids)
                })
                .collect(),
        };

        let report = evaluate(
            &ranker,
            &testset,
            &DEFAULT_K_VALUES,
            &RetrievalConfig::default(),
        )
        .unwrap();

        assert_eq!(report.metrics.total_questions, 10);
        assert!((report.metrics.hit_rate[&1] - 0.5).abs() < 1e-9);
        assert!((report.metrics.mrr - 0.5).abs() < 1e-9);
        assert_eq!(report.metrics.failures, 5);
    }

    #[test]
    fn rank_is_one_based_and_zero_for_miss() {
        let ranker = FakeRanker::new(&[
            ("first", &["chunk_0002", "chunk_0001"]),
            ("second", &["chunk_0009"]),
        ]);
        let testset = vec![item("first", "chunk_0001"), item("second", "chunk_0001")];
        let report = evaluate(&ranker, &testset, &[5], &RetrievalConfig::default()).unwrap();

        assert_eq!(report.details[0].rank, 2);
        assert!(report.details[0].found);
        assert_eq!(report.details[1].rank, 0);
        assert!(!report.details[1].found);
    }

    #[test]
    fn low_rank_counts_ranks_beyond_five() {
        let deep: Vec<&str> = vec![
            "a", "b", "c", "d", "e", "chunk_0001",
        ];
        let ranker = FakeRanker::new(&[("q", &deep)]);
        let testset = vec![item("q", "chunk_0001")];
        let report = evaluate(&ranker, &testset, &[10], &RetrievalConfig::default()).unwrap();

        assert_eq!(report.details[0].rank, 6);
        assert_eq!(report.metrics.low_rank_count, 1);
        assert_eq!(report.metrics.failures, 0);
    }

    #[test]
    fn hit_rate_grows_with_k() {
        let ranker = FakeRanker::new(&[("q", &["x", "y", "chunk_0001"])]);
        let testset = vec![item("q", "chunk_0001")];
        let report =
            evaluate(&ranker, &testset, &DEFAULT_K_VALUES, &RetrievalConfig::default()).unwrap();

        assert_eq!(report.metrics.hit_rate[&1], 0.0);
        assert_eq!(report.metrics.hit_rate[&3], 1.0);
        assert_eq!(report.metrics.hit_rate[&10], 1.0);
    }

    #[test]
    fn empty_testset_yields_zero_metrics() {
        let ranker = FakeRanker::new(&[]);
        let report =
            evaluate(&ranker, &[], &DEFAULT_K_VALUES, &RetrievalConfig::default()).unwrap();
        assert_eq!(report.metrics.total_questions, 0);
        assert_eq!(report.metrics.mrr, 0.0);
        assert_eq!(report.metrics.hit_rate[&1], 0.0);
    }

    #[test]
    fn report_snapshot_carries_the_config() {
        let config = RetrievalConfig {
            hybrid_alpha: 0.25,
            ..RetrievalConfig::default()
        };
        let ranker = FakeRanker::new(&[]);
        let report = evaluate(&ranker, &[], &[1], &config).unwrap();
        assert!((report.config.hybrid_alpha - 0.25).abs() < f32::EPSILON);
        assert_eq!(report.k_values, vec![1]);
    }

    fn report_with(details: Vec<EvalRecord>, k_values: &[usize]) -> EvalReport {
        let metrics = compute_metrics(&details, k_values);
        EvalReport {
            timestamp: Utc::now().to_rfc3339(),
            k_values: k_values.to_vec(),
            config: RetrievalConfig::default(),
            metrics,
            details,
        }
    }

    fn record(question: &str, rank: usize) -> EvalRecord {
        EvalRecord {
            question: question.to_string(),
            expected_chunk_id: "chunk_0001".to_string(),
            rank,
            found: rank > 0,
            retrieved_ids: Vec::new(),
            top_result_score: None,
            heading: None,
        }
    }

    #[test]
    fn deltas_flag_direction_per_metric() {
        let before = report_with(vec![record("a", 0), record("b", 1)], &[1]);
        let after = report_with(vec![record("a", 1), record("b", 1)], &[1]);

        let deltas = metric_deltas(&before, &after);
        assert!(deltas["hit_rate@1"].improved);
        assert!(deltas["mrr"].improved);
        // failures dropped from 1 to 0: improvement even though change < 0.
        assert!(deltas["failures"].improved);
        assert_eq!(deltas["failures"].change, -1.0);
    }

    #[test]
    fn failure_diff_lists_fixed_and_regressed_questions() {
        let before = report_with(vec![record("a", 0), record("b", 1), record("c", 2)], &[3]);
        let after = report_with(vec![record("a", 1), record("b", 0), record("c", 3)], &[3]);

        let diff = failure_diff(&before, &after);
        assert_eq!(diff.fixed, vec!["a".to_string()]);
        assert_eq!(diff.regressed, vec!["b".to_string()]);
    }
}
