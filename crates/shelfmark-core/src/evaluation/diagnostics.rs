//! Failure-mode diagnostics over an evaluation report.
//!
//! Every evaluated question is classified from its rank alone, failures are
//! aggregated by heading, and a fixed-threshold policy turns the rates into
//! actionable recommendations. The thresholds are deliberately constants,
//! not configuration: recommendations should read the same across runs.

use serde::Serialize;

use crate::chunking::Chunk;

use super::evaluator::{EvalRecord, EvalReport, LOW_RANK_THRESHOLD};

/// Recall-failure rate above which hybrid search is recommended.
pub const HIGH_RECALL_FAILURE_RATE: f64 = 0.30;
/// Recall-failure rate above which top-k / overlap tuning is recommended.
pub const MODERATE_RECALL_FAILURE_RATE: f64 = 0.10;
/// Ranking-issue rate above which reranking is recommended.
pub const RANKING_ISSUE_RATE: f64 = 0.20;
/// A heading with at least this many failures is called out by name.
const HEADING_HOTSPOT_MIN: usize = 3;

/// How much chunk text a recall-failure entry carries for eyeballing.
const PREVIEW_CHARS: usize = 200;
/// How many wrongly-retrieved ids a recall-failure entry lists.
const RETRIEVED_SHOWN: usize = 5;

/// Classification of one evaluated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Found at a useful rank.
    Success,
    /// Found, but ranked below [`LOW_RANK_THRESHOLD`].
    RankingIssue,
    /// Not retrieved at all.
    RecallFailure,
}

pub fn classify(rank: usize) -> Outcome {
    if rank == 0 {
        Outcome::RecallFailure
    } else if rank > LOW_RANK_THRESHOLD {
        Outcome::RankingIssue
    } else {
        Outcome::Success
    }
}

/// A question whose expected chunk never came back.
#[derive(Debug, Clone, Serialize)]
pub struct RecallFailure {
    pub question: String,
    pub expected_chunk_id: String,
    pub expected_heading: Option<String>,
    pub expected_text_preview: Option<String>,
    pub retrieved_instead: Vec<String>,
}

/// A question found only deep in the ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankingIssue {
    pub question: String,
    pub expected_chunk_id: String,
    pub actual_rank: usize,
    pub expected_heading: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticSummary {
    pub total_questions: usize,
    pub successes: usize,
    pub recall_failures: usize,
    pub ranking_issues: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub summary: DiagnosticSummary,
    pub recall_failures: Vec<RecallFailure>,
    pub ranking_issues: Vec<RankingIssue>,
    /// `(heading, failure count)`, most failures first.
    pub failures_by_heading: Vec<(String, usize)>,
    pub recommendations: Vec<String>,
}

/// Classifies every record in `report` and derives recommendations.
///
/// `chunks` is the current chunk list, used to show a text preview of each
/// chunk that failed to surface; ids that no longer exist simply get no
/// preview.
pub fn diagnose(report: &EvalReport, chunks: &[Chunk]) -> DiagnosticReport {
    let mut recall_failures = Vec::new();
    let mut ranking_issues = Vec::new();
    let mut successes = 0usize;

    for record in &report.details {
        match classify(record.rank) {
            Outcome::Success => successes += 1,
            Outcome::RankingIssue => ranking_issues.push(RankingIssue {
                question: record.question.clone(),
                expected_chunk_id: record.expected_chunk_id.clone(),
                actual_rank: record.rank,
                expected_heading: record.heading.clone(),
            }),
            Outcome::RecallFailure => recall_failures.push(RecallFailure {
                question: record.question.clone(),
                expected_chunk_id: record.expected_chunk_id.clone(),
                expected_heading: record.heading.clone(),
                expected_text_preview: chunks
                    .iter()
                    .find(|c| c.chunk_id == record.expected_chunk_id)
                    .map(|c| preview(&c.text)),
                retrieved_instead: record
                    .retrieved_ids
                    .iter()
                    .take(RETRIEVED_SHOWN)
                    .cloned()
                    .collect(),
            }),
        }
    }

    let total = report.details.len();
    let summary = DiagnosticSummary {
        total_questions: total,
        successes,
        recall_failures: recall_failures.len(),
        ranking_issues: ranking_issues.len(),
        success_rate: if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64
        },
    };

    let failures_by_heading = aggregate_by_heading(&report.details);
    let recommendations = recommend(&summary, &failures_by_heading);

    DiagnosticReport {
        summary,
        recall_failures,
        ranking_issues,
        failures_by_heading,
        recommendations,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

/// Counts non-successes per heading, most failures first. Ties break on the
/// heading name so the ordering is stable.
fn aggregate_by_heading(details: &[EvalRecord]) -> Vec<(String, usize)> {
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for record in details {
        if classify(record.rank) == Outcome::Success {
            continue;
        }
        let heading = record
            .heading
            .clone()
            .unwrap_or_else(|| "(no heading)".to_string());
        *counts.entry(heading).or_insert(0) += 1;
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

fn recommend(summary: &DiagnosticSummary, by_heading: &[(String, usize)]) -> Vec<String> {
    if summary.total_questions == 0 {
        return vec!["No evaluation data to diagnose.".to_string()];
    }
    let total = summary.total_questions as f64;
    let recall_rate = summary.recall_failures as f64 / total;
    let ranking_rate = summary.ranking_issues as f64 / total;

    let mut recommendations = Vec::new();
    if recall_rate > HIGH_RECALL_FAILURE_RATE {
        recommendations.push(format!(
            "HIGH RECALL FAILURE ({:.0}%): many expected chunks are never retrieved. \
             Enable hybrid search so keyword matches can recover them.",
            recall_rate * 100.0
        ));
    } else if recall_rate > MODERATE_RECALL_FAILURE_RATE {
        recommendations.push(format!(
            "MODERATE RECALL FAILURE ({:.0}%): some expected chunks are never retrieved. \
             Try a larger top-k or more chunk overlap.",
            recall_rate * 100.0
        ));
    }
    if ranking_rate > RANKING_ISSUE_RATE {
        recommendations.push(format!(
            "RANKING ISSUES ({:.0}%): expected chunks are retrieved but ranked low. \
             Consider a reranking stage for better precision.",
            ranking_rate * 100.0
        ));
    }
    if let Some((heading, count)) = by_heading.first() {
        if *count >= HEADING_HOTSPOT_MIN {
            recommendations.push(format!(
                "Failures concentrate under \"{heading}\" ({count} questions); \
                 inspect how that section was chunked."
            ));
        }
    }
    if recommendations.is_empty() {
        recommendations.push("Retrieval quality looks healthy at current thresholds.".to_string());
    }
    recommendations
}

/// Renders a report for terminal output.
pub fn format_report(report: &DiagnosticReport) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let s = &report.summary;
    let _ = writeln!(out, "=== Retrieval Diagnostics ===");
    let _ = writeln!(
        out,
        "{} questions: {} ok, {} recall failures, {} ranking issues ({:.1}% success)",
        s.total_questions,
        s.successes,
        s.recall_failures,
        s.ranking_issues,
        s.success_rate * 100.0
    );

    if !report.recall_failures.is_empty() {
        let _ = writeln!(out, "\nRecall failures:");
        for f in &report.recall_failures {
            let heading = f.expected_heading.as_deref().unwrap_or("(no heading)");
            let _ = writeln!(
                out,
                "  - {} [expected {} under {}]",
                f.question, f.expected_chunk_id, heading
            );
            if !f.retrieved_instead.is_empty() {
                let _ = writeln!(out, "    got: {}", f.retrieved_instead.join(", "));
            }
        }
    }

    if !report.ranking_issues.is_empty() {
        let _ = writeln!(out, "\nRanking issues:");
        for issue in &report.ranking_issues {
            let _ = writeln!(
                out,
                "  - {} [expected {} at rank {}]",
                issue.question, issue.expected_chunk_id, issue.actual_rank
            );
        }
    }

    if !report.failures_by_heading.is_empty() {
        let _ = writeln!(out, "\nFailures by heading:");
        for (heading, count) in &report.failures_by_heading {
            let _ = writeln!(out, "  {count:>3}  {heading}");
        }
    }

    let _ = writeln!(out, "\nRecommendations:");
    for rec in &report.recommendations {
        let _ = writeln!(out, "  * {rec}");
    }
    out
}
