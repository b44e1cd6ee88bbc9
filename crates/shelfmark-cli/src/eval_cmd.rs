//! Evaluation commands: run, compare and diagnose.

use std::fs;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Args;

use shelfmark_core::evaluation::evaluator::{
    evaluate, failure_diff, metric_deltas, EvalReport, DEFAULT_K_VALUES,
};
use shelfmark_core::evaluation::{diagnose, format_report, remap_ground_truth};
use shelfmark_core::storage::{self, ArtifactPaths};
use shelfmark_core::{RetrievalConfig, Retriever};

use crate::config::require_api_key;
use crate::provider::OpenAiEmbedder;

#[derive(Args)]
pub struct EvalArgs {
    /// Testset file produced alongside an earlier index
    #[arg(long)]
    pub testset: PathBuf,

    /// Directory holding the index artifacts
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Evaluate stale ground-truth labels as-is instead of remapping them
    #[arg(long)]
    pub no_remap: bool,

    /// Label baked into the saved report filename
    #[arg(long)]
    pub label: Option<String>,

    /// Write the report here instead of eval_results/
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// API key (falls back to the settings file, then OPENAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Settings file containing {"api_key": "..."}
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

pub fn run_eval(args: EvalArgs) -> Result<()> {
    let paths = ArtifactPaths::new(&args.data_dir);
    let api_key = require_api_key(args.api_key.as_deref(), args.settings.as_deref())?;
    let retriever = Retriever::load(
        &paths,
        RetrievalConfig::default(),
        OpenAiEmbedder::new(api_key),
    )?;

    let testset = storage::load_testset(&args.testset)?;
    println!(
        "Evaluating {} questions from \"{}\"",
        testset.questions.len(),
        testset.label
    );

    let questions = if args.no_remap {
        testset.questions
    } else {
        let (questions, remapped) = remap_ground_truth(testset.questions, retriever.chunks());
        if remapped > 0 {
            println!("Remapped {remapped} stale ground-truth labels");
        }
        questions
    };

    let report = evaluate(&retriever, &questions, &DEFAULT_K_VALUES, retriever.config())?;
    print_summary(&report);

    let saved = match &args.output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&report)?;
            fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            path.clone()
        }
        None => storage::save_eval_report(&paths, &report, args.label.as_deref())?,
    };
    println!("Report saved to {}", saved.display());
    Ok(())
}

fn print_summary(report: &EvalReport) {
    println!();
    for (k, rate) in &report.metrics.hit_rate {
        println!("  hit_rate@{k:<2} {:>6.1}%", rate * 100.0);
    }
    println!("  mrr         {:>6.3}", report.metrics.mrr);
    println!(
        "  failures    {:>6} / {}",
        report.metrics.failures, report.metrics.total_questions
    );
    println!("  low ranks   {:>6}", report.metrics.low_rank_count);
    println!();
}

#[derive(Args)]
pub struct CompareArgs {
    /// Evaluation reports, oldest first; the first and last are compared
    #[arg(required = true, num_args = 2..)]
    pub reports: Vec<PathBuf>,
}

pub fn run_compare(args: CompareArgs) -> Result<()> {
    ensure!(args.reports.len() >= 2, "need at least two reports");
    let before = storage::load_eval_report(&args.reports[0])?;
    let after = storage::load_eval_report(&args.reports[args.reports.len() - 1])?;

    println!(
        "{:<16} {:>9} {:>9} {:>9}",
        "metric", "before", "after", "change"
    );
    for (name, delta) in metric_deltas(&before, &after) {
        let marker = if delta.change == 0.0 {
            ' '
        } else if delta.improved {
            '+'
        } else {
            '!'
        };
        println!(
            "{:<16} {:>9.3} {:>9.3} {:>+9.3} {marker}",
            name, delta.before, delta.after, delta.change
        );
    }

    let diff = failure_diff(&before, &after);
    if !diff.fixed.is_empty() {
        println!("\nFixed ({}):", diff.fixed.len());
        for question in &diff.fixed {
            println!("  + {question}");
        }
    }
    if !diff.regressed.is_empty() {
        println!("\nRegressed ({}):", diff.regressed.len());
        for question in &diff.regressed {
            println!("  ! {question}");
        }
    }
    Ok(())
}

#[derive(Args)]
pub struct DiagnoseArgs {
    /// Evaluation report to analyze
    #[arg(long)]
    pub eval: PathBuf,

    /// Directory holding the index artifacts (for chunk text previews)
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
}

pub fn run_diagnose(args: DiagnoseArgs) -> Result<()> {
    let report = storage::load_eval_report(&args.eval)?;
    let chunks = storage::load_chunks(&ArtifactPaths::new(&args.data_dir))?;
    let diagnostic = diagnose(&report, &chunks);
    print!("{}", format_report(&diagnostic));
    Ok(())
}
