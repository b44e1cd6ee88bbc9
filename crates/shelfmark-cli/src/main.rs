//! Command-line interface for the shelfmark retrieval engine.

mod config;
mod eval_cmd;
mod extract;
mod ingest;
mod output;
mod provider;
mod search_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shelfmark", version, about = "Hybrid retrieval over your documents")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index a document
    Ingest(ingest::IngestArgs),
    /// Search an ingested index
    Search(search_cmd::SearchArgs),
    /// Evaluate retrieval quality against a testset
    Eval(eval_cmd::EvalArgs),
    /// Compare evaluation reports
    Compare(eval_cmd::CompareArgs),
    /// Diagnose failure modes in an evaluation report
    Diagnose(eval_cmd::DiagnoseArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest(args) => ingest::run(args),
        Commands::Search(args) => search_cmd::run(args),
        Commands::Eval(args) => eval_cmd::run_eval(args),
        Commands::Compare(args) => eval_cmd::run_compare(args),
        Commands::Diagnose(args) => eval_cmd::run_diagnose(args),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
