//! The search command: multi-query hybrid search over an ingested index.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use shelfmark_core::search::multi_search;
use shelfmark_core::storage::ArtifactPaths;
use shelfmark_core::{RetrievalConfig, Retriever};

use crate::config::require_api_key;
use crate::output;
use crate::provider::OpenAiEmbedder;

#[derive(Args)]
pub struct SearchArgs {
    /// Query; repeat the flag to search several phrasings at once
    #[arg(long = "query", required = true)]
    pub queries: Vec<String>,

    /// Directory holding the index artifacts
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Results to return after merging
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    /// Guaranteed result slots per sub-query before score-ordered backfill
    #[arg(long, default_value_t = 2)]
    pub per_query_min: usize,

    /// Print results as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// API key (falls back to the settings file, then OPENAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Settings file containing {"api_key": "..."}
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

pub fn run(args: SearchArgs) -> Result<()> {
    let config = RetrievalConfig {
        top_k: args.top_k,
        ..RetrievalConfig::default()
    };
    let api_key = require_api_key(args.api_key.as_deref(), args.settings.as_deref())?;
    let retriever = Retriever::load(
        &ArtifactPaths::new(&args.data_dir),
        config,
        OpenAiEmbedder::new(api_key),
    )?;

    let results = multi_search(&retriever, &args.queries, args.per_query_min, args.top_k)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("No results.");
    } else {
        print!("{}", output::format_results(&results));
    }
    Ok(())
}
