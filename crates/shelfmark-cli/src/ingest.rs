//! The ingest pipeline: extract -> chunk -> keyword corpus -> embeddings.

use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::Args;

use shelfmark_core::chunking::chunk_document;
use shelfmark_core::embedding::embed_chunks;
use shelfmark_core::index::tokenize;
use shelfmark_core::storage::{self, ArtifactPaths, KeywordCorpus};
use shelfmark_core::RetrievalConfig;

use crate::config::require_api_key;
use crate::extract;
use crate::provider::OpenAiEmbedder;

#[derive(Args)]
pub struct IngestArgs {
    /// Document to ingest (.txt, .md, or a pre-extracted *.pages.json)
    #[arg(long)]
    pub document: PathBuf,

    /// Directory the index artifacts are written to
    #[arg(long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Chunk and build the keyword corpus, but skip the embedding calls
    #[arg(long)]
    pub skip_embeddings: bool,

    /// API key (falls back to the settings file, then OPENAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Settings file containing {"api_key": "..."}
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

pub fn run(args: IngestArgs) -> Result<()> {
    let config = RetrievalConfig::default();
    let paths = ArtifactPaths::new(&args.output_dir);

    println!("[1/4] Extracting {}", args.document.display());
    let document = extract::extract(&args.document)?;

    println!("[2/4] Chunking");
    let chunks = chunk_document(&document, &config);
    ensure!(!chunks.is_empty(), "document produced no chunks");
    storage::save_chunks(&paths, &chunks)?;
    storage::save_metadata(&paths, &chunks)?;
    println!("      {} chunks", chunks.len());

    println!("[3/4] Building keyword corpus");
    let corpus = KeywordCorpus {
        corpus_tokens: chunks.iter().map(|c| tokenize(&c.text)).collect(),
        chunk_ids: chunks.iter().map(|c| c.chunk_id.clone()).collect(),
    };
    storage::save_keyword_corpus(&paths, &corpus)?;

    if args.skip_embeddings {
        println!("[4/4] Skipped embeddings (--skip-embeddings)");
        return Ok(());
    }

    println!("[4/4] Embedding {} chunks", chunks.len());
    let api_key = require_api_key(args.api_key.as_deref(), args.settings.as_deref())?;
    let provider = OpenAiEmbedder::new(api_key);
    let embeddings = embed_chunks(&provider, &chunks, &config)?;
    storage::save_embeddings(&paths, &embeddings)?;

    println!("Done. Artifacts in {}", args.output_dir.display());
    Ok(())
}
