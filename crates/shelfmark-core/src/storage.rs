//! Artifact persistence.
//!
//! Everything the engine needs at query time lives under one data directory:
//!
//! | file | contents |
//! |---|---|
//! | `chunks.json` | ordered chunk list (the canonical ordering) |
//! | `embeddings.bin` | raw little-endian `f32`, row-major |
//! | `metadata.json` | chunk records minus text, same order |
//! | `bm25_corpus.json` | tokenized corpus + position-aligned chunk ids |
//! | `eval_results/` | timestamped testsets and evaluation reports |
//!
//! Loads fail fast with an [`ArtifactError`] naming the offending path;
//! nothing is ever silently regenerated.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chunking::{Chunk, ChunkMetadata};
use crate::error::ArtifactError;
use crate::evaluation::evaluator::EvalReport;
use crate::evaluation::testset::Testset;

const CHUNKS_FILE: &str = "chunks.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin";
const METADATA_FILE: &str = "metadata.json";
const KEYWORD_CORPUS_FILE: &str = "bm25_corpus.json";
const EVAL_RESULTS_DIR: &str = "eval_results";

/// Locations of every artifact under a data directory.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    data_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn chunks_file(&self) -> PathBuf {
        self.data_dir.join(CHUNKS_FILE)
    }

    pub fn embeddings_file(&self) -> PathBuf {
        self.data_dir.join(EMBEDDINGS_FILE)
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    pub fn keyword_corpus_file(&self) -> PathBuf {
        self.data_dir.join(KEYWORD_CORPUS_FILE)
    }

    pub fn eval_results_dir(&self) -> PathBuf {
        self.data_dir.join(EVAL_RESULTS_DIR)
    }
}

/// Tokenized keyword corpus as persisted. Statistics are recomputed on load;
/// only token lists and their chunk ids are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCorpus {
    pub corpus_tokens: Vec<Vec<String>>,
    pub chunk_ids: Vec<String>,
}

/// A chunk record without its text, for quick inspection of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub chunk_id: String,
    pub token_estimate: usize,
    pub metadata: ChunkMetadata,
}

pub fn save_chunks(paths: &ArtifactPaths, chunks: &[Chunk]) -> Result<(), ArtifactError> {
    write_json(&paths.chunks_file(), &chunks)
}

pub fn load_chunks(paths: &ArtifactPaths) -> Result<Vec<Chunk>, ArtifactError> {
    read_json(&paths.chunks_file())
}

pub fn save_metadata(paths: &ArtifactPaths, chunks: &[Chunk]) -> Result<(), ArtifactError> {
    let summaries: Vec<ChunkSummary> = chunks
        .iter()
        .map(|c| ChunkSummary {
            chunk_id: c.chunk_id.clone(),
            token_estimate: c.token_estimate,
            metadata: c.metadata.clone(),
        })
        .collect();
    write_json(&paths.metadata_file(), &summaries)
}

pub fn load_metadata(paths: &ArtifactPaths) -> Result<Vec<ChunkSummary>, ArtifactError> {
    read_json(&paths.metadata_file())
}

/// Writes the embedding matrix as raw little-endian `f32`, row-major.
pub fn save_embeddings(
    paths: &ArtifactPaths,
    embeddings: &[Vec<f32>],
) -> Result<(), ArtifactError> {
    let path = paths.embeddings_file();
    let floats: usize = embeddings.iter().map(Vec::len).sum();
    let mut bytes = Vec::with_capacity(floats * 4);
    for row in embeddings {
        for value in row {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    ensure_parent(&path)?;
    fs::write(&path, bytes).map_err(|source| ArtifactError::Io { path, source })
}

/// Reads the embedding matrix back, validating byte alignment, the expected
/// dimension and the expected row count against the chunk list.
pub fn load_embeddings(
    paths: &ArtifactPaths,
    dimension: usize,
    expected_rows: usize,
) -> Result<Vec<Vec<f32>>, ArtifactError> {
    let path = paths.embeddings_file();
    let bytes = read_bytes(&path)?;

    if bytes.len() % 4 != 0 {
        return Err(ArtifactError::Malformed {
            path,
            detail: format!("{} bytes is not a whole number of f32 values", bytes.len()),
        });
    }
    let total = bytes.len() / 4;
    if dimension == 0 {
        if total == 0 && expected_rows == 0 {
            return Ok(Vec::new());
        }
        return Err(ArtifactError::Malformed {
            path,
            detail: "embedding dimension is zero but the file is not empty".to_string(),
        });
    }
    if total % dimension != 0 {
        return Err(ArtifactError::Malformed {
            path,
            detail: format!("{total} f32 values is not divisible by dimension {dimension}"),
        });
    }
    let rows = total / dimension;
    if rows != expected_rows {
        return Err(ArtifactError::Malformed {
            path,
            detail: format!("{rows} embedding rows for {expected_rows} chunks"),
        });
    }

    let mut embeddings = Vec::with_capacity(rows);
    for row_bytes in bytes.chunks_exact(dimension * 4) {
        let row: Vec<f32> = row_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        embeddings.push(row);
    }
    Ok(embeddings)
}

pub fn save_keyword_corpus(
    paths: &ArtifactPaths,
    corpus: &KeywordCorpus,
) -> Result<(), ArtifactError> {
    write_json(&paths.keyword_corpus_file(), corpus)
}

pub fn load_keyword_corpus(paths: &ArtifactPaths) -> Result<KeywordCorpus, ArtifactError> {
    let path = paths.keyword_corpus_file();
    let corpus: KeywordCorpus = read_json(&path)?;
    if corpus.corpus_tokens.len() != corpus.chunk_ids.len() {
        return Err(ArtifactError::Malformed {
            path,
            detail: format!(
                "{} token lists for {} chunk ids",
                corpus.corpus_tokens.len(),
                corpus.chunk_ids.len()
            ),
        });
    }
    Ok(corpus)
}

/// Saves a testset under `eval_results/` with a timestamped name and returns
/// the path.
pub fn save_testset(paths: &ArtifactPaths, testset: &Testset) -> Result<PathBuf, ArtifactError> {
    let path = paths
        .eval_results_dir()
        .join(format!("testset_{}_{}.json", testset.label, timestamp()));
    write_json(&path, testset)?;
    info!(path = %path.display(), questions = testset.questions.len(), "saved testset");
    Ok(path)
}

pub fn load_testset(path: &Path) -> Result<Testset, ArtifactError> {
    read_json(path)
}

/// Saves an evaluation report under `eval_results/` and returns the path.
pub fn save_eval_report(
    paths: &ArtifactPaths,
    report: &EvalReport,
    label: Option<&str>,
) -> Result<PathBuf, ArtifactError> {
    let name = match label {
        Some(label) => format!("eval_{label}_{}.json", timestamp()),
        None => format!("eval_{}.json", timestamp()),
    };
    let path = paths.eval_results_dir().join(name);
    write_json(&path, report)?;
    info!(path = %path.display(), "saved evaluation report");
    Ok(path)
}

pub fn load_eval_report(path: &Path) -> Result<EvalReport, ArtifactError> {
    read_json(path)
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn ensure_parent(path: &Path) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(ArtifactError::Missing(path.to_path_buf()))
        }
        Err(source) => Err(ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Malformed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    ensure_parent(path)?;
    let json = serde_json::to_vec_pretty(value).map_err(|e| ArtifactError::Malformed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    fs::write(path, json).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}
