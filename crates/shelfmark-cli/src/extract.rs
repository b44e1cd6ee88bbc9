//! Document extraction.
//!
//! Plain text and markdown are read directly as a single unpaginated page.
//! Anything else (PDFs and similar) must be extracted externally into a
//! `*.pages.json` file: an array of `{"page_number": N, "text": "..."}`
//! records, one per page.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use shelfmark_core::chunking::{DocumentPage, SourceDocument};

#[derive(Deserialize)]
struct PageRecord {
    page_number: Option<u32>,
    text: String,
}

pub fn extract(path: &Path) -> Result<SourceDocument> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    if name.ends_with(".pages.json") {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let records: Vec<PageRecord> = serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not a valid pages file", path.display()))?;
        return Ok(SourceDocument {
            pages: records
                .into_iter()
                .map(|r| DocumentPage {
                    text: r.text,
                    page_number: r.page_number,
                })
                .collect(),
            source_file: Some(name),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "md" | "markdown" => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(SourceDocument::from_text(text, Some(name)))
        }
        other => bail!(
            "unsupported document format \"{other}\": extract it to a *.pages.json file first"
        ),
    }
}
