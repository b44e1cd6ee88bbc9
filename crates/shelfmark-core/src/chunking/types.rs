use serde::{Deserialize, Serialize};

/// One page of extracted document text.
///
/// Plain-text sources are a single page with no page number; paginated
/// sources (externally extracted PDFs and the like) carry one entry per page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub text: String,
    pub page_number: Option<u32>,
}

/// A document handed to the chunker: ordered pages plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub pages: Vec<DocumentPage>,
    pub source_file: Option<String>,
}

impl SourceDocument {
    /// Wraps a single unpaginated text as a document.
    pub fn from_text(text: impl Into<String>, source_file: Option<String>) -> Self {
        Self {
            pages: vec![DocumentPage {
                text: text.into(),
                page_number: None,
            }],
            source_file,
        }
    }
}

/// Provenance attached to a chunk. Every field is optional; plain-text
/// documents with no detected headings produce all-`None` metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    /// Inclusive page span `(first, last)` when the source is paginated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

/// An indexable unit of text.
///
/// `chunk_id` is `chunk_NNNN` (1-based, zero-padded) in document order. Ids
/// are only stable within one ingestion run; the canonical ordering is the
/// position in the persisted chunk list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub token_estimate: usize,
    pub metadata: ChunkMetadata,
}
