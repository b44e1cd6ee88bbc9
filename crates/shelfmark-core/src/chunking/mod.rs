//! Document chunking.
//!
//! A document is split into sections by a cascade of boundary detectors, then
//! oversized sections are cut down to the token budget:
//!
//! 1. **Markdown headings** (`#` through `######` followed by a space).
//! 2. **Structural headings** for plain text: an all-uppercase line, or a
//!    title-cased line right after a blank line, within a length window.
//! 3. **Paragraph fallback**: blank-line-separated paragraphs grouped until
//!    the token budget is reached.
//!
//! The first detector that finds at least two headings wins; the paragraph
//! fallback always succeeds. Text ahead of the first detected heading becomes
//! a leading section without a heading.

mod split;
mod types;

use tracing::{debug, info};

use crate::config::RetrievalConfig;
use split::split_large_section;

pub use types::{Chunk, ChunkMetadata, DocumentPage, SourceDocument};

/// One physical line with the page it came from.
#[derive(Debug, Clone)]
struct Line {
    text: String,
    page: Option<u32>,
}

/// A detected section before budget enforcement.
#[derive(Debug, Clone)]
struct Section {
    heading: Option<String>,
    heading_level: Option<u8>,
    body: String,
    page_range: Option<(u32, u32)>,
}

/// Splits a document into chunks.
///
/// Chunk ids are `chunk_NNNN`, 1-based, in document order. Sections over the
/// token budget are split paragraph-first with sentence overlap, and their
/// sub-chunks get a `" (part N)"` heading suffix.
pub fn chunk_document(document: &SourceDocument, config: &RetrievalConfig) -> Vec<Chunk> {
    let lines = collect_lines(document);

    let (sections, strategy) = if let Some(sections) = detect_markdown_sections(&lines) {
        (sections, "markdown")
    } else if let Some(sections) = detect_structural_sections(&lines) {
        (sections, "structural")
    } else {
        (fallback_sections(&lines, config), "paragraph")
    };
    debug!(strategy, sections = sections.len(), "detected sections");

    let mut pending: Vec<(String, Option<String>, Option<u8>, Option<(u32, u32)>)> = Vec::new();
    for section in sections {
        let tokens = config.estimate_tokens(&section.body);
        if tokens <= config.chunk_max_tokens {
            pending.push((
                section.body,
                section.heading,
                section.heading_level,
                section.page_range,
            ));
            continue;
        }
        let pieces = split_large_section(&section.body, config);
        let multi = pieces.len() > 1;
        for (i, piece) in pieces.into_iter().enumerate() {
            let heading = if multi {
                section
                    .heading
                    .as_ref()
                    .map(|h| format!("{h} (part {})", i + 1))
            } else {
                section.heading.clone()
            };
            pending.push((piece, heading, section.heading_level, section.page_range));
        }
    }

    let built: Vec<Chunk> = pending
        .into_iter()
        .enumerate()
        .map(|(i, (text, heading, heading_level, page_range))| {
            let token_estimate = config.estimate_tokens(&text);
            Chunk {
                chunk_id: format!("chunk_{:04}", i + 1),
                token_estimate,
                metadata: ChunkMetadata {
                    heading,
                    heading_level,
                    page_range,
                    source_file: document.source_file.clone(),
                },
                text,
            }
        })
        .collect();

    info!(strategy, chunks = built.len(), "chunked document");
    built
}

fn collect_lines(document: &SourceDocument) -> Vec<Line> {
    let mut lines = Vec::new();
    for (i, page) in document.pages.iter().enumerate() {
        if i > 0 {
            // Page boundaries double as paragraph boundaries.
            lines.push(Line {
                text: String::new(),
                page: None,
            });
        }
        for text in page.text.lines() {
            lines.push(Line {
                text: text.to_string(),
                page: page.page_number,
            });
        }
    }
    lines
}

/// `# Title` through `###### Title`. Returns `(level, title)`.
fn parse_markdown_heading(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let title = trimmed[hashes..].strip_prefix(' ')?.trim();
    if title.is_empty() {
        return None;
    }
    Some((hashes as u8, title.to_string()))
}

fn detect_markdown_sections(lines: &[Line]) -> Option<Vec<Section>> {
    let mut sections = Vec::new();
    let mut heading: Option<(u8, String, Option<u32>)> = None;
    let mut body: Vec<Line> = Vec::new();
    let mut headings_found = 0usize;

    for line in lines {
        if let Some((level, title)) = parse_markdown_heading(&line.text) {
            headings_found += 1;
            close_section(&mut sections, heading.take(), &body);
            body.clear();
            heading = Some((level, title, line.page));
        } else {
            body.push(line.clone());
        }
    }
    close_section(&mut sections, heading.take(), &body);

    if headings_found >= 2 {
        Some(sections)
    } else {
        None
    }
}

/// Heuristic heading test for plain text.
///
/// All-uppercase lines always qualify; title-cased lines only qualify right
/// after a blank line. Both are bounded to 6..=79 characters so stray short
/// tokens and full sentences rarely match.
fn is_structural_heading(text: &str, after_blank: bool) -> bool {
    let t = text.trim();
    let len = t.chars().count();
    if !(6..=79).contains(&len) {
        return false;
    }
    if !t.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    if !t.chars().any(|c| c.is_lowercase()) {
        return true;
    }
    after_blank && is_title_cased(t)
}

/// Every word opens with something other than a lowercase letter.
fn is_title_cased(text: &str) -> bool {
    text.split_whitespace()
        .all(|w| !w.chars().next().is_some_and(|c| c.is_lowercase()))
}

fn detect_structural_sections(lines: &[Line]) -> Option<Vec<Section>> {
    let mut sections = Vec::new();
    let mut heading: Option<(u8, String, Option<u32>)> = None;
    let mut body: Vec<Line> = Vec::new();
    let mut headings_found = 0usize;
    let mut after_blank = true;

    for line in lines {
        let trimmed = line.text.trim();
        if is_structural_heading(&line.text, after_blank) {
            headings_found += 1;
            close_structural(&mut sections, heading.take(), &body);
            body.clear();
            heading = Some((0, trimmed.to_string(), line.page));
        } else {
            body.push(line.clone());
        }
        after_blank = trimmed.is_empty();
    }
    close_structural(&mut sections, heading.take(), &body);

    if headings_found >= 2 {
        Some(sections)
    } else {
        None
    }
}

fn close_section(sections: &mut Vec<Section>, heading: Option<(u8, String, Option<u32>)>, body: &[Line]) {
    let (level, title, heading_page) = match heading {
        Some((level, title, page)) => (Some(level), Some(title), page),
        None => (None, None, None),
    };
    if let Some(section) = section_from_lines(title, level, heading_page, body) {
        sections.push(section);
    }
}

/// Structural headings carry no level.
fn close_structural(
    sections: &mut Vec<Section>,
    heading: Option<(u8, String, Option<u32>)>,
    body: &[Line],
) {
    let (title, heading_page) = match heading {
        Some((_, title, page)) => (Some(title), page),
        None => (None, None),
    };
    if let Some(section) = section_from_lines(title, None, heading_page, body) {
        sections.push(section);
    }
}

/// Trims blank edges and assembles a section; drops sections whose body is
/// entirely blank (a heading with no content under it has nothing to index).
fn section_from_lines(
    heading: Option<String>,
    heading_level: Option<u8>,
    heading_page: Option<u32>,
    lines: &[Line],
) -> Option<Section> {
    let start = lines.iter().position(|l| !l.text.trim().is_empty())?;
    let end = lines.iter().rposition(|l| !l.text.trim().is_empty())?;
    let trimmed = &lines[start..=end];

    let body = trimmed
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let pages = heading_page
        .into_iter()
        .chain(trimmed.iter().filter_map(|l| l.page));
    let page_range = pages.fold(None, |acc: Option<(u32, u32)>, p| match acc {
        None => Some((p, p)),
        Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
    });

    Some(Section {
        heading,
        heading_level,
        body,
        page_range,
    })
}

/// Groups paragraphs until the token budget is reached. Always succeeds;
/// a document with no detectable headings becomes heading-less chunks.
fn fallback_sections(lines: &[Line], config: &RetrievalConfig) -> Vec<Section> {
    // Paragraphs are blank-line separated runs of lines.
    let mut paragraphs: Vec<Vec<Line>> = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    for line in lines {
        if line.text.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.clone());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let mut sections = Vec::new();
    let mut group: Vec<Line> = Vec::new();
    let mut group_tokens = 0usize;
    for paragraph in paragraphs {
        let text: String = paragraph
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let tokens = config.estimate_tokens(&text);
        if group_tokens + tokens > config.chunk_max_tokens && !group.is_empty() {
            close_section(&mut sections, None, &group);
            group.clear();
            group_tokens = 0;
        }
        if !group.is_empty() {
            group.push(Line {
                text: String::new(),
                page: None,
            });
        }
        group.extend(paragraph);
        group_tokens += tokens;
    }
    close_section(&mut sections, None, &group);
    sections
}
