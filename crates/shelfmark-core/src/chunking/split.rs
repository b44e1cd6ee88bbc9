//! Oversized-section splitting.
//!
//! Sections that blow the token budget are split paragraph-first, falling
//! back to sentences when a single paragraph is itself over budget. A fixed
//! number of trailing sentences from each closed chunk is carried into the
//! next one so that context survives the cut.

use crate::config::RetrievalConfig;

/// Splits `text` into pieces that each fit the token budget.
///
/// Paragraph-built pieces are joined with blank lines and seed the next piece
/// with their last `overlap_sentences` sentences joined into a single run.
/// Sentence-built pieces (from an over-budget paragraph) are joined with
/// newlines and carry the last `overlap_sentences` list entries verbatim.
/// Always returns at least one piece.
pub(crate) fn split_large_section(text: &str, config: &RetrievalConfig) -> Vec<String> {
    let max_tokens = config.chunk_max_tokens;
    let overlap = config.chunk_overlap_sentences;

    let paragraphs = split_into_paragraphs(text, config);

    let mut pieces: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for paragraph in paragraphs {
        let paragraph_tokens = config.estimate_tokens(&paragraph);

        if paragraph_tokens > max_tokens {
            // The paragraph alone is over budget; stream its sentences.
            for sentence in split_sentences(&paragraph) {
                let sentence_tokens = config.estimate_tokens(&sentence);
                if current_tokens + sentence_tokens > max_tokens && !current.is_empty() {
                    pieces.push(current.join("\n"));
                    if overlap > 0 {
                        let start = current.len().saturating_sub(overlap);
                        current = current.split_off(start);
                        current_tokens =
                            current.iter().map(|s| config.estimate_tokens(s)).sum();
                    } else {
                        current.clear();
                        current_tokens = 0;
                    }
                }
                current_tokens += sentence_tokens;
                current.push(sentence);
            }
            continue;
        }

        if current_tokens + paragraph_tokens > max_tokens && !current.is_empty() {
            let piece = current.join("\n\n");
            if overlap > 0 {
                let sentences = split_sentences(&piece);
                let start = sentences.len().saturating_sub(overlap);
                let carried = sentences[start..].join(" ");
                current_tokens = config.estimate_tokens(&carried);
                current = vec![carried];
            } else {
                current.clear();
                current_tokens = 0;
            }
            pieces.push(piece);
        }
        current_tokens += paragraph_tokens;
        current.push(paragraph);
    }

    if !current.is_empty() {
        pieces.push(current.join("\n\n"));
    }

    if pieces.is_empty() {
        vec![text.to_string()]
    } else {
        pieces
    }
}

/// Breaks a section body into paragraphs.
///
/// Blank-line-separated blocks first; if the text has no blank lines at all
/// and is over budget, sentences stand in for paragraphs so the splitter
/// still has units to work with.
fn split_into_paragraphs(text: &str, config: &RetrievalConfig) -> Vec<String> {
    let blocks: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if blocks.len() > 1 {
        return blocks;
    }

    // Single block: regroup line-by-line in case blank lines were uneven.
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(stripped);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    if paragraphs.len() <= 1 && config.estimate_tokens(text) > config.chunk_max_tokens {
        return split_sentences(text.trim());
    }
    if paragraphs.is_empty() {
        vec![text.to_string()]
    } else {
        paragraphs
    }
}

/// Splits on whitespace runs that follow `.`, `!` or `?`. The terminator
/// stays with its sentence; the whitespace is consumed.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}
