//! Terminal formatting for search results.

use shelfmark_core::SearchResult;

const PREVIEW_CHARS: usize = 200;

pub fn format_results(results: &[SearchResult]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        let _ = write!(out, "{}. {}  score {:.3}", i + 1, result.chunk_id, result.score);
        match (result.vector_score, result.keyword_score) {
            (Some(v), Some(k)) => {
                let _ = write!(out, "  (vec {v:.3} / kw {k:.3})");
            }
            (Some(v), None) => {
                let _ = write!(out, "  (vec {v:.3})");
            }
            (None, Some(k)) => {
                let _ = write!(out, "  (kw {k:.3})");
            }
            (None, None) => {}
        }
        let _ = writeln!(out);

        let mut context: Vec<String> = Vec::new();
        if let Some(heading) = &result.metadata.heading {
            context.push(heading.clone());
        }
        if let Some((first, last)) = result.metadata.page_range {
            if first == last {
                context.push(format!("page {first}"));
            } else {
                context.push(format!("pages {first}-{last}"));
            }
        }
        if let Some(query) = &result.matched_query {
            context.push(format!("matched \"{query}\""));
        }
        if !context.is_empty() {
            let _ = writeln!(out, "   {}", context.join(" | "));
        }
        let _ = writeln!(out, "   {}", preview(&result.text));
        let _ = writeln!(out);
    }
    out
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::chunking::ChunkMetadata;

    #[test]
    fn formatted_results_show_scores_and_context() {
        let results = vec![SearchResult {
            chunk_id: "chunk_0002".to_string(),
            text: "Yeast converts sugars into ethanol.".to_string(),
            score: 0.91,
            vector_score: Some(0.88),
            keyword_score: Some(4.2),
            matched_query: Some("yeast".to_string()),
            metadata: ChunkMetadata {
                heading: Some("Fermentation".to_string()),
                heading_level: Some(1),
                page_range: Some((12, 13)),
                source_file: None,
            },
        }];
        let text = format_results(&results);

        assert!(text.contains("1. chunk_0002"));
        assert!(text.contains("score 0.910"));
        assert!(text.contains("vec 0.880"));
        assert!(text.contains("Fermentation"));
        assert!(text.contains("pages 12-13"));
        assert!(text.contains("matched \"yeast\""));
    }

    #[test]
    fn long_text_is_previewed() {
        let results = vec![SearchResult {
            chunk_id: "chunk_0001".to_string(),
            text: "word ".repeat(100),
            score: 0.5,
            vector_score: None,
            keyword_score: None,
            matched_query: None,
            metadata: ChunkMetadata::default(),
        }];
        let text = format_results(&results);
        assert!(text.contains("..."));
    }
}
