use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One ground-truth question: the chunk that should come back when the
/// question is asked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsetItem {
    pub chunk_id: String,
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Set by ground-truth remapping when the label moved to a new chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_chunk_id: Option<String>,
}

/// A labeled, timestamped collection of test questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testset {
    pub created_at: String,
    pub label: String,
    pub num_questions: usize,
    pub questions: Vec<TestsetItem>,
}

impl Testset {
    pub fn new(label: impl Into<String>, questions: Vec<TestsetItem>) -> Self {
        Self {
            created_at: Utc::now().to_rfc3339(),
            label: label.into(),
            num_questions: questions.len(),
            questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testset_counts_its_questions() {
        let item = TestsetItem {
            chunk_id: "chunk_0001".to_string(),
            question: "What is a shelfmark?".to_string(),
            answer: "A location code for a book.".to_string(),
            heading: None,
            original_chunk_id: None,
        };
        let testset = Testset::new("baseline", vec![item.clone(), item]);
        assert_eq!(testset.num_questions, 2);
        assert_eq!(testset.label, "baseline");
    }
}
