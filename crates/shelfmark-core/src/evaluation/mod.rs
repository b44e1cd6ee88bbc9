//! Retrieval quality evaluation.
//!
//! A testset pairs questions with the chunk that answers them. The
//! [`evaluator`] ranks every question through a [`crate::retriever::Ranker`]
//! and reports hit rate and MRR; [`remap`] repairs ground-truth labels after
//! re-chunking; [`diagnostics`] classifies failures and suggests fixes.

pub mod diagnostics;
pub mod evaluator;
pub mod remap;
pub mod testset;

pub use diagnostics::{diagnose, format_report, DiagnosticReport};
pub use evaluator::{evaluate, EvalMetrics, EvalRecord, EvalReport};
pub use remap::remap_ground_truth;
pub use testset::{Testset, TestsetItem};
