//! Worker task and result types.
//!
//! A [`WorkerTask`] is the immutable input to one specialist invocation; a
//! [`WorkerResult`] is its outcome as observed by the dispatcher. Results are
//! created once, after the worker finishes or fails, and never mutated.

use crate::category::Category;
use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One invocation of a specialist capability for a category.
///
/// Carries a private snapshot of the accumulated transcript so that parallel
/// workers never share mutable context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerTask {
    pub category: Category,
    pub transcript: Transcript,
}

impl WorkerTask {
    pub fn new(category: Category, transcript: Transcript) -> Self {
        Self {
            category,
            transcript,
        }
    }
}

/// Outcome of one worker task. The produced content is opaque to the engine;
/// only the verifier establishes ground truth about artifacts on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub category: Category,
    pub success: bool,
    /// Worker-reported summary of what it produced. Informational only.
    pub content: String,
    /// Files the worker claims to have written, relative to the artifact root.
    pub produced_files: Vec<PathBuf>,
    /// Failure detail when `success` is false.
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl WorkerResult {
    /// Build a successful result.
    pub fn succeeded(
        category: Category,
        content: impl Into<String>,
        produced_files: Vec<PathBuf>,
        elapsed: Duration,
    ) -> Self {
        Self {
            category,
            success: true,
            content: content.into(),
            produced_files,
            error: None,
            elapsed,
        }
    }

    /// Build a failed result. The failure stays local to this worker.
    pub fn failed(category: Category, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            category,
            success: false,
            content: String::new(),
            produced_files: Vec::new(),
            error: Some(error.into()),
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_result() {
        let r = WorkerResult::succeeded(
            Category::Unit,
            "wrote 3 tests",
            vec![PathBuf::from("unit_tests/test_models.py")],
            Duration::from_secs(2),
        );
        assert!(r.success);
        assert_eq!(r.category, Category::Unit);
        assert_eq!(r.produced_files.len(), 1);
        assert!(r.error.is_none());
    }

    #[test]
    fn test_failed_result_carries_error() {
        let r = WorkerResult::failed(Category::Functional, "capability raised", Duration::ZERO);
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("capability raised"));
        assert!(r.content.is_empty());
        assert!(r.produced_files.is_empty());
    }

    #[test]
    fn test_task_snapshot_is_private() {
        let mut transcript = Transcript::from_request("req");
        let task = WorkerTask::new(Category::Unit, transcript.clone());
        transcript.push("supervisor", "later note");
        assert_eq!(task.transcript.len(), 1);
    }
}
