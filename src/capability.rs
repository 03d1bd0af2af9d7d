//! Boundary traits for external collaborators.
//!
//! The engine composes three capabilities it does not implement itself:
//!
//! - [`Specialist`]: produces test artifacts for one category
//! - [`DecisionMaker`]: quality review and supervisor routing
//! - [`TestRunner`]: executes artifacts and returns raw tool output
//!
//! Everything behind these traits is replaceable; the engine depends only on
//! the signatures here. Production implementations live in `agents`, test
//! stubs live next to the tests that use them.

use crate::category::Category;
use crate::errors::ExecError;
use crate::transcript::Transcript;
use crate::worker::WorkerTask;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What a specialist hands back after one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistOutput {
    /// Free-form summary of the work performed.
    pub content: String,
    /// Files the specialist wrote, relative to the artifact root.
    pub produced_files: Vec<PathBuf>,
}

impl SpecialistOutput {
    pub fn new(content: impl Into<String>, produced_files: Vec<PathBuf>) -> Self {
        Self {
            content: content.into(),
            produced_files,
        }
    }
}

/// A worker that generates test artifacts for exactly one category.
///
/// Implementations may fail; the dispatcher converts failures into
/// `success=false` results without disturbing sibling workers. They must also
/// tolerate re-invocation with an augmented transcript carrying repair
/// instructions from a previous iteration.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// The single category this specialist produces artifacts for.
    fn category(&self) -> Category;

    /// Generate (or repair) artifacts for the task's category.
    async fn run(&self, task: &WorkerTask) -> anyhow::Result<SpecialistOutput>;
}

/// Binary quality verdict from the review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    /// Artifacts are adequate; the session may terminate.
    Finish,
    /// Artifacts need more work; hand back to the supervisor.
    Continue,
}

/// Outcome of the quality review call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub verdict: ReviewVerdict,
    /// Preserved verbatim in the routing decision for auditability.
    pub rationale: String,
}

/// Outcome of the supervisor routing call: which category works next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDecision {
    pub category: Category,
    pub rationale: String,
}

/// External decision-making capability.
///
/// Treated as a pure function of its inputs: no side effects are attributed
/// to it, and its rationales are stored verbatim so every routing step stays
/// auditable.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Judge verified artifact state: finish, or continue working.
    async fn review(
        &self,
        transcript: &Transcript,
        report_summary: &str,
    ) -> anyhow::Result<ReviewDecision>;

    /// Supervisor routing: pick the category that should work next, with
    /// instructions in the rationale.
    async fn route(&self, transcript: &Transcript) -> anyhow::Result<CategoryDecision>;
}

/// Raw output of one test-tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    /// stdout and stderr concatenated, the form the parser consumes.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// External process-execution capability.
///
/// The engine depends only on the raw text this returns, never on structured
/// tool output, so external tool version drift cannot break classification.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run the test tool scoped to `dir`, bounded by `timeout`.
    async fn run(&self, dir: &Path, timeout: Duration) -> Result<ExecOutput, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_output_combined() {
        let out = ExecOutput {
            stdout: "5 passed\n".into(),
            stderr: "warning\n".into(),
            exit_code: 0,
        };
        assert_eq!(out.combined(), "5 passed\nwarning\n");
    }

    #[test]
    fn test_review_verdict_serde() {
        let json = serde_json::to_string(&ReviewVerdict::Finish).unwrap();
        assert_eq!(json, "\"finish\"");
        let back: ReviewVerdict = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(back, ReviewVerdict::Continue);
    }
}
