//! Final session summary.
//!
//! Folds the complete iteration history into a [`SessionSummary`]: overall
//! verdict, per-category first-to-last deltas, failure counts. Read-only over
//! the session; aggregation never retries anything and never mutates state.
//! Rendering the summary for humans is the report module's job.

use crate::category::Category;
use crate::session::{SessionResult, SessionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-category movement across the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDelta {
    pub category: Category,
    /// Whether artifacts existed in the final report.
    pub exists: bool,
    pub first_passed: u32,
    pub first_failed: u32,
    pub final_passed: u32,
    pub final_failed: u32,
    /// Artifact files in the final report.
    pub files: usize,
}

impl CategoryDelta {
    /// Net change in passing tests between the first and last iteration.
    pub fn passed_delta(&self) -> i64 {
        i64::from(self.final_passed) - i64::from(self.first_passed)
    }

    pub fn final_total(&self) -> u32 {
        self.final_passed + self.final_failed
    }
}

/// The folded view of one finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub request: String,
    pub status: SessionStatus,
    pub iterations_run: u32,
    pub max_iterations: u32,
    /// Aggregate counts from the final verification report.
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub tests_total: u32,
    pub artifacts_executable: bool,
    /// One entry per category, in fixed enumeration order.
    pub category_deltas: Vec<CategoryDelta>,
    /// Iterations whose report carried blocking import errors.
    pub blocking_iterations: u32,
    /// Worker results with `success=false` across all iterations.
    pub worker_failures: u32,
    /// Rationale attached to the final routing decision.
    pub final_rationale: String,
}

/// Folds a finished session into its summary.
pub struct Aggregator;

impl Aggregator {
    pub fn summarize(result: &SessionResult) -> SessionSummary {
        let session = &result.session;
        let history = session.history();
        let first = history.first();
        let last = history.last();

        let category_deltas = Category::ALL
            .iter()
            .map(|category| {
                let first_ev = first.map(|r| r.report.category(*category));
                let last_ev = last.map(|r| r.report.category(*category));
                CategoryDelta {
                    category: *category,
                    exists: last_ev.is_some_and(|e| e.exists()),
                    first_passed: first_ev.map_or(0, |e| e.tests_passed()),
                    first_failed: first_ev.map_or(0, |e| e.tests_failed()),
                    final_passed: last_ev.map_or(0, |e| e.tests_passed()),
                    final_failed: last_ev.map_or(0, |e| e.tests_failed()),
                    files: last_ev.map_or(0, |e| e.files_found().len()),
                }
            })
            .collect();

        let blocking_iterations = history
            .iter()
            .filter(|r| r.report.imports().has_blocking_errors)
            .count() as u32;
        let worker_failures = history
            .iter()
            .flat_map(|r| r.worker_results.iter())
            .filter(|w| !w.success)
            .count() as u32;

        SessionSummary {
            session_id: session.id(),
            request: session.request().to_string(),
            status: session.status(),
            iterations_run: session.iterations_run(),
            max_iterations: session.max_iterations(),
            tests_passed: last.map_or(0, |r| r.report.tests_passed()),
            tests_failed: last.map_or(0, |r| r.report.tests_failed()),
            tests_total: last.map_or(0, |r| r.report.tests_total()),
            artifacts_executable: last.is_some_and(|r| r.artifacts_executable),
            category_deltas,
            blocking_iterations,
            worker_failures,
            final_rationale: last.map_or(String::new(), |r| r.decision.rationale.clone()),
        }
    }
}
