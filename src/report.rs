//! Markdown rendering of the final session report.
//!
//! Pure string building over the aggregator's summary and the ordered
//! iteration history. The engine guarantees the history is complete and
//! ordered; this module only decides layout.

use crate::aggregator::SessionSummary;
use crate::session::IterationRecord;

/// Render the full report: status dashboard, per-category breakdown, and the
/// per-iteration audit trail.
pub fn render_markdown(summary: &SessionSummary, history: &[IterationRecord]) -> String {
    let mut out = String::new();

    out.push_str("# Test Suite Report\n\n");
    out.push_str(&format!("Request: {}\n\n", summary.request));

    out.push_str("## Status\n\n");
    out.push_str("| | |\n|---|---|\n");
    out.push_str(&format!("| Verdict | **{}** |\n", summary.status));
    out.push_str(&format!(
        "| Iterations | {} of {} |\n",
        summary.iterations_run, summary.max_iterations
    ));
    out.push_str(&format!(
        "| Tests | {} total ({} passed, {} failed) |\n",
        summary.tests_total, summary.tests_passed, summary.tests_failed
    ));
    out.push_str(&format!(
        "| Artifacts executable | {} |\n",
        if summary.artifacts_executable {
            "yes"
        } else {
            "no"
        }
    ));
    if summary.blocking_iterations > 0 {
        out.push_str(&format!(
            "| Iterations with blocking import errors | {} |\n",
            summary.blocking_iterations
        ));
    }
    if summary.worker_failures > 0 {
        out.push_str(&format!(
            "| Worker failures | {} |\n",
            summary.worker_failures
        ));
    }
    out.push('\n');

    out.push_str("## Categories\n\n");
    out.push_str("| Category | Artifacts | Tests | Passed | Failed | Δ passed |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for delta in &summary.category_deltas {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:+} |\n",
            delta.category,
            if delta.exists {
                format!("{} file(s)", delta.files)
            } else {
                "missing".to_string()
            },
            delta.final_total(),
            delta.final_passed,
            delta.final_failed,
            delta.passed_delta(),
        ));
    }
    out.push('\n');

    out.push_str("## Iterations\n\n");
    for record in history {
        out.push_str(&format!("### Iteration {}\n\n", record.iteration));
        if record.worker_results.is_empty() {
            out.push_str("- workers: none completed\n");
        } else {
            for worker in &record.worker_results {
                if worker.success {
                    out.push_str(&format!("- {} ✓\n", worker.category.worker_name()));
                } else {
                    out.push_str(&format!(
                        "- {} ✗ ({})\n",
                        worker.category.worker_name(),
                        worker.error.as_deref().unwrap_or("unknown failure")
                    ));
                }
            }
        }
        out.push_str(&format!(
            "- verified: {} tests ({} passed, {} failed), executable: {}\n",
            record.report.tests_total(),
            record.report.tests_passed(),
            record.report.tests_failed(),
            if record.artifacts_executable {
                "yes"
            } else {
                "no"
            }
        ));
        out.push_str(&format!("- routed to: {}\n\n", record.decision.target));
        out.push_str(&format!(
            "> {}\n\n",
            record.decision.rationale.trim().replace('\n', "\n> ")
        ));
    }

    if !summary.final_rationale.is_empty() {
        out.push_str("## Final rationale\n\n");
        out.push_str(summary.final_rationale.trim());
        out.push('\n');
    }

    out
}
