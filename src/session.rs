//! Session state and the append-only iteration history.
//!
//! A [`Session`] is one end-to-end run. Its history is the audit trail:
//! exactly one [`IterationRecord`] per loop pass, appended after the dispatch
//! barrier and never rewritten. Mutation is crate-private; only the
//! orchestrator touches a live session, and it is discarded once the
//! aggregator has consumed it.

use crate::router::RoutingDecision;
use crate::verifier::VerificationReport;
use crate::worker::WorkerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Terminal classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Artifacts verified adequate before the budget ran out.
    Converged,
    /// Still in progress (the status of a live session).
    NeedsWork,
    /// The iteration budget ran out. Not an error: partial progress is
    /// preserved and reported.
    Exhausted,
}

impl SessionStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Converged => "converged",
            Self::NeedsWork => "needs work",
            Self::Exhausted => "exhausted",
        };
        write!(f, "{s}")
    }
}

/// Immutable snapshot of one loop pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    /// Results from this pass's dispatch, possibly empty or partial.
    pub worker_results: Vec<WorkerResult>,
    pub report: VerificationReport,
    pub decision: RoutingDecision,
    /// Whether artifacts were judged executable at this pass.
    pub artifacts_executable: bool,
    pub recorded_at: DateTime<Utc>,
}

impl IterationRecord {
    pub fn new(
        iteration: u32,
        worker_results: Vec<WorkerResult>,
        report: VerificationReport,
        decision: RoutingDecision,
    ) -> Self {
        let artifacts_executable = report.artifacts_executable();
        Self {
            iteration,
            worker_results,
            report,
            decision,
            artifacts_executable,
            recorded_at: Utc::now(),
        }
    }
}

/// One end-to-end run of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    request: String,
    max_iterations: u32,
    iterations_run: u32,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    history: Vec<IterationRecord>,
}

impl Session {
    pub fn new(request: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            request: request.into(),
            max_iterations,
            iterations_run: 0,
            status: SessionStatus::NeedsWork,
            started_at: Utc::now(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn iterations_run(&self) -> u32 {
        self.iterations_run
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The ordered audit trail. Read-only: records are never removed or
    /// rewritten once appended.
    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn last_record(&self) -> Option<&IterationRecord> {
        self.history.last()
    }

    /// Append this pass's record. Exactly one call per iteration.
    pub(crate) fn record_iteration(&mut self, record: IterationRecord) {
        self.iterations_run = record.iteration;
        self.history.push(record);
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

/// What `run_session` hands back: the finished session with its complete
/// history, ready for aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub session: Session,
}

impl SessionResult {
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn converged(&self) -> bool {
        self.session.status().is_converged()
    }

    pub fn history(&self) -> &[IterationRecord] {
        self.session.history()
    }
}
