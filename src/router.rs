//! Routing decisions over verification reports.
//!
//! One rule is closed-form and reproducible: blocked artifacts with zero
//! collected tests always go back to the supervisor with the synthesized
//! repair instructions, without spending a delegated decision call on a
//! mechanically obvious case. Everything else is delegated to the external
//! decision capability, whose rationale is preserved verbatim.

use crate::capability::{DecisionMaker, ReviewVerdict};
use crate::category::Category;
use crate::errors::SessionError;
use crate::transcript::Transcript;
use crate::verifier::VerificationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Where the session goes next. Closed set, matched exhaustively at every
/// consumption site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    /// Targeted retry: dispatch exactly this category next iteration.
    Category(Category),
    /// Hand back to the supervisor to pick the retry category.
    Supervisor,
    /// Artifacts converged; end the session.
    Terminate,
}

impl RouteTarget {
    pub fn is_terminate(&self) -> bool {
        matches!(self, Self::Terminate)
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(c) => write!(f, "{c}"),
            Self::Supervisor => write!(f, "supervisor"),
            Self::Terminate => write!(f, "terminate"),
        }
    }
}

/// A routing decision plus the rationale that makes it auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub target: RouteTarget,
    pub rationale: String,
}

impl RoutingDecision {
    pub fn terminate(rationale: impl Into<String>) -> Self {
        Self {
            target: RouteTarget::Terminate,
            rationale: rationale.into(),
        }
    }

    pub fn supervisor(rationale: impl Into<String>) -> Self {
        Self {
            target: RouteTarget::Supervisor,
            rationale: rationale.into(),
        }
    }

    pub fn retry(category: Category, rationale: impl Into<String>) -> Self {
        Self {
            target: RouteTarget::Category(category),
            rationale: rationale.into(),
        }
    }
}

/// Decides what happens after verification.
pub struct Router {
    decider: Arc<dyn DecisionMaker>,
}

impl Router {
    pub fn new(decider: Arc<dyn DecisionMaker>) -> Self {
        Self { decider }
    }

    /// Classify a verification outcome into terminate-or-supervisor.
    ///
    /// Blocked artifacts with zero collected tests route deterministically;
    /// the decision capability is provably not consulted on that path.
    pub async fn classify(
        &self,
        report: &VerificationReport,
        transcript: &Transcript,
    ) -> Result<RoutingDecision, SessionError> {
        if report.imports().has_blocking_errors && report.tests_total() == 0 {
            let decision = RoutingDecision::supervisor(blocking_rationale(report));
            info!(target = %decision.target, "deterministic route: blocking import errors");
            return Ok(decision);
        }

        let review = self
            .decider
            .review(transcript, &report.summary())
            .await
            .map_err(SessionError::DecisionFailed)?;
        info!(verdict = ?review.verdict, "delegated quality review");

        Ok(match review.verdict {
            ReviewVerdict::Finish => RoutingDecision::terminate(review.rationale),
            ReviewVerdict::Continue => RoutingDecision::supervisor(review.rationale),
        })
    }

    /// Resolve a supervisor route into the concrete category that retries
    /// next, via a second delegated decision.
    pub async fn pick_category(
        &self,
        transcript: &Transcript,
    ) -> Result<RoutingDecision, SessionError> {
        let decision = self
            .decider
            .route(transcript)
            .await
            .map_err(SessionError::DecisionFailed)?;
        info!(category = %decision.category, "supervisor picked retry category");
        Ok(RoutingDecision::retry(decision.category, decision.rationale))
    }
}

/// Rationale for the deterministic blocking route: every synthesized fix,
/// spelled out as repair instructions for the next worker.
fn blocking_rationale(report: &VerificationReport) -> String {
    let imports = report.imports();
    let mut rationale =
        String::from("tests cannot execute: import errors are preventing collection\n");
    if !imports.missing_modules.is_empty() {
        rationale.push_str(&format!(
            "missing modules: {}\n",
            imports.missing_modules.join(", ")
        ));
    }
    rationale.push_str("required fixes:\n");
    for fix in &imports.suggested_fixes {
        rationale.push_str(&format!("  - {}: {}\n", fix.issue, fix.action));
    }
    rationale.push_str(&format!(
        "evidence: {} file(s) found, {} tests collected, {} error(s)\n",
        report.files_found().len(),
        report.tests_total(),
        report.errors().len(),
    ));
    rationale
}
