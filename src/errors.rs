//! Typed error hierarchy for the testsmith engine.
//!
//! Two top-level enums cover the two failure surfaces:
//! - `SessionError`: conditions that make the iteration loop itself
//!   non-viable; these propagate out of `run_session`
//! - `ExecError`: failures of one external test-tool invocation; these are
//!   absorbed into the VerificationReport, never propagated
//!
//! Worker failures are not errors at this level: they surface as
//! `success=false` WorkerResults (see `worker`).

use crate::category::Category;
use thiserror::Error;

/// Fatal session-level errors. Anything that reaches an IterationRecord
/// instead of this enum is by definition recoverable.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no specialists configured; at least one category must have a worker")]
    NoSpecialists,

    #[error("iteration budget must be at least 1, got {given}")]
    InvalidIterationBudget { given: u32 },

    #[error("two specialists registered for category {category}")]
    DuplicateSpecialist { category: Category },

    #[error("decision capability failed: {0}")]
    DecisionFailed(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single external test-tool invocation.
///
/// `ToolMissing` and `Timeout` are deliberately distinct variants: the
/// Verifier records both as non-blocking execution failures, and routing
/// must never mistake either for an import-level blocking error.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("test tool '{cmd}' not found on PATH")]
    ToolMissing { cmd: String },

    #[error("test execution timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("failed to run test tool: {0}")]
    Io(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_invalid_budget_carries_value() {
        let err = SessionError::InvalidIterationBudget { given: 0 };
        match &err {
            SessionError::InvalidIterationBudget { given } => assert_eq!(*given, 0),
            _ => panic!("expected InvalidIterationBudget"),
        }
        assert!(err.to_string().contains('0'));
    }

    #[test]
    fn session_error_duplicate_names_category() {
        let err = SessionError::DuplicateSpecialist {
            category: Category::Unit,
        };
        assert!(err.to_string().contains("Unit"));
    }

    #[test]
    fn exec_error_variants_are_distinct() {
        let missing = ExecError::ToolMissing {
            cmd: "pytest".into(),
        };
        let timeout = ExecError::Timeout { seconds: 30 };
        assert!(matches!(missing, ExecError::ToolMissing { .. }));
        assert!(matches!(timeout, ExecError::Timeout { .. }));
        assert!(missing.to_string().contains("pytest"));
        assert!(timeout.to_string().contains("30"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&SessionError::NoSpecialists);
        assert_std_error(&ExecError::Timeout { seconds: 1 });
    }
}
