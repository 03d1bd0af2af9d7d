//! The iteration state machine.
//!
//! Drives one session to convergence or budget exhaustion:
//!
//! ```text
//! Init -> Dispatch -> AwaitBarrier -> Verify -> Classify -+-> Terminate
//!           ^                                             |
//!           +------------------- RouteAgain <-------------+
//! ```
//!
//! Iteration 1 is a full fan-out: a single triage decision briefs every
//! category, then all specialists run in parallel. Later iterations are
//! targeted-fix passes dispatching only the category the routing decision
//! named. Exactly one [`IterationRecord`] lands in the session history per
//! pass, including passes where every worker failed.

use crate::capability::{DecisionMaker, Specialist};
use crate::category::Category;
use crate::dispatcher::Dispatcher;
use crate::errors::SessionError;
use crate::router::{Router, RouteTarget};
use crate::session::{IterationRecord, Session, SessionResult, SessionStatus};
use crate::transcript::Transcript;
use crate::verifier::Verifier;
use crate::worker::{WorkerResult, WorkerTask};
use std::sync::Arc;
use tracing::info;

/// Default iteration budget when the caller does not specify one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Composes the dispatcher, verifier and router into the session loop.
pub struct Orchestrator {
    specialists: Vec<Arc<dyn Specialist>>,
    router: Router,
    verifier: Verifier,
    dispatcher: Dispatcher,
}

impl Orchestrator {
    /// Build an orchestrator over a specialist roster.
    ///
    /// Fails fast on the conditions that make the loop non-viable: an empty
    /// roster or two specialists claiming the same category.
    pub fn new(
        specialists: Vec<Arc<dyn Specialist>>,
        decider: Arc<dyn DecisionMaker>,
        verifier: Verifier,
    ) -> Result<Self, SessionError> {
        if specialists.is_empty() {
            return Err(SessionError::NoSpecialists);
        }
        for (i, a) in specialists.iter().enumerate() {
            if specialists[i + 1..].iter().any(|b| b.category() == a.category()) {
                return Err(SessionError::DuplicateSpecialist {
                    category: a.category(),
                });
            }
        }
        Ok(Self {
            specialists,
            router: Router::new(decider),
            verifier,
            dispatcher: Dispatcher::new(),
        })
    }

    /// Replace the default dispatcher (timeout tuning).
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Run one session to a terminal status.
    pub async fn run_session(
        &self,
        request: &str,
        max_iterations: u32,
    ) -> Result<SessionResult, SessionError> {
        if max_iterations < 1 {
            return Err(SessionError::InvalidIterationBudget {
                given: max_iterations,
            });
        }

        let mut session = Session::new(request, max_iterations);
        let mut transcript = Transcript::from_request(request);
        let mut retry_target: Option<Category> = None;

        info!(session_id = %session.id(), max_iterations, "session start");

        for iteration in 1..=max_iterations {
            info!(iteration, max_iterations, "iteration start");

            let results = if iteration == 1 {
                self.dispatch_all(&mut transcript).await?
            } else {
                self.dispatch_targeted(&transcript, retry_target).await?
            };

            // Post-barrier merge: single-threaded, fixed category order, so
            // the transcript is deterministic regardless of completion order.
            for category in Category::ALL {
                if let Some(result) = results
                    .iter()
                    .find(|r| r.category == category && r.success)
                {
                    transcript.push(category.worker_name(), &result.content);
                }
            }

            let report = self.verifier.verify().await;
            info!(
                tests_total = report.tests_total(),
                tests_failed = report.tests_failed(),
                executable = report.artifacts_executable(),
                "verification complete"
            );

            let decision = self.router.classify(&report, &transcript).await?;
            transcript.push("validator", &decision.rationale);

            let terminate = decision.target.is_terminate();
            session.record_iteration(IterationRecord::new(iteration, results, report, decision));

            if terminate {
                session.set_status(SessionStatus::Converged);
                info!(iteration, "session converged");
                break;
            }

            // Resolve the supervisor route into the concrete category that
            // retries, unless the budget is already spent.
            if iteration < max_iterations {
                let retry = self.router.pick_category(&transcript).await?;
                match retry.target {
                    RouteTarget::Category(category) => {
                        transcript.push("supervisor", &retry.rationale);
                        retry_target = Some(category);
                    }
                    RouteTarget::Supervisor | RouteTarget::Terminate => {
                        return Err(SessionError::Other(anyhow::anyhow!(
                            "supervisor routing produced a non-category target"
                        )));
                    }
                }
            }
        }

        if !session.status().is_converged() {
            session.set_status(SessionStatus::Exhausted);
            info!(iterations = session.iterations_run(), "budget exhausted");
        }

        Ok(SessionResult { session })
    }

    /// Iteration 1: one triage decision whose rationale briefs every
    /// category, then the full roster in parallel, each worker holding its
    /// own transcript snapshot.
    async fn dispatch_all(
        &self,
        transcript: &mut Transcript,
    ) -> Result<Vec<WorkerResult>, SessionError> {
        let triage = self.router.pick_category(transcript).await?;
        transcript.push("supervisor", &triage.rationale);

        let assignments = self
            .specialists
            .iter()
            .map(|s| {
                (
                    Arc::clone(s),
                    WorkerTask::new(s.category(), transcript.clone()),
                )
            })
            .collect();
        Ok(self.dispatcher.dispatch(assignments).await)
    }

    /// Iterations 2..N: only the category the routing decision named.
    async fn dispatch_targeted(
        &self,
        transcript: &Transcript,
        retry_target: Option<Category>,
    ) -> Result<Vec<WorkerResult>, SessionError> {
        let Some(category) = retry_target else {
            return Err(SessionError::Other(anyhow::anyhow!(
                "no retry target recorded for a targeted-fix pass"
            )));
        };
        let Some(specialist) = self
            .specialists
            .iter()
            .find(|s| s.category() == category)
        else {
            return Err(SessionError::Other(anyhow::anyhow!(
                "supervisor picked {category} but no specialist is registered for it"
            )));
        };

        let assignments = vec![(
            Arc::clone(specialist),
            WorkerTask::new(category, transcript.clone()),
        )];
        Ok(self.dispatcher.dispatch(assignments).await)
    }
}
