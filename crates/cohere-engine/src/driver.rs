//! The solver loop.
//!
//! The solver only knows the program. Each model it returns is checked by
//! the search; inconsistent models are excluded with one blocking clause
//! per violation reason and the solver is asked again.
//!
//! A verdict on the violation query is only trusted when no thread was cut
//! short by the unrolling bound, so both outcomes are confirmed by a second
//! run that talks about `Bound` events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use cohere_smt::encoder::ProgramEncoding;
use cohere_smt::solver::{SatResult, SmtSolver};

use crate::error::{EngineError, ReasoningError};
use crate::graph::GraphSet;
use crate::literal::{blocking_clause, CoreLiteral, Reason};
use crate::model::ExecutionModel;
use crate::result::{Verdict, VerificationReport, Witness};
use crate::search::{RefinementResult, Search};
use crate::stats::{RefinementStats, RefinementSummary};
use crate::task::VerificationTask;
use crate::timeout::{deadline_exceeded, deadline_from_timeout_secs, timeout_unknown_reason};

/// Hooks into a running refinement loop.
pub trait Diagnostics {
    fn on_iteration(&mut self, _iteration: usize, _result: &RefinementResult) {}
    fn on_clause(&mut self, _reason: &Reason) {}
    fn on_finish(&mut self, _report: &VerificationReport) {}
}

pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {}

/// Keeps what the hooks saw, mostly for tests.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    pub iterations: Vec<(usize, Verdict)>,
    pub clauses: Vec<Reason>,
    pub verdict: Option<Verdict>,
}

impl Diagnostics for CollectingDiagnostics {
    fn on_iteration(&mut self, iteration: usize, result: &RefinementResult) {
        self.iterations.push((iteration, result.verdict));
    }

    fn on_clause(&mut self, reason: &Reason) {
        self.clauses.push(reason.clone());
    }

    fn on_finish(&mut self, report: &VerificationReport) {
        self.verdict = Some(report.verdict);
    }
}

/// Cooperative cancellation; checked before every solver call and between
/// search steps.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum LoopOutcome {
    /// The solver ran out of candidates.
    Unsat,
    /// A candidate passed the search.
    Consistent(Witness),
    Unknown(String),
}

#[derive(Default)]
struct RunState {
    summary: RefinementSummary,
    iterations: Vec<RefinementStats>,
    clauses: Vec<Reason>,
}

fn solver_error<E: std::error::Error>(err: E) -> EngineError {
    EngineError::Solver(err.to_string())
}

pub struct RefinementDriver<'t, S: SmtSolver> {
    task: &'t VerificationTask,
    solver: S,
    shutdown: Option<ShutdownSignal>,
}

impl<'t, S: SmtSolver> RefinementDriver<'t, S> {
    pub fn new(task: &'t VerificationTask, solver: S) -> Self {
        Self {
            task,
            solver,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    pub fn run(self) -> Result<VerificationReport, EngineError> {
        self.run_with(&mut NoDiagnostics)
    }

    pub fn run_with(
        mut self,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<VerificationReport, EngineError> {
        let task = self.task;
        let deadline = deadline_from_timeout_secs(task.config.timeout_secs);
        let mut state = RunState::default();

        let (verdict, reason, witness) = if task.assertion_is_trivial() {
            info!("Assertion holds trivially; skipping the solver");
            (Verdict::Pass, None, None)
        } else {
            self.verify(deadline, &mut state, diagnostics)?
        };

        let inverted = task.is_inverted();
        let verdict = if inverted { verdict.invert() } else { verdict };
        state.summary.num_clauses = state.clauses.len();
        let report = VerificationReport {
            program: task.program.name.clone(),
            model: task.wmm.name().to_string(),
            verdict,
            reason,
            inverted,
            witness,
            summary: state.summary,
            iterations: state.iterations,
            clauses: state.clauses,
            config: task.config.clone(),
        };
        info!(
            verdict = %report.verdict,
            iterations = report.summary.iterations,
            clauses = report.summary.num_clauses,
            "Refinement finished"
        );
        diagnostics.on_finish(&report);
        Ok(report)
    }

    fn verify(
        &mut self,
        deadline: Option<Instant>,
        state: &mut RunState,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<(Verdict, Option<String>, Option<Witness>), EngineError> {
        let task = self.task;
        info!(program = %task.program.name, model = task.wmm.name(), "Encoding program...");
        let encoding = task.encode_program();
        let core = task.encode_wmm_core(&encoding);
        self.solver
            .load(&encoding.declarations, &encoding.assertions)
            .map_err(solver_error)?;
        self.solver
            .load(&core.declarations, &core.assertions)
            .map_err(solver_error)?;
        debug!(
            variables = encoding.declarations.len() + core.declarations.len(),
            assertions = encoding.assertions.len() + core.assertions.len(),
            "program encoded"
        );

        self.solver.push().map_err(solver_error)?;
        self.solver
            .assert(&task.encode_assertions())
            .map_err(solver_error)?;
        let has_bound = task.program.bound_events().next().is_some();

        info!("Refining candidate executions...");
        match self.refine(&encoding, deadline, state, diagnostics)? {
            LoopOutcome::Unknown(reason) => Ok((Verdict::Unknown, Some(reason), None)),
            LoopOutcome::Unsat if !has_bound => Ok((Verdict::Pass, None, None)),
            LoopOutcome::Unsat => {
                // no consistent execution violates the assertion; PASS
                // also needs every consistent execution to stay within
                // the unrolling bound
                self.solver.pop().map_err(solver_error)?;
                self.solver
                    .assert(&task.encode_no_bound_event_exec().not())
                    .map_err(solver_error)?;
                self.reassert_clauses(state)?;
                info!("Checking the unrolling bound...");
                let start = Instant::now();
                let outcome = self.refine(&encoding, deadline, state, diagnostics);
                state.summary.bound_check_time = start.elapsed();
                Ok(match outcome? {
                    LoopOutcome::Unsat => (Verdict::Pass, None, None),
                    LoopOutcome::Consistent(_) => (
                        Verdict::Unknown,
                        Some("Unrolling bound reached by a consistent execution".into()),
                        None,
                    ),
                    LoopOutcome::Unknown(reason) => (Verdict::Unknown, Some(reason), None),
                })
            }
            LoopOutcome::Consistent(witness) if !has_bound => {
                Ok((Verdict::Fail, None, Some(witness)))
            }
            LoopOutcome::Consistent(_) => {
                self.solver
                    .assert(&task.encode_no_bound_event_exec())
                    .map_err(solver_error)?;
                info!("Looking for a violation within the unrolling bound...");
                let start = Instant::now();
                let outcome = self.refine(&encoding, deadline, state, diagnostics);
                state.summary.bound_check_time = start.elapsed();
                Ok(match outcome? {
                    LoopOutcome::Consistent(witness) => (Verdict::Fail, None, Some(witness)),
                    LoopOutcome::Unsat => (
                        Verdict::Unknown,
                        Some("Assertion only fails in executions cut short by the unrolling bound".into()),
                        None,
                    ),
                    LoopOutcome::Unknown(reason) => (Verdict::Unknown, Some(reason), None),
                })
            }
        }
    }

    fn reassert_clauses(&mut self, state: &RunState) -> Result<(), EngineError> {
        for reason in &state.clauses {
            if let Some(clause) = blocking_clause(reason) {
                self.solver.assert(&clause).map_err(solver_error)?;
            }
        }
        Ok(())
    }

    fn refine(
        &mut self,
        encoding: &ProgramEncoding,
        deadline: Option<Instant>,
        state: &mut RunState,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<LoopOutcome, EngineError> {
        let task = self.task;
        let config = &task.config;
        loop {
            if deadline_exceeded(deadline) {
                return Ok(LoopOutcome::Unknown(timeout_unknown_reason("Refinement")));
            }
            if self.shutdown.as_ref().is_some_and(ShutdownSignal::is_requested) {
                return Ok(LoopOutcome::Unknown("Interrupted".into()));
            }
            if config.max_iterations > 0 && state.summary.iterations >= config.max_iterations {
                return Ok(LoopOutcome::Unknown(format!(
                    "Iteration limit {} reached",
                    config.max_iterations
                )));
            }

            let solver_start = Instant::now();
            let sat = self.solver.check_sat().map_err(solver_error)?;
            state.summary.solver_time += solver_start.elapsed();
            match sat {
                SatResult::Unsat => return Ok(LoopOutcome::Unsat),
                SatResult::Unknown(reason) => {
                    return Ok(LoopOutcome::Unknown(format!("Solver returned unknown: {reason}")))
                }
                SatResult::Sat => {}
            }
            let smt_model = self
                .solver
                .get_model(&encoding.model_vars)
                .map_err(solver_error)?;

            let construction_start = Instant::now();
            let execution = ExecutionModel::from_solver_model(
                &task.program,
                &encoding.rf_candidates,
                &smt_model,
            )?;
            let mut graphs =
                GraphSet::build(&task.wmm, &execution, config.max_fixpoint_iterations)?;
            let construction = construction_start.elapsed();
            let mut result = Search::new(&mut graphs)
                .with_deadline(deadline)
                .with_shutdown(self.shutdown.clone())
                .run(config.k)?;
            result.stats.model_construction_time = construction;

            let iteration = state.summary.iterations + 1;
            state.summary.absorb(&result.stats);
            state.iterations.push(result.stats.clone());
            diagnostics.on_iteration(iteration, &result);
            info!(
                iteration,
                events = result.stats.model_size,
                edges = result.stats.graph_edges,
                state = ?result.state,
                search_ms = millis(result.stats.search_time),
                "candidate checked"
            );

            match result.verdict {
                Verdict::Pass => {
                    return Ok(LoopOutcome::Consistent(Witness::from_model(&execution)))
                }
                Verdict::Unknown => {
                    let reason = if deadline_exceeded(deadline) {
                        timeout_unknown_reason("Refinement")
                    } else if self.shutdown.as_ref().is_some_and(ShutdownSignal::is_requested) {
                        "Interrupted".to_string()
                    } else {
                        "Coherence search stopped before deciding".to_string()
                    };
                    return Ok(LoopOutcome::Unknown(reason));
                }
                Verdict::Fail => {
                    if result.violations.is_false() {
                        return Err(ReasoningError::EmptyViolation.into());
                    }
                    for reason in result.violations.cubes() {
                        let clause = checked_clause(reason, &execution)?;
                        self.solver.assert(&clause).map_err(solver_error)?;
                        diagnostics.on_clause(reason);
                        if reason.literals().iter().any(|l| l.is_backward(&task.program)) {
                            state.summary.num_future_read_clauses += 1;
                        }
                        state.clauses.push(reason.clone());
                    }
                }
            }
        }
    }
}

/// The blocking clause of `reason`, which must hold in the execution it
/// was derived from and mention solver variables only.
fn checked_clause(
    reason: &Reason,
    execution: &ExecutionModel<'_>,
) -> Result<cohere_smt::terms::SmtTerm, ReasoningError> {
    for literal in reason.literals() {
        if let CoreLiteral::Coherence { first, second } = *literal {
            return Err(ReasoningError::UnresolvedCoherence { first, second });
        }
        if !literal.holds_in(execution) {
            return Err(ReasoningError::FalseLiteral(literal.to_string()));
        }
    }
    blocking_clause(reason).ok_or(ReasoningError::EmptyViolation)
}

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefinementConfig;
    use cohere_ir::{models, Condition, Instruction, Program, ValueExpr};
    use cohere_smt::solver::Model;
    use cohere_smt::terms::{SmtSort, SmtTerm};
    use std::collections::VecDeque;
    use std::io;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Answers from a script; records what it was told.
    #[derive(Default)]
    struct ScriptedSolver {
        answers: VecDeque<SatResult>,
        asserted: usize,
        scopes: usize,
    }

    impl SmtSolver for ScriptedSolver {
        type Error = io::Error;

        fn declare_var(&mut self, _name: &str, _sort: SmtSort) -> Result<(), io::Error> {
            Ok(())
        }

        fn assert(&mut self, _term: &SmtTerm) -> Result<(), io::Error> {
            self.asserted += 1;
            Ok(())
        }

        fn push(&mut self) -> Result<(), io::Error> {
            self.scopes += 1;
            Ok(())
        }

        fn pop(&mut self) -> Result<(), io::Error> {
            self.scopes -= 1;
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, io::Error> {
            self.answers
                .pop_front()
                .ok_or_else(|| io::Error::other("script exhausted"))
        }

        fn get_model(&mut self, _vars: &[(String, SmtSort)]) -> Result<Model, io::Error> {
            Ok(Model::default())
        }

        fn reset(&mut self) -> Result<(), io::Error> {
            Ok(())
        }
    }

    fn reader_task(config: RefinementConfig) -> Result<VerificationTask, EngineError> {
        let program = Program::new("reader")
            .with_location("x", 0)
            .with_thread(vec![Instruction::load("r", "x")])
            .with_assertion(
                Condition::eq(ValueExpr::final_reg(0, "r"), ValueExpr::constant(0)),
                false,
            );
        VerificationTask::new(&program, models::sc(), config)
    }

    #[test]
    fn trivial_assertion_never_calls_the_solver() -> TestResult {
        let program = Program::new("noop").with_location("x", 0);
        let task = VerificationTask::new(&program, models::sc(), RefinementConfig::default())?;
        let report = RefinementDriver::new(&task, ScriptedSolver::default()).run()?;
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.summary.iterations, 0);
        Ok(())
    }

    #[test]
    fn unsat_violation_query_passes() -> TestResult {
        let task = reader_task(RefinementConfig::default())?;
        let solver = ScriptedSolver {
            answers: VecDeque::from([SatResult::Unsat]),
            ..ScriptedSolver::default()
        };
        let mut diagnostics = CollectingDiagnostics::default();
        let report = RefinementDriver::new(&task, solver).run_with(&mut diagnostics)?;
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(diagnostics.verdict, Some(Verdict::Pass));
        assert!(diagnostics.iterations.is_empty());
        Ok(())
    }

    #[test]
    fn solver_unknown_is_reported() -> TestResult {
        let task = reader_task(RefinementConfig::default())?;
        let solver = ScriptedSolver {
            answers: VecDeque::from([SatResult::Unknown("timeout".into())]),
            ..ScriptedSolver::default()
        };
        let report = RefinementDriver::new(&task, solver).run()?;
        assert_eq!(report.verdict, Verdict::Unknown);
        assert_eq!(report.reason.as_deref(), Some("Solver returned unknown: timeout"));
        Ok(())
    }

    #[test]
    fn consistent_candidate_fails_with_witness() -> TestResult {
        // the empty model executes nothing beyond the initial writes
        let task = reader_task(RefinementConfig::default())?;
        let solver = ScriptedSolver {
            answers: VecDeque::from([SatResult::Sat]),
            ..ScriptedSolver::default()
        };
        let mut diagnostics = CollectingDiagnostics::default();
        let report = RefinementDriver::new(&task, solver).run_with(&mut diagnostics)?;
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.summary.iterations, 1);
        assert!(report.clauses.is_empty());
        let witness = report.witness.ok_or("FAIL carries a witness")?;
        assert!(witness.executed.is_empty());
        assert_eq!(diagnostics.iterations, vec![(1, Verdict::Pass)]);
        Ok(())
    }

    #[test]
    fn shutdown_stops_the_loop() -> TestResult {
        let task = reader_task(RefinementConfig::default())?;
        let signal = ShutdownSignal::new();
        signal.request();
        let report = RefinementDriver::new(&task, ScriptedSolver::default())
            .with_shutdown(signal)
            .run()?;
        assert_eq!(report.verdict, Verdict::Unknown);
        assert_eq!(report.reason.as_deref(), Some("Interrupted"));
        Ok(())
    }

    #[test]
    fn clause_literals_are_checked_against_the_model() -> TestResult {
        let task = reader_task(RefinementConfig::default())?;
        let execution = ExecutionModel::new(&task.program, [1], [(0, 1)])?;
        let holds = Reason::singleton(CoreLiteral::ReadFrom { write: 0, read: 1 });
        assert!(checked_clause(&holds, &execution).is_ok());
        let wrong = Reason::singleton(CoreLiteral::Exec(7));
        assert!(matches!(
            checked_clause(&wrong, &execution),
            Err(ReasoningError::FalseLiteral(_))
        ));
        let guess = Reason::singleton(CoreLiteral::Coherence { first: 0, second: 1 });
        assert_eq!(
            checked_clause(&guess, &execution),
            Err(ReasoningError::UnresolvedCoherence { first: 0, second: 1 })
        );
        Ok(())
    }
}
