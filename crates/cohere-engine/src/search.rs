//! Search for a coherence order (kSearch).
//!
//! Saturation at depth `d` tries both orders of every open write pair. An
//! order is refuted when guessing it leads to a violation within `d - 1`
//! further nested guesses. A pair with one refuted order gets the other
//! order forced, justified by the refutation minus the guess. A pair with
//! both orders refuted is a violation of the current state, explained by
//! resolving the two refutations. Forced edges survive into deeper rounds.
//!
//! Pairs still open after depth `k` are decided by plain backtracking: one
//! pair per level, both orders, so `n` open pairs cost at most `2^n`
//! branches. Only a deadline or a shutdown request leaves a model
//! undecided.

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, trace};

use crate::driver::ShutdownSignal;
use crate::error::{EngineError, ReasoningError};
use crate::graph::{CoherenceOrigin, Edge, GraphSet};
use crate::literal::CoreLiteral;
use crate::logic::Dnf;
use crate::model::ModelIndex;
use crate::reasoning::Reasoner;
use crate::result::Verdict;
use crate::stats::RefinementStats;
use crate::timeout::deadline_exceeded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    /// Saturating with up to this many nested guesses.
    Exploring(usize),
    Violated,
    Consistent,
    /// No open pairs were left to decide.
    Exhausted { violated: bool },
}

impl SearchState {
    /// PASS means a consistent coherence exists, FAIL that none does.
    pub fn verdict(self) -> Verdict {
        match self {
            SearchState::Consistent | SearchState::Exhausted { violated: false } => Verdict::Pass,
            SearchState::Violated | SearchState::Exhausted { violated: true } => Verdict::Fail,
            SearchState::Exploring(_) => Verdict::Unknown,
        }
    }
}

/// Outcome of refining one candidate execution.
#[derive(Debug, Clone, Serialize)]
pub struct RefinementResult {
    pub verdict: Verdict,
    pub state: SearchState,
    /// Reasons why the execution is inconsistent; empty unless FAIL.
    pub violations: Dnf<CoreLiteral>,
    pub stats: RefinementStats,
}

enum Attempt {
    Violated(Dnf<CoreLiteral>),
    Consistent,
    Open,
}

enum Saturation {
    Violated(Dnf<CoreLiteral>),
    Consistent,
    Stuck,
}

pub struct Search<'g, 'a> {
    graphs: &'g mut GraphSet<'a>,
    stats: RefinementStats,
    deadline: Option<Instant>,
    shutdown: Option<ShutdownSignal>,
    /// Guesses currently in place.
    nesting: usize,
}

impl<'g, 'a> Search<'g, 'a> {
    pub fn new(graphs: &'g mut GraphSet<'a>) -> Self {
        let stats = RefinementStats {
            model_size: graphs.model().size(),
            ..RefinementStats::default()
        };
        Self {
            graphs,
            stats,
            deadline: None,
            shutdown: None,
            nesting: 0,
        }
    }

    /// Gives up with UNKNOWN once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Gives up with UNKNOWN once `signal` is raised.
    pub fn with_shutdown(mut self, signal: Option<ShutdownSignal>) -> Self {
        self.shutdown = signal;
        self
    }

    pub fn run(mut self, k: usize) -> Result<RefinementResult, EngineError> {
        let start = Instant::now();
        let outcome = self.k_search(k);
        self.stats.search_time = start.elapsed();
        self.stats.graph_edges = self.graphs.total_edges();
        let (state, violations) = outcome?;
        debug!(
            state = ?state,
            violations = violations.len(),
            guesses = self.stats.num_guessed_coherences,
            forced = self.stats.num_forced_coherences,
            "search finished"
        );
        Ok(RefinementResult {
            verdict: state.verdict(),
            state,
            violations,
            stats: self.stats,
        })
    }

    fn k_search(&mut self, k: usize) -> Result<(SearchState, Dnf<CoreLiteral>), EngineError> {
        let exhausted = self.graphs.unresolved_pairs().is_empty();
        if self.graphs.has_violations() {
            let reasons = self.violation_reasons()?;
            let state = if exhausted {
                SearchState::Exhausted { violated: true }
            } else {
                SearchState::Violated
            };
            return Ok((state, reasons));
        }
        if exhausted {
            return Ok((SearchState::Exhausted { violated: false }, Dnf::falsum()));
        }
        let mut state = SearchState::Exploring(0);
        for depth in 1..=k {
            state = SearchState::Exploring(depth);
            trace!(depth, "saturating");
            match self.saturate(depth)? {
                Saturation::Violated(reasons) => return Ok((SearchState::Violated, reasons)),
                Saturation::Consistent => return Ok((SearchState::Consistent, Dnf::falsum())),
                Saturation::Stuck if self.interrupted() => return Ok((state, Dnf::falsum())),
                Saturation::Stuck => {}
            }
        }
        trace!(open = self.graphs.unresolved_pairs().len(), "deciding remaining pairs");
        Ok(match self.decide()? {
            Saturation::Violated(reasons) => (SearchState::Violated, reasons),
            Saturation::Consistent => (SearchState::Consistent, Dnf::falsum()),
            Saturation::Stuck => (state, Dnf::falsum()),
        })
    }

    fn interrupted(&self) -> bool {
        deadline_exceeded(self.deadline)
            || self.shutdown.as_ref().is_some_and(ShutdownSignal::is_requested)
    }

    fn saturate(&mut self, depth: usize) -> Result<Saturation, EngineError> {
        self.stats.saturation_depth = self.stats.saturation_depth.max(depth);
        loop {
            if self.graphs.has_violations() {
                return Ok(Saturation::Violated(self.violation_reasons()?));
            }
            let pairs = self.graphs.unresolved_pairs();
            if pairs.is_empty() {
                return Ok(Saturation::Consistent);
            }
            let mut progress = false;
            for (a, b) in pairs {
                if self.interrupted() {
                    return Ok(Saturation::Stuck);
                }
                if self.graphs.is_ordered(a, b) {
                    continue;
                }
                let forward = self.coherence_literal(a, b);
                let backward = self.coherence_literal(b, a);
                let ab = self.attempt(a, b, depth)?;
                if matches!(ab, Attempt::Consistent) {
                    return Ok(Saturation::Consistent);
                }
                let ba = self.attempt(b, a, depth)?;
                if matches!(ba, Attempt::Consistent) {
                    return Ok(Saturation::Consistent);
                }
                match (ab, ba) {
                    (Attempt::Violated(ab), Attempt::Violated(ba)) => {
                        if let Some(reasons) = independent(&ab, &forward) {
                            return Ok(Saturation::Violated(reasons));
                        }
                        if let Some(reasons) = independent(&ba, &backward) {
                            return Ok(Saturation::Violated(reasons));
                        }
                        return Ok(Saturation::Violated(
                            self.resolve(&ab, &forward, &ba, &backward),
                        ));
                    }
                    (Attempt::Violated(ab), Attempt::Open) => {
                        if let Some(reasons) = independent(&ab, &forward) {
                            return Ok(Saturation::Violated(reasons));
                        }
                        self.force(Edge::new(b, a), &ab, &forward)?;
                        progress = true;
                        break;
                    }
                    (Attempt::Open, Attempt::Violated(ba)) => {
                        if let Some(reasons) = independent(&ba, &backward) {
                            return Ok(Saturation::Violated(reasons));
                        }
                        self.force(Edge::new(a, b), &ba, &backward)?;
                        progress = true;
                        break;
                    }
                    _ => {}
                }
            }
            if !progress {
                return Ok(Saturation::Stuck);
            }
        }
    }

    /// Backtracking over the open pairs: the first open pair is tried in
    /// both orders, each followed by a recursive call. `Stuck` only on
    /// interruption.
    fn decide(&mut self) -> Result<Saturation, EngineError> {
        if self.graphs.has_violations() {
            return Ok(Saturation::Violated(self.violation_reasons()?));
        }
        let Some(&(a, b)) = self.graphs.unresolved_pairs().first() else {
            return Ok(Saturation::Consistent);
        };
        if self.interrupted() {
            return Ok(Saturation::Stuck);
        }
        let forward = self.coherence_literal(a, b);
        let backward = self.coherence_literal(b, a);
        let ab = match self.under_guess(a, b, Self::decide)? {
            Saturation::Violated(ab) => ab,
            decided => return Ok(decided),
        };
        if let Some(reasons) = independent(&ab, &forward) {
            return Ok(Saturation::Violated(reasons));
        }
        let ba = match self.under_guess(b, a, Self::decide)? {
            Saturation::Violated(ba) => ba,
            decided => return Ok(decided),
        };
        if let Some(reasons) = independent(&ba, &backward) {
            return Ok(Saturation::Violated(reasons));
        }
        Ok(Saturation::Violated(self.resolve(&ab, &forward, &ba, &backward)))
    }

    /// Tentatively orders `first` before `second` and looks `depth - 1`
    /// guesses further. The graphs are restored before returning.
    fn attempt(
        &mut self,
        first: ModelIndex,
        second: ModelIndex,
        depth: usize,
    ) -> Result<Attempt, EngineError> {
        self.under_guess(first, second, |search| search.attempt_inner(depth))
    }

    fn attempt_inner(&mut self, depth: usize) -> Result<Attempt, EngineError> {
        if self.graphs.has_violations() {
            return Ok(Attempt::Violated(self.violation_reasons()?));
        }
        if depth <= 1 {
            return Ok(if self.graphs.unresolved_pairs().is_empty() {
                Attempt::Consistent
            } else {
                Attempt::Open
            });
        }
        Ok(match self.saturate(depth - 1)? {
            Saturation::Violated(reasons) => Attempt::Violated(reasons),
            Saturation::Consistent => Attempt::Consistent,
            Saturation::Stuck => Attempt::Open,
        })
    }

    /// Runs `then` with `first -> second` guessed, then backtracks.
    fn under_guess<T>(
        &mut self,
        first: ModelIndex,
        second: ModelIndex,
        then: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let watermark = self.graphs.watermark();
        self.stats.num_guessed_coherences += 1;
        self.nesting += 1;
        debug!(first, second, nesting = self.nesting, "guessing coherence");
        let outcome = match self
            .graphs
            .add_coherence(Edge::new(first, second), CoherenceOrigin::Guessed)
        {
            Ok(_) => then(self),
            Err(e) => Err(e),
        };
        self.nesting -= 1;
        self.graphs.backtrack_to(watermark);
        outcome
    }

    fn resolve(
        &mut self,
        ab: &Dnf<CoreLiteral>,
        forward: &CoreLiteral,
        ba: &Dnf<CoreLiteral>,
        backward: &CoreLiteral,
    ) -> Dnf<CoreLiteral> {
        let start = Instant::now();
        let resolved = ab.resolve(forward, ba, backward);
        self.stats.resolution_time += start.elapsed();
        resolved
    }

    /// Adds `edge` for good: its opposite was refuted by `refutation`,
    /// every cube of which contains `guess`.
    fn force(
        &mut self,
        edge: Edge,
        refutation: &Dnf<CoreLiteral>,
        guess: &CoreLiteral,
    ) -> Result<(), EngineError> {
        let reason = refutation
            .smallest()
            .map(|cube| cube.without(guess))
            .unwrap_or_default();
        debug!(first = edge.first, second = edge.second, %reason, "forcing coherence");
        self.stats.num_forced_coherences += 1;
        self.graphs
            .add_coherence(edge, CoherenceOrigin::Forced(reason))?;
        Ok(())
    }

    /// Every violation at the top level, where the reasons become clauses.
    /// Under a guess one reason is enough to refute it.
    fn violation_reasons(&mut self) -> Result<Dnf<CoreLiteral>, EngineError> {
        let start = Instant::now();
        let mut reasoner = Reasoner::new(&*self.graphs);
        let reasons = if self.nesting == 0 {
            reasoner.all_violation_reasons()?
        } else {
            let reason = reasoner
                .some_violation_reason()?
                .ok_or(ReasoningError::EmptyViolation)?;
            Dnf::new([reason])
        };
        self.stats.violation_computation_time += start.elapsed();
        self.stats.num_computed_violations += reasons.len();
        Ok(reasons)
    }

    fn coherence_literal(&self, first: ModelIndex, second: ModelIndex) -> CoreLiteral {
        let model = self.graphs.model();
        CoreLiteral::Coherence {
            first: model.event_id(first),
            second: model.event_id(second),
        }
    }
}

/// Cubes of `refutation` that do not depend on the guess `literal`, if any.
/// Such a cube is a violation of the state before the guess.
fn independent(refutation: &Dnf<CoreLiteral>, literal: &CoreLiteral) -> Option<Dnf<CoreLiteral>> {
    let rest = refutation.independent_of(literal);
    (!rest.is_false()).then_some(rest)
}

/// Runs the search on `graphs` with at most `k` nested guesses.
pub fn k_search(graphs: &mut GraphSet<'_>, k: usize) -> Result<RefinementResult, EngineError> {
    Search::new(graphs).run(k)
}
