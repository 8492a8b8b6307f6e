use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_micros() as f64 / 1000.0)
}

/// Counters and timings of one refinement call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefinementStats {
    /// Executed visible events of the candidate execution.
    pub model_size: usize,
    /// Edges across all event graphs after the search.
    pub graph_edges: usize,
    #[serde(rename = "model_construction_ms", serialize_with = "millis")]
    pub model_construction_time: Duration,
    #[serde(rename = "search_ms", serialize_with = "millis")]
    pub search_time: Duration,
    #[serde(rename = "violation_computation_ms", serialize_with = "millis")]
    pub violation_computation_time: Duration,
    #[serde(rename = "resolution_ms", serialize_with = "millis")]
    pub resolution_time: Duration,
    pub num_guessed_coherences: usize,
    pub num_forced_coherences: usize,
    pub num_computed_violations: usize,
    /// Deepest nesting of coherence guesses reached.
    pub saturation_depth: usize,
}

/// Totals over all iterations of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefinementSummary {
    pub iterations: usize,
    pub min_model_size: usize,
    pub avg_model_size: f64,
    pub max_model_size: usize,
    #[serde(rename = "model_construction_ms", serialize_with = "millis")]
    pub model_construction_time: Duration,
    #[serde(rename = "search_ms", serialize_with = "millis")]
    pub search_time: Duration,
    #[serde(rename = "violation_computation_ms", serialize_with = "millis")]
    pub violation_computation_time: Duration,
    #[serde(rename = "resolution_ms", serialize_with = "millis")]
    pub resolution_time: Duration,
    #[serde(rename = "solver_ms", serialize_with = "millis")]
    pub solver_time: Duration,
    /// Time spent in the second run that settles the unrolling bound.
    #[serde(rename = "bound_check_ms", serialize_with = "millis")]
    pub bound_check_time: Duration,
    pub num_guessed_coherences: usize,
    pub num_forced_coherences: usize,
    pub num_computed_violations: usize,
    pub max_saturation_depth: usize,
    pub num_clauses: usize,
    /// Clauses excluding a read that takes its value from a later write of
    /// its own thread.
    pub num_future_read_clauses: usize,
}

impl RefinementSummary {
    pub fn absorb(&mut self, stats: &RefinementStats) {
        self.iterations += 1;
        self.min_model_size = if self.iterations == 1 {
            stats.model_size
        } else {
            self.min_model_size.min(stats.model_size)
        };
        self.avg_model_size +=
            (stats.model_size as f64 - self.avg_model_size) / self.iterations as f64;
        self.max_model_size = self.max_model_size.max(stats.model_size);
        self.model_construction_time += stats.model_construction_time;
        self.search_time += stats.search_time;
        self.violation_computation_time += stats.violation_computation_time;
        self.resolution_time += stats.resolution_time;
        self.num_guessed_coherences += stats.num_guessed_coherences;
        self.num_forced_coherences += stats.num_forced_coherences;
        self.num_computed_violations += stats.num_computed_violations;
        self.max_saturation_depth = self.max_saturation_depth.max(stats.saturation_depth);
    }
}

impl fmt::Display for RefinementSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = |d: Duration| d.as_micros() as f64 / 1000.0;
        writeln!(f, "Iterations: {}", self.iterations)?;
        writeln!(f, "Solver time (ms): {:.1}", ms(self.solver_time))?;
        writeln!(f, "Model construction time (ms): {:.1}", ms(self.model_construction_time))?;
        if self.iterations > 0 {
            writeln!(
                f,
                "Model size (#events): min {} / avg {:.1} / max {}",
                self.min_model_size, self.avg_model_size, self.max_model_size
            )?;
        }
        writeln!(f, "Violation computation time (ms): {:.1}", ms(self.violation_computation_time))?;
        writeln!(f, "Resolution time (ms): {:.1}", ms(self.resolution_time))?;
        writeln!(f, "Search time (ms): {:.1}", ms(self.search_time))?;
        writeln!(
            f,
            "Coherence guesses: {} ({} forced)",
            self.num_guessed_coherences, self.num_forced_coherences
        )?;
        writeln!(f, "Violations: {}", self.num_computed_violations)?;
        writeln!(f, "Max saturation depth: {}", self.max_saturation_depth)?;
        writeln!(
            f,
            "Clauses: {} ({} future read)",
            self.num_clauses, self.num_future_read_clauses
        )?;
        write!(f, "Bound check time (ms): {:.1}", ms(self.bound_check_time))
    }
}
