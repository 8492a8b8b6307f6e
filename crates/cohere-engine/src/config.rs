use serde::{Deserialize, Serialize};

/// What the solver knows about the memory model before the first iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitialApproximation {
    /// Nothing: every candidate comes from the program encoding alone.
    #[default]
    Empty,
    /// Acyclicity of `po-loc | rf`, implied by per-location coherence.
    PoLocRf,
}

/// Knobs of the refinement loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Maximal number of nested coherence guesses per saturation round.
    pub k: usize,
    /// Rounds allowed for a recursive relation group to reach its fixpoint.
    pub max_fixpoint_iterations: usize,
    /// Solver calls before giving up (0 = no limit).
    pub max_iterations: usize,
    /// Wall-clock budget for the whole run (0 = no limit).
    pub timeout_secs: u64,
    pub initial_approximation: InitialApproximation,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            k: 2,
            max_fixpoint_iterations: 1000,
            max_iterations: 0,
            timeout_secs: 0,
            initial_approximation: InitialApproximation::default(),
        }
    }
}
