use cohere_ir::{EventId, ProgramError, WmmError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Program error: {0}")]
    Program(#[from] ProgramError),
    #[error("Memory model error: {0}")]
    Wmm(#[from] WmmError),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Malformed solver model: {0}")]
    MalformedModel(String),
    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),
    #[error("Recursive relations `{group}` did not reach a fixpoint within {limit} iterations")]
    FixpointDiverged { group: String, limit: usize },
}

/// Failures while explaining a violation. All of them point at a bug in the
/// graphs or the search, never at the program under verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningError {
    #[error("Edge ({first}, {second}) of `{graph}` has no derivation from older edges")]
    UnexplainedEdge {
        graph: String,
        first: EventId,
        second: EventId,
    },
    #[error("Coherence literal co({first}, {second}) survived resolution")]
    UnresolvedCoherence { first: EventId, second: EventId },
    #[error("Reason literal `{0}` does not hold in the model it was derived from")]
    FalseLiteral(String),
    #[error("Search reported a violation without a reason")]
    EmptyViolation,
}
