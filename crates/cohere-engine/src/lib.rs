#![doc = include_str!("../README.md")]

//! Cohere refinement engine.
//!
//! This crate checks candidate executions against a memory model: event
//! graphs for every relation, incremental propagation with stamp-based
//! backtracking, bounded search for a coherence order, explanation of
//! violations as conjunctions of solver literals, and the solver loop that
//! turns those explanations into blocking clauses.

pub mod axiom;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod literal;
pub mod logic;
pub mod model;
pub mod reasoning;
pub mod result;
pub mod search;
pub mod stats;
pub mod task;
pub mod timeline;
mod timeout;

pub use config::{InitialApproximation, RefinementConfig};
pub use driver::{
    CollectingDiagnostics, Diagnostics, NoDiagnostics, RefinementDriver, ShutdownSignal,
};
pub use error::{EngineError, ReasoningError};
pub use graph::{CoherenceOrigin, Edge, GraphSet};
pub use literal::{blocking_clause, CoreLiteral, Reason};
pub use logic::{Conjunction, Dnf};
pub use model::ExecutionModel;
pub use result::{ReadsFromWitness, Verdict, VerificationReport, Witness};
pub use search::{k_search, RefinementResult, SearchState};
pub use stats::{RefinementStats, RefinementSummary};
pub use task::VerificationTask;
