#![doc = include_str!("../README.md")]

//! Cohere intermediate representation.
//!
//! This crate defines the program IR consumed by the verifier, its lowering
//! to events, the branch-equivalence analysis used to canonicalize execution
//! literals, and the relation algebra in which memory models are written.

pub mod branch_equivalence;
pub mod events;
pub mod models;
pub mod program;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod wmm;

pub use branch_equivalence::{BranchClass, BranchEquivalence, ClassId};
pub use events::{CompiledProgram, Event, EventId, EventKind};
pub use program::{
    Assertion, Condition, Instruction, Location, LocationId, MemoryTag, Program, ProgramError,
    RmwOp, Thread, ThreadId, ValueExpr,
};
pub use wmm::{
    strongly_connected_components, AxiomDef, AxiomKind, BaseRelation, EventFilter, RelationDef,
    RelationExpr, RelationId, Wmm, WmmError,
};
