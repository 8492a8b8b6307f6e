#![doc = include_str!("../README.md")]

//! SMT encoding and solver integration for weak-memory program verification.
//!
//! The encoder produces an under-approximating query: every execution of the
//! program with an arbitrary reads-from choice. The refinement engine rules
//! out the inconsistent ones by adding clauses over the encoding's variables.

pub mod backends;
pub mod encoder;
pub mod solver;
pub mod terms;
