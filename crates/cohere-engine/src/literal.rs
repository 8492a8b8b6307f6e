use cohere_ir::{CompiledProgram, EventId};
use cohere_smt::encoder::variables::{exec_var, rf_var};
use cohere_smt::terms::SmtTerm;
use serde::Serialize;
use std::fmt;

use crate::logic::Conjunction;
use crate::model::ExecutionModel;

/// Atomic facts a reason may be made of. All literals are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoreLiteral {
    /// The event executes.
    Exec(EventId),
    /// `read` takes its value from `write`.
    ReadFrom { write: EventId, read: EventId },
    /// `first` precedes `second` in coherence. Only ever a search-time
    /// guess; resolution removes these before a clause leaves the engine.
    Coherence { first: EventId, second: EventId },
}

pub type Reason = Conjunction<CoreLiteral>;

impl CoreLiteral {
    /// A reads-from edge pointing backwards in program order.
    pub fn is_backward(&self, program: &CompiledProgram) -> bool {
        match *self {
            CoreLiteral::ReadFrom { write, read } => program.po_before(read, write),
            _ => false,
        }
    }

    pub fn is_coherence(&self) -> bool {
        matches!(self, CoreLiteral::Coherence { .. })
    }

    /// The solver variable behind the literal. Coherence has none.
    pub fn to_term(&self) -> Option<SmtTerm> {
        match *self {
            CoreLiteral::Exec(e) => Some(SmtTerm::var(exec_var(e))),
            CoreLiteral::ReadFrom { write, read } => Some(SmtTerm::var(rf_var(write, read))),
            CoreLiteral::Coherence { .. } => None,
        }
    }

    /// Whether the literal is true in `model`. Coherence literals are not
    /// part of a model and never hold.
    pub fn holds_in(&self, model: &ExecutionModel<'_>) -> bool {
        match *self {
            CoreLiteral::Exec(e) => model.is_executed(e),
            CoreLiteral::ReadFrom { write, read } => model.read_from(read) == Some(write),
            CoreLiteral::Coherence { .. } => false,
        }
    }
}

impl fmt::Display for CoreLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreLiteral::Exec(e) => write!(f, "exec(e{e})"),
            CoreLiteral::ReadFrom { write, read } => write!(f, "rf(e{write}, e{read})"),
            CoreLiteral::Coherence { first, second } => write!(f, "co(e{first}, e{second})"),
        }
    }
}

/// The blocking clause for a reason: at least one literal must be false.
pub fn blocking_clause(reason: &Reason) -> Option<SmtTerm> {
    let negated = reason
        .literals()
        .iter()
        .map(|l| l.to_term().map(SmtTerm::not))
        .collect::<Option<Vec<_>>>()?;
    Some(SmtTerm::or(negated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohere_ir::{Instruction, Program, ValueExpr};

    #[test]
    fn display_and_terms() {
        let rf = CoreLiteral::ReadFrom { write: 1, read: 4 };
        assert_eq!(rf.to_string(), "rf(e1, e4)");
        assert_eq!(rf.to_term(), Some(SmtTerm::var("rf_1_4")));
        let co = CoreLiteral::Coherence {
            first: 1,
            second: 2,
        };
        assert_eq!(co.to_term(), None);
        assert!(co.is_coherence());
    }

    #[test]
    fn clause_negates_every_literal() {
        let reason = Reason::new([CoreLiteral::Exec(3), CoreLiteral::ReadFrom { write: 0, read: 3 }]);
        let clause = blocking_clause(&reason);
        assert_eq!(
            clause,
            Some(SmtTerm::or(vec![
                SmtTerm::var("exec_3").not(),
                SmtTerm::var("rf_0_3").not(),
            ]))
        );
        let with_guess = reason.and(&Reason::singleton(CoreLiteral::Coherence {
            first: 1,
            second: 2,
        }));
        assert_eq!(blocking_clause(&with_guess), None);
    }

    #[test]
    fn backward_reads_from() -> Result<(), Box<dyn std::error::Error>> {
        // e0 init x, e1 load, e2 store
        let program = Program::new("lb")
            .with_location("x", 0)
            .with_thread(vec![
                Instruction::load("r", "x"),
                Instruction::store("x", ValueExpr::constant(1)),
            ])
            .compile()?;
        assert!(CoreLiteral::ReadFrom { write: 2, read: 1 }.is_backward(&program));
        assert!(!CoreLiteral::ReadFrom { write: 0, read: 1 }.is_backward(&program));
        Ok(())
    }
}
