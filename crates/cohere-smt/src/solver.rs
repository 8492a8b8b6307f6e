use std::collections::HashMap;

use crate::terms::{SmtSort, SmtTerm};

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// Variable assignments extracted after a SAT result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl Model {
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Boolean value with unassigned variables read as `false`.
    pub fn is_true(&self, name: &str) -> bool {
        self.get_bool(name).unwrap_or(false)
    }
}

/// Abstract SMT solver interface.
///
/// Every call blocks until the solver answers. Implementations are expected
/// to honour their own timeout and to report it as [`SatResult::Unknown`].
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint in the current scope.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop the innermost scope, dropping its assertions.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Values of `vars` in the model of the last SAT check.
    fn get_model(&mut self, vars: &[(String, SmtSort)]) -> Result<Model, Self::Error>;

    /// Reset the solver state (assertions, scopes and declarations).
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Declare every variable of `declarations` and assert every term.
    fn load(
        &mut self,
        declarations: &[(String, SmtSort)],
        assertions: &[SmtTerm],
    ) -> Result<(), Self::Error> {
        for (name, sort) in declarations {
            self.declare_var(name, *sort)?;
        }
        for term in assertions {
            self.assert(term)?;
        }
        Ok(())
    }
}
