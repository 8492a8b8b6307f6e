use std::collections::HashMap;

use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::terms::{SmtSort, SmtTerm};

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("No model available: the last check was not SAT")]
    NoModel,
}

pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    bool_vars: HashMap<String, z3::ast::Bool>,
    last_check_sat: bool,
    params: Option<z3::Params>,
}

enum Z3Term {
    Int(z3::ast::Int),
    Bool(z3::ast::Bool),
}

impl Z3Term {
    fn into_int(self) -> Result<z3::ast::Int, Z3Error> {
        match self {
            Z3Term::Int(i) => Ok(i),
            Z3Term::Bool(_) => Err(Z3Error::Internal("Expected Int, got Bool".into())),
        }
    }

    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(Z3Error::Internal("Expected Bool, got Int".into())),
        }
    }
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            last_check_sat: false,
            params: None,
        }
    }

    /// A solver whose checks give up after `timeout_secs` (0 = no limit).
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        let mut solver = Self::new();
        if timeout_secs > 0 {
            let mut params = z3::Params::new();
            let timeout_ms = u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
            params.set_u32("timeout", timeout_ms);
            solver.solver.set_params(&params);
            solver.params = Some(params);
        }
        solver
    }

    fn translate(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => {
                let l = self.translate(lhs)?.into_int()?;
                let r = self.translate(rhs)?.into_int()?;
                Ok(Z3Term::Int(&l + &r))
            }
            SmtTerm::Sub(lhs, rhs) => {
                let l = self.translate(lhs)?.into_int()?;
                let r = self.translate(rhs)?.into_int()?;
                Ok(Z3Term::Int(&l - &r))
            }
            SmtTerm::Eq(lhs, rhs) => match (self.translate(lhs)?, self.translate(rhs)?) {
                (Z3Term::Int(l), Z3Term::Int(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                (Z3Term::Bool(l), Z3Term::Bool(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                _ => Err(Z3Error::Internal("Sort mismatch in Eq".into())),
            },
            SmtTerm::Lt(lhs, rhs) => {
                let l = self.translate(lhs)?.into_int()?;
                let r = self.translate(rhs)?.into_int()?;
                Ok(Z3Term::Bool(l.lt(&r)))
            }
            SmtTerm::Le(lhs, rhs) => {
                let l = self.translate(lhs)?.into_int()?;
                let r = self.translate(rhs)?.into_int()?;
                Ok(Z3Term::Bool(l.le(&r)))
            }
            SmtTerm::And(terms) | SmtTerm::Or(terms) => {
                let bools = terms
                    .iter()
                    .map(|t| self.translate(t).and_then(Z3Term::into_bool))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                if matches!(term, SmtTerm::And(_)) {
                    Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
                } else {
                    Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
                }
            }
            SmtTerm::Not(inner) => Ok(Z3Term::Bool(self.translate(inner)?.into_bool()?.not())),
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate(lhs)?.into_bool()?;
                let r = self.translate(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate(cond)?.into_bool()?;
                match (self.translate(then)?, self.translate(els)?) {
                    (Z3Term::Int(t), Z3Term::Int(e)) => Ok(Z3Term::Int(c.ite(&t, &e))),
                    (Z3Term::Bool(t), Z3Term::Bool(e)) => Ok(Z3Term::Bool(c.ite(&t, &e))),
                    _ => Err(Z3Error::Internal("Sort mismatch in ITE".into())),
                }
            }
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: SmtSort) -> Result<(), Z3Error> {
        match sort {
            SmtSort::Int => {
                self.int_vars
                    .insert(name.to_string(), z3::ast::Int::new_const(name));
            }
            SmtSort::Bool => {
                self.bool_vars
                    .insert(name.to_string(), z3::ast::Bool::new_const(name));
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        self.last_check_sat = false;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        let result = match self.solver.check() {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown("Z3 returned unknown".into()),
        };
        self.last_check_sat = result == SatResult::Sat;
        Ok(result)
    }

    fn get_model(&mut self, vars: &[(String, SmtSort)]) -> Result<Model, Z3Error> {
        if !self.last_check_sat {
            return Err(Z3Error::NoModel);
        }
        let z3_model = self
            .solver
            .get_model()
            .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
        let mut values = HashMap::with_capacity(vars.len());
        for (name, sort) in vars {
            let value = match sort {
                SmtSort::Int => self
                    .int_vars
                    .get(name)
                    .and_then(|v| z3_model.eval::<z3::ast::Int>(v, true))
                    .and_then(|v| v.as_i64())
                    .map(ModelValue::Int),
                SmtSort::Bool => self
                    .bool_vars
                    .get(name)
                    .and_then(|v| z3_model.eval::<z3::ast::Bool>(v, true))
                    .and_then(|v| v.as_bool())
                    .map(ModelValue::Bool),
            };
            match value {
                Some(value) => {
                    values.insert(name.clone(), value);
                }
                None => return Err(Z3Error::UnknownVariable(name.clone())),
            }
        }
        Ok(Model { values })
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset.
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.bool_vars.clear();
        self.last_check_sat = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn z3_basic_sat_and_model() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", SmtSort::Int)?;
        solver.declare_var("b", SmtSort::Bool)?;
        solver.assert(&SmtTerm::and(vec![
            SmtTerm::var("b"),
            SmtTerm::int(0).lt(SmtTerm::var("x")),
            SmtTerm::var("x").add(SmtTerm::int(1)).eq(SmtTerm::int(4)),
        ]))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        let model = solver.get_model(&[
            ("x".to_string(), SmtSort::Int),
            ("b".to_string(), SmtSort::Bool),
        ])?;
        assert_eq!(model.get_int("x"), Some(3));
        assert_eq!(model.get_bool("b"), Some(true));
        Ok(())
    }

    #[test]
    fn z3_push_pop_scopes_assertions() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("a", SmtSort::Bool)?;
        solver.assert(&SmtTerm::var("a"))?;
        solver.push()?;
        solver.assert(&SmtTerm::var("a").not())?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        assert!(matches!(
            solver.get_model(&[("a".to_string(), SmtSort::Bool)]),
            Err(Z3Error::NoModel)
        ));
        solver.pop()?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn z3_ite_over_ints() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("c", SmtSort::Bool)?;
        solver.declare_var("v", SmtSort::Int)?;
        solver.assert(&SmtTerm::var("v").eq(SmtTerm::ite(
            SmtTerm::var("c"),
            SmtTerm::int(1),
            SmtTerm::int(2),
        )))?;
        solver.assert(&SmtTerm::var("c").not())?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        let model = solver.get_model(&[("v".to_string(), SmtSort::Int)])?;
        assert_eq!(model.get_int("v"), Some(2));
        Ok(())
    }

    #[test]
    fn z3_unknown_variable_is_an_error() {
        let mut solver = Z3Solver::new();
        let result = solver.assert(&SmtTerm::var("ghost"));
        assert!(matches!(result, Err(Z3Error::UnknownVariable(_))));
    }

    #[test]
    fn z3_timeout_configuration_survives_reset() -> TestResult {
        let mut solver = Z3Solver::with_timeout_secs(2);
        assert!(solver.params.is_some());
        solver.declare_var("x", SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        solver.reset()?;
        solver.declare_var("x", SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(2)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        assert!(solver.params.is_some());
        Ok(())
    }
}
