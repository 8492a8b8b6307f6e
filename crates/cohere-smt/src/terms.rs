use std::fmt;

/// SMT sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Bool,
    Int,
}

impl fmt::Display for SmtSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
        }
    }
}

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtTerm {
    Var(String),
    IntLit(i64),
    BoolLit(bool),

    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),

    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),

    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn ne(self, other: SmtTerm) -> Self {
        self.eq(other).not()
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    /// Conjunction; drops `true` operands and collapses trivial cases.
    pub fn and(terms: Vec<SmtTerm>) -> Self {
        let mut kept = Vec::with_capacity(terms.len());
        for t in terms {
            match t {
                SmtTerm::BoolLit(true) => {}
                SmtTerm::BoolLit(false) => return SmtTerm::BoolLit(false),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => SmtTerm::BoolLit(true),
            1 => kept.pop().unwrap_or(SmtTerm::BoolLit(true)),
            _ => SmtTerm::And(kept),
        }
    }

    /// Disjunction; drops `false` operands and collapses trivial cases.
    pub fn or(terms: Vec<SmtTerm>) -> Self {
        let mut kept = Vec::with_capacity(terms.len());
        for t in terms {
            match t {
                SmtTerm::BoolLit(false) => {}
                SmtTerm::BoolLit(true) => return SmtTerm::BoolLit(true),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => SmtTerm::BoolLit(false),
            1 => kept.pop().unwrap_or(SmtTerm::BoolLit(false)),
            _ => SmtTerm::Or(kept),
        }
    }

    pub fn not(self) -> Self {
        match self {
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
            SmtTerm::Not(inner) => *inner,
            other => SmtTerm::Not(Box::new(other)),
        }
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        match cond {
            SmtTerm::BoolLit(true) => then,
            SmtTerm::BoolLit(false) => els,
            cond => SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els)),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(true))
    }
}
