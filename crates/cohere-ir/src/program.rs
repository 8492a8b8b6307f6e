//! Program IR: already-unrolled threads over named shared locations.
//!
//! Loops are expected to be unrolled before a program reaches this crate:
//! jumps may only target labels that appear later in the same thread, and a
//! `Bound` instruction marks the point where unrolling stopped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::events::CompiledProgram;
use std::fmt;
use thiserror::Error;

/// A unique identifier for a thread (its index in [`Program::threads`]).
pub type ThreadId = usize;
/// A unique identifier for a shared location (its index in [`Program::locations`]).
pub type LocationId = usize;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("Invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Thread {thread}: unknown location `{location}`")]
    UnknownLocation { thread: ThreadId, location: String },
    #[error("Thread {thread}: unknown label `{label}`")]
    UnknownLabel { thread: ThreadId, label: String },
    #[error("Thread {thread}: duplicate label `{label}`")]
    DuplicateLabel { thread: ThreadId, label: String },
    #[error("Thread {thread}: jump to `{label}` goes backwards (loops must be unrolled)")]
    BackwardJump { thread: ThreadId, label: String },
    #[error("Assertion refers to unknown thread {0}")]
    UnknownThread(ThreadId),
    #[error("Thread {thread}: final-value reference used inside a thread")]
    FinalValueInThread { thread: ThreadId },
    #[error("Assertion uses thread-local register `{0}`; use a final-value reference")]
    LocalRegisterInAssertion(String),
    #[error("Thread {thread}: RMW operand reads its destination register `{reg}`")]
    RmwOperandUsesDestination { thread: ThreadId, reg: String },
    #[error("Duplicate location `{0}`")]
    DuplicateLocation(String),
}

/// Ordering annotation carried by memory accesses and fences.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTag {
    #[default]
    Relaxed,
    Acquire,
    Release,
    AcqRel,
    SeqCst,
}

impl MemoryTag {
    pub fn is_acquire(self) -> bool {
        matches!(self, MemoryTag::Acquire | MemoryTag::AcqRel | MemoryTag::SeqCst)
    }

    pub fn is_release(self) -> bool {
        matches!(self, MemoryTag::Release | MemoryTag::AcqRel | MemoryTag::SeqCst)
    }
}

impl fmt::Display for MemoryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryTag::Relaxed => write!(f, "rlx"),
            MemoryTag::Acquire => write!(f, "acq"),
            MemoryTag::Release => write!(f, "rel"),
            MemoryTag::AcqRel => write!(f, "acq_rel"),
            MemoryTag::SeqCst => write!(f, "sc"),
        }
    }
}

/// Integer-valued expression over registers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpr {
    Const(i64),
    /// Register of the enclosing thread.
    Reg(String),
    /// Final value of a register of some thread; only valid in assertions.
    Final { thread: ThreadId, reg: String },
    Add(Box<ValueExpr>, Box<ValueExpr>),
    Sub(Box<ValueExpr>, Box<ValueExpr>),
}

impl ValueExpr {
    pub fn constant(value: i64) -> Self {
        ValueExpr::Const(value)
    }

    pub fn reg(name: impl Into<String>) -> Self {
        ValueExpr::Reg(name.into())
    }

    pub fn final_reg(thread: ThreadId, reg: impl Into<String>) -> Self {
        ValueExpr::Final {
            thread,
            reg: reg.into(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: ValueExpr) -> Self {
        ValueExpr::Add(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: ValueExpr) -> Self {
        ValueExpr::Sub(Box::new(self), Box::new(other))
    }

    /// Thread-local registers read by this expression.
    pub fn registers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_registers(&mut out);
        out
    }

    fn collect_registers(&self, out: &mut BTreeSet<String>) {
        match self {
            ValueExpr::Const(_) | ValueExpr::Final { .. } => {}
            ValueExpr::Reg(name) => {
                out.insert(name.clone());
            }
            ValueExpr::Add(lhs, rhs) | ValueExpr::Sub(lhs, rhs) => {
                lhs.collect_registers(out);
                rhs.collect_registers(out);
            }
        }
    }

    fn has_final(&self) -> bool {
        match self {
            ValueExpr::Const(_) | ValueExpr::Reg(_) => false,
            ValueExpr::Final { .. } => true,
            ValueExpr::Add(lhs, rhs) | ValueExpr::Sub(lhs, rhs) => lhs.has_final() || rhs.has_final(),
        }
    }

    fn check_assertion_refs(&self, num_threads: usize) -> Result<(), ProgramError> {
        match self {
            ValueExpr::Const(_) => Ok(()),
            ValueExpr::Reg(name) => Err(ProgramError::LocalRegisterInAssertion(name.clone())),
            ValueExpr::Final { thread, .. } if *thread >= num_threads => {
                Err(ProgramError::UnknownThread(*thread))
            }
            ValueExpr::Final { .. } => Ok(()),
            ValueExpr::Add(lhs, rhs) | ValueExpr::Sub(lhs, rhs) => {
                lhs.check_assertion_refs(num_threads)?;
                rhs.check_assertion_refs(num_threads)
            }
        }
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueExpr::Const(v) => write!(f, "{v}"),
            ValueExpr::Reg(name) => write!(f, "{name}"),
            ValueExpr::Final { thread, reg } => write!(f, "{thread}:{reg}"),
            ValueExpr::Add(lhs, rhs) => write!(f, "({lhs} + {rhs})"),
            ValueExpr::Sub(lhs, rhs) => write!(f, "({lhs} - {rhs})"),
        }
    }
}

/// Boolean condition over [`ValueExpr`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    True,
    False,
    Eq(ValueExpr, ValueExpr),
    Ne(ValueExpr, ValueExpr),
    Lt(ValueExpr, ValueExpr),
    Le(ValueExpr, ValueExpr),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn eq(lhs: ValueExpr, rhs: ValueExpr) -> Self {
        Condition::Eq(lhs, rhs)
    }

    pub fn ne(lhs: ValueExpr, rhs: ValueExpr) -> Self {
        Condition::Ne(lhs, rhs)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn and(conds: Vec<Condition>) -> Self {
        Condition::And(conds)
    }

    pub fn or(conds: Vec<Condition>) -> Self {
        Condition::Or(conds)
    }

    /// True iff the condition is syntactically the constant `true`.
    pub fn is_trivially_true(&self) -> bool {
        match self {
            Condition::True => true,
            Condition::And(conds) => conds.iter().all(Condition::is_trivially_true),
            Condition::Not(inner) => matches!(**inner, Condition::False),
            _ => false,
        }
    }

    pub fn registers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit_exprs(&mut |e| out.extend(e.registers()));
        out
    }

    fn visit_exprs(&self, f: &mut impl FnMut(&ValueExpr)) {
        match self {
            Condition::True | Condition::False => {}
            Condition::Eq(l, r) | Condition::Ne(l, r) | Condition::Lt(l, r) | Condition::Le(l, r) => {
                f(l);
                f(r);
            }
            Condition::Not(inner) => inner.visit_exprs(f),
            Condition::And(conds) | Condition::Or(conds) => {
                for c in conds {
                    c.visit_exprs(f);
                }
            }
        }
    }

    fn has_final(&self) -> bool {
        let mut found = false;
        self.visit_exprs(&mut |e| found |= e.has_final());
        found
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::True => write!(f, "true"),
            Condition::False => write!(f, "false"),
            Condition::Eq(l, r) => write!(f, "{l} == {r}"),
            Condition::Ne(l, r) => write!(f, "{l} != {r}"),
            Condition::Lt(l, r) => write!(f, "{l} < {r}"),
            Condition::Le(l, r) => write!(f, "{l} <= {r}"),
            Condition::Not(inner) => write!(f, "!({inner})"),
            Condition::And(conds) => write_joined(f, conds, " && "),
            Condition::Or(conds) => write_joined(f, conds, " || "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, conds: &[Condition], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in conds.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, ")")
}

/// Read-modify-write operation applied to the value read by the RMW load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmwOp {
    Exchange { value: ValueExpr },
    FetchAdd { value: ValueExpr },
    CompareExchange { expected: ValueExpr, desired: ValueExpr },
}

impl RmwOp {
    fn registers(&self) -> BTreeSet<String> {
        match self {
            RmwOp::Exchange { value } | RmwOp::FetchAdd { value } => value.registers(),
            RmwOp::CompareExchange { expected, desired } => {
                let mut regs = expected.registers();
                regs.extend(desired.registers());
                regs
            }
        }
    }
}

/// One instruction of an unrolled thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    Load {
        reg: String,
        location: String,
        #[serde(default)]
        tag: MemoryTag,
    },
    Store {
        location: String,
        value: ValueExpr,
        #[serde(default)]
        tag: MemoryTag,
    },
    Rmw {
        reg: String,
        location: String,
        op: RmwOp,
        #[serde(default)]
        tag: MemoryTag,
    },
    Fence {
        name: String,
        #[serde(default)]
        tag: MemoryTag,
    },
    Local {
        reg: String,
        value: ValueExpr,
    },
    Label {
        name: String,
    },
    Jump {
        target: String,
    },
    CondJump {
        cond: Condition,
        target: String,
    },
    /// Marks that the unrolling bound was reached; the thread stops here.
    Bound,
}

impl Instruction {
    pub fn load(reg: impl Into<String>, location: impl Into<String>) -> Self {
        Instruction::Load {
            reg: reg.into(),
            location: location.into(),
            tag: MemoryTag::Relaxed,
        }
    }

    pub fn store(location: impl Into<String>, value: ValueExpr) -> Self {
        Instruction::Store {
            location: location.into(),
            value,
            tag: MemoryTag::Relaxed,
        }
    }

    pub fn fence(name: impl Into<String>) -> Self {
        Instruction::Fence {
            name: name.into(),
            tag: MemoryTag::Relaxed,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Instruction::Label { name: name.into() }
    }

    pub fn cond_jump(cond: Condition, target: impl Into<String>) -> Self {
        Instruction::CondJump {
            cond,
            target: target.into(),
        }
    }

    /// Returns the same instruction with its ordering tag replaced.
    pub fn tagged(mut self, new_tag: MemoryTag) -> Self {
        match &mut self {
            Instruction::Load { tag, .. }
            | Instruction::Store { tag, .. }
            | Instruction::Rmw { tag, .. }
            | Instruction::Fence { tag, .. } => *tag = new_tag,
            _ => {}
        }
        self
    }
}

/// A thread: an unrolled instruction sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub name: Option<String>,
    pub instructions: Vec<Instruction>,
}

/// A shared memory location with its initial value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub init: i64,
}

/// The safety property checked over final register values.
///
/// The verifier searches for a consistent execution whose final state
/// violates `condition`. With `inverted`, the final verdict is flipped,
/// which turns the check into a reachability question (litmus `exists`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub condition: Condition,
    #[serde(default)]
    pub inverted: bool,
}

impl Default for Assertion {
    fn default() -> Self {
        Self {
            condition: Condition::True,
            inverted: false,
        }
    }
}

/// A concurrent program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    #[serde(default)]
    pub locations: Vec<Location>,
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub assertion: Assertion,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(source: &str) -> Result<Self, ProgramError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn with_location(mut self, name: impl Into<String>, init: i64) -> Self {
        self.locations.push(Location {
            name: name.into(),
            init,
        });
        self
    }

    pub fn with_thread(mut self, instructions: Vec<Instruction>) -> Self {
        self.threads.push(Thread {
            name: None,
            instructions,
        });
        self
    }

    pub fn with_assertion(mut self, condition: Condition, inverted: bool) -> Self {
        self.assertion = Assertion {
            condition,
            inverted,
        };
        self
    }

    /// Lowers the program to events and computes its static dependencies.
    pub fn compile(&self) -> Result<CompiledProgram, ProgramError> {
        CompiledProgram::from_program(self)
    }

    pub fn location_id(&self, name: &str) -> Option<LocationId> {
        self.locations.iter().position(|l| l.name == name)
    }

    /// Structural checks that do not need the compiled form.
    pub fn validate(&self) -> Result<(), ProgramError> {
        for (i, loc) in self.locations.iter().enumerate() {
            if self.locations[..i].iter().any(|l| l.name == loc.name) {
                return Err(ProgramError::DuplicateLocation(loc.name.clone()));
            }
        }
        for (tid, thread) in self.threads.iter().enumerate() {
            for inst in &thread.instructions {
                let has_final = match inst {
                    Instruction::Store { value, .. } | Instruction::Local { value, .. } => {
                        value.has_final()
                    }
                    Instruction::CondJump { cond, .. } => cond.has_final(),
                    Instruction::Rmw { reg, op, .. } => {
                        if op.registers().contains(reg) {
                            return Err(ProgramError::RmwOperandUsesDestination {
                                thread: tid,
                                reg: reg.clone(),
                            });
                        }
                        false
                    }
                    _ => false,
                };
                if has_final {
                    return Err(ProgramError::FinalValueInThread { thread: tid });
                }
            }
        }
        let mut result = Ok(());
        self.assertion.condition.visit_exprs(&mut |e| {
            if result.is_ok() {
                result = e.check_assertion_refs(self.threads.len());
            }
        });
        result
    }
}
