//! Program encoding.
//!
//! The encoding covers control flow, register data flow and the reads-from
//! choice. It deliberately says nothing about coherence or any derived
//! relation of the memory model: every model of the encoding is a candidate
//! execution that the refinement engine still has to check.

pub mod variables;

use std::collections::BTreeMap;
use tracing::debug;

use cohere_ir::{
    CompiledProgram, Condition, EventId, EventKind, ThreadId, ValueExpr,
};

use crate::terms::{SmtSort, SmtTerm};
use variables::{clock_var, exec_var, rf_var, val_var};

/// Variables and assertions produced for one program.
#[derive(Debug, Clone, Default)]
pub struct ProgramEncoding {
    /// Variable declarations: (name, sort).
    pub declarations: Vec<(String, SmtSort)>,
    /// Assertions (constraints).
    pub assertions: Vec<SmtTerm>,
    /// Variables whose values make up an execution.
    pub model_vars: Vec<(String, SmtSort)>,
    /// Candidate (write, read) pairs of the reads-from relation.
    pub rf_candidates: Vec<(EventId, EventId)>,
}

impl ProgramEncoding {
    fn declare(&mut self, name: String, sort: SmtSort) {
        self.model_vars.push((name.clone(), sort));
        self.declarations.push((name, sort));
    }

    fn declare_internal(&mut self, name: String, sort: SmtSort) {
        self.declarations.push((name, sort));
    }

    fn assert_term(&mut self, term: SmtTerm) {
        if !term.is_true() {
            self.assertions.push(term);
        }
    }
}

/// Where register names are resolved.
enum Scope<'a> {
    /// Inside a thread, just before the event at `pos`.
    Thread {
        program: &'a CompiledProgram,
        thread: &'a [EventId],
        pos: usize,
    },
    /// After all threads finished (assertions).
    Final { program: &'a CompiledProgram },
}

/// Value of `reg` given the definitions in `defs` (program order): the
/// latest executed one wins, 0 if none executed. Jumps only go forward, so a
/// later executed definition is also later in time.
fn register_value<'a>(
    program: &CompiledProgram,
    defs: impl Iterator<Item = &'a EventId>,
    reg: &str,
) -> SmtTerm {
    defs.filter(|&&id| program.events[id].defined_register() == Some(reg))
        .fold(SmtTerm::int(0), |acc, &id| {
            SmtTerm::ite(SmtTerm::var(exec_var(id)), SmtTerm::var(val_var(id)), acc)
        })
}

impl Scope<'_> {
    fn register(&self, reg: &str) -> SmtTerm {
        match self {
            Scope::Thread {
                program,
                thread,
                pos,
            } => register_value(program, thread[..*pos].iter(), reg),
            Scope::Final { .. } => SmtTerm::int(0),
        }
    }

    fn final_register(&self, thread: ThreadId, reg: &str) -> SmtTerm {
        match self {
            Scope::Final { program } => match program.threads.get(thread) {
                Some(events) => register_value(program, events.iter(), reg),
                None => SmtTerm::int(0),
            },
            Scope::Thread { .. } => SmtTerm::int(0),
        }
    }

    fn value(&self, expr: &ValueExpr) -> SmtTerm {
        match expr {
            ValueExpr::Const(v) => SmtTerm::int(*v),
            ValueExpr::Reg(reg) => self.register(reg),
            ValueExpr::Final { thread, reg } => self.final_register(*thread, reg),
            ValueExpr::Add(l, r) => self.value(l).add(self.value(r)),
            ValueExpr::Sub(l, r) => self.value(l).sub(self.value(r)),
        }
    }

    fn condition(&self, cond: &Condition) -> SmtTerm {
        match cond {
            Condition::True => SmtTerm::bool(true),
            Condition::False => SmtTerm::bool(false),
            Condition::Eq(l, r) => self.value(l).eq(self.value(r)),
            Condition::Ne(l, r) => self.value(l).ne(self.value(r)),
            Condition::Lt(l, r) => self.value(l).lt(self.value(r)),
            Condition::Le(l, r) => self.value(l).le(self.value(r)),
            Condition::Not(inner) => self.condition(inner).not(),
            Condition::And(conds) => SmtTerm::and(conds.iter().map(|c| self.condition(c)).collect()),
            Condition::Or(conds) => SmtTerm::or(conds.iter().map(|c| self.condition(c)).collect()),
        }
    }
}

/// Encodes control flow, data flow and reads-from of `program`.
pub fn encode_program(program: &CompiledProgram) -> ProgramEncoding {
    let mut enc = ProgramEncoding::default();

    for event in &program.events {
        enc.declare(exec_var(event.id), SmtSort::Bool);
        if matches!(
            event.kind,
            EventKind::Init { .. }
                | EventKind::Load { .. }
                | EventKind::Store { .. }
                | EventKind::Local { .. }
        ) {
            enc.declare(val_var(event.id), SmtSort::Int);
        }
    }

    for &init in &program.init_events {
        enc.assert_term(SmtTerm::var(exec_var(init)));
        if let EventKind::Init { value, .. } = program.events[init].kind {
            enc.assert_term(SmtTerm::var(val_var(init)).eq(SmtTerm::int(value)));
        }
    }

    for thread in &program.threads {
        encode_thread(program, thread, &mut enc);
    }
    encode_reads_from(program, &mut enc);

    debug!(
        program = %program.name,
        declarations = enc.declarations.len(),
        assertions = enc.assertions.len(),
        rf_candidates = enc.rf_candidates.len(),
        "encoded program"
    );
    enc
}

fn encode_thread(program: &CompiledProgram, thread: &[EventId], enc: &mut ProgramEncoding) {
    let mut incoming: BTreeMap<EventId, Vec<SmtTerm>> = BTreeMap::new();
    for (pos, &id) in thread.iter().enumerate() {
        let event = &program.events[id];
        let exec = SmtTerm::var(exec_var(id));
        let scope = Scope::Thread {
            program,
            thread,
            pos,
        };

        let guard = if pos == 0 {
            SmtTerm::bool(true)
        } else {
            SmtTerm::or(incoming.remove(&id).unwrap_or_default())
        };
        enc.assert_term(exec.clone().eq(guard));

        let next = thread.get(pos + 1).copied();
        match &event.kind {
            EventKind::Jump { target } => {
                incoming.entry(*target).or_default().push(exec.clone());
            }
            EventKind::CondJump { cond, target } => {
                let taken = scope.condition(cond);
                incoming
                    .entry(*target)
                    .or_default()
                    .push(SmtTerm::and(vec![exec.clone(), taken.clone()]));
                if let Some(next) = next {
                    incoming
                        .entry(next)
                        .or_default()
                        .push(SmtTerm::and(vec![exec.clone(), taken.not()]));
                }
            }
            EventKind::Bound => {}
            _ => {
                if let Some(next) = next {
                    incoming.entry(next).or_default().push(exec.clone());
                }
            }
        }

        match &event.kind {
            EventKind::Store { value, .. } | EventKind::Local { value, .. } => {
                enc.assert_term(SmtTerm::var(val_var(id)).eq(scope.value(value)));
            }
            _ => {}
        }
    }
}

fn encode_reads_from(program: &CompiledProgram, enc: &mut ProgramEncoding) {
    let mut writes_by_location: Vec<Vec<EventId>> = vec![Vec::new(); program.num_locations()];
    for event in program.events.iter().filter(|e| e.is_write()) {
        if let Some(loc) = event.location() {
            writes_by_location[loc].push(event.id);
        }
    }

    for read in program.events.iter().filter(|e| e.is_read()) {
        let Some(loc) = read.location() else {
            continue;
        };
        let r = read.id;
        let mut choices = Vec::new();
        for &w in &writes_by_location[loc] {
            let name = rf_var(w, r);
            enc.declare(name.clone(), SmtSort::Bool);
            enc.rf_candidates.push((w, r));
            let rf = SmtTerm::var(name);
            enc.assert_term(rf.clone().implies(SmtTerm::and(vec![
                SmtTerm::var(exec_var(w)),
                SmtTerm::var(exec_var(r)),
                SmtTerm::var(val_var(r)).eq(SmtTerm::var(val_var(w))),
            ])));
            choices.push(rf);
        }
        for (i, a) in choices.iter().enumerate() {
            for b in &choices[i + 1..] {
                enc.assert_term(SmtTerm::or(vec![a.clone().not(), b.clone().not()]));
            }
        }
        enc.assert_term(SmtTerm::var(exec_var(r)).implies(SmtTerm::or(choices)));
    }
}

/// Holds iff the final state violates the program's assertion.
pub fn encode_assertion_violation(program: &CompiledProgram) -> SmtTerm {
    let scope = Scope::Final { program };
    scope.condition(&program.assertion.condition).not()
}

/// Holds iff no `Bound` event executes, i.e. no thread was cut short by the
/// unrolling bound.
pub fn encode_no_bound_event_exec(program: &CompiledProgram) -> SmtTerm {
    SmtTerm::and(
        program
            .bound_events()
            .map(|e| SmtTerm::var(exec_var(e.id)).not())
            .collect(),
    )
}

/// Acyclicity of `po-loc | rf` through integer clocks on memory events.
///
/// Every model allowed by a model with per-location coherence satisfies it,
/// so adding it up front only removes candidates the engine would reject.
pub fn encode_po_loc_rf_acyclicity(
    program: &CompiledProgram,
    rf_candidates: &[(EventId, EventId)],
) -> ProgramEncoding {
    let mut enc = ProgramEncoding::default();
    let memory: Vec<EventId> = program
        .events
        .iter()
        .filter(|e| e.is_memory())
        .map(|e| e.id)
        .collect();
    for &e in &memory {
        enc.declare_internal(clock_var(e), SmtSort::Int);
    }
    let clk = |e: EventId| SmtTerm::var(clock_var(e));
    let exec = |e: EventId| SmtTerm::var(exec_var(e));

    for thread in &program.threads {
        let accesses: Vec<EventId> = thread
            .iter()
            .copied()
            .filter(|&e| program.events[e].is_memory())
            .collect();
        for (i, &a) in accesses.iter().enumerate() {
            for &b in &accesses[i + 1..] {
                if program.events[a].location() == program.events[b].location() {
                    enc.assert_term(
                        SmtTerm::and(vec![exec(a), exec(b)]).implies(clk(a).lt(clk(b))),
                    );
                }
            }
        }
    }
    for &(w, r) in rf_candidates {
        enc.assert_term(SmtTerm::var(rf_var(w, r)).implies(clk(w).lt(clk(r))));
    }
    enc
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohere_ir::{Instruction, Program};

    fn store_buffering() -> CompiledProgram {
        Program::new("sb")
            .with_location("x", 0)
            .with_location("y", 0)
            .with_thread(vec![
                Instruction::store("x", ValueExpr::constant(1)),
                Instruction::load("r1", "y"),
            ])
            .with_thread(vec![
                Instruction::store("y", ValueExpr::constant(1)),
                Instruction::load("r2", "x"),
            ])
            .with_assertion(
                Condition::not(Condition::and(vec![
                    Condition::eq(ValueExpr::final_reg(0, "r1"), ValueExpr::constant(0)),
                    Condition::eq(ValueExpr::final_reg(1, "r2"), ValueExpr::constant(0)),
                ])),
                false,
            )
            .compile()
            .expect("sb compiles")
    }

    #[test]
    fn reads_get_one_candidate_per_same_location_write() {
        let program = store_buffering();
        let enc = encode_program(&program);
        // r1 (e3) may read init y (e1) or T1's store (e4); r2 (e5) reads e0 or e2.
        assert_eq!(enc.rf_candidates, vec![(1, 3), (4, 3), (0, 5), (2, 5)]);
        assert!(enc
            .model_vars
            .iter()
            .any(|(n, s)| n == "rf_4_3" && *s == SmtSort::Bool));
    }

    #[test]
    fn thread_entry_always_executes() {
        let program = store_buffering();
        let enc = encode_program(&program);
        let entry = SmtTerm::var(exec_var(2)).eq(SmtTerm::bool(true));
        assert!(enc.assertions.contains(&entry));
    }

    #[test]
    fn violation_negates_assertion() {
        let program = store_buffering();
        let violation = encode_assertion_violation(&program);
        // not(not(a && b)) folds to the conjunction itself
        assert!(matches!(violation, SmtTerm::And(ref parts) if parts.len() == 2));
    }

    #[test]
    fn trivially_true_assertion_cannot_be_violated() {
        let program = Program::new("empty")
            .with_thread(vec![])
            .compile()
            .expect("compiles");
        assert_eq!(encode_assertion_violation(&program), SmtTerm::bool(false));
        assert_eq!(encode_no_bound_event_exec(&program), SmtTerm::bool(true));
    }

    #[test]
    fn clocks_cover_memory_events_only() {
        let program = store_buffering();
        let enc = encode_program(&program);
        let approx = encode_po_loc_rf_acyclicity(&program, &enc.rf_candidates);
        assert_eq!(approx.declarations.len(), 6);
        assert!(approx.model_vars.is_empty());
        // one implication per rf candidate; SB has no same-location po pairs
        assert_eq!(approx.assertions.len(), enc.rf_candidates.len());
    }
}
