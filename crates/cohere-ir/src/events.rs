//! Compiled event form of a [`Program`].
//!
//! Every instruction becomes one event (RMWs become an exclusive load/store
//! pair). Initial writes get the lowest ids, one per location, followed by the
//! events of each thread in program order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::branch_equivalence::BranchEquivalence;
use crate::program::{
    Assertion, Condition, Instruction, LocationId, MemoryTag, Program, ProgramError, RmwOp,
    ThreadId, ValueExpr,
};

/// Dense event identifier (index into [`CompiledProgram::events`]).
pub type EventId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Init { location: LocationId, value: i64 },
    Load { location: LocationId, reg: String },
    Store { location: LocationId, value: ValueExpr },
    Fence { name: String },
    Local { reg: String, value: ValueExpr },
    Label { name: String },
    Jump { target: EventId },
    CondJump { cond: Condition, target: EventId },
    Bound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    /// `None` for initial writes.
    pub thread: Option<ThreadId>,
    pub po_index: usize,
    pub kind: EventKind,
    pub tag: MemoryTag,
    /// Set on both halves of a lowered RMW.
    pub exclusive: bool,
}

impl Event {
    /// Visible events take part in memory-model relations.
    pub fn is_visible(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Init { .. }
                | EventKind::Load { .. }
                | EventKind::Store { .. }
                | EventKind::Fence { .. }
        )
    }

    pub fn is_init(&self) -> bool {
        matches!(self.kind, EventKind::Init { .. })
    }

    pub fn is_read(&self) -> bool {
        matches!(self.kind, EventKind::Load { .. })
    }

    pub fn is_write(&self) -> bool {
        matches!(self.kind, EventKind::Init { .. } | EventKind::Store { .. })
    }

    pub fn is_memory(&self) -> bool {
        self.is_read() || self.is_write()
    }

    pub fn is_fence(&self) -> bool {
        matches!(self.kind, EventKind::Fence { .. })
    }

    pub fn fence_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Fence { name } => Some(name),
            _ => None,
        }
    }

    pub fn location(&self) -> Option<LocationId> {
        match self.kind {
            EventKind::Init { location, .. }
            | EventKind::Load { location, .. }
            | EventKind::Store { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Register written by this event, if any.
    pub fn defined_register(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Load { reg, .. } | EventKind::Local { reg, .. } => Some(reg),
            _ => None,
        }
    }

    pub fn jump_target(&self) -> Option<EventId> {
        match self.kind {
            EventKind::Jump { target } | EventKind::CondJump { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Whether control can continue with the next event of the thread.
    pub fn falls_through(&self) -> bool {
        !matches!(self.kind, EventKind::Jump { .. } | EventKind::Bound)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.thread {
            Some(t) => write!(f, "e{}@T{}:", self.id, t)?,
            None => write!(f, "e{}@init:", self.id)?,
        }
        match &self.kind {
            EventKind::Init { location, value } => write!(f, "W(loc{location}={value})"),
            EventKind::Load { location, reg } => write!(f, "{reg}=R(loc{location})"),
            EventKind::Store { location, value } => write!(f, "W(loc{location}={value})"),
            EventKind::Fence { name } => write!(f, "F({name})"),
            EventKind::Local { reg, value } => write!(f, "{reg}={value}"),
            EventKind::Label { name } => write!(f, "{name}:"),
            EventKind::Jump { target } => write!(f, "goto e{target}"),
            EventKind::CondJump { cond, target } => write!(f, "if {cond} goto e{target}"),
            EventKind::Bound => write!(f, "bound"),
        }?;
        if self.tag != MemoryTag::Relaxed {
            write!(f, "[{}]", self.tag)?;
        }
        Ok(())
    }
}

/// A program lowered to events, together with its static dependencies.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub name: String,
    pub events: Vec<Event>,
    pub location_names: Vec<String>,
    /// Initial write of each location, indexed by `LocationId`.
    pub init_events: Vec<EventId>,
    /// Events of each thread in program order.
    pub threads: Vec<Vec<EventId>>,
    pub assertion: Assertion,
    /// Exclusive (load, store) pairs produced by RMW lowering.
    pub rmw: Vec<(EventId, EventId)>,
    /// (load, store) pairs where the stored value depends on the loaded one.
    pub data_deps: Vec<(EventId, EventId)>,
    /// (load, event) pairs where the event is guarded by a branch on the load.
    pub ctrl_deps: Vec<(EventId, EventId)>,
    pub branch_equivalence: BranchEquivalence,
}

enum PendingKind {
    Ready(EventKind),
    Jump(String),
    CondJump(Condition, String),
}

struct Pending {
    kind: PendingKind,
    tag: MemoryTag,
    exclusive: bool,
}

impl Pending {
    fn ready(kind: EventKind) -> Self {
        Self {
            kind: PendingKind::Ready(kind),
            tag: MemoryTag::Relaxed,
            exclusive: false,
        }
    }

    fn memory(kind: EventKind, tag: MemoryTag, exclusive: bool) -> Self {
        Self {
            kind: PendingKind::Ready(kind),
            tag,
            exclusive,
        }
    }
}

type DefState = BTreeMap<String, BTreeSet<EventId>>;

impl CompiledProgram {
    pub fn from_program(program: &Program) -> Result<Self, ProgramError> {
        program.validate()?;

        let mut events = Vec::new();
        let mut init_events = Vec::new();
        for (location, loc) in program.locations.iter().enumerate() {
            let id = events.len();
            events.push(Event {
                id,
                thread: None,
                po_index: 0,
                kind: EventKind::Init {
                    location,
                    value: loc.init,
                },
                tag: MemoryTag::Relaxed,
                exclusive: false,
            });
            init_events.push(id);
        }

        let mut threads = Vec::with_capacity(program.threads.len());
        let mut rmw = Vec::new();
        let mut cas_labels = 0usize;
        for (tid, thread) in program.threads.iter().enumerate() {
            let pending = lower_thread(program, tid, &thread.instructions, &mut cas_labels)?;
            let base = events.len();

            let mut labels: HashMap<&str, usize> = HashMap::new();
            for (pos, p) in pending.iter().enumerate() {
                if let PendingKind::Ready(EventKind::Label { name }) = &p.kind {
                    if labels.insert(name.as_str(), pos).is_some() {
                        return Err(ProgramError::DuplicateLabel {
                            thread: tid,
                            label: name.clone(),
                        });
                    }
                }
            }
            let resolve = |pos: usize, label: &str| -> Result<EventId, ProgramError> {
                match labels.get(label) {
                    None => Err(ProgramError::UnknownLabel {
                        thread: tid,
                        label: label.to_string(),
                    }),
                    Some(&target) if target <= pos => Err(ProgramError::BackwardJump {
                        thread: tid,
                        label: label.to_string(),
                    }),
                    Some(&target) => Ok(base + target),
                }
            };

            let mut ids = Vec::with_capacity(pending.len());
            for (pos, p) in pending.iter().enumerate() {
                let kind = match &p.kind {
                    PendingKind::Ready(kind) => kind.clone(),
                    PendingKind::Jump(label) => EventKind::Jump {
                        target: resolve(pos, label)?,
                    },
                    PendingKind::CondJump(cond, label) => EventKind::CondJump {
                        cond: cond.clone(),
                        target: resolve(pos, label)?,
                    },
                };
                let id = base + pos;
                events.push(Event {
                    id,
                    thread: Some(tid),
                    po_index: pos,
                    kind,
                    tag: p.tag,
                    exclusive: p.exclusive,
                });
                ids.push(id);
            }
            for pair in ids.windows(2) {
                let (a, b) = (&events[pair[0]], &events[pair[1]]);
                if a.exclusive && a.is_read() && b.exclusive && b.is_write() {
                    rmw.push((a.id, b.id));
                }
            }
            // CAS lowering puts a branch between the two halves.
            for quad in ids.windows(3) {
                let (a, b, c) = (&events[quad[0]], &events[quad[1]], &events[quad[2]]);
                if a.exclusive
                    && a.is_read()
                    && matches!(b.kind, EventKind::CondJump { .. })
                    && c.exclusive
                    && c.is_write()
                {
                    rmw.push((a.id, c.id));
                }
            }
            threads.push(ids);
        }
        rmw.sort_unstable();

        let branch_equivalence = BranchEquivalence::compute(&events, &threads);
        let (data_deps, ctrl_deps) = dependencies(&events, &threads, &branch_equivalence);

        Ok(Self {
            name: program.name.clone(),
            events,
            location_names: program.locations.iter().map(|l| l.name.clone()).collect(),
            init_events,
            threads,
            assertion: program.assertion.clone(),
            rmw,
            data_deps,
            ctrl_deps,
            branch_equivalence,
        })
    }

    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id]
    }

    pub fn num_locations(&self) -> usize {
        self.location_names.len()
    }

    pub fn visible_events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_visible())
    }

    /// `Bound` events, i.e. the points where loop unrolling stopped.
    pub fn bound_events(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Bound))
    }

    /// Registers defined anywhere in `thread`.
    pub fn thread_registers(&self, thread: ThreadId) -> BTreeSet<String> {
        self.threads
            .get(thread)
            .into_iter()
            .flatten()
            .filter_map(|&id| self.events[id].defined_register())
            .map(str::to_string)
            .collect()
    }

    /// `a` precedes `b` in the program order of the same thread.
    pub fn po_before(&self, a: EventId, b: EventId) -> bool {
        let (ea, eb) = (&self.events[a], &self.events[b]);
        ea.thread.is_some() && ea.thread == eb.thread && ea.po_index < eb.po_index
    }
}

fn lower_thread(
    program: &Program,
    tid: ThreadId,
    instructions: &[Instruction],
    cas_labels: &mut usize,
) -> Result<Vec<Pending>, ProgramError> {
    let location = |name: &str| {
        program
            .location_id(name)
            .ok_or_else(|| ProgramError::UnknownLocation {
                thread: tid,
                location: name.to_string(),
            })
    };

    let mut out = Vec::with_capacity(instructions.len());
    for inst in instructions {
        match inst {
            Instruction::Load { reg, location: loc, tag } => out.push(Pending::memory(
                EventKind::Load {
                    location: location(loc)?,
                    reg: reg.clone(),
                },
                *tag,
                false,
            )),
            Instruction::Store {
                location: loc,
                value,
                tag,
            } => out.push(Pending::memory(
                EventKind::Store {
                    location: location(loc)?,
                    value: value.clone(),
                },
                *tag,
                false,
            )),
            Instruction::Rmw {
                reg,
                location: loc,
                op,
                tag,
            } => {
                let loc = location(loc)?;
                let load = EventKind::Load {
                    location: loc,
                    reg: reg.clone(),
                };
                match op {
                    RmwOp::Exchange { value } => {
                        out.push(Pending::memory(load, *tag, true));
                        out.push(Pending::memory(
                            EventKind::Store {
                                location: loc,
                                value: value.clone(),
                            },
                            *tag,
                            true,
                        ));
                    }
                    RmwOp::FetchAdd { value } => {
                        out.push(Pending::memory(load, *tag, true));
                        out.push(Pending::memory(
                            EventKind::Store {
                                location: loc,
                                value: ValueExpr::reg(reg.clone()).add(value.clone()),
                            },
                            *tag,
                            true,
                        ));
                    }
                    RmwOp::CompareExchange { expected, desired } => {
                        let label = format!("__cas_{}", *cas_labels);
                        *cas_labels += 1;
                        out.push(Pending::memory(load, *tag, true));
                        out.push(Pending {
                            kind: PendingKind::CondJump(
                                Condition::ne(ValueExpr::reg(reg.clone()), expected.clone()),
                                label.clone(),
                            ),
                            tag: MemoryTag::Relaxed,
                            exclusive: false,
                        });
                        out.push(Pending::memory(
                            EventKind::Store {
                                location: loc,
                                value: desired.clone(),
                            },
                            *tag,
                            true,
                        ));
                        out.push(Pending::ready(EventKind::Label { name: label }));
                    }
                }
            }
            Instruction::Fence { name, tag } => out.push(Pending::memory(
                EventKind::Fence { name: name.clone() },
                *tag,
                false,
            )),
            Instruction::Local { reg, value } => out.push(Pending::ready(EventKind::Local {
                reg: reg.clone(),
                value: value.clone(),
            })),
            Instruction::Label { name } => {
                out.push(Pending::ready(EventKind::Label { name: name.clone() }))
            }
            Instruction::Jump { target } => out.push(Pending {
                kind: PendingKind::Jump(target.clone()),
                tag: MemoryTag::Relaxed,
                exclusive: false,
            }),
            Instruction::CondJump { cond, target } => out.push(Pending {
                kind: PendingKind::CondJump(cond.clone(), target.clone()),
                tag: MemoryTag::Relaxed,
                exclusive: false,
            }),
            Instruction::Bound => out.push(Pending::ready(EventKind::Bound)),
        }
    }
    Ok(out)
}

/// Static data and control dependencies.
///
/// A dependency from load `l` to event `e` is only recorded when it holds in
/// every execution in which both `l` and `e` execute: a register counts as
/// depending on `l` only if `l` is its sole reaching definition, possibly
/// through a chain of local assignments.
fn dependencies(
    events: &[Event],
    threads: &[Vec<EventId>],
    branches: &BranchEquivalence,
) -> (Vec<(EventId, EventId)>, Vec<(EventId, EventId)>) {
    let mut data = BTreeSet::new();
    let mut ctrl = BTreeSet::new();

    for thread in threads {
        let states = reaching_definitions(events, thread);
        let mut sources: HashMap<EventId, BTreeSet<EventId>> = HashMap::new();

        let expr_sources =
            |state: &DefState, regs: BTreeSet<String>, sources: &HashMap<EventId, BTreeSet<EventId>>| {
                let mut out = BTreeSet::new();
                for reg in regs {
                    if let Some(defs) = state.get(&reg) {
                        if defs.len() == 1 {
                            if let Some(srcs) = defs.iter().next().and_then(|d| sources.get(d)) {
                                out.extend(srcs.iter().copied());
                            }
                        }
                    }
                }
                out
            };

        for (pos, &id) in thread.iter().enumerate() {
            let Some(state) = &states[pos] else {
                continue;
            };
            match &events[id].kind {
                EventKind::Load { .. } => {
                    sources.insert(id, BTreeSet::from([id]));
                }
                EventKind::Local { value, .. } => {
                    let srcs = expr_sources(state, value.registers(), &sources);
                    sources.insert(id, srcs);
                }
                EventKind::Store { value, .. } => {
                    for src in expr_sources(state, value.registers(), &sources) {
                        data.insert((src, id));
                    }
                }
                EventKind::CondJump { cond, .. } => {
                    let srcs = expr_sources(state, cond.registers(), &sources);
                    if srcs.is_empty() {
                        continue;
                    }
                    for (later_pos, &later) in thread.iter().enumerate().skip(pos + 1) {
                        if states[later_pos].is_none() || !events[later].is_visible() {
                            continue;
                        }
                        if branches.is_implied(later, id) {
                            for &src in &srcs {
                                ctrl.insert((src, later));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    (data.into_iter().collect(), ctrl.into_iter().collect())
}

/// May-reaching register definitions at the entry of each event, `None` for
/// unreachable events. Jumps only go forward, so one pass in program order
/// visits every predecessor first.
fn reaching_definitions(events: &[Event], thread: &[EventId]) -> Vec<Option<DefState>> {
    let mut incoming: HashMap<EventId, Vec<usize>> = HashMap::new();
    for (pos, &id) in thread.iter().enumerate() {
        if let Some(target) = events[id].jump_target() {
            incoming.entry(target).or_default().push(pos);
        }
    }

    let mut entry_states: Vec<Option<DefState>> = Vec::with_capacity(thread.len());
    let mut exit_states: Vec<Option<DefState>> = Vec::with_capacity(thread.len());
    for (pos, &id) in thread.iter().enumerate() {
        let mut preds = Vec::new();
        if pos > 0 && events[thread[pos - 1]].falls_through() {
            preds.push(pos - 1);
        }
        preds.extend(incoming.get(&id).into_iter().flatten().copied());

        let entry = if pos == 0 {
            Some(DefState::new())
        } else {
            let mut merged: Option<DefState> = None;
            for pred in preds {
                if let Some(state) = &exit_states[pred] {
                    let acc = merged.get_or_insert_with(DefState::new);
                    for (reg, defs) in state {
                        acc.entry(reg.clone()).or_default().extend(defs.iter().copied());
                    }
                }
            }
            merged
        };

        let exit = entry.as_ref().map(|state| {
            let mut state = state.clone();
            if let Some(reg) = events[id].defined_register() {
                state.insert(reg.to_string(), BTreeSet::from([id]));
            }
            state
        });
        entry_states.push(entry);
        exit_states.push(exit);
    }
    entry_states
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Instruction, Program, ValueExpr};

    fn message_passing_with_dependency() -> Program {
        Program::new("mp-dep")
            .with_location("x", 0)
            .with_location("y", 0)
            .with_thread(vec![
                Instruction::load("r1", "x"),
                Instruction::Local {
                    reg: "r2".into(),
                    value: ValueExpr::reg("r1").add(ValueExpr::constant(1)),
                },
                Instruction::store("y", ValueExpr::reg("r2")),
                Instruction::cond_jump(
                    Condition::eq(ValueExpr::reg("r1"), ValueExpr::constant(0)),
                    "skip",
                ),
                Instruction::store("x", ValueExpr::constant(2)),
                Instruction::label("skip"),
                Instruction::store("x", ValueExpr::constant(3)),
            ])
    }

    #[test]
    fn init_events_come_first() {
        let compiled = message_passing_with_dependency().compile().expect("compiles");
        assert_eq!(compiled.init_events, vec![0, 1]);
        assert!(compiled.events[0].is_init() && compiled.events[1].is_init());
        assert_eq!(compiled.threads[0].first(), Some(&2));
        assert_eq!(compiled.event(2).po_index, 0);
    }

    #[test]
    fn data_dependency_flows_through_locals() {
        let compiled = message_passing_with_dependency().compile().expect("compiles");
        // load r1 = e2, store y = e4
        assert_eq!(compiled.data_deps, vec![(2, 4)]);
    }

    #[test]
    fn control_dependency_only_for_dominated_events() {
        let compiled = message_passing_with_dependency().compile().expect("compiles");
        // cond jump = e5, guarded store = e6, label = e7, store after join = e8
        assert!(compiled.ctrl_deps.contains(&(2, 6)));
        assert!(compiled.ctrl_deps.contains(&(2, 8)));
        assert!(!compiled.ctrl_deps.iter().any(|&(_, e)| e == 7));
    }

    #[test]
    fn redefined_register_breaks_dependency() {
        let program = Program::new("kill")
            .with_location("x", 0)
            .with_thread(vec![
                Instruction::load("r1", "x"),
                Instruction::cond_jump(Condition::True, "join"),
                Instruction::Local {
                    reg: "r1".into(),
                    value: ValueExpr::constant(5),
                },
                Instruction::label("join"),
                Instruction::store("x", ValueExpr::reg("r1")),
            ]);
        let compiled = program.compile().expect("compiles");
        assert!(compiled.data_deps.is_empty());
    }

    #[test]
    fn rmw_lowering_produces_exclusive_pair() {
        let program = Program::new("rmw").with_location("x", 0).with_thread(vec![
            Instruction::Rmw {
                reg: "r".into(),
                location: "x".into(),
                op: RmwOp::FetchAdd {
                    value: ValueExpr::constant(1),
                },
                tag: MemoryTag::AcqRel,
            },
            Instruction::Rmw {
                reg: "s".into(),
                location: "x".into(),
                op: RmwOp::CompareExchange {
                    expected: ValueExpr::constant(1),
                    desired: ValueExpr::constant(7),
                },
                tag: MemoryTag::SeqCst,
            },
        ]);
        let compiled = program.compile().expect("compiles");
        assert_eq!(compiled.rmw, vec![(1, 2), (3, 5)]);
        assert!(compiled.events[1].exclusive && compiled.events[2].exclusive);
        assert!(!compiled.events[4].exclusive);
        assert_eq!(compiled.events[4].jump_target(), Some(6));
        assert!(compiled.data_deps.contains(&(1, 2)));
    }

    #[test]
    fn backward_jumps_are_rejected() {
        let program = Program::new("loop").with_thread(vec![
            Instruction::label("top"),
            Instruction::Jump {
                target: "top".into(),
            },
        ]);
        assert!(matches!(
            program.compile(),
            Err(ProgramError::BackwardJump { .. })
        ));
    }

    #[test]
    fn unknown_labels_and_locations_are_rejected() {
        let missing_label = Program::new("l").with_thread(vec![Instruction::Jump {
            target: "nowhere".into(),
        }]);
        assert!(matches!(
            missing_label.compile(),
            Err(ProgramError::UnknownLabel { .. })
        ));

        let missing_location = Program::new("x").with_thread(vec![Instruction::load("r", "z")]);
        assert!(matches!(
            missing_location.compile(),
            Err(ProgramError::UnknownLocation { .. })
        ));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let program = Program::new("dup").with_thread(vec![
            Instruction::label("a"),
            Instruction::label("a"),
        ]);
        assert!(matches!(
            program.compile(),
            Err(ProgramError::DuplicateLabel { .. })
        ));
    }
}
