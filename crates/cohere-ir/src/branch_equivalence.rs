//! Branch equivalence: events that execute under exactly the same conditions.
//!
//! Two events of a thread are equivalent when one dominates the other and is
//! post-dominated by it in the (acyclic) control-flow graph. All initial
//! writes, and the entry block of every thread, always execute.

use std::collections::BTreeSet;

use crate::events::{Event, EventId, EventKind};

pub type ClassId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchClass {
    pub events: Vec<EventId>,
    pub representative: EventId,
    /// Executes in every execution.
    pub always: bool,
    /// Events of the class can execute at all.
    pub reachable: bool,
    /// Classes whose execution is implied by this one (including itself).
    pub implied: BTreeSet<ClassId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchEquivalence {
    classes: Vec<BranchClass>,
    class_of: Vec<ClassId>,
}

impl BranchEquivalence {
    pub fn compute(events: &[Event], threads: &[Vec<EventId>]) -> Self {
        let mut classes = Vec::new();
        let mut class_of = vec![usize::MAX; events.len()];

        let inits: Vec<EventId> = events.iter().filter(|e| e.is_init()).map(|e| e.id).collect();
        if let Some(&first) = inits.first() {
            let id = classes.len();
            for &e in &inits {
                class_of[e] = id;
            }
            classes.push(BranchClass {
                events: inits,
                representative: first,
                always: true,
                reachable: true,
                implied: BTreeSet::from([id]),
            });
        }

        for thread in threads {
            compute_thread(events, thread, &mut classes, &mut class_of);
        }

        Self { classes, class_of }
    }

    pub fn classes(&self) -> &[BranchClass] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn class_of(&self, event: EventId) -> ClassId {
        self.class_of[event]
    }

    pub fn class(&self, id: ClassId) -> &BranchClass {
        &self.classes[id]
    }

    pub fn representative(&self, event: EventId) -> EventId {
        self.classes[self.class_of[event]].representative
    }

    pub fn is_always_executed(&self, event: EventId) -> bool {
        self.classes[self.class_of[event]].always
    }

    pub fn is_reachable(&self, event: EventId) -> bool {
        self.classes[self.class_of[event]].reachable
    }

    /// Whether every execution of `a` also executes `b`.
    pub fn is_implied(&self, a: EventId, b: EventId) -> bool {
        let (ca, cb) = (&self.classes[self.class_of[a]], self.class_of[b]);
        !ca.reachable || self.classes[cb].always || ca.implied.contains(&cb)
    }

    /// Makes the smallest visible event of each class its representative.
    /// Classes without visible events keep their smallest event.
    pub fn assign_visible_representatives(&mut self, events: &[Event]) {
        for class in &mut self.classes {
            let visible = class
                .events
                .iter()
                .copied()
                .filter(|&e| events[e].is_visible())
                .min();
            class.representative = visible.unwrap_or(class.representative);
        }
    }
}

fn compute_thread(
    events: &[Event],
    thread: &[EventId],
    classes: &mut Vec<BranchClass>,
    class_of: &mut [ClassId],
) {
    let n = thread.len();
    if n == 0 {
        return;
    }
    let base = thread[0];
    let successors = |pos: usize| -> Vec<usize> {
        let event = &events[thread[pos]];
        let mut succ = Vec::with_capacity(2);
        match &event.kind {
            EventKind::Jump { target } => succ.push(target - base),
            EventKind::CondJump { target, .. } => {
                succ.push(pos + 1);
                succ.push(target - base);
            }
            EventKind::Bound => succ.push(n),
            _ => succ.push(pos + 1),
        }
        succ
    };

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    for pos in 0..n {
        for s in successors(pos) {
            if s < n && !preds[s].contains(&pos) {
                preds[s].push(pos);
            }
        }
    }

    let mut reachable = vec![false; n];
    reachable[0] = true;
    for pos in 1..n {
        reachable[pos] = preds[pos].iter().any(|&p| reachable[p]);
    }

    // Forward jumps make position order a topological order.
    let mut dom: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for pos in 0..n {
        if !reachable[pos] {
            continue;
        }
        let mut set: Option<BTreeSet<usize>> = None;
        for &p in preds[pos].iter().filter(|&&p| reachable[p]) {
            set = Some(match set {
                None => dom[p].clone(),
                Some(acc) => acc.intersection(&dom[p]).copied().collect(),
            });
        }
        let mut set = set.unwrap_or_default();
        set.insert(pos);
        dom[pos] = set;
    }

    let mut pdom: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for pos in (0..n).rev() {
        if !reachable[pos] {
            continue;
        }
        let mut set: Option<BTreeSet<usize>> = None;
        for s in successors(pos) {
            let succ_set = if s < n { pdom[s].clone() } else { BTreeSet::new() };
            set = Some(match set {
                None => succ_set,
                Some(acc) => acc.intersection(&succ_set).copied().collect(),
            });
        }
        let mut set = set.unwrap_or_default();
        set.insert(pos);
        pdom[pos] = set;
    }

    let mut heads: Vec<(usize, ClassId)> = Vec::new();
    for pos in 0..n {
        let id = thread[pos];
        if !reachable[pos] {
            class_of[id] = classes.len();
            classes.push(BranchClass {
                events: vec![id],
                representative: id,
                always: false,
                reachable: false,
                implied: BTreeSet::new(),
            });
            continue;
        }
        let existing = heads
            .iter()
            .find(|&&(head, _)| dom[pos].contains(&head) && pdom[head].contains(&pos))
            .map(|&(_, class)| class);
        match existing {
            Some(class) => {
                class_of[id] = class;
                classes[class].events.push(id);
            }
            None => {
                let class = classes.len();
                class_of[id] = class;
                heads.push((pos, class));
                classes.push(BranchClass {
                    events: vec![id],
                    representative: id,
                    always: pos == 0,
                    reachable: true,
                    implied: BTreeSet::new(),
                });
            }
        }
    }

    for pos in (0..n).filter(|&p| reachable[p]) {
        let class = class_of[thread[pos]];
        let implied: Vec<ClassId> = dom[pos].iter().map(|&d| class_of[thread[d]]).collect();
        classes[class].implied.extend(implied);
    }
}
