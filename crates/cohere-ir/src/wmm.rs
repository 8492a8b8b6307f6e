//! Memory-model definitions: a small relation algebra plus axioms.
//!
//! Relations live in an arena and refer to their operands by [`RelationId`].
//! Structurally equal expressions are interned to one id, so sharing a
//! sub-relation between axioms costs nothing. Recursive definitions are built
//! with [`Wmm::declare`] followed by [`Wmm::define`].

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::events::Event;
use crate::program::MemoryTag;

pub type RelationId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WmmError {
    #[error("Relation `{0}` is declared but never defined")]
    UndefinedRelation(String),
    #[error("Relation `{relation}` refers to unknown relation id {operand}")]
    UnknownOperand {
        relation: String,
        operand: RelationId,
    },
    #[error("Unknown relation `{0}`")]
    UnknownRelation(String),
    #[error("Difference `{0}` needs a right operand decided by its two endpoints alone")]
    NonStaticDifference(String),
    #[error("Difference `{0}` is part of a recursive definition")]
    RecursiveDifference(String),
    #[error("Axiom `{axiom}` refers to unknown relation id {relation}")]
    UnknownAxiomRelation {
        axiom: String,
        relation: RelationId,
    },
}

/// Unary predicate over visible events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    Memory,
    Reads,
    Writes,
    Init,
    /// Fences, optionally restricted to one fence name.
    Fence(Option<String>),
    Acquire,
    Release,
    SeqCst,
    Exclusive,
    Union(Box<EventFilter>, Box<EventFilter>),
    Intersection(Box<EventFilter>, Box<EventFilter>),
    Difference(Box<EventFilter>, Box<EventFilter>),
}

impl EventFilter {
    pub fn fence(name: impl Into<String>) -> Self {
        EventFilter::Fence(Some(name.into()))
    }

    pub fn or(self, other: EventFilter) -> Self {
        EventFilter::Union(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: EventFilter) -> Self {
        EventFilter::Intersection(Box::new(self), Box::new(other))
    }

    pub fn minus(self, other: EventFilter) -> Self {
        EventFilter::Difference(Box::new(self), Box::new(other))
    }

    pub fn matches(&self, event: &Event) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Memory => event.is_memory(),
            EventFilter::Reads => event.is_read(),
            EventFilter::Writes => event.is_write(),
            EventFilter::Init => event.is_init(),
            EventFilter::Fence(None) => event.is_fence(),
            EventFilter::Fence(Some(name)) => event.fence_name() == Some(name.as_str()),
            EventFilter::Acquire => event.tag.is_acquire(),
            EventFilter::Release => event.tag.is_release(),
            EventFilter::SeqCst => event.tag == MemoryTag::SeqCst,
            EventFilter::Exclusive => event.exclusive,
            EventFilter::Union(a, b) => a.matches(event) || b.matches(event),
            EventFilter::Intersection(a, b) => a.matches(event) && b.matches(event),
            EventFilter::Difference(a, b) => a.matches(event) && !b.matches(event),
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::All => write!(f, "_"),
            EventFilter::Memory => write!(f, "M"),
            EventFilter::Reads => write!(f, "R"),
            EventFilter::Writes => write!(f, "W"),
            EventFilter::Init => write!(f, "IW"),
            EventFilter::Fence(None) => write!(f, "F"),
            EventFilter::Fence(Some(name)) => write!(f, "F.{name}"),
            EventFilter::Acquire => write!(f, "ACQ"),
            EventFilter::Release => write!(f, "REL"),
            EventFilter::SeqCst => write!(f, "SC"),
            EventFilter::Exclusive => write!(f, "X"),
            EventFilter::Union(a, b) => write!(f, "({a} | {b})"),
            EventFilter::Intersection(a, b) => write!(f, "({a} & {b})"),
            EventFilter::Difference(a, b) => write!(f, "({a} \\ {b})"),
        }
    }
}

/// Relations read directly off the program or the execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseRelation {
    Po,
    Loc,
    Int,
    Ext,
    Id,
    Rf,
    Co,
    Rmw,
    Data,
    Ctrl,
    Product(EventFilter, EventFilter),
    Identity(EventFilter),
}

impl BaseRelation {
    /// Static relations only depend on which events executed.
    pub fn is_static(&self) -> bool {
        !matches!(self, BaseRelation::Rf | BaseRelation::Co)
    }
}

impl fmt::Display for BaseRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseRelation::Po => write!(f, "po"),
            BaseRelation::Loc => write!(f, "loc"),
            BaseRelation::Int => write!(f, "int"),
            BaseRelation::Ext => write!(f, "ext"),
            BaseRelation::Id => write!(f, "id"),
            BaseRelation::Rf => write!(f, "rf"),
            BaseRelation::Co => write!(f, "co"),
            BaseRelation::Rmw => write!(f, "rmw"),
            BaseRelation::Data => write!(f, "data"),
            BaseRelation::Ctrl => write!(f, "ctrl"),
            BaseRelation::Product(a, b) => write!(f, "{a} * {b}"),
            BaseRelation::Identity(s) => write!(f, "[{s}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationExpr {
    Base(BaseRelation),
    Union(RelationId, RelationId),
    Intersection(RelationId, RelationId),
    /// The right operand must be static.
    Difference(RelationId, RelationId),
    Composition(RelationId, RelationId),
    Inverse(RelationId),
    TransitiveClosure(RelationId),
    /// `r | id`
    Optional(RelationId),
    /// `[domain]; r; [range]`
    Restrict {
        inner: RelationId,
        domain: EventFilter,
        range: EventFilter,
    },
}

impl RelationExpr {
    pub fn operands(&self) -> Vec<RelationId> {
        match self {
            RelationExpr::Base(_) => Vec::new(),
            RelationExpr::Union(a, b)
            | RelationExpr::Intersection(a, b)
            | RelationExpr::Difference(a, b)
            | RelationExpr::Composition(a, b) => vec![*a, *b],
            RelationExpr::Inverse(r)
            | RelationExpr::TransitiveClosure(r)
            | RelationExpr::Optional(r)
            | RelationExpr::Restrict { inner: r, .. } => vec![*r],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: Option<String>,
    /// `None` while a recursive relation is declared but not yet defined.
    pub expr: Option<RelationExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxiomKind {
    Acyclic,
    Empty,
    Irreflexive,
}

impl fmt::Display for AxiomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxiomKind::Acyclic => write!(f, "acyclic"),
            AxiomKind::Empty => write!(f, "empty"),
            AxiomKind::Irreflexive => write!(f, "irreflexive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxiomDef {
    pub kind: AxiomKind,
    pub relation: RelationId,
    pub name: String,
}

/// A memory model: relation definitions plus consistency axioms.
#[derive(Debug, Clone, Default)]
pub struct Wmm {
    name: String,
    relations: Vec<RelationDef>,
    names: IndexMap<String, RelationId>,
    axioms: Vec<AxiomDef>,
    interned: HashMap<RelationExpr, RelationId>,
}

impl Wmm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    pub fn relation(&self, id: RelationId) -> &RelationDef {
        &self.relations[id]
    }

    pub fn num_relations(&self) -> usize {
        self.relations.len()
    }

    pub fn axioms(&self) -> &[AxiomDef] {
        &self.axioms
    }

    pub fn lookup(&self, name: &str) -> Result<RelationId, WmmError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| WmmError::UnknownRelation(name.to_string()))
    }

    /// The relation's name, the base relation it denotes, or `#id`.
    pub fn display_name(&self, id: RelationId) -> String {
        match self.relations.get(id) {
            Some(RelationDef {
                name: Some(name), ..
            }) => name.clone(),
            Some(RelationDef {
                expr: Some(RelationExpr::Base(base)),
                ..
            }) => base.to_string(),
            _ => format!("#{id}"),
        }
    }

    // ---- builders ----

    pub fn intern(&mut self, expr: RelationExpr) -> RelationId {
        if let Some(&id) = self.interned.get(&expr) {
            return id;
        }
        let id = self.relations.len();
        self.relations.push(RelationDef {
            name: None,
            expr: Some(expr.clone()),
        });
        self.interned.insert(expr, id);
        id
    }

    /// Attaches a name to a relation so it can be looked up and printed.
    pub fn named(&mut self, id: RelationId, name: impl Into<String>) -> RelationId {
        let name = name.into();
        if self.relations[id].name.is_none() {
            self.relations[id].name = Some(name.clone());
        }
        self.names.insert(name, id);
        id
    }

    /// Declares a relation whose definition follows later (recursion).
    pub fn declare(&mut self, name: impl Into<String>) -> RelationId {
        let name = name.into();
        let id = self.relations.len();
        self.relations.push(RelationDef {
            name: Some(name.clone()),
            expr: None,
        });
        self.names.insert(name, id);
        id
    }

    pub fn define(&mut self, id: RelationId, expr: RelationExpr) {
        self.relations[id].expr = Some(expr);
    }

    pub fn base(&mut self, base: BaseRelation) -> RelationId {
        self.intern(RelationExpr::Base(base))
    }

    pub fn po(&mut self) -> RelationId {
        self.base(BaseRelation::Po)
    }

    pub fn loc(&mut self) -> RelationId {
        self.base(BaseRelation::Loc)
    }

    pub fn int(&mut self) -> RelationId {
        self.base(BaseRelation::Int)
    }

    pub fn ext(&mut self) -> RelationId {
        self.base(BaseRelation::Ext)
    }

    pub fn rf(&mut self) -> RelationId {
        self.base(BaseRelation::Rf)
    }

    pub fn co(&mut self) -> RelationId {
        self.base(BaseRelation::Co)
    }

    pub fn rmw(&mut self) -> RelationId {
        self.base(BaseRelation::Rmw)
    }

    pub fn data(&mut self) -> RelationId {
        self.base(BaseRelation::Data)
    }

    pub fn ctrl(&mut self) -> RelationId {
        self.base(BaseRelation::Ctrl)
    }

    pub fn identity(&mut self, filter: EventFilter) -> RelationId {
        self.base(BaseRelation::Identity(filter))
    }

    pub fn product(&mut self, domain: EventFilter, range: EventFilter) -> RelationId {
        self.base(BaseRelation::Product(domain, range))
    }

    pub fn union(&mut self, a: RelationId, b: RelationId) -> RelationId {
        self.intern(RelationExpr::Union(a, b))
    }

    /// Left-nested union `first | rest[0] | ...`.
    pub fn union_all(&mut self, first: RelationId, rest: &[RelationId]) -> RelationId {
        rest.iter().fold(first, |acc, &r| self.union(acc, r))
    }

    pub fn intersection(&mut self, a: RelationId, b: RelationId) -> RelationId {
        self.intern(RelationExpr::Intersection(a, b))
    }

    pub fn difference(&mut self, a: RelationId, b: RelationId) -> RelationId {
        self.intern(RelationExpr::Difference(a, b))
    }

    pub fn composition(&mut self, a: RelationId, b: RelationId) -> RelationId {
        self.intern(RelationExpr::Composition(a, b))
    }

    /// Left-nested composition `first; rest[0]; ...`.
    pub fn sequence(&mut self, first: RelationId, rest: &[RelationId]) -> RelationId {
        rest.iter().fold(first, |acc, &r| self.composition(acc, r))
    }

    pub fn inverse(&mut self, r: RelationId) -> RelationId {
        self.intern(RelationExpr::Inverse(r))
    }

    pub fn closure(&mut self, r: RelationId) -> RelationId {
        self.intern(RelationExpr::TransitiveClosure(r))
    }

    pub fn optional(&mut self, r: RelationId) -> RelationId {
        self.intern(RelationExpr::Optional(r))
    }

    /// Reflexive-transitive closure.
    pub fn star(&mut self, r: RelationId) -> RelationId {
        let plus = self.closure(r);
        self.optional(plus)
    }

    pub fn restrict(
        &mut self,
        inner: RelationId,
        domain: EventFilter,
        range: EventFilter,
    ) -> RelationId {
        self.intern(RelationExpr::Restrict {
            inner,
            domain,
            range,
        })
    }

    /// `po; [F.name]; po`
    pub fn fencerel(&mut self, name: &str) -> RelationId {
        let po = self.po();
        let fence = self.identity(EventFilter::fence(name));
        self.sequence(po, &[fence, po])
    }

    /// From-read: `rf^-1; co`.
    pub fn fr(&mut self) -> RelationId {
        let rf = self.rf();
        let rf_inv = self.inverse(rf);
        let co = self.co();
        self.composition(rf_inv, co)
    }

    pub fn po_loc(&mut self) -> RelationId {
        let po = self.po();
        let loc = self.loc();
        self.intersection(po, loc)
    }

    pub fn external(&mut self, r: RelationId) -> RelationId {
        let ext = self.ext();
        self.intersection(r, ext)
    }

    pub fn internal(&mut self, r: RelationId) -> RelationId {
        let int = self.int();
        self.intersection(r, int)
    }

    pub fn acyclic(&mut self, relation: RelationId, name: impl Into<String>) {
        self.axiom(AxiomKind::Acyclic, relation, name);
    }

    pub fn empty(&mut self, relation: RelationId, name: impl Into<String>) {
        self.axiom(AxiomKind::Empty, relation, name);
    }

    pub fn irreflexive(&mut self, relation: RelationId, name: impl Into<String>) {
        self.axiom(AxiomKind::Irreflexive, relation, name);
    }

    pub fn axiom(&mut self, kind: AxiomKind, relation: RelationId, name: impl Into<String>) {
        self.axioms.push(AxiomDef {
            kind,
            relation,
            name: name.into(),
        });
    }

    // ---- analysis ----

    pub fn dependencies(&self, id: RelationId) -> Vec<RelationId> {
        self.relations[id]
            .expr
            .as_ref()
            .map(RelationExpr::operands)
            .unwrap_or_default()
    }

    /// Strongly connected components of the dependency graph, operands
    /// before the relations that use them.
    pub fn recursive_groups(&self) -> Vec<Vec<RelationId>> {
        strongly_connected_components(self.relations.len(), |id| self.dependencies(id))
    }

    /// Whether a group of [`Wmm::recursive_groups`] is genuinely recursive.
    pub fn is_recursive(&self, group: &[RelationId]) -> bool {
        match group {
            [single] => self.dependencies(*single).contains(single),
            _ => group.len() > 1,
        }
    }

    /// Per relation, whether it is independent of `rf` and `co`.
    pub fn static_relations(&self) -> Vec<bool> {
        let mut is_static = vec![false; self.relations.len()];
        for group in self.recursive_groups() {
            let recursive = self.is_recursive(&group);
            for &id in &group {
                is_static[id] = !recursive
                    && match &self.relations[id].expr {
                        Some(RelationExpr::Base(base)) => base.is_static(),
                        Some(expr) => expr.operands().iter().all(|&o| is_static[o]),
                        None => false,
                    };
            }
        }
        is_static
    }

    /// Per relation, whether membership of a pair depends only on the two
    /// events themselves (never on rf, co, or on other events executing).
    pub fn pairwise_relations(&self) -> Vec<bool> {
        let mut pairwise = vec![false; self.relations.len()];
        for group in self.recursive_groups() {
            if self.is_recursive(&group) {
                continue;
            }
            for &id in &group {
                pairwise[id] = match &self.relations[id].expr {
                    Some(RelationExpr::Base(base)) => base.is_static(),
                    Some(RelationExpr::Composition(..)) | Some(RelationExpr::TransitiveClosure(_)) => {
                        false
                    }
                    Some(expr) => expr.operands().iter().all(|&o| pairwise[o]),
                    None => false,
                };
            }
        }
        pairwise
    }

    pub fn validate(&self) -> Result<(), WmmError> {
        let n = self.relations.len();
        for (id, rel) in self.relations.iter().enumerate() {
            let Some(expr) = &rel.expr else {
                return Err(WmmError::UndefinedRelation(self.display_name(id)));
            };
            if let Some(&operand) = expr.operands().iter().find(|&&o| o >= n) {
                return Err(WmmError::UnknownOperand {
                    relation: self.display_name(id),
                    operand,
                });
            }
        }
        for axiom in &self.axioms {
            if axiom.relation >= n {
                return Err(WmmError::UnknownAxiomRelation {
                    axiom: axiom.name.clone(),
                    relation: axiom.relation,
                });
            }
        }

        let pairwise = self.pairwise_relations();
        for group in self.recursive_groups() {
            let recursive = self.is_recursive(&group);
            for &id in &group {
                if let Some(RelationExpr::Difference(_, rhs)) = &self.relations[id].expr {
                    if recursive {
                        return Err(WmmError::RecursiveDifference(self.display_name(id)));
                    }
                    if !pairwise[*rhs] {
                        return Err(WmmError::NonStaticDifference(self.display_name(id)));
                    }
                }
            }
        }
        Ok(())
    }

    fn fmt_expr(&self, expr: &RelationExpr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = |id: RelationId| self.display_name(id);
        match expr {
            RelationExpr::Base(base) => write!(f, "{base}"),
            RelationExpr::Union(a, b) => write!(f, "{} | {}", n(*a), n(*b)),
            RelationExpr::Intersection(a, b) => write!(f, "{} & {}", n(*a), n(*b)),
            RelationExpr::Difference(a, b) => write!(f, "{} \\ {}", n(*a), n(*b)),
            RelationExpr::Composition(a, b) => write!(f, "{} ; {}", n(*a), n(*b)),
            RelationExpr::Inverse(r) => write!(f, "{}^-1", n(*r)),
            RelationExpr::TransitiveClosure(r) => write!(f, "{}+", n(*r)),
            RelationExpr::Optional(r) => write!(f, "{}?", n(*r)),
            RelationExpr::Restrict {
                inner,
                domain,
                range,
            } => write!(f, "[{domain}]; {}; [{range}]", n(*inner)),
        }
    }
}

impl fmt::Display for Wmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model {}", self.name)?;
        for (id, rel) in self.relations.iter().enumerate() {
            write!(f, "  {} = ", self.display_name(id))?;
            match &rel.expr {
                Some(expr) => self.fmt_expr(expr, f)?,
                None => write!(f, "<undefined>")?,
            }
            writeln!(f)?;
        }
        for axiom in &self.axioms {
            writeln!(
                f,
                "  {} {} as {}",
                axiom.kind,
                self.display_name(axiom.relation),
                axiom.name
            )?;
        }
        Ok(())
    }
}

/// Tarjan's algorithm over nodes `0..n`. Components are returned so that
/// every node's successors appear in the same or an earlier component.
pub fn strongly_connected_components<F>(n: usize, successors: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> Vec<usize>,
{
    let mut state = Tarjan {
        successors,
        index: vec![None; n],
        low: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next: 0,
        groups: Vec::new(),
    };
    for v in 0..n {
        if state.index[v].is_none() {
            state.visit(v);
        }
    }
    state.groups
}

struct Tarjan<F> {
    successors: F,
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    groups: Vec<Vec<usize>>,
}

impl<F: Fn(usize) -> Vec<usize>> Tarjan<F> {
    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next);
        self.low[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        for w in (self.successors)(v) {
            if w >= self.index.len() {
                continue;
            }
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.low[v] = self.low[v].min(self.low[w]);
                }
                Some(iw) if self.on_stack[w] => self.low[v] = self.low[v].min(iw),
                Some(_) => {}
            }
        }

        if Some(self.low[v]) == self.index[v] {
            let mut group = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                group.push(w);
                if w == v {
                    break;
                }
            }
            group.sort_unstable();
            self.groups.push(group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_relations_are_interned() {
        let mut wmm = Wmm::new("t");
        let a = wmm.fr();
        let b = wmm.fr();
        assert_eq!(a, b);
        let po = wmm.po();
        assert_eq!(wmm.po(), po);
    }

    #[test]
    fn operands_come_before_users() {
        let mut wmm = Wmm::new("t");
        let po = wmm.po();
        let rf = wmm.rf();
        let u = wmm.union(po, rf);
        let groups = wmm.recursive_groups();
        let position = |id| groups.iter().position(|g| g.contains(&id));
        assert!(position(po) < position(u));
        assert!(position(rf) < position(u));
        assert!(groups.iter().all(|g| !wmm.is_recursive(g)));
    }

    #[test]
    fn recursive_definition_forms_one_group() {
        let mut wmm = Wmm::new("t");
        let po = wmm.po();
        let hb = wmm.declare("hb");
        let hbhb = wmm.composition(hb, hb);
        wmm.define(hb, RelationExpr::Union(po, hbhb));
        let groups = wmm.recursive_groups();
        let group = groups
            .iter()
            .find(|g| g.contains(&hb))
            .expect("hb is in some group");
        assert!(group.contains(&hbhb));
        assert!(wmm.is_recursive(group));
        assert!(!wmm.static_relations()[hb]);
        assert!(wmm.validate().is_ok());
    }

    #[test]
    fn static_relations_exclude_rf_and_co() {
        let mut wmm = Wmm::new("t");
        let po_loc = wmm.po_loc();
        let fr = wmm.fr();
        let is_static = wmm.static_relations();
        assert!(is_static[po_loc]);
        assert!(!is_static[fr]);
    }

    #[test]
    fn difference_needs_static_right_operand() {
        let mut wmm = Wmm::new("t");
        let po = wmm.po();
        let rf = wmm.rf();
        let bad = wmm.difference(po, rf);
        wmm.named(bad, "bad");
        assert_eq!(
            wmm.validate(),
            Err(WmmError::NonStaticDifference("bad".into()))
        );
    }

    #[test]
    fn difference_rejects_composed_right_operand() {
        let mut wmm = Wmm::new("t");
        let po = wmm.po();
        let fence = wmm.fencerel("mfence");
        let bad = wmm.difference(po, fence);
        wmm.named(bad, "unfenced");
        assert!(wmm.static_relations()[fence]);
        assert!(!wmm.pairwise_relations()[fence]);
        assert_eq!(
            wmm.validate(),
            Err(WmmError::NonStaticDifference("unfenced".into()))
        );
    }

    #[test]
    fn undefined_declaration_is_reported() {
        let mut wmm = Wmm::new("t");
        wmm.declare("hb");
        assert_eq!(
            wmm.validate(),
            Err(WmmError::UndefinedRelation("hb".into()))
        );
        assert!(matches!(
            wmm.lookup("sw"),
            Err(WmmError::UnknownRelation(_))
        ));
    }

    #[test]
    fn display_lists_relations_and_axioms() {
        let mut wmm = Wmm::new("demo");
        let po = wmm.po();
        let rf = wmm.rf();
        let u = wmm.union(po, rf);
        wmm.named(u, "po-rf");
        wmm.acyclic(u, "no-thin-air");
        let text = wmm.to_string();
        assert!(text.contains("po-rf = po | rf"));
        assert!(text.contains("acyclic po-rf as no-thin-air"));
    }
}
