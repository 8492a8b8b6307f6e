//! Event graphs: one edge store per relation of the memory model, kept up
//! to date incrementally while the search adds coherence edges.
//!
//! Graph ids coincide with the model's relation ids. A few hidden graphs
//! follow them: the coherence base the search writes into, the identity
//! used by `r?`, and `co` itself when the model never mentions it. `co` is
//! always the transitive closure of the coherence base.
//!
//! Propagation walks the strongly connected components of the dependency
//! graph in dependency order. Non-recursive graphs derive their new edges
//! from the deltas of their operands in one step; recursive groups iterate
//! semi-naively until nothing changes.

pub mod edge;
mod primitive;

use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::trace;

use cohere_ir::{
    strongly_connected_components, BaseRelation, EventFilter, RelationExpr, Wmm, WmmError,
};

use crate::axiom::Axiom;
use crate::error::EngineError;
use crate::literal::Reason;
use crate::model::{ExecutionModel, ModelIndex};
use crate::timeline::{Stamp, Timeline};
pub use edge::{Edge, EdgeStore};

pub type GraphId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphNode {
    /// Fixed by which events executed.
    Static,
    /// Fixed by the reads-from choice of the model.
    ReadFrom,
    /// Coherence edges placed by the search.
    CoherenceBase,
    Union(GraphId, GraphId),
    Intersection(GraphId, GraphId),
    Difference(GraphId, GraphId),
    Composition(GraphId, GraphId),
    Inverse(GraphId),
    Closure(GraphId),
    Restrict {
        inner: GraphId,
        domain: Vec<bool>,
        range: Vec<bool>,
    },
}

impl GraphNode {
    pub fn operands(&self) -> Vec<GraphId> {
        match self {
            GraphNode::Static | GraphNode::ReadFrom | GraphNode::CoherenceBase => Vec::new(),
            GraphNode::Union(a, b)
            | GraphNode::Intersection(a, b)
            | GraphNode::Difference(a, b)
            | GraphNode::Composition(a, b) => vec![*a, *b],
            GraphNode::Inverse(a) | GraphNode::Closure(a) | GraphNode::Restrict { inner: a, .. } => {
                vec![*a]
            }
        }
    }
}

/// Why a coherence-base edge is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoherenceOrigin {
    /// The initial write of a location precedes every other write to it.
    Init,
    /// The opposite order was refuted under this reason.
    Forced(Reason),
    /// Tentative, undone by backtracking.
    Guessed,
}

#[derive(Debug, Clone)]
pub struct EventGraph {
    pub name: String,
    pub node: GraphNode,
    store: EdgeStore,
}

impl EventGraph {
    pub fn store(&self) -> &EdgeStore {
        &self.store
    }
}

type Deltas = HashMap<GraphId, Vec<Edge>>;

pub struct GraphSet<'a> {
    model: &'a ExecutionModel<'a>,
    graphs: Vec<EventGraph>,
    groups: Vec<Vec<GraphId>>,
    recursive: Vec<bool>,
    coherence_base: GraphId,
    coherence: GraphId,
    origins: HashMap<Edge, CoherenceOrigin>,
    axioms: Vec<Axiom>,
    timeline: Timeline,
    max_fixpoint_iterations: usize,
}

impl<'a> GraphSet<'a> {
    /// Materializes every relation of `wmm` over `model`, with the initial
    /// coherence edges in place.
    pub fn build(
        wmm: &Wmm,
        model: &'a ExecutionModel<'a>,
        max_fixpoint_iterations: usize,
    ) -> Result<Self, EngineError> {
        wmm.validate()?;
        let n = model.size();
        let relations = wmm.num_relations();
        let coherence_base = relations;
        let identity = relations + 1;

        let mut graphs = Vec::with_capacity(relations + 3);
        let mut seeds: Vec<(GraphId, Vec<Edge>)> = Vec::new();
        let mut coherence = None;
        for (id, def) in wmm.relations().iter().enumerate() {
            let expr = def
                .expr
                .as_ref()
                .ok_or_else(|| WmmError::UndefinedRelation(wmm.display_name(id)))?;
            let node = match expr {
                RelationExpr::Base(BaseRelation::Co) => {
                    coherence = Some(id);
                    GraphNode::Closure(coherence_base)
                }
                RelationExpr::Base(base) => {
                    seeds.push((id, primitive::base_edges(base, model)));
                    if matches!(base, BaseRelation::Rf) {
                        GraphNode::ReadFrom
                    } else {
                        GraphNode::Static
                    }
                }
                RelationExpr::Union(a, b) => GraphNode::Union(*a, *b),
                RelationExpr::Intersection(a, b) => GraphNode::Intersection(*a, *b),
                RelationExpr::Difference(a, b) => GraphNode::Difference(*a, *b),
                RelationExpr::Composition(a, b) => GraphNode::Composition(*a, *b),
                RelationExpr::Inverse(a) => GraphNode::Inverse(*a),
                RelationExpr::TransitiveClosure(a) => GraphNode::Closure(*a),
                RelationExpr::Optional(a) => GraphNode::Union(*a, identity),
                RelationExpr::Restrict {
                    inner,
                    domain,
                    range,
                } => GraphNode::Restrict {
                    inner: *inner,
                    domain: mask(model, domain),
                    range: mask(model, range),
                },
            };
            graphs.push(EventGraph {
                name: wmm.display_name(id),
                node,
                store: EdgeStore::new(n),
            });
        }
        graphs.push(EventGraph {
            name: "co-base".into(),
            node: GraphNode::CoherenceBase,
            store: EdgeStore::new(n),
        });
        graphs.push(EventGraph {
            name: "id".into(),
            node: GraphNode::Static,
            store: EdgeStore::new(n),
        });
        seeds.push((identity, primitive::base_edges(&BaseRelation::Id, model)));
        let coherence = match coherence {
            Some(id) => id,
            None => {
                graphs.push(EventGraph {
                    name: "co".into(),
                    node: GraphNode::Closure(coherence_base),
                    store: EdgeStore::new(n),
                });
                graphs.len() - 1
            }
        };

        let groups = strongly_connected_components(graphs.len(), |g| graphs[g].node.operands());
        let recursive = groups
            .iter()
            .map(|group| match group.as_slice() {
                [single] => graphs[*single].node.operands().contains(single),
                _ => true,
            })
            .collect();
        let axioms = wmm
            .axioms()
            .iter()
            .map(|def| Axiom::new(def.kind, def.relation, def.name.clone()))
            .collect();

        let mut set = Self {
            model,
            graphs,
            groups,
            recursive,
            coherence_base,
            coherence,
            origins: HashMap::new(),
            axioms,
            timeline: Timeline::new(),
            max_fixpoint_iterations,
        };

        let mut deltas: Deltas = HashMap::new();
        for (g, edges) in seeds {
            let added = set.insert_new(g, edges);
            deltas.insert(g, added);
        }
        let init = primitive::initial_coherence(model);
        for &e in &init {
            set.origins.insert(e, CoherenceOrigin::Init);
        }
        let added = set.insert_new(coherence_base, init);
        deltas.insert(coherence_base, added);
        set.propagate(deltas)?;
        trace!(
            graphs = set.graphs.len(),
            edges = set.total_edges(),
            "built event graphs"
        );
        Ok(set)
    }

    pub fn model(&self) -> &'a ExecutionModel<'a> {
        self.model
    }

    pub fn graph(&self, id: GraphId) -> &EventGraph {
        &self.graphs[id]
    }

    pub fn num_graphs(&self) -> usize {
        self.graphs.len()
    }

    pub fn axioms(&self) -> &[Axiom] {
        &self.axioms
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The graph of `co`.
    pub fn coherence(&self) -> GraphId {
        self.coherence
    }

    pub fn coherence_origin(&self, edge: Edge) -> Option<&CoherenceOrigin> {
        self.origins.get(&edge)
    }

    pub fn watermark(&self) -> Stamp {
        self.timeline.watermark()
    }

    pub fn backtrack_to(&mut self, watermark: Stamp) {
        self.timeline.backtrack_to(watermark);
        for graph in &mut self.graphs {
            graph.store.backtrack_to(watermark);
        }
        for axiom in &mut self.axioms {
            axiom.backtrack_to(watermark);
        }
    }

    pub fn contains(&self, graph: GraphId, edge: Edge) -> bool {
        self.graphs[graph].store.contains(edge, &self.timeline)
    }

    pub fn stamp_of(&self, graph: GraphId, edge: Edge) -> Option<Stamp> {
        self.graphs[graph].store.stamp_of(edge, &self.timeline)
    }

    pub fn successors(&self, graph: GraphId, node: ModelIndex) -> impl Iterator<Item = ModelIndex> + '_ {
        self.graphs[graph].store.successors(node, &self.timeline)
    }

    pub fn predecessors(
        &self,
        graph: GraphId,
        node: ModelIndex,
    ) -> impl Iterator<Item = ModelIndex> + '_ {
        self.graphs[graph].store.predecessors(node, &self.timeline)
    }

    pub fn has_violations(&self) -> bool {
        self.axioms.iter().any(Axiom::is_violated)
    }

    /// `a` and `b` are ordered by `co` one way or the other.
    pub fn is_ordered(&self, a: ModelIndex, b: ModelIndex) -> bool {
        self.contains(self.coherence, Edge::new(a, b))
            || self.contains(self.coherence, Edge::new(b, a))
    }

    /// Pairs of same-location writes that `co` does not order yet, most
    /// constrained first: pairs whose writes touch more edges of the
    /// tightest axiom graph lead. Ties keep locations with fewer open pairs
    /// first.
    pub fn unresolved_pairs(&self) -> Vec<(ModelIndex, ModelIndex)> {
        let mut by_location: Vec<Vec<(ModelIndex, ModelIndex)>> = Vec::new();
        for loc in 0..self.model.num_locations() {
            let writes = self.model.writes_to(loc);
            let mut open = Vec::new();
            for (i, &a) in writes.iter().enumerate() {
                for &b in &writes[i + 1..] {
                    if !self.is_ordered(a, b) {
                        open.push((a, b));
                    }
                }
            }
            if !open.is_empty() {
                by_location.push(open);
            }
        }
        by_location.sort_by_key(Vec::len);
        let mut pairs: Vec<_> = by_location.into_iter().flatten().collect();
        if let Some(tight) = self.tightest_axiom_graph() {
            let degree = |x: ModelIndex| {
                self.successors(tight, x).count() + self.predecessors(tight, x).count()
            };
            pairs.sort_by_cached_key(|&(a, b)| Reverse(degree(a) + degree(b)));
        }
        pairs
    }

    /// The axiom graph with the least room left: its estimated size comes
    /// closest to its maximum, then its current size does.
    fn tightest_axiom_graph(&self) -> Option<GraphId> {
        if self.axioms.is_empty() {
            return None;
        }
        let bounds = self.size_bounds();
        self.axioms
            .iter()
            .map(|axiom| axiom.graph)
            .min_by_key(|&g| {
                let (min, max, estimate) = bounds[g];
                (max.saturating_sub(estimate), max.saturating_sub(min))
            })
    }

    /// Adds a coherence edge and everything that follows from it. Returns
    /// `false` when `co` already contained the edge.
    pub fn add_coherence(
        &mut self,
        edge: Edge,
        origin: CoherenceOrigin,
    ) -> Result<bool, EngineError> {
        if self.contains(self.coherence, edge) {
            return Ok(false);
        }
        self.origins.insert(edge, origin);
        let added = self.insert_new(self.coherence_base, vec![edge]);
        let mut deltas = HashMap::new();
        deltas.insert(self.coherence_base, added);
        self.propagate(deltas)?;
        Ok(true)
    }

    pub fn total_edges(&self) -> usize {
        self.graphs.iter().map(|g| g.store.size()).sum()
    }

    pub fn size(&self, graph: GraphId) -> usize {
        self.graphs[graph].store.size()
    }

    /// No completion of the current state has fewer edges.
    pub fn min_size(&self, graph: GraphId) -> usize {
        self.size(graph)
    }

    /// No completion of the current state has more edges.
    pub fn max_size(&self, graph: GraphId) -> usize {
        self.size_bounds()[graph].1
    }

    pub fn estimated_size(&self, graph: GraphId) -> usize {
        self.size_bounds()[graph].2
    }

    /// (min, max, estimate) per graph.
    fn size_bounds(&self) -> Vec<(usize, usize, usize)> {
        let n = self.model.size();
        let full = n * n;
        let total_order: usize = (0..self.model.num_locations())
            .map(|loc| {
                let k = self.model.writes_to(loc).len();
                k * k.saturating_sub(1) / 2
            })
            .sum();
        let mut bounds = vec![(0, 0, 0); self.graphs.len()];
        for (gi, group) in self.groups.iter().enumerate() {
            for &g in group {
                let size = self.size(g);
                let (max, estimate) = if self.recursive[gi] {
                    (full, size)
                } else {
                    let b = |x: GraphId| bounds[x];
                    match &self.graphs[g].node {
                        GraphNode::Static | GraphNode::ReadFrom => (size, size),
                        GraphNode::CoherenceBase => (total_order, total_order),
                        GraphNode::Union(x, y) => {
                            ((b(*x).1 + b(*y).1).min(full), b(*x).2.max(b(*y).2))
                        }
                        GraphNode::Intersection(x, y) => {
                            (b(*x).1.min(b(*y).1), b(*x).2.min(b(*y).2))
                        }
                        GraphNode::Difference(x, _) => (b(*x).1, b(*x).2),
                        GraphNode::Composition(x, y) => (
                            b(*x).1.saturating_mul(b(*y).1).min(full),
                            b(*x).2.max(b(*y).2),
                        ),
                        GraphNode::Inverse(x) => (b(*x).1, b(*x).2),
                        GraphNode::Closure(x) if *x == self.coherence_base => {
                            (total_order, total_order)
                        }
                        GraphNode::Closure(x) => (full, b(*x).2),
                        GraphNode::Restrict {
                            inner,
                            domain,
                            range,
                        } => {
                            let cap = domain.iter().filter(|&&d| d).count()
                                * range.iter().filter(|&&r| r).count();
                            (b(*inner).1.min(cap), b(*inner).2.min(cap))
                        }
                    }
                };
                let max = max.max(size);
                bounds[g] = (size, max, estimate.clamp(size, max));
            }
        }
        bounds
    }

    fn insert_new(&mut self, graph: GraphId, candidates: Vec<Edge>) -> Vec<Edge> {
        let mut added = Vec::new();
        for edge in candidates {
            if !self.graphs[graph].store.contains(edge, &self.timeline) {
                let stamp = self.timeline.tick();
                self.graphs[graph].store.insert(edge, stamp);
                added.push(edge);
            }
        }
        added
    }

    fn propagate(&mut self, mut deltas: Deltas) -> Result<(), EngineError> {
        for gi in 0..self.groups.len() {
            let group = self.groups[gi].clone();
            if self.recursive[gi] {
                self.propagate_recursive(&group, &mut deltas)?;
            } else {
                let g = group[0];
                let added = self.apply_rule(g, |op| deltas.get(&op).map(Vec::as_slice));
                if !added.is_empty() {
                    deltas.entry(g).or_default().extend(added);
                }
            }
        }
        for axiom in &mut self.axioms {
            if let Some(edges) = deltas.get(&axiom.graph) {
                axiom.observe(edges, &self.graphs[axiom.graph].store, &self.timeline);
            }
        }
        Ok(())
    }

    fn propagate_recursive(
        &mut self,
        group: &[GraphId],
        deltas: &mut Deltas,
    ) -> Result<(), EngineError> {
        let mut total: Deltas = HashMap::new();
        let mut round: Deltas = HashMap::new();
        let mut iterations = 0;
        loop {
            let mut next: Deltas = HashMap::new();
            for &g in group {
                let added = self.apply_rule(g, |op| {
                    if group.contains(&op) {
                        round.get(&op).map(Vec::as_slice)
                    } else if iterations == 0 {
                        deltas.get(&op).map(Vec::as_slice)
                    } else {
                        None
                    }
                });
                if !added.is_empty() {
                    total.entry(g).or_default().extend(added.iter().copied());
                    next.insert(g, added);
                }
            }
            if next.is_empty() {
                break;
            }
            iterations += 1;
            if iterations > self.max_fixpoint_iterations {
                return Err(EngineError::FixpointDiverged {
                    group: group
                        .iter()
                        .map(|&g| self.graphs[g].name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    limit: self.max_fixpoint_iterations,
                });
            }
            round = next;
        }
        trace!(group = ?group, iterations, "recursive group settled");
        for (g, edges) in total {
            deltas.entry(g).or_default().extend(edges);
        }
        Ok(())
    }

    /// Derives and inserts the new edges of `graph` given its operands'
    /// deltas. Returns what was actually added.
    fn apply_rule<'d, F>(&mut self, graph: GraphId, delta: F) -> Vec<Edge>
    where
        F: Fn(GraphId) -> Option<&'d [Edge]>,
    {
        let d = |op: GraphId| delta(op).unwrap_or(&[]);
        if let GraphNode::Closure(a) = self.graphs[graph].node {
            let edges = d(a).to_vec();
            return self.extend_closure(graph, &edges);
        }
        let tl = &self.timeline;
        let candidates: Vec<Edge> = match &self.graphs[graph].node {
            GraphNode::Static
            | GraphNode::ReadFrom
            | GraphNode::CoherenceBase
            | GraphNode::Closure(_) => return Vec::new(),
            GraphNode::Union(a, b) => d(*a).iter().chain(d(*b)).copied().collect(),
            GraphNode::Intersection(a, b) => {
                let (sa, sb) = (&self.graphs[*a].store, &self.graphs[*b].store);
                d(*a)
                    .iter()
                    .filter(|&&e| sb.contains(e, tl))
                    .chain(d(*b).iter().filter(|&&e| sa.contains(e, tl)))
                    .copied()
                    .collect()
            }
            GraphNode::Difference(a, b) => {
                let sb = &self.graphs[*b].store;
                d(*a)
                    .iter()
                    .filter(|&&e| !sb.contains(e, tl))
                    .copied()
                    .collect()
            }
            GraphNode::Composition(a, b) => {
                let (sa, sb) = (&self.graphs[*a].store, &self.graphs[*b].store);
                let mut out = Vec::new();
                for &Edge { first: x, second: y } in d(*a) {
                    out.extend(sb.successors(y, tl).map(|z| Edge::new(x, z)));
                }
                for &Edge { first: y, second: z } in d(*b) {
                    out.extend(sa.predecessors(y, tl).map(|x| Edge::new(x, z)));
                }
                out
            }
            GraphNode::Inverse(a) => d(*a).iter().map(|e| e.inverse()).collect(),
            GraphNode::Restrict {
                inner,
                domain,
                range,
            } => d(*inner)
                .iter()
                .filter(|e| domain[e.first] && range[e.second])
                .copied()
                .collect(),
        };
        self.insert_new(graph, candidates)
    }

    /// Incremental transitive closure: adding `u -> v` connects every
    /// predecessor of `u` (and `u`) to every successor of `v` (and `v`).
    fn extend_closure(&mut self, graph: GraphId, edges: &[Edge]) -> Vec<Edge> {
        let mut added = Vec::new();
        for &edge in edges {
            if self.contains(graph, edge) {
                continue;
            }
            let mut sources = vec![edge.first];
            sources.extend(self.predecessors(graph, edge.first));
            let mut targets = vec![edge.second];
            targets.extend(self.successors(graph, edge.second));
            let mut candidates = Vec::with_capacity(sources.len() * targets.len());
            for &s in &sources {
                for &t in &targets {
                    candidates.push(Edge::new(s, t));
                }
            }
            candidates.sort_unstable();
            candidates.dedup();
            added.extend(self.insert_new(graph, candidates));
        }
        added
    }
}

fn mask(model: &ExecutionModel<'_>, filter: &EventFilter) -> Vec<bool> {
    (0..model.size())
        .map(|i| filter.matches(model.event(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohere_ir::{models, CompiledProgram, Instruction, Program, ValueExpr};
    use proptest::prelude::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn two_writers() -> CompiledProgram {
        // e0 init x | e1 W x=1 | e2 W x=2, e3 R x
        Program::new("2w")
            .with_location("x", 0)
            .with_thread(vec![Instruction::store("x", ValueExpr::constant(1))])
            .with_thread(vec![
                Instruction::store("x", ValueExpr::constant(2)),
                Instruction::load("r", "x"),
            ])
            .compile()
            .unwrap_or_else(|e| panic!("compiles: {e}"))
    }

    #[test]
    fn initial_coherence_and_from_read() -> TestResult {
        let program = two_writers();
        let model = ExecutionModel::new(&program, [1, 2, 3], [(0, 3)])?;
        let wmm = models::sc();
        let graphs = GraphSet::build(&wmm, &model, 100)?;
        let co = graphs.coherence();
        assert!(graphs.contains(co, Edge::new(0, 1)));
        assert!(graphs.contains(co, Edge::new(0, 2)));
        assert_eq!(graphs.unresolved_pairs(), vec![(1, 2)]);

        let fr = wmm.lookup("fr")?;
        assert!(graphs.contains(fr, Edge::new(3, 1)));
        assert!(graphs.contains(fr, Edge::new(3, 2)));
        // r reads init although its own thread wrote x before
        assert!(graphs.has_violations());
        Ok(())
    }

    #[test]
    fn guessed_edges_vanish_on_backtrack() -> TestResult {
        let program = two_writers();
        let model = ExecutionModel::new(&program, [1, 2, 3], [(2, 3)])?;
        let wmm = models::sc();
        let mut graphs = GraphSet::build(&wmm, &model, 100)?;
        assert!(!graphs.has_violations());
        let fr = wmm.lookup("fr")?;
        let before = graphs.total_edges();

        let mark = graphs.watermark();
        assert!(graphs.add_coherence(Edge::new(2, 1), CoherenceOrigin::Guessed)?);
        assert!(graphs.contains(fr, Edge::new(3, 1)));
        assert!(graphs.unresolved_pairs().is_empty());
        assert!(!graphs.add_coherence(Edge::new(2, 1), CoherenceOrigin::Guessed)?);

        graphs.backtrack_to(mark);
        assert!(!graphs.contains(fr, Edge::new(3, 1)));
        assert_eq!(graphs.total_edges(), before);
        assert_eq!(graphs.unresolved_pairs(), vec![(1, 2)]);
        Ok(())
    }

    #[test]
    fn closure_connects_chains() -> TestResult {
        // e0 init x | e1, e2, e3 writes in separate threads
        let program = Program::new("3w")
            .with_location("x", 0)
            .with_thread(vec![Instruction::store("x", ValueExpr::constant(1))])
            .with_thread(vec![Instruction::store("x", ValueExpr::constant(2))])
            .with_thread(vec![Instruction::store("x", ValueExpr::constant(3))])
            .compile()?;
        let model = ExecutionModel::new(&program, [1, 2, 3], Vec::new())?;
        let mut graphs = GraphSet::build(&models::sc(), &model, 100)?;
        graphs.add_coherence(Edge::new(2, 3), CoherenceOrigin::Guessed)?;
        graphs.add_coherence(Edge::new(1, 2), CoherenceOrigin::Guessed)?;
        let co = graphs.coherence();
        assert!(graphs.contains(co, Edge::new(1, 3)));
        assert!(graphs.contains(co, Edge::new(0, 3)));
        assert!(graphs.unresolved_pairs().is_empty());
        assert_eq!(graphs.size(co), 6);
        assert_eq!(graphs.max_size(co), 6);
        Ok(())
    }

    #[test]
    fn recursive_relation_reaches_fixpoint() -> TestResult {
        // hb = po | hb;hb over a three-event thread
        let program = Program::new("chain")
            .with_location("x", 0)
            .with_thread(vec![
                Instruction::store("x", ValueExpr::constant(1)),
                Instruction::store("x", ValueExpr::constant(2)),
                Instruction::load("r", "x"),
            ])
            .compile()?;
        let mut wmm = Wmm::new("rec");
        let hb = wmm.declare("hb");
        let po = wmm.po();
        let hb_hb = wmm.composition(hb, hb);
        wmm.define(hb, RelationExpr::Union(po, hb_hb));
        wmm.acyclic(hb, "hb");
        let model = ExecutionModel::new(&program, [1, 2, 3], [(2, 3)])?;
        let graphs = GraphSet::build(&wmm, &model, 100)?;
        assert!(graphs.contains(hb, Edge::new(1, 3)));
        assert_eq!(graphs.size(hb), 3);
        assert!(!graphs.has_violations());
        Ok(())
    }

    #[test]
    fn size_bounds_are_ordered() -> TestResult {
        let program = two_writers();
        let model = ExecutionModel::new(&program, [1, 2, 3], [(2, 3)])?;
        let graphs = GraphSet::build(&models::tso(), &model, 100)?;
        for g in 0..graphs.num_graphs() {
            assert!(graphs.min_size(g) <= graphs.estimated_size(g));
            assert!(graphs.estimated_size(g) <= graphs.max_size(g));
        }
        Ok(())
    }

    fn live_edges(graphs: &GraphSet<'_>, graph: GraphId) -> Vec<Edge> {
        let nodes = graphs.model().size();
        (0..nodes)
            .flat_map(|a| graphs.successors(graph, a).map(move |b| Edge::new(a, b)))
            .collect()
    }

    #[test]
    fn constrained_pairs_come_first() -> TestResult {
        // e0 init y, e1 init x
        // e2 W x, e3 R x | e4 W x | e5 W y | e6 W y
        let program = Program::new("order")
            .with_location("y", 0)
            .with_location("x", 0)
            .with_thread(vec![
                Instruction::store("x", ValueExpr::constant(1)),
                Instruction::load("r", "x"),
            ])
            .with_thread(vec![Instruction::store("x", ValueExpr::constant(2))])
            .with_thread(vec![Instruction::store("y", ValueExpr::constant(1))])
            .with_thread(vec![Instruction::store("y", ValueExpr::constant(2))])
            .compile()?;
        let model = ExecutionModel::new(&program, [2, 3, 4, 5, 6], [(2, 3)])?;
        let graphs = GraphSet::build(&models::sc(), &model, 100)?;
        assert_eq!(graphs.unresolved_pairs(), vec![(2, 4), (5, 6)]);
        Ok(())
    }

    fn live_edges(graphs: &GraphSet<'_>, graph: GraphId) -> Vec<Edge> {
        let nodes = graphs.model().size();
        (0..nodes)
            .flat_map(|a| graphs.successors(graph, a).map(move |b| Edge::new(a, b)))
            .collect()
    }

    fn snapshot(graphs: &GraphSet<'_>) -> Vec<Vec<Edge>> {
        (0..graphs.num_graphs())
            .map(|g| {
                let mut edges = live_edges(graphs, g);
                edges.sort_unstable();
                edges
            })
            .collect()
    }

    /// e0 init x | e1..e4 one write per thread | e5 R x, reading e1.
    fn writers_and_reader() -> CompiledProgram {
        let mut program = Program::new("4w1r").with_location("x", 0);
        for v in 1..=4 {
            program = program.with_thread(vec![Instruction::store("x", ValueExpr::constant(v))]);
        }
        program
            .with_thread(vec![Instruction::load("r", "x")])
            .compile()
            .unwrap_or_else(|e| panic!("compiles: {e}"))
    }

    #[derive(Debug, Clone)]
    enum Step {
        Guess(usize, usize),
        Mark,
        Backtrack,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => (1usize..5, 1usize..5).prop_map(|(a, b)| Step::Guess(a, b)),
            1 => Just(Step::Mark),
            1 => Just(Step::Backtrack),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// A union holds exactly the edges of its operands and an
        /// intersection exactly their common edges, while coherence
        /// guesses come and go.
        #[test]
        fn union_and_intersection_track_operands(
            guesses in prop::collection::vec((1usize..5, 1usize..5), 0..8),
        ) {
            let program = writers_and_reader();
            let model = ExecutionModel::new(&program, [1, 2, 3, 4, 5], [(1, 5)])
                .unwrap_or_else(|e| panic!("model: {e}"));
            let mut wmm = Wmm::new("mono");
            let co = wmm.co();
            let fr = wmm.fr();
            let ext = wmm.ext();
            let either = wmm.union(co, fr);
            let both = wmm.intersection(co, ext);
            let mut graphs = GraphSet::build(&wmm, &model, 100)
                .unwrap_or_else(|e| panic!("graphs: {e}"));
            let start = graphs.watermark();
            let initial = graphs.total_edges();
            let nodes = model.size();

            for (a, b) in guesses {
                if a == b || graphs.is_ordered(a, b) {
                    continue;
                }
                graphs
                    .add_coherence(Edge::new(a, b), CoherenceOrigin::Guessed)
                    .unwrap_or_else(|e| panic!("propagation: {e}"));
                for x in 0..nodes {
                    for y in 0..nodes {
                        let edge = Edge::new(x, y);
                        let in_co = graphs.contains(co, edge);
                        prop_assert_eq!(
                            graphs.contains(either, edge),
                            in_co || graphs.contains(fr, edge)
                        );
                        prop_assert_eq!(
                            graphs.contains(both, edge),
                            in_co && graphs.contains(ext, edge)
                        );
                    }
                }
            }

            graphs.backtrack_to(start);
            prop_assert_eq!(graphs.total_edges(), initial);
        }

        /// Backtracking to any earlier watermark restores exactly the edges
        /// live when it was taken, in every graph.
        #[test]
        fn backtracking_restores_marked_state(steps in prop::collection::vec(step(), 0..16)) {
            let program = writers_and_reader();
            let model = ExecutionModel::new(&program, [1, 2, 3, 4, 5], [(1, 5)])
                .unwrap_or_else(|e| panic!("model: {e}"));
            let mut graphs = GraphSet::build(&models::tso(), &model, 100)
                .unwrap_or_else(|e| panic!("graphs: {e}"));
            let mut marks = vec![(graphs.watermark(), snapshot(&graphs))];

            for step in steps {
                match step {
                    Step::Guess(a, b) => {
                        if a != b && !graphs.is_ordered(a, b) {
                            graphs
                                .add_coherence(Edge::new(a, b), CoherenceOrigin::Guessed)
                                .unwrap_or_else(|e| panic!("propagation: {e}"));
                        }
                    }
                    Step::Mark => marks.push((graphs.watermark(), snapshot(&graphs))),
                    Step::Backtrack => {
                        if let Some((mark, expected)) = marks.pop() {
                            graphs.backtrack_to(mark);
                            prop_assert_eq!(snapshot(&graphs), expected);
                        }
                    }
                }
            }

            while let Some((mark, expected)) = marks.pop() {
                graphs.backtrack_to(mark);
                prop_assert_eq!(snapshot(&graphs), expected);
            }
        }
    }
}
