//! Explaining edges and violations by literals of the solver model.
//!
//! An edge inserted at stamp `s` is explained only through operand edges
//! whose stamps are smaller than `s`. Stamps strictly decrease along every
//! recursive call, so explanations terminate even inside recursive
//! relation groups.

use std::collections::HashMap;

use cohere_ir::{AxiomKind, BranchEquivalence, EventId};

use crate::axiom::{self, Axiom};
use crate::error::ReasoningError;
use crate::graph::{CoherenceOrigin, Edge, GraphId, GraphNode, GraphSet};
use crate::literal::{CoreLiteral, Reason};
use crate::logic::Dnf;
use crate::model::ModelIndex;
use crate::timeline::Stamp;

pub struct Reasoner<'g, 'a> {
    graphs: &'g GraphSet<'a>,
    branches: &'a BranchEquivalence,
    memo: HashMap<(GraphId, Edge), Reason>,
}

impl<'g, 'a> Reasoner<'g, 'a> {
    pub fn new(graphs: &'g GraphSet<'a>) -> Self {
        Self {
            graphs,
            branches: &graphs.model().program().branch_equivalence,
            memo: HashMap::new(),
        }
    }

    /// `exec` of the event's branch representative, or nothing when the
    /// event executes in every run.
    pub fn exec_reason(&self, event: EventId) -> Reason {
        if self.branches.is_always_executed(event) {
            Reason::tautology()
        } else {
            Reason::singleton(CoreLiteral::Exec(self.branches.representative(event)))
        }
    }

    fn exec_both(&self, edge: Edge) -> Reason {
        let model = self.graphs.model();
        self.exec_reason(model.event_id(edge.first))
            .and(&self.exec_reason(model.event_id(edge.second)))
    }

    /// Why `edge` is in `graph`.
    pub fn edge_reason(&mut self, graph: GraphId, edge: Edge) -> Result<Reason, ReasoningError> {
        if let Some(reason) = self.memo.get(&(graph, edge)) {
            return Ok(reason.clone());
        }
        let graphs = self.graphs;
        let stamp = graphs
            .stamp_of(graph, edge)
            .ok_or_else(|| self.unexplained(graph, edge))?;
        let model = graphs.model();
        let reason = match &graphs.graph(graph).node {
            GraphNode::Static => self.exec_both(edge),
            GraphNode::ReadFrom => Reason::singleton(CoreLiteral::ReadFrom {
                write: model.event_id(edge.first),
                read: model.event_id(edge.second),
            }),
            GraphNode::CoherenceBase => match graphs.coherence_origin(edge) {
                Some(CoherenceOrigin::Init) => self.exec_both(edge),
                Some(CoherenceOrigin::Forced(reason)) => reason.clone(),
                // exec facts must survive when resolution strips the guess
                Some(CoherenceOrigin::Guessed) => Reason::singleton(CoreLiteral::Coherence {
                    first: model.event_id(edge.first),
                    second: model.event_id(edge.second),
                })
                .and(&self.exec_both(edge)),
                None => return Err(self.unexplained(graph, edge)),
            },
            &GraphNode::Union(a, b) => match self.reason_below(a, edge, stamp)? {
                Some(reason) => reason,
                None => self
                    .reason_below(b, edge, stamp)?
                    .ok_or_else(|| self.unexplained(graph, edge))?,
            },
            &GraphNode::Intersection(a, b) => {
                let ra = self.reason_below(a, edge, stamp)?;
                let rb = self.reason_below(b, edge, stamp)?;
                match (ra, rb) {
                    (Some(ra), Some(rb)) => ra.and(&rb),
                    _ => return Err(self.unexplained(graph, edge)),
                }
            }
            &GraphNode::Difference(a, _) | &GraphNode::Restrict { inner: a, .. } => self
                .reason_below(a, edge, stamp)?
                .ok_or_else(|| self.unexplained(graph, edge))?,
            &GraphNode::Inverse(a) => self
                .reason_below(a, edge.inverse(), stamp)?
                .ok_or_else(|| self.unexplained(graph, edge))?,
            &GraphNode::Composition(a, b) => {
                let middle = graphs
                    .successors(a, edge.first)
                    .find(|&y| {
                        self.is_below(a, Edge::new(edge.first, y), stamp)
                            && self.is_below(b, Edge::new(y, edge.second), stamp)
                    })
                    .ok_or_else(|| self.unexplained(graph, edge))?;
                let left = self.edge_reason(a, Edge::new(edge.first, middle))?;
                let right = self.edge_reason(b, Edge::new(middle, edge.second))?;
                left.and(&right)
            }
            &GraphNode::Closure(a) => {
                let path = axiom::shortest_path(edge.first, edge.second, |x| {
                    graphs
                        .successors(a, x)
                        .filter(|&y| self.is_below(a, Edge::new(x, y), stamp))
                        .collect()
                });
                // a self-loop in a closure needs a real cycle
                let path = match path {
                    Some(p) if !p.is_empty() => Some(p),
                    _ if edge.is_loop() => self.cycle_below(a, edge.first, stamp),
                    _ => None,
                }
                .ok_or_else(|| self.unexplained(graph, edge))?;
                self.path_reason(a, &path)?
            }
        };
        let reason = self.minimize(&reason);
        self.memo.insert((graph, edge), reason.clone());
        Ok(reason)
    }

    fn is_below(&self, graph: GraphId, edge: Edge, bound: Stamp) -> bool {
        self.graphs
            .stamp_of(graph, edge)
            .is_some_and(|s| s < bound)
    }

    fn reason_below(
        &mut self,
        graph: GraphId,
        edge: Edge,
        bound: Stamp,
    ) -> Result<Option<Reason>, ReasoningError> {
        if self.is_below(graph, edge, bound) {
            self.edge_reason(graph, edge).map(Some)
        } else {
            Ok(None)
        }
    }

    fn cycle_below(&self, graph: GraphId, node: ModelIndex, bound: Stamp) -> Option<Vec<Edge>> {
        self.graphs
            .successors(graph, node)
            .filter(|&y| self.is_below(graph, Edge::new(node, y), bound))
            .filter_map(|y| {
                let rest = axiom::shortest_path(y, node, |x| {
                    self.graphs
                        .successors(graph, x)
                        .filter(|&z| self.is_below(graph, Edge::new(x, z), bound))
                        .collect()
                })?;
                let mut cycle = vec![Edge::new(node, y)];
                cycle.extend(rest);
                Some(cycle)
            })
            .min_by_key(Vec::len)
    }

    fn path_reason(&mut self, graph: GraphId, path: &[Edge]) -> Result<Reason, ReasoningError> {
        let mut reason = Reason::tautology();
        for &edge in path {
            reason = reason.and(&self.edge_reason(graph, edge)?);
        }
        Ok(reason)
    }

    /// One reason per recorded violation of `axiom`.
    pub fn axiom_reasons(&mut self, axiom: &Axiom) -> Result<Dnf<CoreLiteral>, ReasoningError> {
        let edges: Vec<Edge> = axiom.violations().collect();
        let mut cubes = Vec::with_capacity(edges.len());
        for edge in edges {
            cubes.push(self.violation_reason(axiom, edge)?);
        }
        Ok(Dnf::new(cubes))
    }

    /// The reason of the first recorded violation, if any.
    pub fn some_axiom_reason(&mut self, axiom: &Axiom) -> Result<Option<Reason>, ReasoningError> {
        match axiom.violations().next() {
            Some(edge) => self.violation_reason(axiom, edge).map(Some),
            None => Ok(None),
        }
    }

    /// One reason for some violation of some axiom. Enough to refute a
    /// guess without enumerating every violation.
    pub fn some_violation_reason(&mut self) -> Result<Option<Reason>, ReasoningError> {
        let graphs = self.graphs;
        for axiom in graphs.axioms().iter().filter(|a| a.is_violated()) {
            if let Some(reason) = self.some_axiom_reason(axiom)? {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    /// Reasons for every violation of every axiom.
    pub fn all_violation_reasons(&mut self) -> Result<Dnf<CoreLiteral>, ReasoningError> {
        let graphs = self.graphs;
        let mut dnf = Dnf::falsum();
        for axiom in graphs.axioms().iter().filter(|a| a.is_violated()) {
            dnf = dnf.or(self.axiom_reasons(axiom)?);
        }
        Ok(dnf)
    }

    fn violation_reason(&mut self, axiom: &Axiom, edge: Edge) -> Result<Reason, ReasoningError> {
        let graphs = self.graphs;
        let reason = match axiom.kind {
            AxiomKind::Empty | AxiomKind::Irreflexive => self.edge_reason(axiom.graph, edge)?,
            AxiomKind::Acyclic => {
                let store = graphs.graph(axiom.graph).store();
                let back = axiom::path(store, graphs.timeline(), edge.second, edge.first)
                    .ok_or_else(|| self.unexplained(axiom.graph, edge))?;
                let mut cycle = vec![edge];
                cycle.extend(back);
                self.path_reason(axiom.graph, &cycle)?
            }
        };
        Ok(self.minimize(&reason))
    }

    /// Drops `exec` literals implied by another literal of the reason.
    pub fn minimize(&self, reason: &Reason) -> Reason {
        let literals = reason.literals();
        literals
            .iter()
            .filter(|&&lit| match lit {
                CoreLiteral::Exec(e) => !literals
                    .iter()
                    .any(|&other| other != lit && self.implies_exec(other, e)),
                _ => true,
            })
            .copied()
            .collect()
    }

    fn implies_exec(&self, literal: CoreLiteral, event: EventId) -> bool {
        match literal {
            CoreLiteral::Exec(e) => self.branches.is_implied(e, event),
            CoreLiteral::ReadFrom { write, read } => {
                self.branches.is_implied(write, event) || self.branches.is_implied(read, event)
            }
            // guesses get resolved away and cannot stand in for exec facts
            CoreLiteral::Coherence { .. } => false,
        }
    }

    fn unexplained(&self, graph: GraphId, edge: Edge) -> ReasoningError {
        let model = self.graphs.model();
        ReasoningError::UnexplainedEdge {
            graph: self.graphs.graph(graph).name.clone(),
            first: model.event_id(edge.first),
            second: model.event_id(edge.second),
        }
    }
}
