//! Consistency axioms over event graphs.
//!
//! An axiom watches the edges added to its graph and records violations as
//! they appear. Each violation carries the watermark at which it was found,
//! so backtracking drops exactly the violations that depended on undone
//! edges.

use std::collections::{HashMap, VecDeque};

use cohere_ir::AxiomKind;

use crate::graph::{Edge, EdgeStore, GraphId};
use crate::model::ModelIndex;
use crate::timeline::{Stamp, Timeline};

#[derive(Debug, Clone)]
pub struct Axiom {
    pub kind: AxiomKind,
    pub graph: GraphId,
    pub name: String,
    violations: Vec<(Edge, Stamp)>,
}

impl Axiom {
    pub fn new(kind: AxiomKind, graph: GraphId, name: String) -> Self {
        Self {
            kind,
            graph,
            name,
            violations: Vec::new(),
        }
    }

    pub fn is_violated(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Edges witnessing a violation: the offending edge for `empty` and
    /// `irreflexive`, an edge on a cycle for `acyclic`.
    pub fn violations(&self) -> impl Iterator<Item = Edge> + '_ {
        self.violations.iter().map(|&(e, _)| e)
    }

    pub(crate) fn observe(&mut self, added: &[Edge], store: &EdgeStore, timeline: &Timeline) {
        let now = timeline.watermark();
        for &edge in added {
            let violated = match self.kind {
                AxiomKind::Empty => true,
                AxiomKind::Irreflexive => edge.is_loop(),
                AxiomKind::Acyclic => {
                    edge.is_loop() || path(store, timeline, edge.second, edge.first).is_some()
                }
            };
            if violated {
                self.violations.push((edge, now));
            }
        }
    }

    pub fn backtrack_to(&mut self, watermark: Stamp) {
        let keep = self.violations.partition_point(|&(_, s)| s <= watermark);
        self.violations.truncate(keep);
    }
}

/// A shortest path `from ->* to` over live edges, as the list of its edges.
/// `from == to` yields the empty path.
pub(crate) fn path(
    store: &EdgeStore,
    timeline: &Timeline,
    from: ModelIndex,
    to: ModelIndex,
) -> Option<Vec<Edge>> {
    shortest_path(from, to, |node| store.successors(node, timeline).collect())
}

/// Breadth-first search with an arbitrary successor function.
pub(crate) fn shortest_path<F>(from: ModelIndex, to: ModelIndex, successors: F) -> Option<Vec<Edge>>
where
    F: Fn(ModelIndex) -> Vec<ModelIndex>,
{
    if from == to {
        return Some(Vec::new());
    }
    let mut parent: HashMap<ModelIndex, ModelIndex> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        for next in successors(node) {
            if next == from || parent.contains_key(&next) {
                continue;
            }
            parent.insert(next, node);
            if next == to {
                let mut edges = Vec::new();
                let mut cur = to;
                while let Some(&prev) = parent.get(&cur) {
                    edges.push(Edge::new(prev, cur));
                    cur = prev;
                }
                edges.reverse();
                return Some(edges);
            }
            queue.push_back(next);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(edges: &[(usize, usize)], tl: &mut Timeline) -> EdgeStore {
        let mut store = EdgeStore::new(4);
        for &(a, b) in edges {
            store.insert(Edge::new(a, b), tl.tick());
        }
        store
    }

    #[test]
    fn acyclic_detects_the_closing_edge() {
        let mut tl = Timeline::new();
        let mut store = store_with(&[(1, 2), (2, 3)], &mut tl);
        let mut axiom = Axiom::new(AxiomKind::Acyclic, 0, "t".into());
        axiom.observe(&[Edge::new(1, 2), Edge::new(2, 3)], &store, &tl);
        assert!(!axiom.is_violated());

        let mark = tl.watermark();
        let closing = Edge::new(3, 1);
        store.insert(closing, tl.tick());
        axiom.observe(&[closing], &store, &tl);
        assert_eq!(axiom.violations().collect::<Vec<_>>(), vec![closing]);
        assert_eq!(
            path(&store, &tl, 1, 3),
            Some(vec![Edge::new(1, 2), Edge::new(2, 3)])
        );

        tl.backtrack_to(mark);
        store.backtrack_to(mark);
        axiom.backtrack_to(mark);
        assert!(!axiom.is_violated());
    }

    #[test]
    fn irreflexive_and_empty() {
        let mut tl = Timeline::new();
        let store = store_with(&[(0, 0), (0, 1)], &mut tl);
        let added = [Edge::new(0, 0), Edge::new(0, 1)];
        let mut irreflexive = Axiom::new(AxiomKind::Irreflexive, 0, "i".into());
        irreflexive.observe(&added, &store, &tl);
        assert_eq!(irreflexive.violations().count(), 1);
        let mut empty = Axiom::new(AxiomKind::Empty, 0, "e".into());
        empty.observe(&added, &store, &tl);
        assert_eq!(empty.violations().count(), 2);
    }
}
