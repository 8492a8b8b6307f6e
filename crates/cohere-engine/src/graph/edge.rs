use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::model::ModelIndex;
use crate::timeline::{Stamp, Timeline};

/// Ordered pair of model indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub first: ModelIndex,
    pub second: ModelIndex,
}

impl Edge {
    pub fn new(first: ModelIndex, second: ModelIndex) -> Self {
        Self { first, second }
    }

    pub fn inverse(self) -> Self {
        Self::new(self.second, self.first)
    }

    pub fn is_loop(self) -> bool {
        self.first == self.second
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Edges of one relation with the stamp of their latest insertion.
///
/// Entries are never removed. An edge is present iff its stamp is live in
/// the [`Timeline`]. `history` lists the live insertions in stamp order and
/// is cut back on backtracking, which keeps [`EdgeStore::size`] exact.
#[derive(Debug, Clone)]
pub struct EdgeStore {
    stamps: HashMap<Edge, Stamp>,
    outgoing: Vec<Vec<ModelIndex>>,
    incoming: Vec<Vec<ModelIndex>>,
    history: Vec<(Edge, Stamp)>,
}

impl EdgeStore {
    pub fn new(num_events: usize) -> Self {
        Self {
            stamps: HashMap::new(),
            outgoing: vec![Vec::new(); num_events],
            incoming: vec![Vec::new(); num_events],
            history: Vec::new(),
        }
    }

    /// The live stamp of `edge`.
    pub fn stamp_of(&self, edge: Edge, timeline: &Timeline) -> Option<Stamp> {
        self.stamps
            .get(&edge)
            .copied()
            .filter(|&s| timeline.is_live(s))
    }

    pub fn contains(&self, edge: Edge, timeline: &Timeline) -> bool {
        self.stamp_of(edge, timeline).is_some()
    }

    /// Records `edge` at `stamp`. The caller checks that it is not present.
    pub fn insert(&mut self, edge: Edge, stamp: Stamp) {
        if self.stamps.insert(edge, stamp).is_none() {
            self.outgoing[edge.first].push(edge.second);
            self.incoming[edge.second].push(edge.first);
        }
        self.history.push((edge, stamp));
    }

    pub fn successors<'a>(
        &'a self,
        node: ModelIndex,
        timeline: &'a Timeline,
    ) -> impl Iterator<Item = ModelIndex> + 'a {
        self.outgoing[node]
            .iter()
            .copied()
            .filter(move |&s| self.contains(Edge::new(node, s), timeline))
    }

    pub fn predecessors<'a>(
        &'a self,
        node: ModelIndex,
        timeline: &'a Timeline,
    ) -> impl Iterator<Item = ModelIndex> + 'a {
        self.incoming[node]
            .iter()
            .copied()
            .filter(move |&p| self.contains(Edge::new(p, node), timeline))
    }

    /// Live edges with their stamps, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (Edge, Stamp)> + '_ {
        self.history.iter().copied()
    }

    pub fn size(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn backtrack_to(&mut self, watermark: Stamp) {
        let keep = self.history.partition_point(|&(_, s)| s <= watermark);
        self.history.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinsertion_after_backtrack() {
        let mut tl = Timeline::new();
        let mut store = EdgeStore::new(3);
        let e = Edge::new(0, 1);
        store.insert(e, tl.tick());
        let mark = tl.watermark();
        let f = Edge::new(1, 2);
        store.insert(f, tl.tick());
        assert_eq!(store.successors(1, &tl).collect::<Vec<_>>(), vec![2]);

        tl.backtrack_to(mark);
        store.backtrack_to(mark);
        assert!(store.contains(e, &tl));
        assert!(!store.contains(f, &tl));
        assert_eq!(store.size(), 1);
        assert_eq!(store.successors(1, &tl).count(), 0);

        let again = tl.tick();
        store.insert(f, again);
        assert_eq!(store.stamp_of(f, &tl), Some(again));
        assert_eq!(store.predecessors(2, &tl).collect::<Vec<_>>(), vec![1]);
        assert_eq!(store.size(), 2);
    }
}
