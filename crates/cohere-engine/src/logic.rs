//! Conjunctions and disjunctive normal forms over positive literals.
//!
//! Reasons for violations are conjunctions; the set of all reasons found
//! for one candidate execution is a DNF. Literals are kept sorted and
//! deduplicated so that subsumption is a subset test.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Conjunction<L> {
    literals: Vec<L>,
}

impl<L: Ord + Clone> Conjunction<L> {
    /// The empty conjunction, i.e. `true`.
    pub fn tautology() -> Self {
        Self {
            literals: Vec::new(),
        }
    }

    pub fn new(literals: impl IntoIterator<Item = L>) -> Self {
        let mut literals: Vec<L> = literals.into_iter().collect();
        literals.sort();
        literals.dedup();
        Self { literals }
    }

    pub fn singleton(literal: L) -> Self {
        Self {
            literals: vec![literal],
        }
    }

    pub fn literals(&self) -> &[L] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn contains(&self, literal: &L) -> bool {
        self.literals.binary_search(literal).is_ok()
    }

    pub fn and(&self, other: &Conjunction<L>) -> Conjunction<L> {
        let mut literals = Vec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.literals.len() && j < other.literals.len() {
            match self.literals[i].cmp(&other.literals[j]) {
                std::cmp::Ordering::Less => {
                    literals.push(self.literals[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    literals.push(other.literals[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    literals.push(self.literals[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        literals.extend_from_slice(&self.literals[i..]);
        literals.extend_from_slice(&other.literals[j..]);
        Conjunction { literals }
    }

    pub fn without(&self, literal: &L) -> Conjunction<L> {
        Conjunction {
            literals: self
                .literals
                .iter()
                .filter(|l| *l != literal)
                .cloned()
                .collect(),
        }
    }

    /// Every literal of `self` also occurs in `other`, so `other` implies
    /// `self`.
    pub fn is_subset_of(&self, other: &Conjunction<L>) -> bool {
        if self.len() > other.len() {
            return false;
        }
        let mut rest = other.literals.iter();
        self.literals
            .iter()
            .all(|l| rest.by_ref().any(|o| o == l))
    }
}

impl<L: Ord + Clone> Default for Conjunction<L> {
    fn default() -> Self {
        Self::tautology()
    }
}

impl<L: Ord + Clone> FromIterator<L> for Conjunction<L> {
    fn from_iter<I: IntoIterator<Item = L>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<L: fmt::Display> fmt::Display for Conjunction<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.literals.is_empty() {
            return write!(f, "true");
        }
        for (i, literal) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, " & ")?;
            }
            write!(f, "{literal}")?;
        }
        Ok(())
    }
}

/// A disjunction of conjunctions. The empty DNF is `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Dnf<L> {
    cubes: Vec<Conjunction<L>>,
}

impl<L: Ord + Clone> Dnf<L> {
    pub fn falsum() -> Self {
        Self { cubes: Vec::new() }
    }

    pub fn new(cubes: impl IntoIterator<Item = Conjunction<L>>) -> Self {
        let mut dnf = Self {
            cubes: cubes.into_iter().collect(),
        };
        dnf.simplify();
        dnf
    }

    pub fn cubes(&self) -> &[Conjunction<L>] {
        &self.cubes
    }

    pub fn into_cubes(self) -> Vec<Conjunction<L>> {
        self.cubes
    }

    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_false(&self) -> bool {
        self.cubes.is_empty()
    }

    pub fn push(&mut self, cube: Conjunction<L>) {
        self.cubes.push(cube);
        self.simplify();
    }

    pub fn or(mut self, other: Dnf<L>) -> Dnf<L> {
        self.cubes.extend(other.cubes);
        self.simplify();
        self
    }

    /// A smallest cube, if any.
    pub fn smallest(&self) -> Option<&Conjunction<L>> {
        self.cubes.iter().min_by_key(|c| c.len())
    }

    /// Drops duplicate cubes and cubes that contain another cube.
    pub fn simplify(&mut self) {
        let mut cubes = std::mem::take(&mut self.cubes);
        cubes.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        cubes.dedup();
        let mut kept: Vec<Conjunction<L>> = Vec::with_capacity(cubes.len());
        for cube in cubes {
            if !kept.iter().any(|k| k.is_subset_of(&cube)) {
                kept.push(cube);
            }
        }
        self.cubes = kept;
    }

    /// Cubes that do not mention `literal`.
    pub fn independent_of(&self, literal: &L) -> Dnf<L> {
        Dnf {
            cubes: self
                .cubes
                .iter()
                .filter(|c| !c.contains(literal))
                .cloned()
                .collect(),
        }
    }

    /// Resolution on a pair of complementary guesses: `self` was derived
    /// under `literal`, `other` under `other_literal`, and one of the two
    /// literals always holds. Each resolvent joins one cube of each side
    /// with the guessed literals removed.
    pub fn resolve(&self, literal: &L, other: &Dnf<L>, other_literal: &L) -> Dnf<L> {
        let mut resolvents = Vec::with_capacity(self.len() * other.len());
        for a in &self.cubes {
            let a = a.without(literal);
            for b in &other.cubes {
                resolvents.push(a.and(&b.without(other_literal)));
            }
        }
        Dnf::new(resolvents)
    }
}

impl<L: Ord + Clone> Default for Dnf<L> {
    fn default() -> Self {
        Self::falsum()
    }
}

impl<L: fmt::Display> fmt::Display for Dnf<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cubes.is_empty() {
            return write!(f, "false");
        }
        for (i, cube) in self.cubes.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "({cube})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn conj(lits: &[u8]) -> Conjunction<u8> {
        Conjunction::new(lits.iter().copied())
    }

    #[test]
    fn conjunction_is_sorted_and_deduplicated() {
        let c = conj(&[3, 1, 3, 2]);
        assert_eq!(c.literals(), &[1, 2, 3]);
        assert!(c.contains(&2));
        assert_eq!(c.without(&2).literals(), &[1, 3]);
        assert_eq!(c.and(&conj(&[0, 2, 4])).literals(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn subset_test() {
        assert!(conj(&[1, 3]).is_subset_of(&conj(&[1, 2, 3])));
        assert!(!conj(&[1, 4]).is_subset_of(&conj(&[1, 2, 3])));
        assert!(Conjunction::<u8>::tautology().is_subset_of(&conj(&[7])));
    }

    #[test]
    fn simplify_drops_subsumed_cubes() {
        let dnf = Dnf::new(vec![conj(&[1, 2, 3]), conj(&[1, 2]), conj(&[1, 2]), conj(&[4])]);
        assert_eq!(dnf.cubes(), &[conj(&[4]), conj(&[1, 2])]);
    }

    #[test]
    fn resolution_removes_both_guesses() {
        let left = Dnf::new(vec![conj(&[1, 10]), conj(&[2, 3, 10])]);
        let right = Dnf::new(vec![conj(&[1, 11])]);
        let resolved = left.resolve(&10, &right, &11);
        // {1} subsumes {1, 2, 3}
        assert_eq!(resolved.cubes(), &[conj(&[1])]);
    }

    #[test]
    fn display_uses_ascii_connectives() {
        let dnf = Dnf::new(vec![conj(&[1, 2]), conj(&[3])]);
        assert_eq!(dnf.to_string(), "(3) | (1 & 2)");
        assert_eq!(Dnf::<u8>::falsum().to_string(), "false");
    }

    proptest! {
        #[test]
        fn simplified_cubes_are_pairwise_incomparable(
            cubes in prop::collection::vec(prop::collection::vec(0u8..6, 0..4), 0..8)
        ) {
            let dnf = Dnf::new(cubes.iter().map(|c| conj(c)));
            for (i, a) in dnf.cubes().iter().enumerate() {
                for (j, b) in dnf.cubes().iter().enumerate() {
                    if i != j {
                        prop_assert!(!a.is_subset_of(b));
                    }
                }
            }
            // every input cube is implied by some kept cube
            for c in &cubes {
                let c = conj(c);
                prop_assert!(dnf.cubes().iter().any(|k| k.is_subset_of(&c)));
            }
        }
    }
}
