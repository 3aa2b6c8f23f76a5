//! TRUE/FALSE partitions of board positions and the per-size classification map.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::Vertex;

/// Classification of a single vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Removing the vertex leaves the maximum matching weight unchanged.
    True,
    /// Removing the vertex strictly decreases the maximum matching weight.
    False,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::True => "TRUE",
            Verdict::False => "FALSE",
        })
    }
}

// ============================================================================
// Partition
// ============================================================================

/// The pair `(TRUE(n), FALSE(n))` for one board size.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    trues: BTreeSet<Vertex>,
    falses: BTreeSet<Vertex>,
}

impl Partition {
    /// Builds a partition from explicit sets.
    pub fn new(trues: BTreeSet<Vertex>, falses: BTreeSet<Vertex>) -> Self {
        Self { trues, falses }
    }

    /// Builds a partition from vertex lists.
    pub fn from_lists(trues: &[Vertex], falses: &[Vertex]) -> Self {
        Self {
            trues: trues.iter().copied().collect(),
            falses: falses.iter().copied().collect(),
        }
    }

    /// The fixed classification for board sizes 1..=3, which the engine never computes.
    pub fn known(size: usize) -> Option<Self> {
        match size {
            1 => Some(Self::from_lists(&[1], &[])),
            2 => Some(Self::from_lists(&[], &[1, 2])),
            3 => Some(Self::from_lists(&[2, 3], &[1])),
            _ => None,
        }
    }

    /// Matching-inessential vertices.
    #[inline]
    pub fn trues(&self) -> &BTreeSet<Vertex> {
        &self.trues
    }

    /// Matching-essential vertices.
    #[inline]
    pub fn falses(&self) -> &BTreeSet<Vertex> {
        &self.falses
    }

    /// Returns the verdict recorded for `v`, if any.
    pub fn verdict(&self, v: Vertex) -> Option<Verdict> {
        if self.trues.contains(&v) {
            Some(Verdict::True)
        } else if self.falses.contains(&v) {
            Some(Verdict::False)
        } else {
            None
        }
    }

    /// Records `v` under `verdict`, removing it from the other side if present.
    pub fn set(&mut self, v: Vertex, verdict: Verdict) {
        let (into, from) = match verdict {
            Verdict::True => (&mut self.trues, &mut self.falses),
            Verdict::False => (&mut self.falses, &mut self.trues),
        };
        from.remove(&v);
        into.insert(v);
    }

    /// Records `v` under `verdict` without touching the other side.
    #[inline]
    pub(crate) fn insert(&mut self, v: Vertex, verdict: Verdict) {
        match verdict {
            Verdict::True => self.trues.insert(v),
            Verdict::False => self.falses.insert(v),
        };
    }

    /// Adds every verdict of `other`. Both sides are unioned, so merge order is irrelevant.
    pub fn absorb(&mut self, other: Partition) {
        self.trues.extend(other.trues);
        self.falses.extend(other.falses);
    }

    /// Number of classified vertices.
    pub fn len(&self) -> usize {
        self.trues.len() + self.falses.len()
    }

    /// Returns `true` if nothing is classified.
    pub fn is_empty(&self) -> bool {
        self.trues.is_empty() && self.falses.is_empty()
    }

    /// Returns `true` iff TRUE and FALSE are disjoint and together cover exactly `1..=size`.
    pub fn is_complete_for(&self, size: usize) -> bool {
        self.trues.is_disjoint(&self.falses)
            && self.len() == size
            && self
                .trues
                .iter()
                .chain(&self.falses)
                .all(|&v| (1..=size).contains(&v))
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Ordered mapping from board size to its partition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification {
    steps: BTreeMap<usize, Partition>,
}

impl Classification {
    /// Creates an empty classification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the partition for `size`, replacing any earlier one.
    pub fn insert(&mut self, size: usize, partition: Partition) {
        self.steps.insert(size, partition);
    }

    /// Partition for `size`, if computed.
    pub fn get(&self, size: usize) -> Option<&Partition> {
        self.steps.get(&size)
    }

    /// Iterates `(size, partition)` in ascending size order.
    pub fn iter(&self) -> btree_map::Iter<'_, usize, Partition> {
        self.steps.iter()
    }

    /// Computed sizes, ascending.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.keys().copied()
    }

    /// Number of computed sizes.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no size was computed.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Largest computed size.
    pub fn max_size(&self) -> Option<usize> {
        self.steps.keys().next_back().copied()
    }
}

impl<'a> IntoIterator for &'a Classification {
    type Item = (&'a usize, &'a Partition);
    type IntoIter = btree_map::Iter<'a, usize, Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
