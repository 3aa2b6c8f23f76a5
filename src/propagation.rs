//! Propagation of a TRUE verdict without further oracle calls.
//!
//! Let `M` be a maximum matching of `G` that leaves `s` uncovered. Every neighbor `u`
//! of `s` is covered by `M` (otherwise `M + su` would be larger), and swapping `u`'s
//! matched edge for `su` yields another maximum matching that leaves `M(u)` uncovered.
//! Rotation applies this once or twice; discovery follows whole alternating paths
//! between two maximum matchings.

use std::collections::BTreeSet;

use crate::graph::{DivisorGraph, Vertex};
use crate::oracle::Matching;

/// How far a rotation follows matched edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hops {
    /// Partners of the uncovered vertex's neighbors.
    One,
    /// Additionally, partners of the neighbors of every vertex found by the first hop.
    Two,
}

/// Per-step propagation rule applied after a candidate tests TRUE.
#[derive(Clone, Debug)]
pub enum Propagation {
    /// Every candidate is tested on its own.
    None,
    /// Rotate along matched edges next to the candidate.
    Rotation(Hops),
    /// Walk alternating paths from the outer vertices of a baseline maximum matching.
    Discovery {
        /// Maximum matching of the full graph for this step.
        old: Matching,
        /// Vertices left uncovered by `old`, ascending.
        outer: Vec<Vertex>,
    },
}

impl Propagation {
    /// Builds the discovery rule from a maximum matching of the full `G(n)`.
    pub fn discovery(old: Matching, order: usize) -> Self {
        let outer = old.unmatched(order).collect();
        Propagation::Discovery { old, outer }
    }

    /// Returns `true` if this rule can resolve candidates beyond the one tested.
    #[inline]
    pub fn propagates(&self) -> bool {
        !matches!(self, Propagation::None)
    }

    /// Vertices proven TRUE by a maximum matching `found` that leaves some TRUE vertex
    /// uncovered.
    ///
    /// `graph` is the snapshot `found` was computed on and `released` are the neighbors
    /// the uncovered vertex had in the full graph. The result may include vertices that
    /// are already classified.
    pub fn resolve(
        &self,
        graph: &DivisorGraph,
        released: &[Vertex],
        found: &Matching,
    ) -> BTreeSet<Vertex> {
        match self {
            Propagation::None => BTreeSet::new(),
            Propagation::Rotation(hops) => rotate(graph, released, found, *hops),
            Propagation::Discovery { old, outer } => discover(old, outer, found, graph.order()),
        }
    }
}

/// One- or two-hop rotation around an uncovered vertex.
pub fn rotate(
    graph: &DivisorGraph,
    released: &[Vertex],
    found: &Matching,
    hops: Hops,
) -> BTreeSet<Vertex> {
    let first: BTreeSet<Vertex> = released.iter().filter_map(|&u| found.mate(u)).collect();
    if hops == Hops::One {
        return first;
    }

    let mut out = first.clone();
    for &w in &first {
        for &l in graph.neighbors(w) {
            if let Some(x) = found.mate(l) {
                out.insert(x);
            }
        }
    }
    out
}

/// Alternating-path discovery between the step's baseline matching `old` and `found`.
///
/// From each outer vertex `u`, repeatedly step to `found`'s partner and then to `old`'s
/// partner; every vertex reached by an `old` step is uncovered by some maximum matching.
pub fn discover(
    old: &Matching,
    outer: &[Vertex],
    found: &Matching,
    order: usize,
) -> BTreeSet<Vertex> {
    let mut out = BTreeSet::new();
    for &u in outer {
        let mut x = u;
        // An alternating path visits each vertex at most once.
        for _ in 0..=order {
            let Some(y) = found.mate(x) else { break };
            let Some(z) = old.mate(y) else { break };
            out.insert(z);
            x = z;
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::tests::brute_weight;

    /// Every vertex in `marks` must be uncovered by some maximum matching of `graph`.
    fn assert_all_inessential(graph: &mut DivisorGraph, marks: &BTreeSet<Vertex>) {
        let full = brute_weight(graph);
        for &v in marks {
            let d = graph.detach(v);
            assert_eq!(brute_weight(graph), full, "vertex {v} is essential");
            graph.reattach(d);
        }
    }

    #[test]
    fn one_hop_marks_partners_of_released_neighbors() {
        // Path 1-2-3-4-5 with s = 5 removed: M = {1-2, 3-4}; s's neighbor 4 -> partner 3.
        let mut g = DivisorGraph::from_edges(5, &[(1, 2), (2, 3), (3, 4), (4, 5)]);
        let d = g.detach(5);
        let m = Matching::from_edges(5, [(1, 2), (3, 4)]);
        let marks = rotate(&g, d.neighbors(), &m, Hops::One);
        assert_eq!(marks, BTreeSet::from([3]));
        g.reattach(d);
        assert_all_inessential(&mut g, &marks);
    }

    #[test]
    fn two_hops_reach_further() {
        let mut g = DivisorGraph::from_edges(5, &[(1, 2), (2, 3), (3, 4), (4, 5)]);
        let d = g.detach(5);
        let m = Matching::from_edges(5, [(1, 2), (3, 4)]);
        let marks = rotate(&g, d.neighbors(), &m, Hops::Two);
        // 3's neighbors are 2 and 4; their partners are 1 and 3.
        assert_eq!(marks, BTreeSet::from([1, 3]));
        g.reattach(d);
        assert_all_inessential(&mut g, &marks);
    }

    #[test]
    fn discovery_follows_alternating_path() {
        // Path 1-2-3-4-5: old = {2-3, 4-5} leaves 1 outer; found = {1-2, 3-4} leaves 5.
        let mut g = DivisorGraph::from_edges(5, &[(1, 2), (2, 3), (3, 4), (4, 5)]);
        let old = Matching::from_edges(5, [(2, 3), (4, 5)]);
        let found = Matching::from_edges(5, [(1, 2), (3, 4)]);
        let Propagation::Discovery { old, outer } = Propagation::discovery(old, 5) else {
            unreachable!()
        };
        assert_eq!(outer, vec![1]);
        let marks = discover(&old, &outer, &found, 5);
        assert_eq!(marks, BTreeSet::from([3, 5]));
        assert_all_inessential(&mut g, &marks);
    }

    #[test]
    fn rotation_on_divisor_graphs_only_marks_inessential_vertices() {
        let oracle = crate::oracle::EdmondsOracle;
        for n in 4..=13 {
            let mut g = DivisorGraph::with_size(n);
            let full = brute_weight(&g);
            for s in 2..=n {
                let d = g.detach(s);
                let m = crate::oracle::query(&oracle, &g, n).unwrap();
                if m.weight() == full {
                    let marks = rotate(&g, d.neighbors(), &m, Hops::Two);
                    g.reattach(d);
                    assert_all_inessential(&mut g, &marks);
                } else {
                    g.reattach(d);
                }
            }
        }
    }

    #[test]
    fn none_resolves_nothing() {
        let g = DivisorGraph::with_size(6);
        let m = Matching::from_edges(6, [(1, 5), (2, 4), (3, 6)]);
        assert!(Propagation::None.resolve(&g, &[1, 2], &m).is_empty());
        assert!(!Propagation::None.propagates());
    }
}
