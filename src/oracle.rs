//! Exact maximum-cardinality matching oracle.
//!
//! The engine never implements matching itself; it asks a [`MatchingOracle`] for an
//! exact maximum matching of the current graph snapshot and compares weights. The
//! default oracle, [`EdmondsOracle`], delegates to petgraph's blossom implementation.
//! Every answer is checked against the snapshot it was computed for before the engine
//! relies on it.

use crate::error::EngineError;
use crate::graph::{DivisorGraph, Vertex};

// ============================================================================
// Matching
// ============================================================================

/// A set of vertex-disjoint edges, stored as a mate table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matching {
    /// `mates[v]` is the partner of `v`, if matched.
    mates: Vec<Option<Vertex>>,
    weight: usize,
}

impl Matching {
    /// The empty matching over vertices `1..=order`.
    pub fn empty(order: usize) -> Self {
        Self {
            mates: vec![None; order + 1],
            weight: 0,
        }
    }

    /// Builds a matching from an edge list.
    ///
    /// The weight is the number of edges supplied. Edges that reuse a vertex are kept
    /// as given, so [`verify`](Self::verify) can report them.
    pub fn from_edges<I>(order: usize, edges: I) -> Self
    where
        I: IntoIterator<Item = (Vertex, Vertex)>,
    {
        let mut mates = vec![None; order + 1];
        let mut weight = 0;
        for (u, v) in edges {
            let top = u.max(v);
            if top >= mates.len() {
                mates.resize(top + 1, None);
            }
            mates[u] = Some(v);
            mates[v] = Some(u);
            weight += 1;
        }
        Self { mates, weight }
    }

    /// Number of matched edges.
    #[inline]
    pub fn weight(&self) -> usize {
        self.weight
    }

    /// Partner of `v`, or `None` if `v` is unmatched or unknown to this matching.
    #[inline]
    pub fn mate(&self, v: Vertex) -> Option<Vertex> {
        self.mates.get(v).copied().flatten()
    }

    /// Returns whether `v` is covered.
    #[inline]
    pub fn is_matched(&self, v: Vertex) -> bool {
        self.mate(v).is_some()
    }

    /// Matched edges as `(u, v)` with `u < v`, ascending.
    pub fn edges(&self) -> impl Iterator<Item = (Vertex, Vertex)> + '_ {
        self.mates
            .iter()
            .enumerate()
            .filter_map(|(u, &m)| m.filter(|&v| u < v).map(|v| (u, v)))
    }

    /// Vertices of `1..=order` left uncovered ("outer" vertices).
    pub fn unmatched(&self, order: usize) -> impl Iterator<Item = Vertex> + '_ {
        (1..=order).filter(move |&v| !self.is_matched(v))
    }

    /// Checks that this is a maximal matching of `graph`: mates are symmetric, every
    /// matched pair is an attached edge, the weight equals the number of matched pairs,
    /// and no attached edge joins two unmatched vertices.
    ///
    /// # Errors
    /// Returns [`EngineError::OracleContract`] describing the first inconsistency.
    pub fn verify(&self, graph: &DivisorGraph, size: usize) -> Result<(), EngineError> {
        let violation = |details: String| EngineError::OracleContract { size, details };
        let mut pairs = 0usize;
        for (u, mate) in self.mates.iter().enumerate() {
            let Some(v) = *mate else { continue };
            if self.mate(v) != Some(u) {
                return Err(violation(format!("vertex {v} is matched to more than one vertex")));
            }
            if !graph.has_edge(u, v) {
                return Err(violation(format!("matched pair ({u}, {v}) is not an edge")));
            }
            if u < v {
                pairs += 1;
            }
        }
        if pairs != self.weight {
            return Err(violation(format!(
                "weight {} does not match {pairs} disjoint matched pairs",
                self.weight
            )));
        }
        // Maximality, not maximum: an edge with both ends free could extend the matching.
        if let Some((u, v)) = graph
            .edges()
            .find(|&(u, v)| !self.is_matched(u) && !self.is_matched(v))
        {
            return Err(violation(format!(
                "edge ({u}, {v}) has both ends unmatched, so the matching is not maximum"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Oracle
// ============================================================================

/// Source of exact maximum-cardinality matchings.
///
/// Implementations must be pure functions of the graph they are given: workers call
/// the same oracle concurrently, each on its own graph replica.
pub trait MatchingOracle: Send + Sync {
    /// Returns a maximum-cardinality matching of `graph` (detached vertices are isolated).
    fn maximum_matching(&self, graph: &DivisorGraph) -> Matching;
}

impl<O: MatchingOracle + ?Sized> MatchingOracle for &O {
    fn maximum_matching(&self, graph: &DivisorGraph) -> Matching {
        (**self).maximum_matching(graph)
    }
}

/// Edmonds' blossom algorithm, via `petgraph::algo::maximum_matching`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EdmondsOracle;

impl MatchingOracle for EdmondsOracle {
    fn maximum_matching(&self, graph: &DivisorGraph) -> Matching {
        let snapshot = graph.to_petgraph();
        let found = petgraph::algo::maximum_matching(&snapshot);
        Matching::from_edges(
            graph.order(),
            found.edges().map(|(a, b)| (a.index(), b.index())),
        )
    }
}

/// Queries `oracle` and checks the answer against `graph`.
pub(crate) fn query<O: MatchingOracle + ?Sized>(
    oracle: &O,
    graph: &DivisorGraph,
    size: usize,
) -> Result<Matching, EngineError> {
    let matching = oracle.maximum_matching(graph);
    matching.verify(graph, size)?;
    Ok(matching)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    /// Exhaustive maximum matching weight; exponential, for tiny graphs only.
    pub(crate) fn brute_weight(graph: &DivisorGraph) -> usize {
        fn best(graph: &DivisorGraph, v: Vertex, used: &mut [bool]) -> usize {
            if v > graph.order() {
                return 0;
            }
            if used[v] {
                return best(graph, v + 1, used);
            }
            // v stays unmatched
            let mut out = best(graph, v + 1, used);
            used[v] = true;
            for &u in graph.neighbors(v) {
                if u > v && !used[u] {
                    used[u] = true;
                    out = out.max(1 + best(graph, v + 1, used));
                    used[u] = false;
                }
            }
            used[v] = false;
            out
        }
        let mut used = vec![false; graph.order() + 1];
        best(graph, 1, &mut used)
    }

    /// Oracle that answers with a fixed matching regardless of the graph.
    pub(crate) struct LyingOracle(pub Vec<(Vertex, Vertex)>);

    impl MatchingOracle for LyingOracle {
        fn maximum_matching(&self, graph: &DivisorGraph) -> Matching {
            Matching::from_edges(graph.order(), self.0.iter().copied())
        }
    }

    /// Exact on full graphs, empty as soon as some vertex is detached.
    pub(crate) struct EmptyOnRemoval;

    impl MatchingOracle for EmptyOnRemoval {
        fn maximum_matching(&self, graph: &DivisorGraph) -> Matching {
            if (1..=graph.order()).any(|v| graph.degree(v) == 0) {
                Matching::empty(graph.order())
            } else {
                EdmondsOracle.maximum_matching(graph)
            }
        }
    }

    fn random_graph(rng: &mut XorShiftRng, order: usize, p: f64) -> DivisorGraph {
        let mut edges = Vec::new();
        for u in 1..=order {
            for v in (u + 1)..=order {
                if rng.random_bool(p) {
                    edges.push((u, v));
                }
            }
        }
        DivisorGraph::from_edges(order, &edges)
    }

    #[test]
    fn oracle_matches_bruteforce_random_graphs() {
        let mut rng = XorShiftRng::seed_from_u64(0xDEAD_BEEF);
        let oracle = EdmondsOracle;

        for _case in 0..60 {
            let order = rng.random_range(1..=11);
            let p = rng.random_range(0.1..0.7);
            let g = random_graph(&mut rng, order, p);
            let m = query(&oracle, &g, order).unwrap();
            assert_eq!(
                m.weight(),
                brute_weight(&g),
                "order={order} edges={:?}",
                g.edges().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn oracle_matches_bruteforce_on_divisor_graphs_with_removals() {
        let oracle = EdmondsOracle;
        for n in 1..=14 {
            let mut g = DivisorGraph::with_size(n);
            assert_eq!(oracle.maximum_matching(&g).weight(), brute_weight(&g), "n={n}");
            for s in 1..=n {
                let d = g.detach(s);
                let m = query(&oracle, &g, n).unwrap();
                assert!(!m.is_matched(s));
                assert_eq!(m.weight(), brute_weight(&g), "n={n} s={s}");
                g.reattach(d);
            }
        }
    }

    #[test]
    fn odd_cycle_needs_blossom() {
        // Triangle 1-2-3 with a pendant 3-4: maximum matching is 2.
        let g = DivisorGraph::from_edges(5, &[(1, 2), (2, 3), (1, 3), (3, 4), (4, 5)]);
        let m = EdmondsOracle.maximum_matching(&g);
        assert_eq!(m.weight(), 2);
        m.verify(&g, 5).unwrap();
    }

    #[test]
    fn unmatched_lists_outer_vertices() {
        let g = DivisorGraph::with_size(5);
        let m = EdmondsOracle.maximum_matching(&g);
        assert_eq!(m.weight(), 2);
        let outer: Vec<_> = m.unmatched(5).collect();
        assert_eq!(outer.len(), 1);
        assert!(!m.is_matched(outer[0]));
    }

    #[test]
    fn matching_edges_are_ordered_pairs() {
        let m = Matching::from_edges(6, [(4, 2), (1, 5)]);
        assert_eq!(m.edges().collect::<Vec<_>>(), vec![(1, 5), (2, 4)]);
        assert_eq!(m.mate(4), Some(2));
        assert_eq!(m.mate(3), None);
        assert_eq!(m.mate(100), None);
        assert_eq!(Matching::empty(3).weight(), 0);
    }

    #[test]
    fn verify_rejects_non_edges() {
        let g = DivisorGraph::with_size(6);
        let m = Matching::from_edges(6, [(2, 3)]);
        let err = m.verify(&g, 6).unwrap_err();
        assert!(matches!(err, EngineError::OracleContract { size: 6, .. }));
    }

    #[test]
    fn verify_rejects_overlapping_edges() {
        let g = DivisorGraph::with_size(6);
        let err = query(&LyingOracle(vec![(1, 2), (1, 3)]), &g, 6).unwrap_err();
        assert!(err.to_string().contains("contract"));
    }

    #[test]
    fn verify_rejects_matchings_with_a_free_edge() {
        let g = DivisorGraph::with_size(6);
        // (3, 6) is an edge and both ends are free.
        let err = Matching::from_edges(6, [(1, 5), (2, 4)]).verify(&g, 6).unwrap_err();
        assert!(err.to_string().contains("(3, 6)"), "{err}");

        let mut g = DivisorGraph::with_size(7);
        let d = g.detach(7);
        let err = query(&EmptyOnRemoval, &g, 7).unwrap_err();
        assert!(matches!(err, EngineError::OracleContract { size: 7, .. }));
        g.reattach(d);
        assert!(query(&EmptyOnRemoval, &g, 7).is_ok());
    }
}
