//! Incrementally grown divisor graph with transient vertex detachment.
//!
//! `G(n)` has vertices `1..=n` and an edge between `d` and `k` whenever `d` properly
//! divides `k`. Growth is monotonic: [`DivisorGraph::extend`] only ever adds a vertex and
//! its divisor edges. The only removal is [`DivisorGraph::detach`], which must be paired
//! with [`DivisorGraph::reattach`] to restore the exact prior adjacency.

use petgraph::graph::{NodeIndex, UnGraph};

/// A vertex id. Vertex `v` stands for board position `v`; id 0 is never used.
pub type Vertex = usize;

// ============================================================================
// DivisorGraph
// ============================================================================

/// Arena adjacency keyed by vertex id.
///
/// Representation:
/// - `adj[v]` holds the neighbors of `v` in ascending order (`adj[0]` is always empty).
/// - `edge_count` is the number of undirected edges currently attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DivisorGraph {
    adj: Vec<Vec<Vertex>>,
    edge_count: usize,
}

/// Adjacency of a vertex taken out by [`DivisorGraph::detach`].
///
/// Handing it back to [`DivisorGraph::reattach`] restores the vertex exactly.
#[derive(Debug)]
#[must_use = "a detached vertex must be reattached"]
pub struct Detached {
    vertex: Vertex,
    neighbors: Vec<Vertex>,
}

impl Detached {
    /// The vertex that was detached.
    #[inline]
    pub fn vertex(&self) -> Vertex {
        self.vertex
    }

    /// Its neighbors before detachment, ascending.
    #[inline]
    pub fn neighbors(&self) -> &[Vertex] {
        &self.neighbors
    }
}

impl Default for DivisorGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DivisorGraph {
    /// Creates the empty graph `G(0)`.
    pub fn new() -> Self {
        Self {
            adj: vec![Vec::new()],
            edge_count: 0,
        }
    }

    /// Builds `G(n)` from scratch.
    pub fn with_size(n: usize) -> Self {
        let mut graph = Self::new();
        graph.extend(n);
        graph
    }

    /// Grows the graph so that it contains vertex `n` and every divisor edge ending at `n`.
    ///
    /// Missing smaller vertices are added first. Returns `false` if `n` was already
    /// present, in which case nothing changes.
    pub fn extend(&mut self, n: Vertex) -> bool {
        if n == 0 || n <= self.order() {
            return false;
        }
        for k in (self.order() + 1)..=n {
            self.push_vertex(k);
        }
        true
    }

    /// Appends vertex `n == order() + 1` with edges to all of its proper divisors.
    fn push_vertex(&mut self, n: Vertex) {
        debug_assert_eq!(n, self.order() + 1);
        self.adj.push(Vec::new());

        let mut j = 1;
        while j * j <= n {
            if j != n && n % j == 0 {
                self.attach_divisor(j, n);
                let co = n / j;
                // j == 1 pairs with n itself; j * j == n pairs with j again.
                if j != 1 && co != j {
                    self.attach_divisor(co, n);
                }
            }
            j += 1;
        }
        self.adj[n].sort_unstable();
    }

    /// Adds edge `(d, n)` where `n` is the newest vertex, so pushing keeps `adj[d]` sorted.
    #[inline]
    fn attach_divisor(&mut self, d: Vertex, n: Vertex) {
        debug_assert!(d < n && n % d == 0);
        self.adj[d].push(n);
        self.adj[n].push(d);
        self.edge_count += 1;
    }

    /// Largest vertex id (`n` for `G(n)`).
    #[inline]
    pub fn order(&self) -> usize {
        self.adj.len() - 1
    }

    /// Number of undirected edges currently attached.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Neighbors of `v`, ascending. Empty for detached or unknown vertices.
    #[inline]
    pub fn neighbors(&self, v: Vertex) -> &[Vertex] {
        self.adj.get(v).map_or(&[][..], Vec::as_slice)
    }

    /// Degree of `v`.
    #[inline]
    pub fn degree(&self, v: Vertex) -> usize {
        self.neighbors(v).len()
    }

    /// Returns whether the edge `(u, v)` is currently attached.
    #[inline]
    pub fn has_edge(&self, u: Vertex, v: Vertex) -> bool {
        self.neighbors(u).binary_search(&v).is_ok()
    }

    /// Iterates the attached edges as `(u, v)` with `u < v`, in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = (Vertex, Vertex)> + '_ {
        self.adj.iter().enumerate().flat_map(|(u, nbrs)| {
            nbrs.iter()
                .copied()
                .filter(move |&v| u < v)
                .map(move |v| (u, v))
        })
    }

    /// Removes every edge at `s`, leaving `s` isolated.
    ///
    /// An isolated vertex cannot take part in a matching, so the maximum matching of the
    /// result equals that of `G(n)` with `s` deleted.
    pub fn detach(&mut self, s: Vertex) -> Detached {
        debug_assert!(s >= 1 && s <= self.order(), "vertex {s} out of range");
        let neighbors = std::mem::take(&mut self.adj[s]);
        for &v in &neighbors {
            let row = &mut self.adj[v];
            if let Ok(pos) = row.binary_search(&s) {
                row.remove(pos);
            }
        }
        self.edge_count -= neighbors.len();
        Detached {
            vertex: s,
            neighbors,
        }
    }

    /// Restores a vertex taken out by [`detach`](Self::detach).
    pub fn reattach(&mut self, detached: Detached) {
        let Detached { vertex, neighbors } = detached;
        debug_assert!(self.adj[vertex].is_empty(), "vertex {vertex} is not detached");
        for &v in &neighbors {
            let row = &mut self.adj[v];
            if let Err(pos) = row.binary_search(&vertex) {
                row.insert(pos, vertex);
            }
        }
        self.edge_count += neighbors.len();
        self.adj[vertex] = neighbors;
    }

    /// Exports the current snapshot as a petgraph graph whose node index equals the vertex id.
    ///
    /// Node 0 and detached vertices are present but isolated.
    pub fn to_petgraph(&self) -> UnGraph<(), ()> {
        let mut out = UnGraph::with_capacity(self.adj.len(), self.edge_count);
        for _ in 0..self.adj.len() {
            out.add_node(());
        }
        for (u, v) in self.edges() {
            out.add_edge(NodeIndex::new(u), NodeIndex::new(v), ());
        }
        out
    }

    /// Builds an arbitrary simple graph on `1..=order`. Test-only.
    #[cfg(test)]
    pub(crate) fn from_edges(order: usize, edges: &[(Vertex, Vertex)]) -> Self {
        let mut adj = vec![Vec::new(); order + 1];
        let mut edge_count = 0;
        for &(u, v) in edges {
            assert!(u != v && u >= 1 && v >= 1 && u <= order && v <= order);
            if !adj[u].contains(&v) {
                adj[u].push(v);
                adj[v].push(u);
                edge_count += 1;
            }
        }
        for row in &mut adj {
            row.sort_unstable();
        }
        Self { adj, edge_count }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn brute_edges(n: usize) -> Vec<(Vertex, Vertex)> {
        let mut out = Vec::new();
        for d in 1..=n {
            for k in (d + 1)..=n {
                if k % d == 0 {
                    out.push((d, k));
                }
            }
        }
        out
    }

    #[test]
    fn small_graph_has_divisor_edges() {
        let g = DivisorGraph::with_size(6);
        let edges: Vec<_> = g.edges().collect();
        assert_eq!(
            edges,
            vec![(1, 2), (1, 3), (1, 4), (1, 5), (1, 6), (2, 4), (2, 6), (3, 6)]
        );
        assert_eq!(g.edge_count(), 8);
        assert_eq!(g.neighbors(6), &[1, 2, 3]);
    }

    #[test]
    fn perfect_square_does_not_duplicate_root_edge() {
        let g = DivisorGraph::with_size(9);
        assert_eq!(g.neighbors(9), &[1, 3]);
        assert_eq!(g.neighbors(3), &[1, 6, 9]);
    }

    #[test]
    fn vertex_one_has_no_self_loop() {
        let g = DivisorGraph::with_size(1);
        assert_eq!(g.order(), 1);
        assert_eq!(g.degree(1), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn extend_is_idempotent() {
        let mut g = DivisorGraph::with_size(10);
        let before = g.clone();
        assert!(!g.extend(10));
        assert!(!g.extend(3));
        assert_eq!(g, before);
        assert!(g.extend(11));
        assert_eq!(g.neighbors(11), &[1]);
    }

    #[test]
    fn extend_fills_gaps() {
        let mut g = DivisorGraph::new();
        g.extend(12);
        assert_eq!(g, DivisorGraph::with_size(12));
    }

    #[test]
    fn degree_one_iff_prime() {
        let g = DivisorGraph::with_size(60);
        for n in 2..=60usize {
            let prime = (2..n).all(|d| n % d != 0);
            // Degree counts both divisors and multiples, so check the divisor side only.
            let divisors = g.neighbors(n).iter().filter(|&&d| d < n).count();
            assert_eq!(divisors == 1, prime, "n={n}");
        }
    }

    #[test]
    fn detach_isolates_and_reattach_restores() {
        let mut g = DivisorGraph::with_size(12);
        let before = g.clone();

        let d = g.detach(6);
        assert_eq!(d.vertex(), 6);
        assert_eq!(d.neighbors(), &[1, 2, 3, 12]);
        assert_eq!(g.degree(6), 0);
        assert!(!g.has_edge(2, 6));
        assert!(!g.neighbors(12).contains(&6));
        assert_eq!(g.edge_count(), before.edge_count() - 4);

        g.reattach(d);
        assert_eq!(g, before);
    }

    #[test]
    fn petgraph_export_keeps_vertex_ids() {
        let mut g = DivisorGraph::with_size(8);
        let d = g.detach(4);
        let pg = g.to_petgraph();
        assert_eq!(pg.node_count(), 9);
        assert_eq!(pg.edge_count(), g.edge_count());
        assert!(pg.find_edge(NodeIndex::new(2), NodeIndex::new(8)).is_some());
        assert!(pg.find_edge(NodeIndex::new(4), NodeIndex::new(8)).is_none());
        g.reattach(d);
    }

    proptest! {
        #[test]
        fn matches_brute_force_definition(n in 1usize..120) {
            let g = DivisorGraph::with_size(n);
            let edges: Vec<_> = g.edges().collect();
            prop_assert_eq!(edges, brute_edges(n));
        }

        #[test]
        fn detach_round_trip_is_exact(n in 2usize..80, pick in 0usize..1000) {
            let mut g = DivisorGraph::with_size(n);
            let before = g.clone();
            let s = 1 + pick % n;
            let d = g.detach(s);
            prop_assert_eq!(g.degree(s), 0);
            g.reattach(d);
            prop_assert_eq!(g, before);
        }
    }
}
