//! Candidate loop: sequential, or sharded over a fixed pool of graph replicas.
//!
//! Every worker owns a [`DivisorGraph`] replica that is extended in lockstep with the
//! engine's graph, so detaching a candidate on one replica never affects another. The
//! only shared mutable state during a step is the candidate cursor (static sharding) or
//! the locked to-check set (dynamic sharding). Workers accumulate private partitions
//! which are merged after the step's barrier.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam::queue::ArrayQueue;
use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{ConfigError, EngineError};
use crate::graph::{DivisorGraph, Vertex};
use crate::oracle::{query, MatchingOracle};
use crate::partition::{Partition, Verdict};
use crate::propagation::Propagation;
use crate::strategy::{Sharding, StepPlan};

// ============================================================================
// Configuration
// ============================================================================

/// A validated, strictly positive number of workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct WorkerCount(NonZeroUsize);

impl WorkerCount {
    /// Returns the count, or `None` for zero.
    pub fn new(workers: usize) -> Option<Self> {
        NonZeroUsize::new(workers).map(Self)
    }

    /// The number of workers.
    #[inline]
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<i64> for WorkerCount {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(ConfigError::NonPositiveWorkers { got: value })
    }
}

impl From<WorkerCount> for i64 {
    fn from(count: WorkerCount) -> Self {
        i64::try_from(count.get()).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sequential or parallel candidate testing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// One candidate at a time on the engine's own graph.
    #[default]
    Sequential,
    /// Candidates sharded over this many worker replicas.
    Parallel(WorkerCount),
}

impl Execution {
    /// Parallel execution with `workers` workers.
    ///
    /// # Errors
    /// [`ConfigError::NonPositiveWorkers`] if `workers <= 0`.
    pub fn parallel(workers: i64) -> Result<Self, ConfigError> {
        WorkerCount::try_from(workers).map(Execution::Parallel)
    }

    /// Number of workers, if parallel.
    pub fn workers(self) -> Option<WorkerCount> {
        match self {
            Execution::Sequential => None,
            Execution::Parallel(k) => Some(k),
        }
    }
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Sequential => f.write_str("sequential"),
            Execution::Parallel(k) => write!(f, "parallel({k})"),
        }
    }
}

// ============================================================================
// Candidate test
// ============================================================================

/// Outcome of one removal test.
#[derive(Debug)]
enum Tested {
    False,
    /// The candidate is TRUE; `marks` are further vertices proven TRUE by propagation.
    True(BTreeSet<Vertex>),
}

/// The read-only part of a step, shared by every worker.
struct Probe<'a, O: ?Sized> {
    oracle: &'a O,
    size: usize,
    reference_weight: usize,
    propagation: &'a Propagation,
}

impl<O: MatchingOracle + ?Sized> Probe<'_, O> {
    /// Detaches `s`, queries the oracle on the remainder and restores `s`.
    fn test(&self, graph: &mut DivisorGraph, s: Vertex) -> Result<Tested, EngineError> {
        let detached = graph.detach(s);
        let outcome = self.judge(graph, s, detached.neighbors());
        graph.reattach(detached);

        let outcome = outcome?;
        let verdict = match &outcome {
            Tested::False => Verdict::False,
            Tested::True(_) => Verdict::True,
        };
        trace!(size = self.size, vertex = s, %verdict, "candidate tested");
        Ok(outcome)
    }

    fn judge(
        &self,
        graph: &DivisorGraph,
        s: Vertex,
        released: &[Vertex],
    ) -> Result<Tested, EngineError> {
        let found = query(self.oracle, graph, self.size)?;
        match found.weight().cmp(&self.reference_weight) {
            std::cmp::Ordering::Less => Ok(Tested::False),
            std::cmp::Ordering::Equal => {
                let marks = if self.propagation.propagates() {
                    self.propagation.resolve(graph, released, &found)
                } else {
                    BTreeSet::new()
                };
                Ok(Tested::True(marks))
            }
            std::cmp::Ordering::Greater => Err(EngineError::OracleContract {
                size: self.size,
                details: format!(
                    "removing vertex {s} raised the matching weight from {} to {}",
                    self.reference_weight,
                    found.weight()
                ),
            }),
        }
    }
}

// ============================================================================
// Step outcome
// ============================================================================

/// Merged result of one size step.
#[derive(Debug, Default)]
pub(crate) struct StepOutcome {
    pub partition: Partition,
    /// Removal tests performed (seeding queries excluded).
    pub oracle_calls: usize,
    /// Candidates resolved by propagation instead of a test.
    pub propagated: usize,
}

impl StepOutcome {
    /// Records a tested verdict and resolves every still-pending mark.
    fn record(&mut self, s: Vertex, tested: Tested, pending: &mut BTreeSet<Vertex>) {
        self.oracle_calls += 1;
        match tested {
            Tested::False => self.partition.insert(s, Verdict::False),
            Tested::True(marks) => {
                self.partition.insert(s, Verdict::True);
                self.resolve(marks, pending);
            }
        }
    }

    fn resolve(&mut self, marks: BTreeSet<Vertex>, pending: &mut BTreeSet<Vertex>) {
        for v in marks {
            if pending.remove(&v) {
                self.partition.insert(v, Verdict::True);
                self.propagated += 1;
            }
        }
    }

    fn merge(&mut self, other: StepOutcome) {
        self.partition.absorb(other.partition);
        self.oracle_calls += other.oracle_calls;
        self.propagated += other.propagated;
    }
}

// ============================================================================
// Sequential
// ============================================================================

/// Tests candidates in ascending order on `graph`.
pub(crate) fn run_sequential<O: MatchingOracle + ?Sized>(
    graph: &mut DivisorGraph,
    oracle: &O,
    plan: StepPlan,
) -> Result<StepOutcome, EngineError> {
    let StepPlan {
        size,
        partition,
        mut to_check,
        reference_weight,
        propagation,
        ..
    } = plan;
    let probe = Probe {
        oracle,
        size,
        reference_weight,
        propagation: &propagation,
    };

    let mut outcome = StepOutcome {
        partition,
        ..StepOutcome::default()
    };
    while let Some(s) = to_check.pop_first() {
        let tested = probe.test(graph, s)?;
        outcome.record(s, tested, &mut to_check);
    }
    Ok(outcome)
}

// ============================================================================
// Worker pool
// ============================================================================

/// A fixed rayon pool with one persistent graph replica per worker.
pub(crate) struct WorkerPool {
    pool: rayon::ThreadPool,
    replicas: Vec<DivisorGraph>,
}

impl WorkerPool {
    /// Builds `workers` threads and as many empty replicas.
    pub fn new(workers: WorkerCount) -> Result<Self, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|i| format!("divmatch-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            replicas: (0..workers.get()).map(|_| DivisorGraph::new()).collect(),
        })
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.replicas.len()
    }

    /// Grows every replica to `n`, mirroring the engine's graph.
    pub fn extend(&mut self, n: Vertex) {
        for replica in &mut self.replicas {
            replica.extend(n);
        }
    }

    /// Runs one step: fans out one task per replica and joins them all before merging.
///
/// A worker that panics, or finds the to-check lock poisoned, sends no report and the
/// step fails with [`EngineError::WorkerPanicked`]. The replicas are not restored in
/// that case, so the pool must not be reused.
    pub fn run<O: MatchingOracle + ?Sized>(
        &mut self,
        oracle: &O,
        plan: StepPlan,
        sharding: Sharding,
    ) -> Result<StepOutcome, EngineError> {
        let StepPlan {
            size,
            partition,
            to_check,
            reference_weight,
            propagation,
            ..
        } = plan;
        let probe = Probe {
            oracle,
            size,
            reference_weight,
            propagation: &propagation,
        };
        let expected = self.replicas.len();
        let reports = ArrayQueue::new(expected);
        let Self { pool, replicas } = self;

        match sharding {
            Sharding::Static => {
                let candidates: Vec<Vertex> = to_check.into_iter().collect();
                let cursor = CachePadded::new(AtomicUsize::new(0));
                pool.scope(|scope| {
                    for replica in replicas.iter_mut() {
                        let (probe, candidates, cursor, reports) =
                            (&probe, &candidates, &cursor, &reports);
                        scope.spawn(move |_| {
                            let report =
                                contain(|| static_worker(probe, replica, candidates, cursor));
                            // Capacity equals the number of spawned tasks.
                            let _ = reports.push(report);
                        });
                    }
                });
            }
            Sharding::Dynamic => {
                let shared = Mutex::new(to_check);
                pool.scope(|scope| {
                    for replica in replicas.iter_mut() {
                        let (probe, shared, reports) = (&probe, &shared, &reports);
                        scope.spawn(move |_| {
                            let report = contain(|| dynamic_worker(probe, replica, shared));
                            let _ = reports.push(report);
                        });
                    }
                });
            }
        }

        let mut outcome = StepOutcome {
            partition,
            ..StepOutcome::default()
        };
        let mut received = 0;
        while let Some(report) = reports.pop() {
            if let Some(report) = report? {
                outcome.merge(report);
                received += 1;
            }
        }
        if received != expected {
            return Err(EngineError::WorkerPanicked {
                size,
                received,
                expected,
            });
        }
        Ok(outcome)
    }
}

/// Runs a worker body, turning a panic into a missing report.
///
/// `ThreadPool::scope` would otherwise re-raise the panic on the engine's thread.
fn contain<F>(body: F) -> Result<Option<StepOutcome>, EngineError>
where
    F: FnOnce() -> Result<Option<StepOutcome>, EngineError>,
{
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
        warn!("worker panicked");
        Ok(None)
    })
}

/// Claims candidate indices from the shared cursor until the list is exhausted.
fn static_worker<O: MatchingOracle + ?Sized>(
    probe: &Probe<'_, O>,
    replica: &mut DivisorGraph,
    candidates: &[Vertex],
    cursor: &AtomicUsize,
) -> Result<Option<StepOutcome>, EngineError> {
    let mut local = StepOutcome::default();
    let mut unused = BTreeSet::new();
    loop {
        let i = cursor.fetch_add(1, Ordering::Relaxed);
        let Some(&s) = candidates.get(i) else { break };
        let tested = probe.test(replica, s)?;
        local.record(s, tested, &mut unused);
    }
    Ok(Some(local))
}

/// Pops the smallest pending candidate under the lock, after first removing the
/// candidates this worker's previous test resolved.
///
/// Returns `Ok(None)` if another worker poisoned the lock.
fn dynamic_worker<O: MatchingOracle + ?Sized>(
    probe: &Probe<'_, O>,
    replica: &mut DivisorGraph,
    shared: &Mutex<BTreeSet<Vertex>>,
) -> Result<Option<StepOutcome>, EngineError> {
    let mut local = StepOutcome::default();
    let mut resolved = BTreeSet::new();
    loop {
        let next = {
            let Ok(mut to_check) = shared.lock() else {
                return Ok(None);
            };
            local.resolve(std::mem::take(&mut resolved), &mut to_check);
            to_check.pop_first()
        };
        let Some(s) = next else { break };

        local.oracle_calls += 1;
        match probe.test(replica, s)? {
            Tested::False => local.partition.insert(s, Verdict::False),
            Tested::True(marks) => {
                local.partition.insert(s, Verdict::True);
                resolved = marks;
            }
        }
    }
    Ok(Some(local))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::EdmondsOracle;
    use crate::propagation::Hops;

    fn plan(size: usize, propagation: Propagation) -> StepPlan {
        let graph = DivisorGraph::with_size(size);
        let weight = EdmondsOracle.maximum_matching(&graph).weight();
        StepPlan {
            size,
            partition: Partition::from_lists(&[], &[1]),
            to_check: (2..=size).collect(),
            reference_weight: weight,
            propagation,
            oracle_calls: 0,
            propagated: 0,
        }
    }

    fn pool(workers: usize, size: usize) -> WorkerPool {
        let mut pool = WorkerPool::new(WorkerCount::new(workers).unwrap()).unwrap();
        for n in 1..=size {
            pool.extend(n);
        }
        pool
    }

    #[test]
    fn worker_count_rejects_non_positive() {
        assert_eq!(
            WorkerCount::try_from(0_i64),
            Err(ConfigError::NonPositiveWorkers { got: 0 })
        );
        assert_eq!(
            Execution::parallel(-3),
            Err(ConfigError::NonPositiveWorkers { got: -3 })
        );
        assert_eq!(WorkerCount::try_from(4_i64).unwrap().get(), 4);
        assert_eq!(Execution::parallel(2).unwrap().workers().map(WorkerCount::get), Some(2));
        assert_eq!(Execution::Sequential.workers(), None);
    }

    #[test]
    fn worker_count_deserializes_through_validation() {
        let ok: WorkerCount = serde_json::from_str("8").unwrap();
        assert_eq!(ok.get(), 8);
        assert!(serde_json::from_str::<WorkerCount>("0").is_err());
        assert!(serde_json::from_str::<WorkerCount>("-2").is_err());
    }

    #[test]
    fn sequential_baseline_size_seven() {
        let mut graph = DivisorGraph::with_size(7);
        let out = run_sequential(&mut graph, &EdmondsOracle, plan(7, Propagation::None)).unwrap();
        assert_eq!(out.partition, Partition::from_lists(&[5, 7], &[1, 2, 3, 4, 6]));
        assert_eq!(out.oracle_calls, 6);
        assert_eq!(out.propagated, 0);
        // The graph is restored after every test.
        assert_eq!(graph, DivisorGraph::with_size(7));
    }

    #[test]
    fn sequential_rotation_saves_tests() {
        let mut graph = DivisorGraph::with_size(16);
        let base = run_sequential(&mut graph, &EdmondsOracle, plan(16, Propagation::None)).unwrap();
        let rot = run_sequential(
            &mut graph,
            &EdmondsOracle,
            plan(16, Propagation::Rotation(Hops::Two)),
        )
        .unwrap();
        assert_eq!(base.partition, rot.partition);
        assert_eq!(rot.oracle_calls + rot.propagated, base.oracle_calls);
    }

    #[test]
    fn static_pool_matches_sequential() {
        let mut graph = DivisorGraph::with_size(20);
        let seq = run_sequential(&mut graph, &EdmondsOracle, plan(20, Propagation::None)).unwrap();
        for k in [1, 2, 4, 8] {
            let out = pool(k, 20)
                .run(&EdmondsOracle, plan(20, Propagation::None), Sharding::Static)
                .unwrap();
            assert_eq!(out.partition, seq.partition, "k={k}");
            assert_eq!(out.oracle_calls, 19);
        }
    }

    #[test]
    fn dynamic_pool_matches_sequential() {
        let mut graph = DivisorGraph::with_size(24);
        let seq = run_sequential(&mut graph, &EdmondsOracle, plan(24, Propagation::None)).unwrap();
        let old = EdmondsOracle.maximum_matching(&graph);
        for k in [1, 3, 8] {
            let mut workers = pool(k, 24);
            for propagation in [
                Propagation::Rotation(Hops::One),
                Propagation::Rotation(Hops::Two),
                Propagation::discovery(old.clone(), 24),
            ] {
                let out = workers
                    .run(&EdmondsOracle, plan(24, propagation), Sharding::Dynamic)
                    .unwrap();
                assert_eq!(out.partition, seq.partition, "k={k}");
                assert!(out.partition.is_complete_for(24));
            }
        }
    }

    #[test]
    fn contract_violation_surfaces_from_workers() {
        use crate::oracle::tests::LyingOracle;
        let mut bad = plan(6, Propagation::None);
        bad.reference_weight = 0;
        let lying = LyingOracle(vec![(1, 2)]);
        let err = pool(2, 6).run(&lying, bad, Sharding::Dynamic).unwrap_err();
        assert!(matches!(err, EngineError::OracleContract { size: 6, .. }));
    }

    /// Panics whenever vertex 3 is detached.
    struct PanicsWithoutThree;

    impl MatchingOracle for PanicsWithoutThree {
        fn maximum_matching(&self, graph: &DivisorGraph) -> crate::oracle::Matching {
            assert!(graph.degree(3) > 0, "vertex 3 detached");
            EdmondsOracle.maximum_matching(graph)
        }
    }

    #[test]
    fn worker_panic_becomes_an_error() {
        for sharding in [Sharding::Static, Sharding::Dynamic] {
            let err = pool(2, 6)
                .run(&PanicsWithoutThree, plan(6, Propagation::None), sharding)
                .unwrap_err();
            assert!(
                matches!(err, EngineError::WorkerPanicked { size: 6, expected: 2, received } if received < 2),
                "{sharding:?}: {err}"
            );
        }
    }
}
