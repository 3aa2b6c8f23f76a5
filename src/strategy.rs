//! The five classification strategies.
//!
//! A strategy decides how a size step is *seeded*: which verdicts are known before any
//! candidate is tested, which vertices remain to be checked, which weight a removal
//! test is compared against, and which [`Propagation`] rule runs after a TRUE verdict.
//! The per-candidate loop itself belongs to the executor, so every strategy runs
//! sequentially or on a worker pool without change.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ConfigError, EngineError};
use crate::graph::{DivisorGraph, Vertex};
use crate::oracle::{query, Matching, MatchingOracle};
use crate::partition::{Partition, Verdict};
use crate::propagation::{rotate, Hops, Propagation};

/// Classification strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Test every vertex `2..=n` from scratch.
    Baseline,
    /// Reuse the previous partition; only re-test the side that growth can change.
    #[default]
    Conserved,
    /// Conserved, plus one-hop rotation after each TRUE verdict.
    Rotation1,
    /// Conserved, plus two-hop rotation after each TRUE verdict.
    Rotation2,
    /// Conserved, plus alternating-path discovery from outer vertices.
    Discovery,
}

/// How the executor distributes candidates between workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sharding {
    /// Fixed candidate list handed out by an atomic cursor.
    Static,
    /// Shared to-check set under a lock, shrunk by each worker's propagation.
    Dynamic,
}

impl Strategy {
    /// Every strategy, in increasing order of sophistication.
    pub const ALL: [Strategy; 5] = [
        Strategy::Baseline,
        Strategy::Conserved,
        Strategy::Rotation1,
        Strategy::Rotation2,
        Strategy::Discovery,
    ];

    /// Short identifier used on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Strategy::Baseline => "baseline",
            Strategy::Conserved => "conserved",
            Strategy::Rotation1 => "rotation1",
            Strategy::Rotation2 => "rotation2",
            Strategy::Discovery => "discovery",
        }
    }

    /// Display name used in benchmark reports.
    pub fn title(self) -> &'static str {
        match self {
            Strategy::Baseline => "Standard Algorithm",
            Strategy::Conserved => "Standard Conserved Algorithm",
            Strategy::Rotation1 => "Standard Algorithm with Conservation and 1 Partial Rotation",
            Strategy::Rotation2 => "Standard Algorithm with Conservation and 2 Partial Rotation",
            Strategy::Discovery => "Standard Algorithm by Discovery with Conservation",
        }
    }

    /// Display name of the parallel variant, without the thread count.
    pub fn parallel_title(self) -> &'static str {
        match self {
            Strategy::Baseline => "Standard Parallel Algorithm",
            Strategy::Conserved => "Standard Parallel Algorithm with Conservation",
            Strategy::Rotation1 => {
                "Standard Parallel Algorithm with Conservation and 1 Partial Rotation"
            }
            Strategy::Rotation2 => {
                "Standard Parallel Algorithm with Conservation and 2 Partial Rotations"
            }
            Strategy::Discovery => "Standard Parallel Algorithm by Discovery with Conservation",
        }
    }

    /// Sharding discipline for the parallel variant.
    pub fn sharding(self) -> Sharding {
        match self {
            Strategy::Baseline | Strategy::Conserved => Sharding::Static,
            Strategy::Rotation1 | Strategy::Rotation2 | Strategy::Discovery => Sharding::Dynamic,
        }
    }

    /// Seeds the step for size `ctx.size`.
    ///
    /// # Errors
    /// Propagates oracle contract violations from the seeding queries.
    pub(crate) fn plan<O: MatchingOracle + ?Sized>(
        self,
        ctx: StepContext<'_, O>,
    ) -> Result<StepPlan, EngineError> {
        let StepContext {
            graph,
            oracle,
            size,
            previous,
            carried,
        } = ctx;
        let mut oracle_calls = 0;

        let plan = match self {
            Strategy::Baseline => {
                let full = query(oracle, graph, size)?;
                oracle_calls += 1;
                StepPlan::new(size, Seed::fresh(size), full.weight(), Propagation::None)
            }
            Strategy::Conserved => {
                let full = query(oracle, graph, size)?;
                oracle_calls += 1;
                StepPlan::new(size, Seed::conserve(graph, size, previous), full.weight(), Propagation::None)
            }
            Strategy::Rotation1 | Strategy::Rotation2 => {
                let hops = if self == Strategy::Rotation1 { Hops::One } else { Hops::Two };
                let full = query(oracle, graph, size)?;
                oracle_calls += 1;
                let mut seed = Seed::conserve(graph, size, previous);

                // The previous maximum matching leaves `size` uncovered; it is still
                // maximum iff the weight did not grow.
                if seed.size_is_true {
                    if let Some(prior) = carried.as_ref().filter(|m| m.weight() == full.weight()) {
                        let marks = rotate(graph, graph.neighbors(size), prior, hops);
                        seed.resolve_true(marks);
                    }
                }
                let weight = full.weight();
                *carried = Some(full);
                StepPlan::new(size, seed, weight, Propagation::Rotation(hops))
            }
            Strategy::Discovery => {
                let seed = Seed::conserve(graph, size, previous);
                let old = match carried.take() {
                    Some(prior) if seed.size_is_true => prior,
                    _ => {
                        oracle_calls += 1;
                        query(oracle, graph, size)?
                    }
                };
                let weight = old.weight();
                *carried = Some(old.clone());
                StepPlan::new(size, seed, weight, Propagation::discovery(old, size))
            }
        };

        trace!(
            strategy = self.key(),
            size,
            pending = plan.to_check.len(),
            seeded = plan.partition.len(),
            "step seeded"
        );
        Ok(StepPlan { oracle_calls, ..plan })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.key() == lower)
            .ok_or_else(|| ConfigError::UnknownName {
                kind: "strategy",
                name: s.to_owned(),
                expected: "baseline, conserved, rotation1, rotation2, discovery",
            })
    }
}

// ============================================================================
// Step plan
// ============================================================================

/// Inputs a strategy needs to seed one size step.
pub(crate) struct StepContext<'a, O: ?Sized> {
    /// The full graph `G(size)`.
    pub graph: &'a DivisorGraph,
    pub oracle: &'a O,
    pub size: usize,
    /// Partition for `size - 1`, if it was produced.
    pub previous: Option<&'a Partition>,
    /// Maximum matching kept from an earlier step, if still trusted.
    pub carried: &'a mut Option<Matching>,
}

/// A seeded step, ready for the candidate loop.
#[derive(Debug)]
pub(crate) struct StepPlan {
    pub size: usize,
    /// Verdicts known before the loop.
    pub partition: Partition,
    /// Candidates still to test, ascending.
    pub to_check: BTreeSet<Vertex>,
    /// Maximum matching weight of the full graph.
    pub reference_weight: usize,
    pub propagation: Propagation,
    /// Oracle queries spent on seeding.
    pub oracle_calls: usize,
    /// Vertices resolved during seeding by rotation.
    pub propagated: usize,
}

impl StepPlan {
    fn new(size: usize, seed: Seed, reference_weight: usize, propagation: Propagation) -> Self {
        Self {
            size,
            partition: seed.partition,
            to_check: seed.to_check,
            reference_weight,
            propagation,
            oracle_calls: 0,
            propagated: seed.propagated,
        }
    }
}

/// Starting verdicts for a step.
struct Seed {
    partition: Partition,
    to_check: BTreeSet<Vertex>,
    /// Whether `size` itself was classified TRUE from the previous partition.
    size_is_true: bool,
    propagated: usize,
}

impl Seed {
    /// Nothing known except the fixed base case: vertex 1 is FALSE.
    fn fresh(size: usize) -> Self {
        Self {
            partition: Partition::from_lists(&[], &[1]),
            to_check: (2..=size).collect(),
            size_is_true: false,
            propagated: 0,
        }
    }

    /// Reuses the partition for `size - 1`.
    ///
    /// `size` is TRUE iff all its neighbors were FALSE: then the maximum matching weight
    /// is unchanged, old TRUE vertices stay TRUE, and only old FALSE vertices need a
    /// re-test. Otherwise the weight grows by one, old FALSE vertices stay FALSE, and
    /// only old TRUE vertices need a re-test.
    fn conserve(graph: &DivisorGraph, size: usize, previous: Option<&Partition>) -> Self {
        let Some(previous) = previous else {
            return Self::fresh(size);
        };
        let size_is_true = graph
            .neighbors(size)
            .iter()
            .all(|v| previous.falses().contains(v));

        let (partition, to_check) = if size_is_true {
            let mut trues = previous.trues().clone();
            trues.insert(size);
            let mut to_check = previous.falses().clone();
            to_check.remove(&1);
            (Partition::new(trues, BTreeSet::from([1])), to_check)
        } else {
            let mut falses = previous.falses().clone();
            falses.insert(size);
            (Partition::new(BTreeSet::new(), falses), previous.trues().clone())
        };

        Self {
            partition,
            to_check,
            size_is_true,
            propagated: 0,
        }
    }

    /// Moves still-pending vertices among `marks` to TRUE.
    fn resolve_true(&mut self, marks: BTreeSet<Vertex>) {
        for v in marks {
            if self.to_check.remove(&v) {
                self.partition.insert(v, Verdict::True);
                self.propagated += 1;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
