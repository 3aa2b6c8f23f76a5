//! Number-theoretic shortcuts that classify a size without consulting the oracle.
//!
//! A prime `p` attaches only to vertex 1, which is always FALSE, so `p` joins TRUE and
//! nothing else moves. For "twice a prime" sizes the partition is derived from the
//! previous one and the status of vertex 2.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::{DivisorGraph, Vertex};
use crate::partition::{Partition, Verdict};

/// Smallest size at which the shortcuts may fire.
pub const DEFAULT_THRESHOLD: usize = 12;

// ============================================================================
// PrimeSet
// ============================================================================

/// Positions whose degree was exactly 1 when they were added to the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrimeSet {
    primes: BTreeSet<Vertex>,
}

impl PrimeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `n` if it was just added to `graph` with degree 1. Returns whether it was.
    ///
    /// Must be called right after `graph.extend(n)`, before any larger vertex exists.
    pub fn observe(&mut self, graph: &DivisorGraph, n: Vertex) -> bool {
        debug_assert_eq!(graph.order(), n, "observe must follow extend({n})");
        if graph.degree(n) == 1 {
            self.primes.insert(n);
            true
        } else {
            false
        }
    }

    /// Returns whether `n` was recorded.
    #[inline]
    pub fn contains(&self, n: Vertex) -> bool {
        self.primes.contains(&n)
    }

    /// Number of recorded primes.
    pub fn len(&self) -> usize {
        self.primes.len()
    }

    /// Returns `true` if no prime was recorded.
    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    /// Recorded primes, ascending.
    pub fn iter(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.primes.iter().copied()
    }
}

// ============================================================================
// Parity test
// ============================================================================

/// How the "twice a prime" branch decides that `n` is even.
///
/// `Bitwise` reproduces the historical test `n & 2 == 0`, which is not an evenness test:
/// every `n = 2p` with `p` an odd prime has bit 1 set, so above the threshold the branch
/// never fires. `Modulo` uses `n % 2 == 0` and does fire, yielding the same partitions
/// as direct computation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityTest {
    /// `n & 2 == 0`.
    #[default]
    Bitwise,
    /// `n % 2 == 0`.
    Modulo,
}

impl ParityTest {
    /// Returns whether `n` passes the parity gate.
    #[inline]
    pub fn admits(self, n: usize) -> bool {
        match self {
            ParityTest::Bitwise => n & 2 == 0,
            ParityTest::Modulo => n % 2 == 0,
        }
    }
}

impl fmt::Display for ParityTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParityTest::Bitwise => "bitwise",
            ParityTest::Modulo => "modulo",
        })
    }
}

impl FromStr for ParityTest {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitwise" => Ok(ParityTest::Bitwise),
            "modulo" => Ok(ParityTest::Modulo),
            _ => Err(ConfigError::UnknownName {
                kind: "parity test",
                name: s.to_owned(),
                expected: "bitwise, modulo",
            }),
        }
    }
}

// ============================================================================
// PrimeShortcut
// ============================================================================

/// Shortcut settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    /// Whether the shortcuts are consulted at all.
    pub enabled: bool,
    /// Smallest size at which they may fire.
    pub threshold: usize,
    /// Evenness test used by the twice-a-prime branch.
    pub parity: ParityTest,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
            parity: ParityTest::Bitwise,
        }
    }
}

impl ShortcutConfig {
    /// Shortcuts switched off; every size goes through a strategy.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Which shortcut applies to a size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shortcut {
    /// `n` is prime.
    Prime,
    /// `n` passed the parity gate and `n / 2` is prime.
    TwicePrime,
}

impl Shortcut {
    /// Picks the shortcut for size `n`, if any.
    ///
    /// The caller is responsible for only asking once a previous partition exists and
    /// `n` is at least the minimum board size.
    pub fn select(config: &ShortcutConfig, primes: &PrimeSet, n: usize) -> Option<Self> {
        if !config.enabled || n < config.threshold {
            return None;
        }
        if primes.contains(n) {
            Some(Shortcut::Prime)
        } else if config.parity.admits(n) && primes.contains(n / 2) {
            Some(Shortcut::TwicePrime)
        } else {
            None
        }
    }

    /// Derives the partition for `n` from the one for `n - 1`.
    pub fn apply(self, n: usize, previous: &Partition) -> Partition {
        let mut next = previous.clone();
        match self {
            Shortcut::Prime => next.set(n, Verdict::True),
            Shortcut::TwicePrime => {
                let half = n / 2;
                let moved = if next.falses().contains(&2) {
                    Verdict::False
                } else {
                    Verdict::True
                };
                next.set(n, Verdict::False);
                next.set(half, moved);
            }
        }
        next
    }

    /// Whether the maximum matching weight is unchanged from `n - 1` to `n`.
    ///
    /// A matching carried over from an earlier step stays maximum only across these.
    #[inline]
    pub fn keeps_weight(self) -> bool {
        matches!(self, Shortcut::Prime)
    }
}

// ============================================================================
// Tests
// ============================================================================
