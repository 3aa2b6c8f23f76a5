//! Classification driver: grows the divisor graph one size at a time and classifies
//! every vertex at each size from `min_size` up to the requested maximum.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, EngineError};
use crate::executor::{run_sequential, Execution, WorkerPool};
use crate::graph::DivisorGraph;
use crate::oracle::{EdmondsOracle, Matching, MatchingOracle};
use crate::partition::{Classification, Partition};
use crate::shortcut::{PrimeSet, Shortcut, ShortcutConfig};
use crate::strategy::{StepContext, Strategy};

/// Smallest board size the engine computes by default. Sizes 1..=3 are fixed constants.
pub const DEFAULT_MIN_SIZE: usize = 4;

// ============================================================================
// Configuration
// ============================================================================

/// Engine settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Classification strategy.
    pub strategy: Strategy,
    /// Sequential or parallel candidate testing.
    pub execution: Execution,
    /// Prime and twice-a-prime shortcuts.
    pub shortcut: ShortcutConfig,
    /// First size that is emitted.
    pub min_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Conserved,
            execution: Execution::Sequential,
            shortcut: ShortcutConfig::default(),
            min_size: DEFAULT_MIN_SIZE,
        }
    }
}

impl EngineConfig {
    /// Sets the strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the execution mode.
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Switches to parallel execution with `workers` workers.
    ///
    /// # Errors
    /// [`ConfigError::NonPositiveWorkers`] if `workers <= 0`.
    pub fn with_workers(self, workers: i64) -> Result<Self, ConfigError> {
        Ok(self.with_execution(Execution::parallel(workers)?))
    }

    /// Sets the shortcut configuration.
    pub fn with_shortcut(mut self, shortcut: ShortcutConfig) -> Self {
        self.shortcut = shortcut;
        self
    }

    /// Sets the first emitted size.
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_size < 2 {
            return Err(ConfigError::MinimumSize { got: self.min_size });
        }
        Ok(())
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Classifies board sizes with a fixed configuration and matching oracle.
///
/// # Example
///
/// ```
/// use divmatch::engine::{Engine, EngineConfig};
/// use divmatch::strategy::Strategy;
///
/// let engine = Engine::new(EngineConfig::default().with_strategy(Strategy::Discovery))?;
/// let steps = engine.classify_range(7)?;
/// let seven = steps.get(7).unwrap();
/// assert_eq!(seven.trues().iter().copied().collect::<Vec<_>>(), vec![5, 7]);
/// # Ok::<(), divmatch::error::EngineError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Engine<O = EdmondsOracle> {
    config: EngineConfig,
    oracle: O,
}

impl Engine {
    /// Engine backed by [`EdmondsOracle`].
    ///
    /// # Errors
    /// Rejects a minimum size below 2.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_oracle(config, EdmondsOracle)
    }
}

impl<O: MatchingOracle> Engine<O> {
    /// Engine backed by a caller-supplied oracle.
    ///
    /// # Errors
    /// Rejects a minimum size below 2.
    pub fn with_oracle(config: EngineConfig, oracle: O) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, oracle })
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classifies every size from `min_size` to `max_size`, in order.
    ///
    /// Each emitted partition is an owned snapshot; later steps never mutate it.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyRange`] if `max_size` is 0.
    /// - [`EngineError::OracleContract`] if the oracle returns something other than an
    ///   exact maximum matching of the graph it was given.
    /// - [`EngineError::ThreadPool`] / [`EngineError::WorkerPanicked`] for parallel
    ///   execution failures.
    pub fn classify_range(&self, max_size: usize) -> Result<Classification, EngineError> {
        if max_size == 0 {
            return Err(ConfigError::EmptyRange.into());
        }
        let EngineConfig {
            strategy,
            execution,
            shortcut,
            min_size,
        } = self.config;
        info!(%strategy, %execution, min_size, max_size, "classifying");

        let mut pool = execution.workers().map(WorkerPool::new).transpose()?;
        let mut graph = DivisorGraph::new();
        let mut primes = PrimeSet::new();
        let mut previous: Option<Partition> = None;
        let mut carried: Option<Matching> = None;
        let mut out = Classification::new();
        let mut total_calls = 0usize;

        for n in 1..=max_size {
            graph.extend(n);
            if let Some(pool) = pool.as_mut() {
                pool.extend(n);
            }
            primes.observe(&graph, n);
            if n < min_size {
                continue;
            }

            let shortcut_taken = previous
                .as_ref()
                .and_then(|prev| Shortcut::select(&shortcut, &primes, n).map(|sc| (sc, prev)));
            let partition = if let Some((sc, prev)) = shortcut_taken {
                if !sc.keeps_weight() {
                    carried = None;
                }
                debug!(size = n, shortcut = ?sc, "shortcut");
                sc.apply(n, prev)
            } else {
                // Sizes below 4 have fixed partitions, usable as a seed.
                let known = Partition::known(n - 1);
                let plan = strategy.plan(StepContext {
                    graph: &graph,
                    oracle: &self.oracle,
                    size: n,
                    previous: previous.as_ref().or(known.as_ref()),
                    carried: &mut carried,
                })?;
                let (seed_calls, seed_resolved, pending) =
                    (plan.oracle_calls, plan.propagated, plan.to_check.len());

                let outcome = match pool.as_mut() {
                    Some(pool) => pool.run(&self.oracle, plan, strategy.sharding())?,
                    None => run_sequential(&mut graph, &self.oracle, plan)?,
                };
                let calls = seed_calls + outcome.oracle_calls;
                total_calls += calls;
                debug!(
                    size = n,
                    pending,
                    oracle_calls = calls,
                    propagated = seed_resolved + outcome.propagated,
                    "step classified"
                );
                outcome.partition
            };

            debug_assert!(partition.is_complete_for(n), "incomplete partition at size {n}");
            out.insert(n, partition.clone());
            previous = Some(partition);
        }

        info!(
            steps = out.len(),
            primes = primes.len(),
            oracle_calls = total_calls,
            "classification finished"
        );
        Ok(out)
    }
}

/// One-shot classification with the default oracle and shortcut settings.
///
/// `workers` of `None` runs sequentially.
///
/// # Errors
/// [`ConfigError::NonPositiveWorkers`] (wrapped) for `Some(k)` with `k <= 0`, plus every
/// error of [`Engine::classify_range`].
pub fn classify_range(
    max_size: usize,
    strategy: Strategy,
    workers: Option<i64>,
) -> Result<Classification, EngineError> {
    let mut config = EngineConfig::default().with_strategy(strategy);
    if let Some(k) = workers {
        config = config.with_workers(k)?;
    }
    Engine::new(config)?.classify_range(max_size)
}

// ============================================================================
// Tests
// ============================================================================
