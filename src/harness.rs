//! Benchmark harness: times each contender over rounds of trials and validates every
//! run against a [`ReferenceDataset`].
//!
//! A trial whose output disagrees with the reference ends that contender's round; the
//! report keeps the valid timings gathered so far and records the failure.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineConfig};
use crate::error::{EngineError, HarnessError};
use crate::executor::{Execution, WorkerCount};
use crate::reference::{Mismatch, ReferenceDataset};
use crate::shortcut::ShortcutConfig;
use crate::strategy::Strategy;

/// Separator line written after each round report.
pub const REPORT_SEPARATOR: &str = "=========================";

/// Worker counts benchmarked for every strategy by default.
pub const DEFAULT_WORKER_COUNTS: [usize; 4] = [2, 4, 6, 8];

/// Default `(trials, max size)` schedule.
pub const DEFAULT_ROUNDS: [Round; 4] = [
    Round { trials: 2, max_size: 50 },
    Round { trials: 10, max_size: 100 },
    Round { trials: 10, max_size: 250 },
    Round { trials: 10, max_size: 500 },
];

// ============================================================================
// Contenders and rounds
// ============================================================================

/// One benchmarked algorithm: a strategy under an execution mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contender {
    /// Strategy under test.
    pub strategy: Strategy,
    /// Sequential or parallel.
    pub execution: Execution,
}

impl Contender {
    /// Sequential contender.
    pub fn sequential(strategy: Strategy) -> Self {
        Self {
            strategy,
            execution: Execution::Sequential,
        }
    }

    /// Parallel contender.
    pub fn parallel(strategy: Strategy, workers: WorkerCount) -> Self {
        Self {
            strategy,
            execution: Execution::Parallel(workers),
        }
    }

    /// Report name, e.g. `Standard Parallel Algorithm with Conservation: 4 Threads`.
    pub fn name(&self) -> String {
        match self.execution {
            Execution::Sequential => self.strategy.title().to_owned(),
            Execution::Parallel(k) => format!("{}: {k} Threads", self.strategy.parallel_title()),
        }
    }

    fn config(&self, shortcut: ShortcutConfig) -> EngineConfig {
        EngineConfig::default()
            .with_strategy(self.strategy)
            .with_execution(self.execution)
            .with_shortcut(shortcut)
    }
}

/// Every strategy sequentially, then every strategy at each of `worker_counts`.
pub fn contenders(worker_counts: &[WorkerCount]) -> Vec<Contender> {
    let mut out: Vec<Contender> = Strategy::ALL.into_iter().map(Contender::sequential).collect();
    for strategy in Strategy::ALL {
        out.extend(worker_counts.iter().map(|&k| Contender::parallel(strategy, k)));
    }
    out
}

/// The default suite: five sequential and twenty parallel contenders.
pub fn default_contenders() -> Vec<Contender> {
    let counts: Vec<WorkerCount> = DEFAULT_WORKER_COUNTS
        .into_iter()
        .filter_map(WorkerCount::new)
        .collect();
    contenders(&counts)
}

/// A batch of identical trials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Number of timed runs.
    pub trials: usize,
    /// Largest board size classified in each run.
    pub max_size: usize,
}

// ============================================================================
// Outcomes and reports
// ============================================================================

/// Result of a single timed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrialOutcome {
    /// Output matched the reference; wall-clock time of the run.
    Valid(Duration),
    /// Output disagreed with the reference.
    Invalid(Mismatch),
}

/// All trials of one contender in one round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    /// Contender name.
    pub name: String,
    /// Largest board size of the round.
    pub max_size: usize,
    /// Timings of the valid trials, in milliseconds.
    pub timings_ms: Vec<u128>,
    /// Validation failure that ended the round early, if any.
    pub failure: Option<String>,
}

impl RoundReport {
    /// Writes the report block: name, size, timing list, optional failure, separator.
    ///
    /// # Errors
    /// Propagates I/O errors from `out`.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        let timings: Vec<String> = self.timings_ms.iter().map(ToString::to_string).collect();
        writeln!(out, "{}", self.name)?;
        writeln!(out, "{} boards", self.max_size)?;
        writeln!(out, "[{}]", timings.join(", "))?;
        if let Some(failure) = &self.failure {
            writeln!(out, "validation failed: {failure}")?;
        }
        writeln!(out, "{REPORT_SEPARATOR}")
    }

    /// Appends the report block to the file at `path`, creating it if needed.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn append_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut out = io::BufWriter::new(file);
        self.write_to(&mut out)?;
        out.flush()
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Runs contenders against a reference dataset.
#[derive(Debug)]
pub struct Harness<'a> {
    reference: &'a ReferenceDataset,
    shortcut: ShortcutConfig,
}

impl<'a> Harness<'a> {
    /// Harness validating against `reference`, with default shortcut settings.
    pub fn new(reference: &'a ReferenceDataset) -> Self {
        Self {
            reference,
            shortcut: ShortcutConfig::default(),
        }
    }

    /// Overrides the shortcut settings used by every trial.
    pub fn with_shortcut(mut self, shortcut: ShortcutConfig) -> Self {
        self.shortcut = shortcut;
        self
    }

    /// Times one classification of `1..=max_size` and validates it.
    ///
    /// # Errors
    /// Engine failures; validation failures are an [`TrialOutcome::Invalid`] instead.
    pub fn run_trial(&self, contender: &Contender, max_size: usize) -> Result<TrialOutcome, HarnessError> {
        let engine = Engine::new(contender.config(self.shortcut)).map_err(EngineError::from)?;

        let start = Instant::now();
        let classification = engine.classify_range(max_size)?;
        let elapsed = start.elapsed();

        match self.reference.validate(&classification) {
            Ok(()) => {
                debug!(name = %contender.name(), max_size, ?elapsed, "trial valid");
                Ok(TrialOutcome::Valid(elapsed))
            }
            Err(mismatch) => {
                warn!(name = %contender.name(), max_size, %mismatch, "trial failed validation");
                Ok(TrialOutcome::Invalid(mismatch))
            }
        }
    }

    /// Runs up to `round.trials` trials, stopping at the first invalid one.
    ///
    /// # Errors
    /// Engine failures.
    pub fn run_round(&self, contender: &Contender, round: Round) -> Result<RoundReport, HarnessError> {
        let mut report = RoundReport {
            name: contender.name(),
            max_size: round.max_size,
            timings_ms: Vec::with_capacity(round.trials),
            failure: None,
        };
        for _ in 0..round.trials {
            match self.run_trial(contender, round.max_size)? {
                TrialOutcome::Valid(elapsed) => report.timings_ms.push(elapsed.as_millis()),
                TrialOutcome::Invalid(mismatch) => {
                    report.failure = Some(mismatch.to_string());
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Runs every round for every contender, handing each report to `sink` as soon as
    /// it is complete.
    ///
    /// # Errors
    /// Engine failures and errors returned by `sink`.
    pub fn run_suite<F>(
        &self,
        contenders: &[Contender],
        rounds: &[Round],
        mut sink: F,
    ) -> Result<Vec<RoundReport>, HarnessError>
    where
        F: FnMut(&RoundReport) -> io::Result<()>,
    {
        let mut reports = Vec::with_capacity(contenders.len() * rounds.len());
        for &round in rounds {
            info!(trials = round.trials, max_size = round.max_size, "beginning round");
            for contender in contenders {
                let report = self.run_round(contender, round)?;
                sink(&report)?;
                reports.push(report);
            }
        }
        info!(reports = reports.len(), "all rounds complete");
        Ok(reports)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::classify_range;
    use crate::partition::Partition;

    fn reference_upto(max_size: usize) -> ReferenceDataset {
        ReferenceDataset::from(&classify_range(max_size, Strategy::Baseline, None).unwrap())
    }

    #[test]
    fn default_suite_names() {
        let all = default_contenders();
        assert_eq!(all.len(), 25);
        assert_eq!(all[0].name(), "Standard Algorithm");
        assert_eq!(all[1].name(), "Standard Conserved Algorithm");
        assert_eq!(all[5].name(), "Standard Parallel Algorithm: 2 Threads");
        assert_eq!(
            all[10].name(),
            "Standard Parallel Algorithm with Conservation: 4 Threads"
        );
        assert_eq!(
            all[24].name(),
            "Standard Parallel Algorithm by Discovery with Conservation: 8 Threads"
        );
    }

    #[test]
    fn valid_round_collects_every_trial() {
        let reference = reference_upto(20);
        let harness = Harness::new(&reference);
        let contender = Contender::parallel(Strategy::Rotation2, WorkerCount::new(2).unwrap());
        let report = harness
            .run_round(&contender, Round { trials: 3, max_size: 20 })
            .unwrap();
        assert_eq!(report.timings_ms.len(), 3);
        assert!(report.failure.is_none());
    }

    #[test]
    fn invalid_trial_ends_round() {
        let mut computed = classify_range(12, Strategy::Baseline, None).unwrap();
        computed.insert(9, Partition::from_lists(&[9], &[1, 2, 3, 4, 5, 6, 7, 8]));
        let reference = ReferenceDataset::from(&computed);
        let harness = Harness::new(&reference);

        let contender = Contender::sequential(Strategy::Discovery);
        let report = harness
            .run_round(&contender, Round { trials: 5, max_size: 12 })
            .unwrap();
        assert!(report.timings_ms.is_empty());
        assert!(report.failure.unwrap().contains("board size 9"));
    }

    #[test]
    fn report_block_format() {
        let report = RoundReport {
            name: "Standard Algorithm".to_owned(),
            max_size: 50,
            timings_ms: vec![12, 9],
            failure: None,
        };
        let mut buf = Vec::new();
        report.write_to(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Standard Algorithm\n50 boards\n[12, 9]\n=========================\n"
        );
    }

    #[test]
    fn suite_feeds_sink_in_order() {
        let reference = reference_upto(10);
        let harness = Harness::new(&reference);
        let contenders = [
            Contender::sequential(Strategy::Baseline),
            Contender::sequential(Strategy::Rotation1),
        ];
        let rounds = [Round { trials: 1, max_size: 8 }, Round { trials: 1, max_size: 10 }];
        let mut seen = Vec::new();
        let reports = harness
            .run_suite(&contenders, &rounds, |r| {
                seen.push((r.name.clone(), r.max_size));
                Ok(())
            })
            .unwrap();
        assert_eq!(reports.len(), 4);
        assert_eq!(seen[1], ("Standard Algorithm with Conservation and 1 Partial Rotation".to_owned(), 8));
        assert_eq!(seen[2].1, 10);
    }

    #[test]
    fn oversized_round_is_a_validation_failure() {
        let reference = reference_upto(8);
        let harness = Harness::new(&reference);
        let outcome = harness
            .run_trial(&Contender::sequential(Strategy::Conserved), 9)
            .unwrap();
        assert_eq!(
            outcome,
            TrialOutcome::Invalid(Mismatch::Uncovered { size: 9, max: 8 })
        );
    }
}
