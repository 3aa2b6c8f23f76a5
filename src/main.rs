//! `divmatch` command line: classify board sizes, verify them against a reference
//! dataset, or run the benchmark suite.
//!
//! **Usage:**
//! ```text
//! divmatch classify --max-size 100 [--strategy discovery] [--workers 4] [--json]
//! divmatch verify --reference "F&M Boards 4-1000.txt" --max-size 500
//! divmatch bench --reference "F&M Boards 4-1000.txt" [--results results.txt]
//! ```
//!
//! Logging is controlled by `DIVMATCH_LOG` (default `divmatch=info`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Once;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use divmatch::engine::{Engine, EngineConfig};
use divmatch::executor::WorkerCount;
use divmatch::harness::{self, Harness, Round};
use divmatch::reference::ReferenceDataset;
use divmatch::shortcut::{ParityTest, ShortcutConfig};
use divmatch::strategy::Strategy;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("DIVMATCH_LOG")
            .unwrap_or_else(|_| EnvFilter::new("divmatch=info"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_thread_ids(true))
            .with(filter)
            .init();
    });
}

/// Classify divisor-graph vertices as matching-essential or not.
#[derive(Parser)]
#[command(name = "divmatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify sizes 4..=max-size and print the partitions.
    Classify {
        #[command(flatten)]
        run: RunArgs,
        /// Print JSON instead of the board text format.
        #[arg(long)]
        json: bool,
        /// Also write the partitions to this file in the board text format.
        #[arg(long)]
        emit_reference: Option<PathBuf>,
    },
    /// Classify and compare against a reference dataset.
    Verify {
        #[command(flatten)]
        run: RunArgs,
        /// Reference dataset file.
        #[arg(long)]
        reference: PathBuf,
    },
    /// Time every strategy and worker count against a reference dataset.
    Bench {
        /// Reference dataset file.
        #[arg(long)]
        reference: PathBuf,
        /// Results report, appended to.
        #[arg(long, default_value = "results.txt")]
        results: PathBuf,
        /// Run a single round of this size instead of the default schedule.
        #[arg(long)]
        max_size: Option<usize>,
        /// Trials for the single round.
        #[arg(long, default_value_t = 10)]
        trials: usize,
        /// Worker counts for the parallel contenders.
        #[arg(long, value_delimiter = ',', default_values_t = harness::DEFAULT_WORKER_COUNTS)]
        workers: Vec<usize>,
        #[command(flatten)]
        shortcut: ShortcutArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Largest board size.
    #[arg(long)]
    max_size: usize,
    /// baseline, conserved, rotation1, rotation2 or discovery.
    #[arg(long, default_value = "conserved")]
    strategy: Strategy,
    /// Worker threads; omit for sequential execution.
    #[arg(long, allow_negative_numbers = true)]
    workers: Option<i64>,
    #[command(flatten)]
    shortcut: ShortcutArgs,
}

#[derive(Args)]
struct ShortcutArgs {
    /// Disable the prime and twice-a-prime shortcuts.
    #[arg(long)]
    no_shortcut: bool,
    /// Evenness test of the twice-a-prime shortcut: bitwise or modulo.
    #[arg(long, default_value = "bitwise")]
    parity: ParityTest,
}

impl ShortcutArgs {
    fn config(&self) -> ShortcutConfig {
        ShortcutConfig {
            enabled: !self.no_shortcut,
            parity: self.parity,
            ..ShortcutConfig::default()
        }
    }
}

impl RunArgs {
    fn engine(&self) -> Result<Engine> {
        let mut config = EngineConfig::default()
            .with_strategy(self.strategy)
            .with_shortcut(self.shortcut.config());
        if let Some(k) = self.workers {
            config = config.with_workers(k)?;
        }
        Ok(Engine::new(config)?)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Classify {
            run,
            json,
            emit_reference,
        } => {
            let classification = run.engine()?.classify_range(run.max_size)?;
            let boards = ReferenceDataset::from(&classification);
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            if json {
                serde_json::to_writer_pretty(&mut out, &classification)?;
                writeln!(out)?;
            } else {
                boards.write_to(&mut out)?;
            }
            out.flush()?;

            if let Some(path) = emit_reference {
                let file = File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                let mut file = BufWriter::new(file);
                boards.write_to(&mut file)?;
                file.flush()?;
            }
        }
        Command::Verify { run, reference } => {
            let reference = ReferenceDataset::load(&reference)?;
            let classification = run.engine()?.classify_range(run.max_size)?;
            if let Err(mismatch) = reference.validate(&classification) {
                eprintln!("Verification FAILED: {mismatch}");
                process::exit(1);
            }
            println!(
                "Verification OK: sizes 4..={} match the reference.",
                run.max_size
            );
        }
        Command::Bench {
            reference,
            results,
            max_size,
            trials,
            workers,
            shortcut,
        } => {
            let reference = ReferenceDataset::load(&reference)?;
            let counts = workers
                .into_iter()
                .map(|k| {
                    WorkerCount::new(k).with_context(|| format!("invalid worker count {k}"))
                })
                .collect::<Result<Vec<_>>>()?;
            let rounds = match max_size {
                Some(max_size) => vec![Round { trials, max_size }],
                None => harness::DEFAULT_ROUNDS.to_vec(),
            };

            let harness = Harness::new(&reference).with_shortcut(shortcut.config());
            let reports = harness.run_suite(&harness::contenders(&counts), &rounds, |report| {
                println!("{}: {:?}", report.name, report.timings_ms);
                report.append_to(&results)
            })?;
            let failed = reports.iter().filter(|r| r.failure.is_some()).count();
            println!("All trials complete ({failed} failed validation).");
        }
    }
    Ok(())
}
