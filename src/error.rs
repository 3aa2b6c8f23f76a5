//! Error types for the classification engine and its collaborators.

use crate::graph::Vertex;

/// Rejected configuration. Raised before any graph or thread work begins.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A parallel execution was requested with zero or a negative number of workers.
    #[error("worker count must be positive, got {got}")]
    NonPositiveWorkers {
        /// The rejected worker count.
        got: i64,
    },

    /// The requested maximum board size was zero.
    #[error("maximum board size must be positive")]
    EmptyRange,

    /// The minimum board size leaves vertex 1 without the fixed FALSE base case.
    #[error("minimum board size must be at least 2, got {got}")]
    MinimumSize {
        /// The rejected minimum size.
        got: usize,
    },

    /// A strategy or parity name that does not parse.
    #[error("unknown {kind} `{name}` (expected one of: {expected})")]
    UnknownName {
        /// What was being parsed.
        kind: &'static str,
        /// The rejected input.
        name: String,
        /// Accepted spellings.
        expected: &'static str,
    },
}

/// Fatal errors raised while classifying a range of board sizes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The matching oracle returned something that is not an exact maximum matching
    /// of the graph it was queried with.
    #[error("matching oracle contract violated at size {size}: {details}")]
    OracleContract {
        /// Board size of the step that issued the query.
        size: usize,
        /// What was wrong with the returned matching.
        details: String,
    },

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A worker panicked, or found the shared to-check set poisoned, and sent no report.
    #[error("worker failed during size {size} (received {received} of {expected} reports)")]
    WorkerPanicked {
        /// Board size of the step.
        size: usize,
        /// Reports that made it past the barrier.
        received: usize,
        /// Number of workers that were started.
        expected: usize,
    },
}

/// Errors raised by the reference dataset loader.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// The dataset file could not be read.
    #[error("failed to read reference dataset {path}: {source}")]
    Io {
        /// Path that was opened.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A TRUE/FALSE line has no bracketed list or contains a non-integer entry.
    #[error("malformed reference line {line}: {details}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What could not be parsed.
        details: String,
    },

    /// Board size 0 was requested.
    #[error("board size must be positive")]
    NonPositiveSize,

    /// The requested size is beyond the last entry in the dataset.
    #[error("board size {size} exceeds the reference dataset maximum of {max}")]
    OutOfRange {
        /// Requested size.
        size: usize,
        /// Largest size the dataset covers.
        max: usize,
    },

    /// A vertex outside `1..=size` was listed for a board size.
    #[error("reference entry for size {size} lists vertex {vertex}")]
    VertexOutOfRange {
        /// Board size of the entry.
        size: usize,
        /// Offending vertex.
        vertex: Vertex,
    },
}

/// Errors raised while running a benchmark suite.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A trial could not run to completion.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The results report could not be written.
    #[error("failed to write results report: {0}")]
    Report(#[from] std::io::Error),
}
