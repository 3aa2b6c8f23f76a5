//! # divmatch
//!
//! Incremental classification of matching-essential vertices in growing divisor graphs.
//!
//! The divisor graph \(G(n)\) has vertices `1..=n` and an edge between `d` and `k`
//! whenever `d` properly divides `k`. For every board size `n` this crate splits the
//! vertices into:
//! - **TRUE** (matching-inessential): removing the vertex leaves the maximum matching
//!   weight unchanged.
//! - **FALSE** (matching-essential): removing the vertex lowers it.
//!
//! The partition for `n` depends only on \(G(n)\). Five strategies compute it with
//! increasing reuse of earlier work, sequentially or on a fixed worker pool, and all of
//! them produce identical partitions.
//!
//! ## Quick Start
//!
//! ```
//! use divmatch::prelude::*;
//!
//! let steps = classify_range(7, Strategy::Conserved, None)?;
//! let seven = steps.get(7).unwrap();
//! assert_eq!(seven.trues().iter().copied().collect::<Vec<_>>(), vec![5, 7]);
//! assert_eq!(seven.falses().len(), 5);
//! # Ok::<(), divmatch::error::EngineError>(())
//! ```
//!
//! ## Parallel Execution
//!
//! ```
//! use divmatch::prelude::*;
//!
//! let config = EngineConfig::default()
//!     .with_strategy(Strategy::Discovery)
//!     .with_workers(4)?;
//! let parallel = Engine::new(config)?.classify_range(30)?;
//! let sequential = classify_range(30, Strategy::Baseline, None)?;
//! assert_eq!(parallel, sequential);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`graph`]: Divisor graph with transient vertex detachment.
//! - [`oracle`]: Maximum matching oracle trait and the petgraph-backed default.
//! - [`partition`]: TRUE/FALSE partitions and the per-size classification map.
//! - [`shortcut`]: Prime and twice-a-prime shortcuts.
//! - [`propagation`]: Rotation and discovery rules that resolve candidates without a test.
//! - [`strategy`]: The five strategies and how each seeds a size step.
//! - [`executor`]: Sequential loop and the replica worker pool.
//! - [`engine`]: Configuration and the size-by-size driver.
//! - [`reference`]: Reference dataset loader and validation.
//! - [`harness`]: Timed, validated benchmark rounds.
//!
//! ## Performance Notes
//!
//! - Each worker owns a full graph replica; memory grows with `workers * edges`.
//! - Rotation and discovery replace oracle calls with matching-table lookups, so they
//!   gain most on large sizes where each oracle call is expensive.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)] // Graph-theory variable names
#![allow(clippy::doc_markdown)] // LaTeX-style notation in docs
#![allow(clippy::multiple_crate_versions)] // Cargo.lock management is external

pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod harness;
pub mod oracle;
pub mod partition;
pub mod propagation;
pub mod reference;
pub mod shortcut;
pub mod strategy;

/// Re-export commonly used types for convenience.
pub mod prelude {
    pub use crate::engine::{classify_range, Engine, EngineConfig};
    pub use crate::error::{ConfigError, EngineError};
    pub use crate::executor::{Execution, WorkerCount};
    pub use crate::graph::{DivisorGraph, Vertex};
    pub use crate::oracle::{EdmondsOracle, Matching, MatchingOracle};
    pub use crate::partition::{Classification, Partition, Verdict};
    pub use crate::reference::ReferenceDataset;
    pub use crate::shortcut::{ParityTest, ShortcutConfig};
    pub use crate::strategy::Strategy;
}
