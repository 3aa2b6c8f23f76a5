//! Precomputed reference classifications, used to validate engine output.
//!
//! The text format holds four lines per board size, starting at size 4:
//!
//! ```text
//! Board size 5
//! TRUE: [3, 5]
//! FALSE: [1, 2, 4]
//! ----------
//! ```
//!
//! Each header must name the next size in sequence, so a skipped or repeated entry is
//! rejected instead of shifting every later size. Separator lines are free-form.
//! Sizes 1..=3 are not stored and come from [`Partition::known`].

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::ReferenceError;
use crate::graph::Vertex;
use crate::partition::{Classification, Partition, Verdict};

/// First size stored in the file.
pub const FIRST_STORED_SIZE: usize = 4;

const LINES_PER_BOARD: usize = 4;
const SEPARATOR: &str = "----------";
const HEADER: &str = "Board size";

/// An explicitly loaded reference dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceDataset {
    /// `boards[i]` is the partition for size `FIRST_STORED_SIZE + i`.
    boards: Vec<Partition>,
}

/// A disagreement between computed and reference classifications.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    /// One side of a partition differs.
    #[error("board size {size} {verdict} set differs: expected {expected:?}, reported {reported:?}")]
    Sets {
        /// Board size.
        size: usize,
        /// Which side differs.
        verdict: Verdict,
        /// Reference set.
        expected: BTreeSet<Vertex>,
        /// Computed set.
        reported: BTreeSet<Vertex>,
    },
    /// The computed range goes beyond what the dataset covers.
    #[error("board size {size} is not covered by the reference (max {max})")]
    Uncovered {
        /// Board size.
        size: usize,
        /// Largest size in the dataset.
        max: usize,
    },
}

impl ReferenceDataset {
    /// Reads and parses the whole file up front.
    ///
    /// # Errors
    /// [`ReferenceError::Io`] if the file cannot be read, or any parse error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses the dataset text.
    ///
    /// # Errors
    /// [`ReferenceError::Malformed`] for an out-of-sequence header or a missing or
    /// unparsable list, and [`ReferenceError::VertexOutOfRange`] for a vertex outside
    /// `1..=size`.
    pub fn parse(text: &str) -> Result<Self, ReferenceError> {
        let lines: Vec<&str> = text.lines().collect();
        let mut boards = Vec::with_capacity(lines.len() / LINES_PER_BOARD + 1);

        for (i, chunk) in lines.chunks(LINES_PER_BOARD).enumerate() {
            let first_line = i * LINES_PER_BOARD + 1;
            if chunk.len() < 3 {
                if chunk.iter().all(|l| l.trim().is_empty()) {
                    break;
                }
                return Err(ReferenceError::Malformed {
                    line: first_line,
                    details: "truncated board entry".to_owned(),
                });
            }
            let size = FIRST_STORED_SIZE + i;
            check_header(chunk[0], first_line, size)?;
            let trues = parse_list(chunk[1], first_line + 1, size)?;
            let falses = parse_list(chunk[2], first_line + 2, size)?;
            boards.push(Partition::new(trues, falses));
        }

        Ok(Self { boards })
    }

    /// Largest size the dataset answers for.
    pub fn max_size(&self) -> usize {
        FIRST_STORED_SIZE + self.boards.len() - 1
    }

    /// Reference partition for `size`.
    ///
    /// # Errors
    /// [`ReferenceError::NonPositiveSize`] for 0, [`ReferenceError::OutOfRange`] beyond
    /// [`max_size`](Self::max_size).
    pub fn partition(&self, size: usize) -> Result<Partition, ReferenceError> {
        if size == 0 {
            return Err(ReferenceError::NonPositiveSize);
        }
        if let Some(known) = Partition::known(size) {
            return Ok(known);
        }
        self.boards
            .get(size - FIRST_STORED_SIZE)
            .cloned()
            .ok_or(ReferenceError::OutOfRange {
                size,
                max: self.max_size(),
            })
    }

    /// Reference TRUE set for `size`.
    ///
    /// # Errors
    /// As [`partition`](Self::partition).
    pub fn trues(&self, size: usize) -> Result<BTreeSet<Vertex>, ReferenceError> {
        self.partition(size).map(|p| p.trues().clone())
    }

    /// Reference FALSE set for `size`.
    ///
    /// # Errors
    /// As [`partition`](Self::partition).
    pub fn falses(&self, size: usize) -> Result<BTreeSet<Vertex>, ReferenceError> {
        self.partition(size).map(|p| p.falses().clone())
    }

    /// Compares every computed size with the reference, smallest first.
    ///
    /// # Errors
    /// The first [`Mismatch`] found.
    pub fn validate(&self, computed: &Classification) -> Result<(), Mismatch> {
        for (&size, reported) in computed {
            let expected = self.partition(size).map_err(|_| Mismatch::Uncovered {
                size,
                max: self.max_size(),
            })?;
            for verdict in [Verdict::True, Verdict::False] {
                let (want, got) = match verdict {
                    Verdict::True => (expected.trues(), reported.trues()),
                    Verdict::False => (expected.falses(), reported.falses()),
                };
                if want != got {
                    return Err(Mismatch::Sets {
                        size,
                        verdict,
                        expected: want.clone(),
                        reported: got.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Writes the dataset in the four-lines-per-size format.
    ///
    /// # Errors
    /// Propagates I/O errors from `out`.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (i, board) in self.boards.iter().enumerate() {
            writeln!(out, "{HEADER} {}", FIRST_STORED_SIZE + i)?;
            writeln!(out, "TRUE: {}", format_list(board.trues()))?;
            writeln!(out, "FALSE: {}", format_list(board.falses()))?;
            writeln!(out, "{SEPARATOR}")?;
        }
        Ok(())
    }
}

impl From<&Classification> for ReferenceDataset {
    /// Takes the contiguous run of sizes starting at 4.
    fn from(classification: &Classification) -> Self {
        let boards = (FIRST_STORED_SIZE..)
            .map_while(|size| classification.get(size).cloned())
            .collect();
        Self { boards }
    }
}

fn check_header(line: &str, line_no: usize, size: usize) -> Result<(), ReferenceError> {
    let found = line
        .trim()
        .strip_prefix(HEADER)
        .and_then(|rest| rest.trim().parse::<usize>().ok());
    if found == Some(size) {
        return Ok(());
    }
    Err(ReferenceError::Malformed {
        line: line_no,
        details: format!("expected `{HEADER} {size}`, found `{}`", line.trim()),
    })
}

fn parse_list(line: &str, line_no: usize, size: usize) -> Result<BTreeSet<Vertex>, ReferenceError> {
    let malformed = |details: String| ReferenceError::Malformed {
        line: line_no,
        details,
    };
    let open = line
        .find('[')
        .ok_or_else(|| malformed("missing `[`".to_owned()))?;
    let close = line[open..]
        .find(']')
        .map(|i| open + i)
        .ok_or_else(|| malformed("missing `]`".to_owned()))?;

    let mut out = BTreeSet::new();
    for item in line[open + 1..close].split(',').map(str::trim) {
        if item.is_empty() {
            continue;
        }
        let vertex: Vertex = item
            .parse()
            .map_err(|_| malformed(format!("`{item}` is not a vertex")))?;
        if vertex == 0 || vertex > size {
            return Err(ReferenceError::VertexOutOfRange { size, vertex });
        }
        out.insert(vertex);
    }
    Ok(out)
}

fn format_list(set: &BTreeSet<Vertex>) -> String {
    let items: Vec<String> = set.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

// ============================================================================
// Tests
// ============================================================================
