use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::Descriptor;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of the `f64` range a numeric cell fell off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Huge,
    Tiny,
}

impl std::fmt::Display for RangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeKind::Huge => write!(f, "huge"),
            RangeKind::Tiny => write!(f, "tiny"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    // -- resource --
    #[error("csv_open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("read failed (offset {offset}): {source}")]
    Read { offset: u64, source: csv::Error },

    #[error("seek failed: {0}")]
    Io(#[from] std::io::Error),

    // -- format --
    #[error("big field (offset {offset}): {len} bytes exceeds {capacity}")]
    FieldTooLarge {
        offset: u64,
        len: usize,
        capacity: usize,
    },

    #[error("no row terminator after header (offset {offset})")]
    MissingTerminator { offset: u64 },

    #[error("unexpected eof (offset {offset})")]
    UnexpectedEof { offset: u64 },

    #[error("row on line {line} ends after {width} cells, column {column} needed")]
    ShortRow {
        line: u64,
        column: usize,
        width: usize,
    },

    #[error("too many columns in csv ({found} > {limit})")]
    TooManyColumns { found: usize, limit: usize },

    #[error("bad cell '{cell}' (offset {offset}): {reason}")]
    BadCell {
        cell: String,
        offset: u64,
        reason: &'static str,
    },

    #[error("{kind} cell '{cell}' (offset {offset})")]
    CellOutOfRange {
        cell: String,
        offset: u64,
        kind: RangeKind,
    },

    // -- lookup --
    #[error("can't find column '{0}'")]
    ColumnNotFound(String),

    // -- contract --
    #[error("invalid descriptor (run {run}, field '{field}'): {reason}")]
    InvalidDescriptor {
        run: i64,
        field: String,
        reason: &'static str,
    },

    #[error("time column {time} does not precede value column {value} for {descriptor}")]
    ColumnOrder {
        descriptor: Descriptor,
        time: usize,
        value: usize,
    },

    #[error("invalid integration bounds [{lb}, {ub}]")]
    InvalidBounds { lb: f64, ub: f64 },

    #[error("oob lb {lb}: series ends before the lower bound")]
    LowerBoundNotReached { lb: f64 },

    #[error("huge csv: more than {limit} rows in one scan")]
    RowBudgetExceeded { limit: usize },

    // -- convergence --
    #[error("search failed; best bounds {min}-{max}")]
    NoConvergence { min: f64, max: f64 },

    #[error("double integration produced no steps over [{lb}, {ub}]")]
    EmptyIntegration { lb: f64, ub: f64 },

    // -- physics --
    #[error("no {what} sample for {descriptor}")]
    MissingSample {
        descriptor: Descriptor,
        what: &'static str,
    },

    // -- config --
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
