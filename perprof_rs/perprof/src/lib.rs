//! Performance profile computation for comparing solver benchmark results.
//!
//! Solver result tables are parsed and validated by [`parse`], combined into a
//! [`ProfileData`] by [`profile`], and can be dumped as plain numbers through
//! [`raw`]. Rendering lives in the `perprof` binary.

use std::path::PathBuf;

use thiserror::Error;

pub mod demo;
pub mod options;
pub mod parse;
pub mod profile;
pub mod raw;

pub use options::{
    Backend, Compare, OutputFormat, ParserOptions, ProfilerOptions, Rgb, TableSource,
    DEFAULT_OUTPUT_STEM,
};
pub use parse::{load_subset, parse_str, parse_table, Objective, ProblemResult, SolverTable};
pub use profile::{ProfileData, SolverSummary};
pub use raw::write_raw;

/// Broad classification of a [`PerfError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input data or option values are malformed or semantically invalid.
    InvalidData,
    /// A supplied file has no usable structure at all (an empty subset list).
    InvalidStructure,
    /// Reading or writing files failed.
    Io,
}

#[derive(Error, Debug)]
pub enum PerfError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{table}:{line}: not valid UTF-8 text")]
    Encoding { table: String, line: usize },
    #[error("{table}: no problems found")]
    EmptyTable { table: String },
    #[error("{table}: malformed header: {message}")]
    Header { table: String, message: String },
    #[error("{table}:{line}: expected at least {required} columns, found {found}")]
    MissingColumns {
        table: String,
        line: usize,
        found: usize,
        required: usize,
    },
    #[error("{table}:{line}: time value '{value}' is not a number")]
    InvalidTime {
        table: String,
        line: usize,
        value: String,
    },
    #[error("{table}:{line}: time spent on {problem} must be positive")]
    NonPositiveTime {
        table: String,
        line: usize,
        problem: String,
    },
    #[error("{table}:{line}: exit flag '{flag}' is neither 'c' nor 'd' (set free_format to accept it)")]
    InvalidExitFlag {
        table: String,
        line: usize,
        flag: String,
    },
    #[error("{table}:{line}: {column} value '{value}' is not a number")]
    InvalidValue {
        table: String,
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("{table}:{line}: problem {problem} appears more than once")]
    DuplicateProblem {
        table: String,
        line: usize,
        problem: String,
    },
    #[error("solver name {0} is used by more than one table")]
    DuplicateSolver(String),
    #[error("subset file {} lists no problems", .0.display())]
    EmptySubset(PathBuf),
    #[error("subset and loaded problems have no problem in common")]
    EmptyIntersection,
    #[error("{solver} solved no problem; there is no profile to plot")]
    NoSuccess { solver: String },
    #[error("output format {format} is not supported by the {backend} backend")]
    UnsupportedFormat {
        backend: Backend,
        format: OutputFormat,
    },
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl PerfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PerfError::Io { .. } => ErrorKind::Io,
            PerfError::EmptySubset(_) => ErrorKind::InvalidStructure,
            _ => ErrorKind::InvalidData,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PerfError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PerfError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subset_is_the_only_structural_error() {
        assert_eq!(
            PerfError::EmptySubset(PathBuf::from("a.subset")).kind(),
            ErrorKind::InvalidStructure
        );
        assert_eq!(PerfError::EmptyIntersection.kind(), ErrorKind::InvalidData);
        assert_eq!(
            PerfError::NoSuccess {
                solver: "a".into()
            }
            .kind(),
            ErrorKind::InvalidData
        );
        let io = PerfError::io("x", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(io.kind(), ErrorKind::Io);
    }
}
