use std::path::PathBuf;

use crate::junction::JunctionKey;

/// Errors that can occur in sjcohort.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    /// A single raw SJ.out.tab line failed validation. The reformatter skips
    /// and counts these; they never leave the stage.
    #[error("malformed junction record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error(
        "junction {key} appears twice in sample '{sample}' (lines {first_line} and {second_line} of {path})"
    )]
    DuplicateJunctionInSample {
        sample: String,
        key: JunctionKey,
        first_line: usize,
        second_line: usize,
        path: PathBuf,
    },

    #[error("no sample junction files given; nothing to combine")]
    EmptyInputSet,

    #[error("{path}:{line}: junction {key} is not in ascending order after {previous}")]
    UnsortedInput {
        path: PathBuf,
        line: usize,
        key: JunctionKey,
        previous: JunctionKey,
    },

    #[error("{path}:{line}: malformed canonical junction line: {reason}")]
    MalformedCanonical {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{path}:{line}: matrix row has {found} columns, expected {expected}")]
    StructuralMismatch {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{path}:{line}: malformed junction matrix: {reason}")]
    MalformedMatrix {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("reference annotation error: {0}")]
    Reference(String),
}

impl Error {
    /// Convenience for wrapping an `io::Error` with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}
