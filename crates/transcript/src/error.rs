//! Transcript error taxonomy.

use thiserror::Error;

/// What went wrong inside a single transcript line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseProblem {
    /// Wrong field count for the line's type.
    #[error("expected {expected} arguments, got {got}")]
    FieldCount {
        /// Human-readable expectation, e.g. `"8"` or `"3 or 6"`.
        expected: &'static str,
        /// Fields actually present.
        got: usize,
    },
    /// The first token is longer than one character.
    #[error("{0:?} is too long to be a type")]
    TypeTooLong(String),
    /// Unrecognized type character.
    #[error("unknown file type {0:?}")]
    UnknownType(char),
    /// A path field failed to decode.
    #[error("path decoding failed")]
    BadPath,
    /// A numeric field failed to parse.
    #[error("bad {0} field")]
    BadNumber(&'static str),
    /// A finder-info blob was not 32 bytes of base64.
    #[error("bad finder info")]
    BadFinderInfo,
    /// Checksums are required but the line recorded `-`.
    #[error("no cksums in transcript")]
    MissingChecksum,
}

/// Failures while reading or iterating a transcript.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// A line violated the grammar.
    #[error("{file} line {line}: {problem}")]
    Parse {
        /// Transcript path, for diagnostics.
        file: String,
        /// 1-based line number.
        line: u32,
        /// The specific violation.
        problem: ParseProblem,
    },
    /// Entries regressed or repeated in path order.
    #[error("{file} line {line}: bad sort order")]
    SortOrder {
        /// Transcript path, for diagnostics.
        file: String,
        /// 1-based line number.
        line: u32,
    },
    /// The transcript file could not be read.
    #[error("{path}: {source}")]
    Io {
        /// Transcript path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A hardlink lookup referenced an inode never seen by the walk.
    #[error("hardlink {0}: inode not registered")]
    UnknownInode(String),
}
