//! Stack construction and selection errors.

use thiserror::Error;

/// Failures while building or driving a transcript stack.
#[derive(Debug, Error)]
pub enum StackError {
    /// A command file could not be read.
    #[error("{path}: {source}")]
    Io {
        /// Command-file path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A command-file line violated the grammar.
    #[error("command file {file} line {line}: {problem}")]
    Kfile {
        /// Command-file path.
        file: String,
        /// 1-based line number.
        line: u32,
        /// Description of the violation.
        problem: String,
    },
    /// Command-file inclusion looped back on itself.
    #[error("command file {file} line {line}: command file loop: {included} already included")]
    Cycle {
        /// Command-file path.
        file: String,
        /// 1-based line number.
        line: u32,
        /// The file that was included twice.
        included: String,
    },
    /// An exclude pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] filters::PatternError),
    /// A transcript failed to open, parse, or keep sort order.
    #[error(transparent)]
    Transcript(#[from] transcript::TranscriptError),
}
