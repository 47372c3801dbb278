//! Applier error taxonomy.
//!
//! Everything here is fatal to the run except network-level fetch failures,
//! which the applier recovers from by disabling further downloads.

use thiserror::Error;

/// Failures while applying an applicable transcript.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Reading the input transcript failed.
    #[error("reading input: {0}")]
    Input(#[from] std::io::Error),
    /// An input line violated the transcript grammar.
    #[error("line {line}: {problem}")]
    Parse {
        /// 1-based input line number.
        line: u32,
        /// The specific violation.
        problem: transcript::ParseProblem,
    },
    /// Input paths regressed or repeated; the sort contract is broken.
    #[error("line {line}: bad sort order")]
    BadSortOrder {
        /// 1-based input line number.
        line: u32,
    },
    /// A transcript header line was malformed.
    #[error("line {line}: invalid transcript name {name:?}")]
    BadHeader {
        /// 1-based input line number.
        line: u32,
        /// The offending token.
        name: String,
    },
    /// A `+` line appeared before any transcript header.
    #[error("line {line}: no transcript indicated")]
    NoTranscript {
        /// 1-based input line number.
        line: u32,
    },
    /// A `+` line named a type that has no payload.
    #[error("line {line}: {type_char:?} invalid download type")]
    BadDownloadType {
        /// 1-based input line number.
        line: u32,
        /// The offending type character.
        type_char: char,
    },
    /// A mutation on a tracked path failed.
    #[error("{path}: {source}")]
    Path {
        /// The path being mutated.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A stat on a tracked path failed.
    #[error(transparent)]
    Walk(#[from] walk::WalkError),
    /// A non-network download failure (verification included).
    #[error(transparent)]
    Fetch(#[from] transfer::FetchError),
    /// The platform cannot perform the requested installation.
    #[error("line {line}: {what} unsupported on this platform")]
    Unsupported {
        /// 1-based input line number.
        line: u32,
        /// What was attempted.
        what: &'static str,
    },
}

impl ApplyError {
    pub(crate) fn path_err(path: &[u8]) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Path {
            path: String::from_utf8_lossy(path).into_owned(),
            source,
        }
    }
}
