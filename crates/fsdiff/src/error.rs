//! Difference-engine errors.

use thiserror::Error;

/// Failures during a difference run; all are fatal.
#[derive(Debug, Error)]
pub enum DiffError {
    /// Stack construction or selection failed.
    #[error(transparent)]
    Stack(#[from] stack::StackError),
    /// The filesystem walk failed.
    #[error(transparent)]
    Walk(#[from] walk::WalkError),
    /// A checksum could not be computed.
    #[error("{path}: {source}")]
    Cksum {
        /// The file being digested.
        path: String,
        /// Underlying failure.
        #[source]
        source: checksums::CksumError,
    },
    /// Hardlink bookkeeping failed.
    #[error(transparent)]
    Hardlink(#[from] transcript::TranscriptError),
    /// The output transcript could not be written.
    #[error("writing output: {0}")]
    Output(#[from] std::io::Error),
    /// Options that cannot be combined, or a stack unfit for the mode.
    #[error("{0}")]
    Usage(String),
}
