//! Transcript model: parsing, writing, and lazy iteration.
//!
//! A transcript is an ordered text file describing filesystem objects, one
//! per line, strictly ascending by path under the session's comparison
//! function. This crate owns the line grammar ([`parse_line`]/[`write_line`]),
//! the per-transcript lazy cursor ([`Transcript`]) with transparent
//! small-file buffering, and the hardlink registry used during filesystem
//! walks.
//!
//! Precedence, exclusion, and command-file handling live one layer up in the
//! `stack` crate; this crate only knows about single transcripts.

mod cursor;
mod entry;
mod error;
mod hardlink;
mod parse;
mod write;

pub use cursor::{Transcript, TranscriptKind, DEFAULT_BUFFER_SIZE};
pub use entry::{EntryInfo, FileMeta, Marker, PathEntry, FINFO_LEN};
pub use error::{ParseProblem, TranscriptError};
pub use hardlink::HardlinkRegistry;
pub use parse::{parse_line, ParseContext};
pub use write::write_line;
