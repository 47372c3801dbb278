//! Transcript stacks and the merged selector stream.
//!
//! A command file (K-file) declares which transcripts make up a client's
//! target state. This crate opens them all into an ordered stack - later
//! declarations override earlier ones, the client-specific special transcript
//! overlays everything, and a null transcript sits at the bottom so the stack
//! is never empty - and merges their cursors into one lazy, strictly
//! ascending stream of path entries ([`TranscriptStack::select`]).
//!
//! The selector applies three filters before yielding an entry: minus lines
//! vanish, excluded paths vanish unless the entry came from the special
//! transcript, and entries outside the session's path prefix vanish.

mod error;
mod kfile;
mod selector;
mod session;
mod which;

pub use error::StackError;
pub use selector::TranscriptStack;
pub use session::Session;
pub use which::{which, WhichOutcome};
