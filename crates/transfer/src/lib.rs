#![deny(unsafe_code)]

//! Capabilities the engine consumes but does not implement.
//!
//! The wire protocol and server store live elsewhere; the applier only needs
//! two things from them: fetch the bytes behind a path descriptor into a
//! local temporary ([`FileFetcher`]) and post a named event with an outcome
//! string ([`EventReporter`]). [`fetch_verified`] wraps a fetch with the size
//! and checksum verification every download gets.
//!
//! [`DirFetcher`] serves fetches from a local loadset tree
//! (`<root>/<transcript>/<path>`), which is enough for offline staging and
//! for exercising the applier end to end.

mod fetch;
mod local;
mod report;

pub use fetch::{fetch_verified, FetchError, FileFetcher, PathDescriptor};
pub use local::DirFetcher;
pub use report::{post_or_warn, EventReporter, NullReporter, Outcome, ReportError};
