//! The difference engine: walk the live filesystem in sorted order, drive the
//! transcript selector in lock step, and emit a transcript describing how the
//! two differ.
//!
//! Two output shapes exist. An *applicable* transcript is the difference
//! stream the applier consumes: `+` lines to download, `-` lines to remove,
//! bare lines for metadata-only drift, with header lines attributing entries
//! to their source transcript. A *creatable* transcript describes what is on
//! the filesystem, with `-` markers for entries the stack expected but the
//! disk lacks.
//!
//! Output is strictly ascending by path, so it is itself a valid transcript
//! and can drive in-place creation and removal safely.

mod config;
mod diff;
mod emit;
mod error;

pub use config::{CheckFields, DiffConfig, EditPath};
pub use diff::Differ;
pub use error::DiffError;
