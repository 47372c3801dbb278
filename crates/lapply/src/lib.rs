//! The applier: consume an applicable transcript in sort order and bring the
//! filesystem into compliance.
//!
//! Each input line is a download-and-install (`+`), a removal (`-`), or a
//! metadata update / payloadless creation (no marker). Downloads land in a
//! sibling temporary, get verified and dressed with their final metadata,
//! and are renamed into place; a half-written target never exists.
//!
//! Directory removals are deferred on a LIFO stack until every descendant
//! named later in the stream has been handled; strictly ascending input
//! order is the contract with the difference engine, and a regression is
//! fatal.

mod apply;
mod error;
mod update;

#[cfg(target_os = "macos")]
mod fork_install;

pub use apply::{Applier, ApplyConfig, Summary};
pub use error::ApplyError;
