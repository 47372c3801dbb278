#![deny(unsafe_code)]

//! # Overview
//!
//! Streaming content digests for transcript verification. A session selects
//! one algorithm by name at startup; every file checksum in a run uses that
//! algorithm and travels base64-encoded in transcript lines (the literal `-`
//! stands for "no checksum recorded").
//!
//! Besides plain files, the crate digests the canonical serialization of an
//! archived-fork object (packed multi-fork file): fixed header, three
//! big-endian entry records, finder-info bytes, resource-fork bytes, data-fork
//! bytes, in that order. See [`fork`].
//!
//! The read buffer is configurable but never smaller than
//! [`MIN_BUFFER_SIZE`]; digests never load whole files into memory.

mod algorithm;
mod fork;
mod stream;

pub use algorithm::{Algorithm, Hasher};
pub use fork::{ForkDigest, AS_ENTRY_LEN, AS_HEADER, AS_HEADER_LEN, FINFO_LEN};
pub use stream::{cksum_file, cksum_reader, CksumError, MIN_BUFFER_SIZE};
