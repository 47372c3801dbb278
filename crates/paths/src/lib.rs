#![deny(unsafe_code)]

//! Path ordering and transcript text codecs.
//!
//! Transcript streams are merged and verified by path order, so every crate in
//! the workspace agrees on one comparison function. Paths are opaque byte
//! sequences in one of two session-wide forms (absolute or relative); the
//! separator sorts before every other byte so that a directory always
//! immediately precedes its own contents in a sorted stream.
//!
//! The codec side covers the two textual encodings transcript lines use:
//! percent-style escaping of whitespace in path names ([`encode`]/[`decode`])
//! and base64 for digests and finder-info blobs.

mod cmp;
mod codec;
mod form;

pub use cmp::{is_child, path_casecmp, path_cmp};
pub use codec::{b64_decode, b64_encode, decode, encode, split_fields, CodecError};
pub use form::PathForm;
