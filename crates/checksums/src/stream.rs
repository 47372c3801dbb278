//! Streaming file checksums.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::Algorithm;

/// Smallest accepted read buffer.
pub const MIN_BUFFER_SIZE: usize = 8192;

/// Checksum failures.
#[derive(Debug, Error)]
pub enum CksumError {
    /// The underlying read failed.
    #[error("checksum read: {0}")]
    Io(#[from] std::io::Error),
    /// A buffer size below [`MIN_BUFFER_SIZE`] was requested.
    #[error("checksum buffer size {0} below minimum {MIN_BUFFER_SIZE}")]
    BufferTooSmall(usize),
    /// Archived-fork digests are only available where resource forks exist.
    #[error("archived-fork checksums unsupported on this platform")]
    Unsupported,
}

/// Digests everything a reader yields.
///
/// Returns the byte count alongside the base64 digest so callers can verify
/// sizes without a second pass.
pub fn cksum_reader<R: Read>(
    mut reader: R,
    algorithm: Algorithm,
    bufsize: usize,
) -> Result<(u64, String), CksumError> {
    if bufsize < MIN_BUFFER_SIZE {
        return Err(CksumError::BufferTooSmall(bufsize));
    }
    let mut hasher = algorithm.hasher();
    let mut buf = vec![0u8; bufsize];
    let mut size: u64 = 0;
    loop {
        let got = reader.read(&mut buf)?;
        if got == 0 {
            break;
        }
        size += got as u64;
        hasher.update(&buf[..got]);
    }
    Ok((size, b64(&hasher.finalize())))
}

fn b64(raw: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(raw)
}

/// Digests a file's contents.
pub fn cksum_file(
    path: &Path,
    algorithm: Algorithm,
    bufsize: usize,
) -> Result<(u64, String), CksumError> {
    let file = File::open(path)?;
    cksum_reader(file, algorithm, bufsize)
}
