//! The download capability and its verification wrapper.

use std::path::Path;

use checksums::Algorithm;
use thiserror::Error;

/// Names one downloadable object on the server side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathDescriptor {
    /// Loadset (transcript) the object belongs to; empty for special files.
    pub transcript: String,
    /// Whether this is a client-specific special file.
    pub special: bool,
    /// The object's path, already encoded for transport.
    pub encoded_path: String,
}

impl PathDescriptor {
    /// Descriptor for a loadset file.
    pub fn file(transcript: &str, encoded_path: &str) -> Self {
        Self {
            transcript: transcript.to_owned(),
            special: false,
            encoded_path: encoded_path.to_owned(),
        }
    }

    /// Descriptor for a special file.
    pub fn special(encoded_path: &str) -> Self {
        Self {
            transcript: String::new(),
            special: true,
            encoded_path: encoded_path.to_owned(),
        }
    }
}

/// Download failures, split by recoverability.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transport failed; further network operations should stop.
    #[error("network: {0}")]
    Network(String),
    /// Writing the temporary failed locally.
    #[error("local: {0}")]
    Local(#[from] std::io::Error),
    /// The payload's size did not match the transcript line.
    #[error("{path}: size {got}, expected {expected}")]
    SizeMismatch {
        /// Destination path.
        path: String,
        /// Expected byte count.
        expected: u64,
        /// Actual byte count.
        got: u64,
    },
    /// The payload's digest did not match the transcript line.
    #[error("{path}: checksum mismatch")]
    CksumMismatch {
        /// Destination path.
        path: String,
    },
    /// Checksum machinery failure.
    #[error(transparent)]
    Cksum(#[from] checksums::CksumError),
}

impl FetchError {
    /// Whether this failure should disable further network operations.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Downloads bytes behind a path descriptor to a local path.
pub trait FileFetcher {
    /// Fetches the object into `dest`, creating it with `mode`.
    fn fetch(
        &mut self,
        desc: &PathDescriptor,
        dest: &Path,
        mode: u32,
    ) -> Result<(), FetchError>;
}

/// Fetches into `dest` and verifies size and, when enabled, checksum.
///
/// On any verification failure the temporary is removed before the error is
/// returned, so a failed download never leaves bytes behind.
pub fn fetch_verified(
    fetcher: &mut dyn FileFetcher,
    desc: &PathDescriptor,
    dest: &Path,
    mode: u32,
    expected_size: u64,
    expected_cksum: Option<&str>,
    algorithm: Option<Algorithm>,
    bufsize: usize,
) -> Result<(), FetchError> {
    fetcher.fetch(desc, dest, mode)?;

    let verify = || -> Result<(), FetchError> {
        let got = std::fs::metadata(dest)?.len();
        if got != expected_size {
            return Err(FetchError::SizeMismatch {
                path: dest.display().to_string(),
                expected: expected_size,
                got,
            });
        }
        if let (Some(expected), Some(algorithm)) = (expected_cksum, algorithm) {
            let (_, b64) = checksums::cksum_file(dest, algorithm, bufsize)?;
            if b64 != expected {
                return Err(FetchError::CksumMismatch {
                    path: dest.display().to_string(),
                });
            }
        }
        Ok(())
    };

    match verify() {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = std::fs::remove_file(dest);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checksums::MIN_BUFFER_SIZE;

    struct FixedFetcher(Vec<u8>);

    impl FileFetcher for FixedFetcher {
        fn fetch(
            &mut self,
            _desc: &PathDescriptor,
            dest: &Path,
            _mode: u32,
        ) -> Result<(), FetchError> {
            std::fs::write(dest, &self.0)?;
            Ok(())
        }
    }

    #[test]
    fn verified_fetch_passes_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t");
        let payload = b"content".to_vec();
        let (_, b64) =
            checksums::cksum_reader(&payload[..], Algorithm::Md5, MIN_BUFFER_SIZE).unwrap();

        fetch_verified(
            &mut FixedFetcher(payload.clone()),
            &PathDescriptor::file("base.T", "/x"),
            &dest,
            0o600,
            payload.len() as u64,
            Some(&b64),
            Some(Algorithm::Md5),
            MIN_BUFFER_SIZE,
        )
        .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }

    #[test]
    fn size_mismatch_removes_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t");
        let err = fetch_verified(
            &mut FixedFetcher(b"short".to_vec()),
            &PathDescriptor::file("base.T", "/x"),
            &dest,
            0o600,
            999,
            None,
            None,
            MIN_BUFFER_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::SizeMismatch { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn cksum_mismatch_removes_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("t");
        let err = fetch_verified(
            &mut FixedFetcher(b"payload".to_vec()),
            &PathDescriptor::file("base.T", "/x"),
            &dest,
            0o600,
            7,
            Some("bogus"),
            Some(Algorithm::Md5),
            MIN_BUFFER_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::CksumMismatch { .. }));
        assert!(!dest.exists());
    }
}
