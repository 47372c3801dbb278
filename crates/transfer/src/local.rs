//! A fetcher backed by a local loadset tree.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::fetch::{FetchError, FileFetcher, PathDescriptor};

/// Serves fetches from `<root>/<transcript>/<decoded-path>`, with special
/// files under `<root>/special/<decoded-path>`.
///
/// Mirrors the store layout a server keeps per loadset, so a mounted or
/// mirrored copy of the store works as an offline source.
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    /// Creates a fetcher rooted at a loadset tree.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_owned(),
        }
    }

    fn source_for(&self, desc: &PathDescriptor) -> Result<PathBuf, FetchError> {
        let decoded = paths::decode(&desc.encoded_path)
            .map_err(|e| FetchError::Network(format!("bad path descriptor: {e}")))?;
        let mut out = self.root.clone();
        if desc.special {
            out.push("special");
        } else {
            out.push(&desc.transcript);
        }
        // Store paths are relative beneath the loadset directory.
        let relative: &[u8] = match decoded.as_slice() {
            [b'/', rest @ ..] | [b'.', b'/', rest @ ..] => rest,
            other => other,
        };
        out.push(Path::new(OsStr::from_bytes(relative)));
        Ok(out)
    }
}

impl FileFetcher for DirFetcher {
    fn fetch(
        &mut self,
        desc: &PathDescriptor,
        dest: &Path,
        mode: u32,
    ) -> Result<(), FetchError> {
        let source = self.source_for(desc)?;
        let mut input = std::fs::File::open(&source)
            .map_err(|e| FetchError::Network(format!("{}: {e}", source.display())))?;
        let mut output = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(dest)?;
        std::io::copy(&mut input, &mut output)?;
        Ok(())
    }
}
