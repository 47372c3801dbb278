//! Difference-line emission.
//!
//! One routine renders every kind of output line. Which side of the
//! comparison gets printed depends on the output shape: applicable lines
//! describe the transcript's target state, creatable lines describe the
//! filesystem, and the `-` marker flips the source for the missing side.

use std::ffi::OsStr;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use checksums::{ForkDigest, FINFO_LEN};
use transcript::{write_line, EntryInfo, PathEntry};
use walk::FsObject;

use crate::config::EditPath;
use crate::diff::Differ;
use crate::error::DiffError;

/// Why a line is being emitted; mirrors the comparison outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flag {
    /// Entry exists only in the transcript.
    TranOnly,
    /// Object exists only on the filesystem.
    FsOnly,
    /// Content differs; a download is needed.
    Download,
    /// Only metadata differs.
    Status,
    /// Metadata differs but the governing transcript is negative.
    StatusNeg,
}

impl<W: Write> Differ<W> {
    fn fill_cksum(&self, entry: &mut PathEntry) -> Result<(), DiffError> {
        let Some(algorithm) = self.config.algorithm else {
            return Ok(());
        };
        let name = entry.name.clone();
        let Some(meta) = entry.info.file_meta_mut() else {
            return Ok(());
        };
        if meta.cksum.is_some() {
            return Ok(());
        }
        let path = Path::new(OsStr::from_bytes(&name));
        let cksum_err = |source| DiffError::Cksum {
            path: String::from_utf8_lossy(&name).into_owned(),
            source,
        };
        let is_archive = matches!(entry.info, EntryInfo::Archive(_));
        let b64 = if is_archive {
            let digest =
                ForkDigest::new(algorithm, self.config.cksum_bufsize).map_err(cksum_err)?;
            digest
                .digest_path(path, &[0u8; FINFO_LEN])
                .map_err(cksum_err)?
                .1
        } else {
            checksums::cksum_file(path, algorithm, self.config.cksum_bufsize)
                .map_err(cksum_err)?
                .1
        };
        if let Some(meta) = entry.info.file_meta_mut() {
            meta.cksum = Some(b64);
        }
        Ok(())
    }

    /// Emits one difference line.
    ///
    /// In applicable mode, objects with multiple links get their hardlink
    /// group marked changed so later `h` siblings are re-linked by the
    /// applier.
    pub(crate) fn print(
        &mut self,
        fs: Option<&FsObject>,
        tran: Option<usize>,
        flag: Flag,
    ) -> Result<(), DiffError> {
        let applicable = self.config.edit_path == EditPath::Applicable;

        if applicable {
            if let Some(fs) = fs {
                let t = fs.entry.type_char();
                if t != 'd' && t != 'h' && fs.nlink > 1 {
                    self.hardlinks
                        .set_changed(fs.dev, fs.ino, &fs.entry.name)?;
                }
            }
        }

        // Which side the line describes, and whether it carries a removal
        // marker.
        let (mut cur, minus) = if applicable {
            match flag {
                Flag::FsOnly => (fs.expect("fs-only line without object").entry.clone(), true),
                _ => (
                    self.stack
                        .tran(tran.expect("transcript line without source"))
                        .current()
                        .expect("transcript line at EOF")
                        .clone(),
                    false,
                ),
            }
        } else {
            match flag {
                Flag::TranOnly => (
                    self.stack
                        .tran(tran.expect("transcript line without source"))
                        .current()
                        .expect("transcript line at EOF")
                        .clone(),
                    true,
                ),
                _ => (fs.expect("filesystem line without object").entry.clone(), false),
            }
        };

        if applicable
            && matches!(flag, Flag::TranOnly | Flag::Download | Flag::StatusNeg)
            && self.prev_tran != tran
        {
            let idx = tran.expect("attributed line without source");
            writeln!(self.out, "{}:", self.stack.tran(idx).shortname)?;
            self.prev_tran = tran;
        }

        if minus {
            // Children of a doomed directory must go even when excluded.
            self.fs_minus = true;
        }

        if !minus {
            self.fill_cksum(&mut cur)?;
        }

        // Negative transcripts carry no authoritative mtime; keep the
        // filesystem's.
        if flag == Flag::StatusNeg {
            if let (Some(fs), Some(meta)) = (fs, cur.info.file_meta_mut()) {
                if let Some(fs_meta) = fs.entry.info.file_meta() {
                    meta.mtime = fs_meta.mtime;
                }
            }
        }

        let download_marker = applicable
            && matches!(flag, Flag::TranOnly | Flag::Download)
            && matches!(cur.info, EntryInfo::File(_) | EntryInfo::Archive(_));

        cur.minus = false;
        let prefix = if minus {
            "- "
        } else if download_marker {
            "+ "
        } else {
            ""
        };
        writeln!(self.out, "{prefix}{}", write_line(&cur))?;
        self.changes += 1;
        Ok(())
    }
}
