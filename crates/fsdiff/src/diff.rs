//! The lock-step comparison of filesystem and transcript stack.
//!
//! Two streams advance together by path order: the sorted filesystem walk
//! and the stack selector. Each comparison classifies one name as matching,
//! creating, updating, or deleting, emits the corresponding line, and tells
//! the caller which stream to advance.

use std::cmp::Ordering;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;

use checksums::{ForkDigest, FINFO_LEN};
use paths::{is_child, path_casecmp};
use stack::{Session, TranscriptStack};
use tracing::warn;
use transcript::{EntryInfo, HardlinkRegistry, PathEntry, TranscriptKind};
use walk::FsObject;

use crate::config::{DiffConfig, EditPath};
use crate::emit::Flag;
use crate::error::DiffError;

/// Which stream(s) the last comparison consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Move {
    /// Advance the transcript side only.
    Tran,
    /// Advance the filesystem side only.
    Fs,
    /// Both sides named the same path.
    Both,
}

/// What the walker should do after checking a name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Descend {
    /// Not a directory; nothing to descend into.
    File,
    /// Descend by reading the directory.
    Dir,
    /// Matched a negative directory: descend by selector only.
    NegDir,
}

/// One difference run over a start path.
pub struct Differ<W: Write> {
    pub(crate) config: DiffConfig,
    pub(crate) stack: TranscriptStack,
    pub(crate) hardlinks: HardlinkRegistry,
    pub(crate) out: W,
    pub(crate) prev_tran: Option<usize>,
    pub(crate) fs_minus: bool,
    pub(crate) changes: u64,
    warn_countdown: u32,
    last_percent: i64,
}

impl<W: Write> Differ<W> {
    /// Creates a differ over an opened stack.
    pub fn new(config: DiffConfig, stack: TranscriptStack, out: W) -> Result<Self, DiffError> {
        if config.edit_path == EditPath::Applicable && config.single_line {
            return Err(DiffError::Usage(
                "single-line and applicable output are mutually exclusive".to_owned(),
            ));
        }
        Ok(Self {
            config,
            stack,
            hardlinks: HardlinkRegistry::new(),
            out,
            prev_tran: None,
            fs_minus: false,
            changes: 0,
            warn_countdown: 3,
            last_percent: -1,
        })
    }

    fn session(&self) -> Session {
        self.config.session.clone()
    }

    /// Runs the walk from the session's path prefix and drains the stack.
    ///
    /// Returns the number of lines emitted.
    pub fn run(&mut self) -> Result<u64, DiffError> {
        let prefix = self.config.session.path_prefix.clone();
        let root = walk::radstat(&prefix)?;
        let finish = if self.config.progress { 100.0 } else { 0.0 };
        self.walk(root, 0.0, finish, false)?;
        // The filesystem is exhausted; everything left in the stack is
        // transcript-only.
        self.check(None, false)?;
        self.stack.report_inactive();
        self.out.flush()?;
        Ok(self.changes)
    }

    fn fs_cksum(&self, fs: &mut FsObject) -> Result<String, DiffError> {
        let algorithm = self
            .config
            .algorithm
            .expect("checksum comparison without an algorithm");
        if let Some(meta) = fs.entry.info.file_meta() {
            if let Some(b64) = &meta.cksum {
                return Ok(b64.clone());
            }
        }
        let name = fs.entry.name.clone();
        let path = std::path::Path::new(std::ffi::OsStr::from_bytes(&name));
        let cksum_err = |source| DiffError::Cksum {
            path: String::from_utf8_lossy(&name).into_owned(),
            source,
        };
        let b64 = if matches!(fs.entry.info, EntryInfo::Archive(_)) {
            ForkDigest::new(algorithm, self.config.cksum_bufsize)
                .map_err(cksum_err)?
                .digest_path(path, &[0u8; FINFO_LEN])
                .map_err(cksum_err)?
                .1
        } else {
            checksums::cksum_file(path, algorithm, self.config.cksum_bufsize)
                .map_err(cksum_err)?
                .1
        };
        if let Some(meta) = fs.entry.info.file_meta_mut() {
            meta.cksum = Some(b64.clone());
        }
        Ok(b64)
    }

    fn compare_file(
        &mut self,
        fs: &mut FsObject,
        tran: usize,
        negative: bool,
    ) -> Result<(), DiffError> {
        let checks = self.config.checks;
        let applicable = self.config.edit_path == EditPath::Applicable;
        let tran_meta = self
            .stack
            .tran(tran)
            .current()
            .and_then(|e| e.info.file_meta())
            .cloned()
            .expect("file entry without metadata");
        let fs_meta = fs
            .entry
            .info
            .file_meta()
            .cloned()
            .expect("file object without metadata");

        if !negative {
            // A size change is gross enough to force a new download; skip
            // the digest entirely.
            if checks.size && fs_meta.size != tran_meta.size {
                return self.print(Some(&*fs), Some(tran), Flag::Download);
            }

            if self.config.session.cksum {
                let fs_b64 = self.fs_cksum(fs)?;
                if Some(fs_b64.as_str()) != tran_meta.cksum.as_deref() {
                    return self.print(Some(&*fs), Some(tran), Flag::Download);
                }
            } else if checks.mtime && fs_meta.mtime != tran_meta.mtime {
                if self.warn_countdown > 0 {
                    warn!(
                        "mtime change without checksums forces a download of {}",
                        fs.entry.display_name()
                    );
                    self.warn_countdown -= 1;
                    if self.warn_countdown == 0 {
                        warn!("no more warnings issued for this condition");
                    }
                }
                return self.print(Some(&*fs), Some(tran), Flag::Download);
            }

            if checks.mtime && fs_meta.mtime != tran_meta.mtime {
                return self.print(Some(&*fs), Some(tran), Flag::Status);
            }
        }

        if (checks.uid && fs_meta.uid != tran_meta.uid)
            || (checks.gid && fs_meta.gid != tran_meta.gid)
            || (checks.mode && fs_meta.mode != tran_meta.mode)
        {
            let flag = if negative && applicable {
                Flag::StatusNeg
            } else {
                Flag::Status
            };
            return self.print(Some(&*fs), Some(tran), flag);
        }
        Ok(())
    }

    fn metadata_differs(&self, fs: &PathEntry, tran: &PathEntry) -> bool {
        let checks = self.config.checks;
        (checks.uid && fs.info.uid() != tran.info.uid())
            || (checks.gid && fs.info.gid() != tran.info.gid())
            || (checks.mode && fs.info.mode() != tran.info.mode())
    }

    /// Compares the current filesystem object against the selected entry and
    /// emits whatever difference line the pair calls for.
    fn compare(
        &mut self,
        fs: Option<&mut FsObject>,
        sel: Option<usize>,
    ) -> Result<Move, DiffError> {
        let Some(tran) = sel else {
            // Stack exhausted: anything left on disk is filesystem-only.
            if let Some(fs) = fs {
                self.print(Some(&*fs), None, Flag::FsOnly)?;
            }
            return Ok(Move::Fs);
        };

        let Some(fs) = fs else {
            // Filesystem exhausted: everything left is transcript-only.
            self.print(None, Some(tran), Flag::TranOnly)?;
            return Ok(Move::Tran);
        };

        let tran_entry = self
            .stack
            .tran(tran)
            .current()
            .expect("selected member at EOF")
            .clone();
        let cmp = path_casecmp(
            &fs.entry.name,
            &tran_entry.name,
            self.config.session.case_sensitive,
        );

        if cmp == Ordering::Greater {
            self.print(Some(&*fs), Some(tran), Flag::TranOnly)?;
            return Ok(Move::Tran);
        }
        if cmp == Ordering::Less {
            self.print(Some(&*fs), Some(tran), Flag::FsOnly)?;
            return Ok(Move::Fs);
        }

        if fs.entry.type_char() != tran_entry.type_char() {
            self.print(Some(&*fs), Some(tran), Flag::Download)?;
            return Ok(Move::Both);
        }

        let negative = self.stack.tran(tran).kind == TranscriptKind::Negative;
        match (&fs.entry.info, &tran_entry.info) {
            (EntryInfo::File(_), EntryInfo::File(_))
            | (EntryInfo::Archive(_), EntryInfo::Archive(_)) => {
                self.compare_file(fs, tran, negative)?;
            }

            (
                EntryInfo::Dir { finfo: fs_finfo, .. },
                EntryInfo::Dir {
                    finfo: tran_finfo, ..
                },
            ) => {
                if !negative {
                    let finfo_differs = match (fs_finfo, tran_finfo) {
                        (Some(a), Some(b)) => a != b,
                        // One side cannot observe finder info; stay quiet.
                        _ => false,
                    };
                    if finfo_differs || self.metadata_differs(&fs.entry, &tran_entry) {
                        self.print(Some(&*fs), Some(tran), Flag::Status)?;
                    }
                }
            }

            (
                EntryInfo::Symlink {
                    target: fs_target, ..
                },
                EntryInfo::Symlink {
                    target: tran_target,
                    ..
                },
            ) => {
                if negative {
                    if fs_target != tran_target {
                        self.print(Some(&*fs), Some(tran), Flag::Status)?;
                    }
                } else {
                    let owner_differs = {
                        let checks = self.config.checks;
                        (checks.uid && fs.entry.info.uid() != tran_entry.info.uid())
                            || (checks.gid && fs.entry.info.gid() != tran_entry.info.gid())
                    };
                    // Mode only where the platform can actually set it on a
                    // symlink.
                    let mode_differs = cfg!(any(target_os = "macos", target_os = "freebsd"))
                        && self.config.checks.mode
                        && fs.entry.info.mode() != tran_entry.info.mode();
                    if fs_target != tran_target || owner_differs || mode_differs {
                        self.print(Some(&*fs), Some(tran), Flag::Status)?;
                    }
                }
            }

            (
                EntryInfo::Hardlink {
                    target: fs_target, ..
                },
                EntryInfo::Hardlink {
                    target: tran_target,
                },
            ) => {
                let group_changed = self.hardlinks.changed(fs.dev, fs.ino, &fs.entry.name)?;
                if fs_target != tran_target || group_changed {
                    self.print(Some(&*fs), Some(tran), Flag::Status)?;
                }
            }

            (EntryInfo::Fifo { .. }, EntryInfo::Fifo { .. })
            | (EntryInfo::Socket { .. }, EntryInfo::Socket { .. })
            | (EntryInfo::Door { .. }, EntryInfo::Door { .. }) => {
                if !negative && self.metadata_differs(&fs.entry, &tran_entry) {
                    self.print(Some(&*fs), Some(tran), Flag::Status)?;
                }
            }

            (
                EntryInfo::Block {
                    major: fs_major,
                    minor: fs_minor,
                    ..
                },
                EntryInfo::Block {
                    major: tran_major,
                    minor: tran_minor,
                    ..
                },
            )
            | (
                EntryInfo::Char {
                    major: fs_major,
                    minor: fs_minor,
                    ..
                },
                EntryInfo::Char {
                    major: tran_major,
                    minor: tran_minor,
                    ..
                },
            ) => {
                let dev_differs = (fs_major, fs_minor) != (tran_major, tran_minor);
                if negative {
                    // Device metadata churns on live systems (ptys change
                    // owner every login); only the device numbers matter.
                    if dev_differs {
                        self.print(Some(&*fs), Some(tran), Flag::Status)?;
                    }
                } else if dev_differs || self.metadata_differs(&fs.entry, &tran_entry) {
                    self.print(Some(&*fs), Some(tran), Flag::Status)?;
                }
            }

            _ => unreachable!("type characters matched but variants differ"),
        }

        Ok(Move::Both)
    }

    /// Runs one name through the selector until the streams align.
    ///
    /// With `fs == None` this drains the remaining transcript entries.
    /// Returns how the walker should proceed, and leaves `fs_minus` set when
    /// the name was emitted as a removal.
    fn check(
        &mut self,
        mut fs: Option<&mut FsObject>,
        parent_minus: bool,
    ) -> Result<Descend, DiffError> {
        self.fs_minus = false;
        let session = self.session();
        let mut enter = Descend::File;

        if let Some(obj) = fs.as_deref_mut() {
            let name = obj.entry.name.clone();

            // Exclusion wins before any stack work, unless a doomed parent
            // means the object must be removed anyway, or the special list
            // pins it.
            if self.stack.excludes.matches(&name)
                && !parent_minus
                && !self.stack.is_special(&name)
            {
                if session.exclude_warnings {
                    warn!("excluding {}", String::from_utf8_lossy(&name));
                }
                // Keep masked entries moving, but this peek is not a real
                // selection.
                if let Some(idx) = self.stack.select(&session)? {
                    self.stack.unselect(idx);
                }
                return Ok(Descend::File);
            }

            // Multiply-linked non-directories become `h` entries after the
            // group's first occurrence.
            if !obj.is_dir() && obj.nlink > 1 {
                if let Some(primary) = self.hardlinks.hardlink(obj.dev, obj.ino, &name) {
                    obj.entry.info = EntryInfo::Hardlink { target: primary };
                }
            }

            enter = if obj.is_dir() {
                Descend::Dir
            } else {
                Descend::File
            };
        }

        loop {
            let sel = self.stack.select(&session)?;
            match self.compare(fs.as_deref_mut(), sel)? {
                Move::Fs => return Ok(enter),
                Move::Both => {
                    let idx = sel.expect("matched without a selected member");
                    let negative_dir = self.stack.tran(idx).kind == TranscriptKind::Negative
                        && self
                            .stack
                            .tran(idx)
                            .current()
                            .is_some_and(|e| e.type_char() == 'd');
                    if negative_dir {
                        enter = Descend::NegDir;
                    }
                    self.stack.advance(idx, &session)?;
                    return Ok(enter);
                }
                Move::Tran => {
                    if let Some(idx) = sel {
                        self.stack.advance(idx, &session)?;
                    } else {
                        // Stack exhausted while draining.
                        return Ok(enter);
                    }
                }
            }
        }
    }

    /// Recursive walk: check this object, then descend as instructed.
    pub(crate) fn walk(
        &mut self,
        mut obj: FsObject,
        start: f64,
        finish: f64,
        parent_minus: bool,
    ) -> Result<(), DiffError> {
        let name = obj.entry.name.clone();
        let session = self.session();

        if finish > 0.0 && (start as i64) != self.last_percent {
            self.last_percent = start as i64;
            println!("%{:02} {}", start as i64, String::from_utf8_lossy(&name));
        }

        match self.check(Some(&mut obj), parent_minus)? {
            Descend::File => Ok(()),

            Descend::NegDir => {
                // Children of a negative directory are examined only where
                // the stack names them.
                loop {
                    let Some(idx) = self.stack.select(&session)? else {
                        return Ok(());
                    };
                    let child_name = self
                        .stack
                        .tran(idx)
                        .current()
                        .expect("selected member at EOF")
                        .name
                        .clone();
                    if !is_child(&child_name, &name, session.case_sensitive) {
                        return Ok(());
                    }
                    match walk::radstat(&child_name) {
                        Ok(child) => self.walk(child, start, finish, parent_minus)?,
                        Err(walk::WalkError::Io { ref source, .. })
                            if source.kind() == std::io::ErrorKind::NotFound
                                || source.kind() == std::io::ErrorKind::NotADirectory =>
                        {
                            // Listed beneath the negative directory but
                            // absent on disk: create it.
                            self.print(None, Some(idx), Flag::TranOnly)?;
                            self.stack.advance(idx, &session)?;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }

            Descend::Dir => {
                if self.config.single_line {
                    return Ok(());
                }
                // If this directory is being removed, everything below goes
                // too, excluded or not.
                let del_parent = self.fs_minus;

                let names = walk::read_dir_sorted(&name, session.case_sensitive)?;
                let chunk = (finish - start) / names.len().max(1) as f64;
                let mut f = start;
                for child in names {
                    let child_path = walk::join(&name, &child);
                    match walk::radstat(&child_path) {
                        Ok(child_obj) => {
                            self.walk(child_obj, f, f + chunk, del_parent)?;
                        }
                        Err(walk::WalkError::Io { ref source, .. })
                            if source.kind() == std::io::ErrorKind::NotFound =>
                        {
                            // Vanished between listing and stat.
                        }
                        Err(e) => return Err(e.into()),
                    }
                    f += chunk;
                }
                Ok(())
            }
        }
    }
}
