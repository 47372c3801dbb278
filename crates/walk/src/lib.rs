#![deny(unsafe_code)]

//! Filesystem-side input for the difference engine.
//!
//! [`radstat`] classifies one on-disk object into the same entry model
//! transcripts use, carrying the extra identity fields (device, inode, link
//! count) the hardlink registry needs. [`read_dir_sorted`] lists a directory
//! in the session's path order so the walker and the transcript selector can
//! advance in lock step.

use std::ffi::OsStr;
use std::fs::Metadata;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use thiserror::Error;
use transcript::{EntryInfo, FileMeta, PathEntry};

/// Walk failures.
#[derive(Debug, Error)]
pub enum WalkError {
    /// A stat, readlink, or directory read failed.
    #[error("{path}: {source}")]
    Io {
        /// The path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The object is of a type transcripts cannot describe.
    #[error("{0} is of an unknown type")]
    UnknownType(String),
}

fn io_err(path: &[u8], source: std::io::Error) -> WalkError {
    WalkError::Io {
        path: String::from_utf8_lossy(path).into_owned(),
        source,
    }
}

/// One live filesystem object, described in transcript terms.
#[derive(Clone, Debug)]
pub struct FsObject {
    /// The object's description; `entry.name` is the path as given.
    pub entry: PathEntry,
    /// Device the object lives on.
    pub dev: u64,
    /// Inode number.
    pub ino: u64,
    /// Hardlink count.
    pub nlink: u64,
}

impl FsObject {
    /// Whether this object is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.entry.info, EntryInfo::Dir { .. })
    }
}

fn file_meta(md: &Metadata) -> FileMeta {
    FileMeta {
        mode: (md.mode() & 0o7777) as u32,
        uid: md.uid(),
        gid: md.gid(),
        mtime: md.mtime(),
        size: md.len(),
        cksum: None,
    }
}

#[cfg(target_os = "macos")]
fn classify_file(path: &[u8], md: &Metadata) -> EntryInfo {
    // A non-empty resource fork marks the packed multi-fork form.
    let mut rsrc = std::ffi::OsString::from_vec(path.to_vec());
    rsrc.push("/..namedfork/rsrc");
    match std::fs::metadata(&rsrc) {
        Ok(fork) if fork.len() > 0 => EntryInfo::Archive(file_meta(md)),
        _ => EntryInfo::File(file_meta(md)),
    }
}

#[cfg(not(target_os = "macos"))]
fn classify_file(_path: &[u8], md: &Metadata) -> EntryInfo {
    EntryInfo::File(file_meta(md))
}

/// Stats one object without following symlinks and classifies it.
///
/// `name` is used verbatim as both the filesystem path and the entry name,
/// so callers hand in paths already in the session's form.
pub fn radstat(name: &[u8]) -> Result<FsObject, WalkError> {
    let os_path = Path::new(OsStr::from_bytes(name));
    let md = std::fs::symlink_metadata(os_path).map_err(|e| io_err(name, e))?;
    let ft = md.file_type();

    let mode = (md.mode() & 0o7777) as u32;
    let (uid, gid) = (md.uid(), md.gid());

    let info = if ft.is_symlink() {
        let target = std::fs::read_link(os_path).map_err(|e| io_err(name, e))?;
        EntryInfo::Symlink {
            mode,
            uid,
            gid,
            target: target.into_os_string().into_vec(),
        }
    } else if ft.is_dir() {
        EntryInfo::Dir {
            mode,
            uid,
            gid,
            finfo: None,
        }
    } else if ft.is_file() {
        classify_file(name, &md)
    } else if ft.is_fifo() {
        EntryInfo::Fifo { mode, uid, gid }
    } else if ft.is_socket() {
        EntryInfo::Socket { mode, uid, gid }
    } else if ft.is_block_device() || ft.is_char_device() {
        let rdev = md.rdev() as rustix::fs::Dev;
        let major = rustix::fs::major(rdev);
        let minor = rustix::fs::minor(rdev);
        if ft.is_block_device() {
            EntryInfo::Block {
                mode,
                uid,
                gid,
                major,
                minor,
            }
        } else {
            EntryInfo::Char {
                mode,
                uid,
                gid,
                major,
                minor,
            }
        }
    } else {
        return Err(WalkError::UnknownType(
            String::from_utf8_lossy(name).into_owned(),
        ));
    };

    Ok(FsObject {
        entry: PathEntry {
            minus: false,
            name: name.to_vec(),
            info,
        },
        dev: md.dev(),
        ino: md.ino(),
        nlink: md.nlink(),
    })
}

/// Lists a directory's entry names in the session's path order.
///
/// `.` and `..` are omitted. Sorting uses the same comparison the selector
/// uses, so walking a tree yields a strictly ascending path stream.
pub fn read_dir_sorted(dir: &[u8], case_sensitive: bool) -> Result<Vec<Vec<u8>>, WalkError> {
    let os_dir = Path::new(OsStr::from_bytes(dir));
    let mut names: Vec<Vec<u8>> = Vec::new();
    for dent in std::fs::read_dir(os_dir).map_err(|e| io_err(dir, e))? {
        let dent = dent.map_err(|e| io_err(dir, e))?;
        names.push(dent.file_name().into_vec());
    }
    names.sort_by(|a, b| paths::path_casecmp(a, b, case_sensitive));
    Ok(names)
}

/// Joins a directory path and a child name in byte form.
pub fn join(dir: &[u8], name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(dir.len() + name.len() + 1);
    out.extend_from_slice(dir);
    if dir.last() != Some(&b'/') {
        out.push(b'/');
    }
    out.extend_from_slice(name);
    out
}
