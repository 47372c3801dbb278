//! Metadata application and payloadless creation.
//!
//! One routine per concern: ownership, permission bits, modification time,
//! and the per-type creation calls (mkdir, symlink, hardlink, mkfifo,
//! mknod). Ownership changes precede permission changes since chown clears
//! the set-id bits.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use filetime::FileTime;
use rustix::fs::{AtFlags, FileType, Mode};
use tracing::warn;
use transcript::{EntryInfo, FileMeta, PathEntry};
use walk::FsObject;

use crate::error::ApplyError;

pub(crate) fn os_path(bytes: &[u8]) -> &Path {
    Path::new(OsStr::from_bytes(bytes))
}

fn chown(path: &[u8], uid: u32, gid: u32) -> Result<(), ApplyError> {
    std::os::unix::fs::chown(os_path(path), Some(uid), Some(gid))
        .map_err(ApplyError::path_err(path))
}

fn lchown(path: &[u8], uid: u32, gid: u32) -> Result<(), ApplyError> {
    std::os::unix::fs::lchown(os_path(path), Some(uid), Some(gid))
        .map_err(ApplyError::path_err(path))
}

fn chmod(path: &[u8], mode: u32) -> Result<(), ApplyError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(os_path(path), std::fs::Permissions::from_mode(mode))
        .map_err(ApplyError::path_err(path))
}

fn set_mtime(path: &[u8], mtime: i64) -> Result<(), ApplyError> {
    filetime::set_file_mtime(os_path(path), FileTime::from_unix_time(mtime, 0))
        .map_err(ApplyError::path_err(path))
}

/// Applies uid/gid/mode to an object, touching only what differs.
///
/// With `current == None` (fresh objects, temporaries) everything is set
/// unconditionally.
pub(crate) fn apply_ownership(
    path: &[u8],
    uid: u32,
    gid: u32,
    mode: u32,
    current: Option<&PathEntry>,
) -> Result<(), ApplyError> {
    let (cur_uid, cur_gid, cur_mode) = match current {
        Some(entry) => (entry.info.uid(), entry.info.gid(), entry.info.mode()),
        None => (None, None, None),
    };
    if cur_uid != Some(uid) || cur_gid != Some(gid) {
        chown(path, uid, gid)?;
    }
    if cur_mode != Some(mode) {
        chmod(path, mode)?;
    }
    Ok(())
}

/// Dresses a freshly downloaded temporary with its final metadata.
pub(crate) fn finish_download(path: &[u8], meta: &FileMeta) -> Result<(), ApplyError> {
    apply_ownership(path, meta.uid, meta.gid, meta.mode, None)?;
    set_mtime(path, meta.mtime)
}

/// What a metadata line did to the filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Applied {
    /// Object existed; metadata brought into line.
    Updated,
    /// Object was created.
    Created,
    /// Nothing could be done (sockets and doors have no creation call).
    Skipped,
}

fn create_prefix_for(path: &[u8]) -> Result<(), ApplyError> {
    if let Some(parent) = os_path(path).parent() {
        std::fs::create_dir_all(parent).map_err(ApplyError::path_err(path))?;
    }
    Ok(())
}

/// Applies one marker-less line: metadata update on an existing object, or
/// creation for the payloadless types.
///
/// `present` is the object currently at the path, already re-classified
/// after any type-change removal. `create_prefix` retries a failed creation
/// once after making the missing intermediate directories.
pub(crate) fn update(
    entry: &PathEntry,
    present: Option<&FsObject>,
    create_prefix: bool,
) -> Result<Applied, ApplyError> {
    let path = &entry.name;
    let current = present.map(|p| &p.entry);

    match &entry.info {
        EntryInfo::File(meta) | EntryInfo::Archive(meta) => {
            // Content is handled by `+` lines; only metadata drifts here.
            apply_ownership(path, meta.uid, meta.gid, meta.mode, current)?;
            let cur_mtime = current
                .and_then(|e| e.info.file_meta())
                .map(|m| m.mtime);
            if cur_mtime != Some(meta.mtime) {
                set_mtime(path, meta.mtime)?;
            }
            Ok(Applied::Updated)
        }

        EntryInfo::Dir { mode, uid, gid, .. } => {
            if present.is_none() {
                let dir = os_path(path);
                let made = std::fs::create_dir(dir);
                match made {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound && create_prefix => {
                        create_prefix_for(path)?;
                        std::fs::create_dir(dir).map_err(ApplyError::path_err(path))?;
                    }
                    other => other.map_err(ApplyError::path_err(path))?,
                }
                apply_ownership(path, *uid, *gid, *mode, None)?;
                return Ok(Applied::Created);
            }
            apply_ownership(path, *uid, *gid, *mode, current)?;
            Ok(Applied::Updated)
        }

        EntryInfo::Symlink {
            uid, gid, target, ..
        } => {
            // Links cannot be edited in place.
            if present.is_some() {
                std::fs::remove_file(os_path(path)).map_err(ApplyError::path_err(path))?;
            }
            let link = std::os::unix::fs::symlink(os_path(target), os_path(path));
            match link {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && create_prefix => {
                    create_prefix_for(path)?;
                    std::os::unix::fs::symlink(os_path(target), os_path(path))
                        .map_err(ApplyError::path_err(path))?;
                }
                other => other.map_err(ApplyError::path_err(path))?,
            }
            lchown(path, *uid, *gid)?;
            if cfg!(any(target_os = "macos", target_os = "freebsd")) {
                if let EntryInfo::Symlink { mode, .. } = &entry.info {
                    // lchmod exists here; elsewhere symlink modes are fixed.
                    let _ = rustix::fs::chmodat(
                        rustix::fs::CWD,
                        os_path(path),
                        Mode::from_raw_mode(*mode),
                        AtFlags::SYMLINK_NOFOLLOW,
                    );
                }
            }
            Ok(if present.is_some() {
                Applied::Updated
            } else {
                Applied::Created
            })
        }

        EntryInfo::Hardlink { target } => {
            if present.is_some() {
                std::fs::remove_file(os_path(path)).map_err(ApplyError::path_err(path))?;
            }
            std::fs::hard_link(os_path(target), os_path(path))
                .map_err(ApplyError::path_err(path))?;
            Ok(if present.is_some() {
                Applied::Updated
            } else {
                Applied::Created
            })
        }

        EntryInfo::Fifo { mode, uid, gid } => {
            if present.is_none() {
                rustix::fs::mknodat(
                    rustix::fs::CWD,
                    os_path(path),
                    FileType::Fifo,
                    Mode::from_raw_mode(*mode),
                    0,
                )
                .map_err(|e| ApplyError::path_err(path)(e.into()))?;
                apply_ownership(path, *uid, *gid, *mode, None)?;
                return Ok(Applied::Created);
            }
            apply_ownership(path, *uid, *gid, *mode, current)?;
            Ok(Applied::Updated)
        }

        EntryInfo::Socket { mode, uid, gid } | EntryInfo::Door { mode, uid, gid } => {
            if present.is_none() {
                // Sockets and doors exist only while their creator runs.
                warn!("{}: cannot create", entry.display_name());
                return Ok(Applied::Skipped);
            }
            apply_ownership(path, *uid, *gid, *mode, current)?;
            Ok(Applied::Updated)
        }

        EntryInfo::Block {
            mode,
            uid,
            gid,
            major,
            minor,
        }
        | EntryInfo::Char {
            mode,
            uid,
            gid,
            major,
            minor,
        } => {
            let file_type = if matches!(entry.info, EntryInfo::Block { .. }) {
                FileType::BlockDevice
            } else {
                FileType::CharacterDevice
            };
            let wanted = (*major, *minor);
            let existing_dev = current.and_then(|e| match e.info {
                EntryInfo::Block { major, minor, .. } | EntryInfo::Char { major, minor, .. } => {
                    Some((major, minor))
                }
                _ => None,
            });

            let mut was_present = present.is_some();
            if was_present && existing_dev != Some(wanted) {
                std::fs::remove_file(os_path(path)).map_err(ApplyError::path_err(path))?;
                was_present = false;
            }
            if !was_present {
                rustix::fs::mknodat(
                    rustix::fs::CWD,
                    os_path(path),
                    file_type,
                    Mode::from_raw_mode(*mode),
                    rustix::fs::makedev(*major, *minor),
                )
                .map_err(|e| ApplyError::path_err(path)(e.into()))?;
                apply_ownership(path, *uid, *gid, *mode, None)?;
                return Ok(Applied::Created);
            }
            apply_ownership(path, *uid, *gid, *mode, current)?;
            Ok(Applied::Updated)
        }
    }
}

/// Clears user and system immutable/append flags where the platform has
/// them; a no-op elsewhere.
#[cfg(target_os = "macos")]
pub(crate) fn clear_flags(path: &[u8]) -> Result<(), ApplyError> {
    use std::ffi::CString;
    use std::os::macos::fs::MetadataExt;

    const CHFLAGS: u32 =
        libc::UF_IMMUTABLE | libc::UF_APPEND | libc::SF_IMMUTABLE | libc::SF_APPEND;

    let st = std::fs::symlink_metadata(os_path(path)).map_err(ApplyError::path_err(path))?;
    let flags = st.st_flags();
    if flags & CHFLAGS == 0 {
        return Ok(());
    }
    let cpath = CString::new(path.to_vec()).map_err(|_| {
        ApplyError::path_err(path)(std::io::Error::from(std::io::ErrorKind::InvalidInput))
    })?;
    let rc = unsafe { libc::chflags(cpath.as_ptr(), flags & !CHFLAGS) };
    if rc != 0 {
        return Err(ApplyError::path_err(path)(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(target_os = "macos"))]
pub(crate) fn clear_flags(_path: &[u8]) -> Result<(), ApplyError> {
    Ok(())
}
