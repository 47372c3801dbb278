//! The path entry model: one filesystem object per transcript line.

/// Length of the finder-info blob carried by directory entries.
pub const FINFO_LEN: usize = 32;

/// Mode bits recorded in transcripts (permissions plus setuid/setgid/sticky).
pub const MODE_MASK: u32 = 0o7777;

/// Ownership and content metadata shared by regular and archived-fork files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMeta {
    /// Permission bits, masked to [`MODE_MASK`].
    pub mode: u32,
    /// Numeric owner.
    pub uid: u32,
    /// Numeric group.
    pub gid: u32,
    /// Modification time, seconds since the epoch.
    pub mtime: i64,
    /// Content length in bytes.
    pub size: u64,
    /// Base64 digest, or `None` when the line recorded `-`.
    pub cksum: Option<String>,
}

/// Type-specific payload of a path entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryInfo {
    /// `f` - regular file.
    File(FileMeta),
    /// `a` - archived-fork file (packed data+resource+meta form).
    Archive(FileMeta),
    /// `d` - directory, with optional finder info.
    Dir {
        /// Permission bits.
        mode: u32,
        /// Numeric owner.
        uid: u32,
        /// Numeric group.
        gid: u32,
        /// Finder-info blob when recorded and nonzero.
        finfo: Option<[u8; FINFO_LEN]>,
    },
    /// `l` - symbolic link.
    Symlink {
        /// Permission bits (0777 when the line omitted ownership).
        mode: u32,
        /// Numeric owner.
        uid: u32,
        /// Numeric group.
        gid: u32,
        /// Link target, raw bytes.
        target: Vec<u8>,
    },
    /// `h` - hardlink to an earlier entry.
    Hardlink {
        /// Path of the first-seen sibling.
        target: Vec<u8>,
    },
    /// `p` - FIFO.
    Fifo {
        /// Permission bits.
        mode: u32,
        /// Numeric owner.
        uid: u32,
        /// Numeric group.
        gid: u32,
    },
    /// `s` - socket.
    Socket {
        /// Permission bits.
        mode: u32,
        /// Numeric owner.
        uid: u32,
        /// Numeric group.
        gid: u32,
    },
    /// `D` - door.
    Door {
        /// Permission bits.
        mode: u32,
        /// Numeric owner.
        uid: u32,
        /// Numeric group.
        gid: u32,
    },
    /// `b` - block device.
    Block {
        /// Permission bits.
        mode: u32,
        /// Numeric owner.
        uid: u32,
        /// Numeric group.
        gid: u32,
        /// Major device number.
        major: u32,
        /// Minor device number.
        minor: u32,
    },
    /// `c` - character device.
    Char {
        /// Permission bits.
        mode: u32,
        /// Numeric owner.
        uid: u32,
        /// Numeric group.
        gid: u32,
        /// Major device number.
        major: u32,
        /// Minor device number.
        minor: u32,
    },
}

impl EntryInfo {
    /// The single-character type tag used on transcript lines.
    pub fn type_char(&self) -> char {
        match self {
            Self::File(_) => 'f',
            Self::Archive(_) => 'a',
            Self::Dir { .. } => 'd',
            Self::Symlink { .. } => 'l',
            Self::Hardlink { .. } => 'h',
            Self::Fifo { .. } => 'p',
            Self::Socket { .. } => 's',
            Self::Door { .. } => 'D',
            Self::Block { .. } => 'b',
            Self::Char { .. } => 'c',
        }
    }

    /// Permission bits, for every type that records them.
    pub fn mode(&self) -> Option<u32> {
        match self {
            Self::File(m) | Self::Archive(m) => Some(m.mode),
            Self::Dir { mode, .. }
            | Self::Symlink { mode, .. }
            | Self::Fifo { mode, .. }
            | Self::Socket { mode, .. }
            | Self::Door { mode, .. }
            | Self::Block { mode, .. }
            | Self::Char { mode, .. } => Some(*mode),
            Self::Hardlink { .. } => None,
        }
    }

    /// Numeric owner, for every type that records one.
    pub fn uid(&self) -> Option<u32> {
        match self {
            Self::File(m) | Self::Archive(m) => Some(m.uid),
            Self::Dir { uid, .. }
            | Self::Symlink { uid, .. }
            | Self::Fifo { uid, .. }
            | Self::Socket { uid, .. }
            | Self::Door { uid, .. }
            | Self::Block { uid, .. }
            | Self::Char { uid, .. } => Some(*uid),
            Self::Hardlink { .. } => None,
        }
    }

    /// Numeric group, for every type that records one.
    pub fn gid(&self) -> Option<u32> {
        match self {
            Self::File(m) | Self::Archive(m) => Some(m.gid),
            Self::Dir { gid, .. }
            | Self::Symlink { gid, .. }
            | Self::Fifo { gid, .. }
            | Self::Socket { gid, .. }
            | Self::Door { gid, .. }
            | Self::Block { gid, .. }
            | Self::Char { gid, .. } => Some(*gid),
            Self::Hardlink { .. } => None,
        }
    }

    /// Content metadata for `f`/`a` entries.
    pub fn file_meta(&self) -> Option<&FileMeta> {
        match self {
            Self::File(m) | Self::Archive(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable content metadata for `f`/`a` entries.
    pub fn file_meta_mut(&mut self) -> Option<&mut FileMeta> {
        match self {
            Self::File(m) | Self::Archive(m) => Some(m),
            _ => None,
        }
    }

    /// Link target for `l` and `h` entries.
    pub fn link_target(&self) -> Option<&[u8]> {
        match self {
            Self::Symlink { target, .. } | Self::Hardlink { target } => Some(target),
            _ => None,
        }
    }
}

/// One transcript line: a named filesystem object and its description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathEntry {
    /// Leading `-` override flag; the selector drops these entries.
    pub minus: bool,
    /// Decoded path, already converted to the session's path form.
    pub name: Vec<u8>,
    /// Type-specific description.
    pub info: EntryInfo,
}

impl PathEntry {
    /// The entry's type tag.
    pub fn type_char(&self) -> char {
        self.info.type_char()
    }

    /// The decoded path as a lossy string, for messages.
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// The leading marker of an applicable-transcript line.
///
/// In a stored transcript `-` marks an override and `+` is cosmetic; in the
/// difference stream consumed by the applier, `+` means download-and-install
/// and `-` means remove.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    /// No prefix: metadata update or payloadless creation.
    None,
    /// `+` prefix: download and install.
    Create,
    /// `-` prefix: remove.
    Remove,
}
