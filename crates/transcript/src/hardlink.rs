//! Hardlink tracking across one filesystem walk.
//!
//! The first path seen for a `(device, inode)` pair is the group's primary;
//! later paths become `h` entries pointing back at it. The per-inode changed
//! bit propagates a re-download of one sibling to the rest of the group.

use std::collections::BTreeMap;

use crate::error::TranscriptError;

struct InodeInfo {
    first: Vec<u8>,
    changed: bool,
}

/// Registry of multiply-referenced inodes, keyed `dev -> ino`.
#[derive(Default)]
pub struct HardlinkRegistry {
    devices: BTreeMap<u64, BTreeMap<u64, InodeInfo>>,
}

impl HardlinkRegistry {
    /// Creates an empty registry; one is used per walk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` for `(dev, ino)`.
    ///
    /// Returns the primary path when the inode was seen before, `None` when
    /// this call made `name` the primary.
    pub fn hardlink(&mut self, dev: u64, ino: u64, name: &[u8]) -> Option<Vec<u8>> {
        let inodes = self.devices.entry(dev).or_default();
        if let Some(info) = inodes.get(&ino) {
            return Some(info.first.clone());
        }
        inodes.insert(
            ino,
            InodeInfo {
                first: name.to_vec(),
                changed: false,
            },
        );
        None
    }

    fn info(&self, dev: u64, ino: u64, name: &[u8]) -> Result<&InodeInfo, TranscriptError> {
        self.devices
            .get(&dev)
            .and_then(|inodes| inodes.get(&ino))
            .ok_or_else(|| TranscriptError::UnknownInode(String::from_utf8_lossy(name).into_owned()))
    }

    /// Reads the changed bit; the inode must be registered.
    pub fn changed(&self, dev: u64, ino: u64, name: &[u8]) -> Result<bool, TranscriptError> {
        Ok(self.info(dev, ino, name)?.changed)
    }

    /// Sets the changed bit; the inode must be registered.
    pub fn set_changed(&mut self, dev: u64, ino: u64, name: &[u8]) -> Result<(), TranscriptError> {
        let missing = || TranscriptError::UnknownInode(String::from_utf8_lossy(name).into_owned());
        self.devices
            .get_mut(&dev)
            .and_then(|inodes| inodes.get_mut(&ino))
            .ok_or_else(missing)?
            .changed = true;
        Ok(())
    }
}
