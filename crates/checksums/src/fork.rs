//! Canonical digests for archived-fork objects.
//!
//! An archived-fork file packs a multi-fork object into one regular file:
//! fixed header, three big-endian entry records, then finder info, resource
//! fork, and data fork back to back. The digest of an archived-fork object is
//! the digest of exactly that byte sequence, whether or not the packed form
//! exists on disk yet.

use std::io::Read;

use crate::stream::{CksumError, MIN_BUFFER_SIZE};
use crate::Algorithm;

/// Length of the fixed archive header.
pub const AS_HEADER_LEN: usize = 26;

/// Length of one entry record (id, offset, length - all big-endian u32).
pub const AS_ENTRY_LEN: usize = 12;

/// Length of the finder-info blob.
pub const FINFO_LEN: usize = 32;

/// The fixed archive header: magic, version 2, 16 filler bytes, entry count 3.
pub const AS_HEADER: [u8; AS_HEADER_LEN] = [
    0x00, 0x05, 0x16, 0x00, // magic
    0x00, 0x02, 0x00, 0x00, // version
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // filler
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // filler
    0x00, 0x03, // entry count
];

const ID_DATA: u32 = 1;
const ID_RSRC: u32 = 2;
const ID_FINFO: u32 = 9;

fn stream_into<R: Read>(
    hasher: &mut crate::Hasher,
    mut reader: R,
    buf: &mut [u8],
) -> std::io::Result<u64> {
    let mut seen: u64 = 0;
    loop {
        let got = reader.read(buf)?;
        if got == 0 {
            return Ok(seen);
        }
        seen += got as u64;
        hasher.update(&buf[..got]);
    }
}

fn entry(id: u32, offset: u32, length: u32) -> [u8; AS_ENTRY_LEN] {
    let mut out = [0u8; AS_ENTRY_LEN];
    out[0..4].copy_from_slice(&id.to_be_bytes());
    out[4..8].copy_from_slice(&offset.to_be_bytes());
    out[8..12].copy_from_slice(&length.to_be_bytes());
    out
}

/// Streaming digest over the canonical archived-fork serialization.
pub struct ForkDigest {
    algorithm: Algorithm,
    bufsize: usize,
}

impl ForkDigest {
    /// Creates a digest context; the buffer size must be at least
    /// [`MIN_BUFFER_SIZE`].
    pub fn new(algorithm: Algorithm, bufsize: usize) -> Result<Self, CksumError> {
        if bufsize < MIN_BUFFER_SIZE {
            return Err(CksumError::BufferTooSmall(bufsize));
        }
        Ok(Self { algorithm, bufsize })
    }

    /// Digests header, entries, finder info, resource fork, then data fork.
    ///
    /// Fork lengths are needed up front: the entry records precede the fork
    /// contents in the serialization. Returns the total serialized byte count
    /// and the base64 digest.
    pub fn digest_parts<R1: Read, R2: Read>(
        &self,
        finfo: &[u8; FINFO_LEN],
        rsrc: R1,
        rsrc_len: u64,
        data: R2,
        data_len: u64,
    ) -> Result<(u64, String), CksumError> {
        let mut hasher = self.algorithm.hasher();
        let mut size: u64 = 0;

        hasher.update(&AS_HEADER);
        size += AS_HEADER_LEN as u64;

        let finfo_off = (AS_HEADER_LEN + 3 * AS_ENTRY_LEN) as u32;
        let rsrc_off = finfo_off + FINFO_LEN as u32;
        let data_off = rsrc_off + rsrc_len as u32;
        hasher.update(&entry(ID_FINFO, finfo_off, FINFO_LEN as u32));
        hasher.update(&entry(ID_RSRC, rsrc_off, rsrc_len as u32));
        hasher.update(&entry(ID_DATA, data_off, data_len as u32));
        size += (3 * AS_ENTRY_LEN) as u64;

        hasher.update(finfo);
        size += FINFO_LEN as u64;

        let mut buf = vec![0u8; self.bufsize];
        size += stream_into(&mut hasher, rsrc, &mut buf)?;
        size += stream_into(&mut hasher, data, &mut buf)?;

        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        Ok((size, STANDARD.encode(hasher.finalize())))
    }

    /// Digests an on-disk multi-fork object by path.
    ///
    /// Only meaningful where the filesystem exposes resource forks as
    /// `<path>/..namedfork/rsrc`; elsewhere this is [`CksumError::Unsupported`].
    #[cfg(target_os = "macos")]
    pub fn digest_path(
        &self,
        path: &std::path::Path,
        finfo: &[u8; FINFO_LEN],
    ) -> Result<(u64, String), CksumError> {
        use std::fs::File;

        let mut rsrc_path = path.to_path_buf().into_os_string();
        rsrc_path.push("/..namedfork/rsrc");
        let rsrc_path = std::path::PathBuf::from(rsrc_path);
        let (rsrc, rsrc_len) = match File::open(&rsrc_path) {
            Ok(f) => {
                let len = f.metadata()?.len();
                (Some(f), len)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (None, 0),
            Err(e) => return Err(e.into()),
        };
        let data = File::open(path)?;
        let data_len = data.metadata()?.len();
        match rsrc {
            Some(f) => self.digest_parts(finfo, f, rsrc_len, data, data_len),
            None => self.digest_parts(finfo, std::io::empty(), 0, data, data_len),
        }
    }

    /// Stub for platforms without resource forks.
    #[cfg(not(target_os = "macos"))]
    pub fn digest_path(
        &self,
        _path: &std::path::Path,
        _finfo: &[u8; FINFO_LEN],
    ) -> Result<(u64, String), CksumError> {
        Err(CksumError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_26_bytes_with_count_3() {
        assert_eq!(AS_HEADER.len(), AS_HEADER_LEN);
        assert_eq!(&AS_HEADER[0..4], &[0x00, 0x05, 0x16, 0x00]);
        assert_eq!(&AS_HEADER[24..26], &[0x00, 0x03]);
    }

    #[test]
    fn serialized_size_accounts_for_all_sections() {
        let fd = ForkDigest::new(Algorithm::Md5, MIN_BUFFER_SIZE).unwrap();
        let finfo = [0u8; FINFO_LEN];
        let rsrc = vec![1u8; 10];
        let data = vec![2u8; 7];
        let (size, _) = fd
            .digest_parts(&finfo, &rsrc[..], 10, &data[..], 7)
            .unwrap();
        assert_eq!(
            size,
            (AS_HEADER_LEN + 3 * AS_ENTRY_LEN + FINFO_LEN) as u64 + 10 + 7
        );
    }

    #[test]
    fn digest_changes_with_fork_contents() {
        let fd = ForkDigest::new(Algorithm::Sha1, MIN_BUFFER_SIZE).unwrap();
        let finfo = [0u8; FINFO_LEN];
        let (_, a) = fd
            .digest_parts(&finfo, &b"r1"[..], 2, &b"d"[..], 1)
            .unwrap();
        let (_, b) = fd
            .digest_parts(&finfo, &b"r2"[..], 2, &b"d"[..], 1)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_matches_hand_built_serialization() {
        let fd = ForkDigest::new(Algorithm::Md5, MIN_BUFFER_SIZE).unwrap();
        let finfo = [9u8; FINFO_LEN];
        let rsrc = b"rsrc-bytes";
        let data = b"data-bytes";
        let (_, streamed) = fd
            .digest_parts(
                &finfo,
                &rsrc[..],
                rsrc.len() as u64,
                &data[..],
                data.len() as u64,
            )
            .unwrap();

        let mut flat = Vec::new();
        flat.extend_from_slice(&AS_HEADER);
        let finfo_off = (AS_HEADER_LEN + 3 * AS_ENTRY_LEN) as u32;
        let rsrc_off = finfo_off + FINFO_LEN as u32;
        let data_off = rsrc_off + rsrc.len() as u32;
        flat.extend_from_slice(&entry(ID_FINFO, finfo_off, FINFO_LEN as u32));
        flat.extend_from_slice(&entry(ID_RSRC, rsrc_off, rsrc.len() as u32));
        flat.extend_from_slice(&entry(ID_DATA, data_off, data.len() as u32));
        flat.extend_from_slice(&finfo);
        flat.extend_from_slice(rsrc);
        flat.extend_from_slice(data);

        let (_, whole) =
            crate::cksum_reader(&flat[..], Algorithm::Md5, MIN_BUFFER_SIZE).unwrap();
        assert_eq!(streamed, whole);
    }
}
