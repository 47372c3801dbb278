//! Unpacking a downloaded archived-fork file into a native multi-fork
//! object. Only meaningful where the filesystem exposes resource forks.

use std::ffi::OsString;
use std::io::Read;
use std::os::unix::ffi::OsStringExt;

use checksums::{AS_ENTRY_LEN, AS_HEADER, AS_HEADER_LEN, FINFO_LEN};
use transcript::FileMeta;

use crate::error::ApplyError;
use crate::update::{finish_download, os_path};

fn read_exact_at(buf: &[u8], offset: usize, len: usize, path: &[u8]) -> Result<&[u8], ApplyError> {
    buf.get(offset..offset + len).ok_or_else(|| {
        ApplyError::path_err(path)(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "truncated archived-fork file",
        ))
    })
}

fn entry_fields(record: &[u8]) -> (u32, u32, u32) {
    let field = |i: usize| {
        u32::from_be_bytes([record[i], record[i + 1], record[i + 2], record[i + 3]])
    };
    (field(0), field(4), field(8))
}

/// Splits the packed form at `temp` into data fork, resource fork, and
/// finder info, installing them at `target`.
pub(crate) fn install(target: &[u8], temp: &[u8], meta: &FileMeta) -> Result<(), ApplyError> {
    let mut packed = Vec::new();
    std::fs::File::open(os_path(temp))
        .and_then(|mut f| f.read_to_end(&mut packed))
        .map_err(ApplyError::path_err(temp))?;

    let header = read_exact_at(&packed, 0, AS_HEADER_LEN, temp)?;
    if header != AS_HEADER {
        let _ = std::fs::remove_file(os_path(temp));
        return Err(ApplyError::path_err(target)(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad archived-fork header",
        )));
    }

    let mut finfo = [0u8; FINFO_LEN];
    let mut rsrc: &[u8] = &[];
    let mut data: &[u8] = &[];
    for i in 0..3 {
        let record = read_exact_at(&packed, AS_HEADER_LEN + i * AS_ENTRY_LEN, AS_ENTRY_LEN, temp)?;
        let (id, offset, length) = entry_fields(record);
        let body = read_exact_at(&packed, offset as usize, length as usize, temp)?;
        match id {
            9 => finfo.copy_from_slice(read_exact_at(&packed, offset as usize, FINFO_LEN, temp)?),
            2 => rsrc = body,
            1 => data = body,
            _ => {}
        }
    }

    // Write the data fork beside the target, dress it, then swap it in; the
    // resource fork can only be attached to the final path.
    let mut data_temp = temp.to_vec();
    data_temp.extend_from_slice(b".data");
    std::fs::write(os_path(&data_temp), data).map_err(ApplyError::path_err(&data_temp))?;
    finish_download(&data_temp, meta)?;
    std::fs::rename(os_path(&data_temp), os_path(target))
        .map_err(ApplyError::path_err(target))?;

    if !rsrc.is_empty() {
        let mut rsrc_path = OsString::from_vec(target.to_vec());
        rsrc_path.push("/..namedfork/rsrc");
        std::fs::write(&rsrc_path, rsrc).map_err(ApplyError::path_err(target))?;
    }
    // TODO: write finder info back via com.apple.FinderInfo once an xattr
    // helper lands.
    let _ = finfo;

    std::fs::remove_file(os_path(temp)).map_err(ApplyError::path_err(temp))?;
    Ok(())
}
