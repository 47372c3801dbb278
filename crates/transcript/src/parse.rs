//! Transcript line grammar.
//!
//! ```text
//! [-|+] <T> <encoded-path> <fields...>
//! ```
//!
//! Fields by type: `d` mode uid gid [finfo-b64]; `p|D|s` mode uid gid;
//! `b|c` mode uid gid major minor; `l` [mode uid gid] target; `h` target;
//! `f|a` mode uid gid mtime size cksum-or-`-`. Mode is octal, everything
//! else decimal.

use paths::PathForm;

use crate::cursor::TranscriptKind;
use crate::entry::{EntryInfo, FileMeta, Marker, PathEntry, FINFO_LEN, MODE_MASK};
use crate::error::ParseProblem;

/// Session facts the parser needs.
#[derive(Clone, Copy, Debug)]
pub struct ParseContext {
    /// Path form parsed names are converted to; `None` keeps them verbatim
    /// (the applier trusts its input's form).
    pub form: Option<PathForm>,
    /// Whether checksums are enabled for this run.
    pub cksum: bool,
}

fn apply_form(form: Option<PathForm>, raw: Vec<u8>) -> Vec<u8> {
    match form {
        Some(form) => form.convert(&raw),
        None => raw,
    }
}

fn octal(tok: &str, what: &'static str) -> Result<u32, ParseProblem> {
    u32::from_str_radix(tok, 8)
        .map(|mode| mode & MODE_MASK)
        .map_err(|_| ParseProblem::BadNumber(what))
}

fn decimal<T: std::str::FromStr>(tok: &str, what: &'static str) -> Result<T, ParseProblem> {
    tok.parse().map_err(|_| ParseProblem::BadNumber(what))
}

fn decode_path(tok: &str) -> Result<Vec<u8>, ParseProblem> {
    paths::decode(tok).map_err(|_| ParseProblem::BadPath)
}

/// Parses one transcript line.
///
/// Returns `None` for blank lines and `#` comments. The name and any
/// hardlink target are decoded and converted to the session path form;
/// symlink targets are decoded only.
pub fn parse_line(
    line: &str,
    kind: TranscriptKind,
    ctx: &ParseContext,
) -> Result<Option<(Marker, PathEntry)>, ParseProblem> {
    let mut av: Vec<&str> = paths::split_fields(line);
    if av.is_empty() || av[0].starts_with('#') {
        return Ok(None);
    }

    if av[0].len() != 1 {
        return Err(ParseProblem::TypeTooLong(av[0].to_owned()));
    }

    let mut marker = Marker::None;
    if av[0] == "-" {
        marker = Marker::Remove;
        av.remove(0);
    }
    if av.first() == Some(&"+") {
        marker = Marker::Create;
        av.remove(0);
    }

    if av.len() < 3 {
        return Err(ParseProblem::FieldCount {
            expected: "at least 3",
            got: av.len(),
        });
    }
    if av[0].len() != 1 {
        return Err(ParseProblem::TypeTooLong(av[0].to_owned()));
    }
    let type_char = av[0].chars().next().unwrap_or('?');

    let name = apply_form(ctx.form, decode_path(av[1])?);
    let ac = av.len();

    let info = match type_char {
        'd' => {
            if ac != 5 && ac != 6 {
                return Err(ParseProblem::FieldCount {
                    expected: "5 or 6",
                    got: ac,
                });
            }
            let finfo = if ac == 6 {
                let raw = paths::b64_decode(av[5]).map_err(|_| ParseProblem::BadFinderInfo)?;
                let blob: [u8; FINFO_LEN] =
                    raw.try_into().map_err(|_| ParseProblem::BadFinderInfo)?;
                Some(blob)
            } else {
                None
            };
            EntryInfo::Dir {
                mode: octal(av[2], "mode")?,
                uid: decimal(av[3], "uid")?,
                gid: decimal(av[4], "gid")?,
                finfo,
            }
        }

        'p' | 'D' | 's' => {
            if ac != 5 {
                return Err(ParseProblem::FieldCount {
                    expected: "5",
                    got: ac,
                });
            }
            let mode = octal(av[2], "mode")?;
            let uid = decimal(av[3], "uid")?;
            let gid = decimal(av[4], "gid")?;
            match type_char {
                'p' => EntryInfo::Fifo { mode, uid, gid },
                'D' => EntryInfo::Door { mode, uid, gid },
                _ => EntryInfo::Socket { mode, uid, gid },
            }
        }

        'b' | 'c' => {
            if ac != 7 {
                return Err(ParseProblem::FieldCount {
                    expected: "7",
                    got: ac,
                });
            }
            let mode = octal(av[2], "mode")?;
            let uid = decimal(av[3], "uid")?;
            let gid = decimal(av[4], "gid")?;
            let major = decimal(av[5], "major")?;
            let minor = decimal(av[6], "minor")?;
            if type_char == 'b' {
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
        }

        'l' => {
            let (mode, uid, gid) = match ac {
                // bare link: target only, ownership implied
                3 => (0o777, 0, 0),
                6 => (
                    octal(av[2], "mode")?,
                    decimal(av[3], "uid")?,
                    decimal(av[4], "gid")?,
                ),
                _ => {
                    return Err(ParseProblem::FieldCount {
                        expected: "3 or 6",
                        got: ac,
                    })
                }
            };
            EntryInfo::Symlink {
                mode,
                uid,
                gid,
                target: decode_path(av[ac - 1])?,
            }
        }

        'h' => {
            if ac != 3 {
                return Err(ParseProblem::FieldCount {
                    expected: "3",
                    got: ac,
                });
            }
            EntryInfo::Hardlink {
                target: apply_form(ctx.form, decode_path(av[2])?),
            }
        }

        'f' | 'a' => {
            if ac != 8 {
                return Err(ParseProblem::FieldCount {
                    expected: "8",
                    got: ac,
                });
            }
            let cksum = if av[7] == "-" {
                if ctx.cksum && kind != TranscriptKind::Negative {
                    return Err(ParseProblem::MissingChecksum);
                }
                None
            } else {
                Some(av[7].to_owned())
            };
            let meta = FileMeta {
                mode: octal(av[2], "mode")?,
                uid: decimal(av[3], "uid")?,
                gid: decimal(av[4], "gid")?,
                mtime: decimal(av[5], "mtime")?,
                size: decimal(av[6], "size")?,
                cksum,
            };
            if type_char == 'f' {
                EntryInfo::File(meta)
            } else {
                EntryInfo::Archive(meta)
            }
        }

        other => return Err(ParseProblem::UnknownType(other)),
    };

    Ok(Some((
        marker,
        PathEntry {
            minus: marker == Marker::Remove,
            name,
            info,
        },
    )))
}
