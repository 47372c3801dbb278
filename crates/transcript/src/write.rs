//! Canonical transcript line rendering.
//!
//! Field layout mirrors the fixed-width form the rest of the tooling sorts
//! and diffs: type character, encoded name padded to 37 columns, a tab, then
//! the type-specific fields. `write(parse(line))` reproduces `line` modulo
//! whitespace.

use crate::entry::{EntryInfo, PathEntry, MODE_MASK};

const NAME_WIDTH: usize = 37;

fn header(entry: &PathEntry) -> String {
    let mut out = String::new();
    if entry.minus {
        out.push_str("- ");
    }
    let name = paths::encode(&entry.name);
    out.push(entry.type_char());
    out.push(' ');
    out.push_str(&format!("{:<width$}", name, width = NAME_WIDTH));
    out.push('\t');
    out
}

/// Renders one entry as a transcript line, without a trailing newline.
///
/// The applier-facing `+` marker is not part of the entry; difference
/// emitters prepend it themselves.
pub fn write_line(entry: &PathEntry) -> String {
    let mut out = header(entry);
    match &entry.info {
        EntryInfo::Fifo { mode, uid, gid }
        | EntryInfo::Socket { mode, uid, gid }
        | EntryInfo::Door { mode, uid, gid } => {
            out.push_str(&format!("{:04o} {uid:5} {gid:5}", mode & MODE_MASK));
        }

        EntryInfo::Dir {
            mode,
            uid,
            gid,
            finfo,
        } => {
            out.push_str(&format!("{:04o} {uid:5} {gid:5}", mode & MODE_MASK));
            if let Some(blob) = finfo {
                if blob.iter().any(|&b| b != 0) {
                    out.push(' ');
                    out.push_str(&paths::b64_encode(blob));
                }
            }
        }

        EntryInfo::Symlink {
            mode,
            uid,
            gid,
            target,
        } => {
            out.push_str(&format!(
                "{:04o} {uid:5} {gid:5} {}",
                mode & MODE_MASK,
                paths::encode(target)
            ));
        }

        EntryInfo::Hardlink { target } => {
            out.push_str(&paths::encode(target));
        }

        EntryInfo::File(meta) | EntryInfo::Archive(meta) => {
            out.push_str(&format!(
                "{:04o} {:5} {:5} {:9} {:7} {}",
                meta.mode & MODE_MASK,
                meta.uid,
                meta.gid,
                meta.mtime,
                meta.size,
                meta.cksum.as_deref().unwrap_or("-")
            ));
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
            out.push_str(&format!(
                "{:04o} {uid:5} {gid:5} {major:5} {minor:5}",
                mode & MODE_MASK
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::TranscriptKind;
    use crate::parse::{parse_line, ParseContext};
    use paths::PathForm;

    fn reparse(line: &str) -> String {
        let ctx = ParseContext {
            form: Some(PathForm::Absolute),
            cksum: false,
        };
        let (_, entry) = parse_line(line, TranscriptKind::Positive, &ctx)
            .unwrap()
            .unwrap();
        write_line(&entry)
    }

    fn fields(line: &str) -> Vec<String> {
        line.split_ascii_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn round_trip_modulo_whitespace() {
        for line in [
            "f /etc/hosts 0644 0 0 1700000000 120 AAAA",
            "a /Library/Thing 0644 501 20 1700000000 9 BBBB",
            "d /opt 0755 0 0",
            "p /run/fifo 0600 0 0",
            "s /run/sock 0700 0 0",
            "D /run/door 0700 0 0",
            "l /usr/tmp 0777 0 0 ../var/tmp",
            "h /b /a",
            "b /dev/sda 0600 0 6 8 0",
            "c /dev/null 0666 0 0 1 3",
            "- f /gone 0644 0 0 5 5 -",
        ] {
            assert_eq!(fields(&reparse(line)), fields(line), "line {line:?}");
        }
    }

    #[test]
    fn name_padded_to_37_columns() {
        let line = reparse("d /opt 0755 0 0");
        let tab = line.find('\t').unwrap();
        // "d " plus the padded name
        assert_eq!(tab, 2 + 37);
    }

    #[test]
    fn minus_prefix_preserved() {
        let line = reparse("- d /gone 0755 0 0");
        assert!(line.starts_with("- d "));
    }

    #[test]
    fn encoded_space_survives() {
        let line = reparse("f /tmp/a\\ b 0644 0 0 1 2 -");
        assert!(line.contains("/tmp/a\\ b"));
    }

    #[test]
    fn zero_finfo_not_emitted() {
        let zeros = paths::b64_encode(&[0u8; 32]);
        let line = reparse(&format!("d /opt 0755 0 0 {zeros}"));
        assert_eq!(fields(&line), fields("d /opt 0755 0 0"));
    }
}
