//! Round-trip and iteration properties over a realistic transcript corpus.

use std::io::Write;

use paths::PathForm;
use transcript::{parse_line, write_line, ParseContext, Transcript, TranscriptKind};

fn ctx() -> ParseContext {
    ParseContext {
        form: Some(PathForm::Absolute),
        cksum: false,
    }
}

const CORPUS: &[&str] = &[
    "d / 0755 0 0",
    "d /Applications 0775 0 80",
    "f /etc/hosts 0644 0 0 1699999999 220 3mbvPpejA2DWdXnQfB7kEA==",
    "f /etc/hosts.equiv 0644 0 0 1699999999 0 1B2M2Y8AsgTpgAmY7PhCfg==",
    "l /etc/rc 0755 0 0 init.d/rc",
    "h /sbin/reboot /sbin/halt",
    "p /run/initctl 0600 0 0",
    "s /run/systemd/notify 0777 0 0",
    "D /var/run/name_service_door 0444 0 0",
    "b /dev/sda 0660 0 6 8 0",
    "c /dev/null 0666 0 0 1 3",
    "- f /var/db/stale 0644 0 0 1 1 -",
    "f /var/with\\ space 0600 0 0 5 5 -",
];

fn fields(line: &str) -> Vec<String> {
    line.split_ascii_whitespace().map(str::to_owned).collect()
}

/// `write(parse(line))` reproduces every corpus line modulo whitespace.
#[test]
fn corpus_round_trips() {
    for line in CORPUS {
        let (_, entry) = parse_line(line, TranscriptKind::Positive, &ctx())
            .unwrap()
            .unwrap_or_else(|| panic!("no entry from {line:?}"));
        let rendered = write_line(&entry);
        assert_eq!(fields(&rendered), fields(line), "line {line:?}");

        // And the rendered form parses back to the same entry.
        let (_, again) = parse_line(&rendered, TranscriptKind::Positive, &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(entry, again, "line {line:?}");
    }
}

/// The short symlink form (target only) canonicalizes to the owned form.
#[test]
fn bare_symlink_canonicalizes() {
    let (_, entry) = parse_line(
        "l /etc/mtab ../proc/self/mounts",
        TranscriptKind::Positive,
        &ctx(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(
        fields(&write_line(&entry)),
        fields("l /etc/mtab 0777 0 0 ../proc/self/mounts")
    );
}

fn sorted_transcript(lines: usize) -> String {
    let mut out = String::from("# generated\n");
    for i in 0..lines {
        out.push_str(&format!("f /data/file{i:05} 0644 0 0 1700000000 {i} -\n"));
    }
    out
}

/// Buffered and streamed iteration see the same entries in the same order.
#[test]
fn buffering_is_transparent() {
    let text = sorted_transcript(200);
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(text.as_bytes()).unwrap();

    let open = |buffer_size: u64| {
        Transcript::open(
            TranscriptKind::Positive,
            tmp.path(),
            "gen.T",
            "gen.K",
            buffer_size,
            true,
            &ctx(),
        )
        .unwrap()
    };

    let (mut streamed, streamed_buffered) = open(0);
    let (mut slurped, slurped_buffered) = open(1 << 20);
    assert!(!streamed_buffered);
    assert!(slurped_buffered);

    let mut count = 0;
    loop {
        assert_eq!(
            streamed.current().map(|e| e.name.clone()),
            slurped.current().map(|e| e.name.clone()),
        );
        if streamed.eof() {
            break;
        }
        count += 1;
        streamed.advance(&ctx()).unwrap();
        slurped.advance(&ctx()).unwrap();
    }
    assert_eq!(count, 200);
    assert_eq!(streamed.total_objects, 200);
}

/// A leading `name:` header sets the short name and yields no entry.
#[test]
fn short_name_header_is_consumed() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"web-server.T:\nd /srv 0755 0 0\n").unwrap();

    let (tran, _) = Transcript::open(
        TranscriptKind::Positive,
        tmp.path(),
        "",
        "test.K",
        0,
        true,
        &ctx(),
    )
    .unwrap();
    assert_eq!(tran.shortname, "web-server.T");
    assert_eq!(tran.current().unwrap().name, b"/srv");
}

/// An applicable transcript (headers, `+` markers, removals) iterates as a
/// plain transcript.
#[test]
fn applicable_output_is_a_valid_transcript() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(
        b"base.T:\n\
          + f /etc/hosts 0644 0 0 1700000000 120 AAAA\n\
          - f /etc/stale 0644 0 0 1 1 -\n\
          f /etc/tuned 0600 0 0 1700000000 9 BBBB\n",
    )
    .unwrap();

    let (mut tran, _) = Transcript::open(
        TranscriptKind::Positive,
        tmp.path(),
        "apply.T",
        "test.K",
        0,
        true,
        &ctx(),
    )
    .unwrap();

    let mut names = Vec::new();
    let mut minuses = Vec::new();
    while let Some(entry) = tran.current() {
        names.push(entry.name.clone());
        minuses.push(entry.minus);
        tran.advance(&ctx()).unwrap();
    }
    assert_eq!(
        names,
        vec![
            b"/etc/hosts".to_vec(),
            b"/etc/stale".to_vec(),
            b"/etc/tuned".to_vec(),
        ]
    );
    assert_eq!(minuses, vec![false, true, false]);
}
