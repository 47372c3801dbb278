//! Metadata-check switch behavior: a disabled field drops out of the
//! comparison entirely.

use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use fsdiff::{DiffConfig, Differ, EditPath};
use stack::TranscriptStack;

fn ids() -> (u32, u32) {
    let probe = tempfile::NamedTempFile::new().unwrap();
    let md = probe.as_file().metadata().unwrap();
    (md.uid(), md.gid())
}

fn write_file(dir: &Path, name: &str, text: &str) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(text.as_bytes()).unwrap();
}

fn mode_of(path: &Path) -> u32 {
    std::fs::metadata(path).unwrap().mode() & 0o7777
}

struct Fixture {
    _dir: tempfile::TempDir,
    kdir: std::path::PathBuf,
    stage: std::path::PathBuf,
}

/// A file whose mode and mtime both drift from its line.
fn drifted_fixture() -> Fixture {
    let (uid, gid) = ids();
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir(&stage).unwrap();
    let target = stage.join("target");
    write_file(&stage, "target", "constant body\n");
    std::fs::set_permissions(
        &target,
        std::os::unix::fs::PermissionsExt::from_mode(0o600),
    )
    .unwrap();
    filetime::set_file_mtime(&target, filetime::FileTime::from_unix_time(1_600_000_000, 0))
        .unwrap();
    let size = std::fs::metadata(&target).unwrap().len();

    let tran = format!(
        "d {} {:04o} {uid} {gid}\nf {} 0644 {uid} {gid} 1700000000 {size} -\n",
        stage.display(),
        mode_of(&stage),
        target.display(),
    );
    write_file(dir.path(), "base.T", &tran);
    write_file(dir.path(), "cmd.K", "p base.T\n");
    Fixture {
        kdir: dir.path().to_owned(),
        stage,
        _dir: dir,
    }
}

fn run(fixture: &Fixture, tune: impl FnOnce(&mut DiffConfig)) -> String {
    let mut config = DiffConfig::new(fixture.stage.as_os_str().as_bytes());
    config.edit_path = EditPath::Applicable;
    tune(&mut config);
    let stack = TranscriptStack::open(&fixture.kdir.join("cmd.K"), &config.session).unwrap();
    let mut out = Vec::new();
    let mut differ = Differ::new(config, stack, &mut out).unwrap();
    differ.run().unwrap();
    drop(differ);
    String::from_utf8(out).unwrap()
}

/// With everything on and checksums off, an mtime change means a download.
#[test]
fn mtime_drift_without_checksums_downloads() {
    let fixture = drifted_fixture();
    let out = run(&fixture, |_| {});
    assert!(out.contains("+ f "), "{out:?}");
}

/// Disabling the mtime check leaves only the mode drift: a bare metadata
/// line instead of a download.
#[test]
fn disabled_mtime_check_downgrades_to_status() {
    let fixture = drifted_fixture();
    let out = run(&fixture, |config| {
        config.checks.set("mtime", false).unwrap();
    });
    assert!(!out.contains("+ f "), "{out:?}");
    assert!(out.lines().any(|l| l.starts_with("f ")), "{out:?}");
}

/// Disabling mtime and mode silences the drift entirely.
#[test]
fn disabled_fields_are_invisible() {
    let fixture = drifted_fixture();
    let out = run(&fixture, |config| {
        config.checks.set("mtime", false).unwrap();
        config.checks.set("mode", false).unwrap();
    });
    assert!(out.is_empty(), "{out:?}");
}

/// Disabling the size check stops a shorter file from forcing a download
/// when nothing else drifted.
#[test]
fn disabled_size_check_ignores_length() {
    let (uid, gid) = ids();
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir(&stage).unwrap();
    let target = stage.join("target");
    write_file(&stage, "target", "short\n");
    std::fs::set_permissions(
        &target,
        std::os::unix::fs::PermissionsExt::from_mode(0o644),
    )
    .unwrap();
    filetime::set_file_mtime(&target, filetime::FileTime::from_unix_time(1_700_000_000, 0))
        .unwrap();

    let tran = format!(
        "d {} {:04o} {uid} {gid}\nf {} 0644 {uid} {gid} 1700000000 999999 -\n",
        stage.display(),
        mode_of(&stage),
        target.display(),
    );
    write_file(dir.path(), "base.T", &tran);
    write_file(dir.path(), "cmd.K", "p base.T\n");
    let fixture = Fixture {
        kdir: dir.path().to_owned(),
        stage,
        _dir: dir,
    };

    let out = run(&fixture, |config| {
        config.checks.set("size", false).unwrap();
    });
    assert!(out.is_empty(), "{out:?}");
}
