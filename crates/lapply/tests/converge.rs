//! Full engine round trips: difference, apply, converge.
//!
//! Builds a target tree, a loadset store, and a transcript stack under a
//! tempdir; runs the differ; feeds its output to the applier backed by the
//! directory fetcher; then re-runs the differ and expects silence.

use std::io::Cursor;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use checksums::{Algorithm, MIN_BUFFER_SIZE};
use fsdiff::{DiffConfig, Differ, EditPath};
use lapply::{Applier, ApplyConfig};
use stack::TranscriptStack;
use transfer::DirFetcher;

const MTIME: i64 = 1_700_000_000;

fn ids() -> (u32, u32) {
    let probe = tempfile::NamedTempFile::new().unwrap();
    let md = probe.as_file().metadata().unwrap();
    (md.uid(), md.gid())
}

fn md5_of(content: &[u8]) -> String {
    checksums::cksum_reader(content, Algorithm::Md5, MIN_BUFFER_SIZE)
        .unwrap()
        .1
}

fn set_mtime(path: &Path) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(MTIME, 0)).unwrap();
}

fn file_line(path: &Path, mode: u32, content: &[u8]) -> String {
    let (uid, gid) = ids();
    format!(
        "f {} {mode:04o} {uid} {gid} {MTIME} {} {}",
        path.display(),
        content.len(),
        md5_of(content)
    )
}

fn dir_line(path: &Path) -> String {
    let (uid, gid) = ids();
    let mode = std::fs::metadata(path).map(|m| m.mode() & 0o7777).unwrap_or(0o755);
    format!("d {} {mode:04o} {uid} {gid}", path.display())
}

fn put_blob(store: &Path, transcript: &str, target: &Path, content: &[u8]) {
    let mut dest = store.join(transcript);
    let relative = target.as_os_str().as_bytes();
    let relative = relative.strip_prefix(b"/").unwrap_or(relative);
    dest.push(std::ffi::OsStr::from_bytes(relative));
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    std::fs::write(&dest, content).unwrap();
}

fn run_diff(kdir: &Path, stage: &Path) -> (String, u64) {
    let config = DiffConfig::new(stage.as_os_str().as_bytes())
        .with_algorithm(Algorithm::Md5)
        .applicable();
    let stack = TranscriptStack::open(&kdir.join("cmd.K"), &config.session).unwrap();
    let mut out = Vec::new();
    let mut differ = Differ::new(config, stack, &mut out).unwrap();
    let changes = differ.run().unwrap();
    drop(differ);
    (String::from_utf8(out).unwrap(), changes)
}

fn run_apply(diff: &str, store: &Path) -> lapply::Summary {
    let mut fetcher = DirFetcher::new(store);
    let config = ApplyConfig {
        algorithm: Some(Algorithm::Md5),
        quiet: true,
        ..ApplyConfig::default()
    };
    let mut applier = Applier::new(config, Some(&mut fetcher));
    applier.run(Cursor::new(diff.as_bytes().to_vec())).unwrap()
}

/// One pass fixes content drift, missing files, stray objects, and metadata
/// drift; the next pass finds nothing to do.
#[test]
fn apply_converges_in_one_pass() {
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir(&stage).unwrap();
    let store = dir.path().join("store");

    let keep = stage.join("keep");
    let new = stage.join("new");
    let stale = stage.join("stale");
    let wrongmode = stage.join("wrongmode");

    // In compliance already.
    std::fs::write(&keep, b"good content").unwrap();
    set_mtime(&keep);
    // Content drifted; correct bytes live in the store.
    std::fs::write(&stale, b"old").unwrap();
    put_blob(&store, "base.T", &stale, b"fresh contents");
    // Missing entirely.
    put_blob(&store, "base.T", &new, b"brand new");
    // Only the mode drifted.
    std::fs::write(&wrongmode, b"constant").unwrap();
    std::fs::set_permissions(
        &wrongmode,
        std::os::unix::fs::PermissionsExt::from_mode(0o600),
    )
    .unwrap();
    set_mtime(&wrongmode);
    // Unmanaged clutter.
    std::fs::write(stage.join("junk"), b"bye").unwrap();
    std::fs::create_dir(stage.join("olddir")).unwrap();
    std::fs::write(stage.join("olddir/inside"), b"bye too").unwrap();

    let tran = format!(
        "{}\n{}\n{}\n{}\n{}\n",
        dir_line(&stage),
        file_line(&keep, 0o644, b"good content"),
        file_line(&new, 0o640, b"brand new"),
        file_line(&stale, 0o644, b"fresh contents"),
        file_line(&wrongmode, 0o644, b"constant"),
    );
    // Permissions of pre-existing managed files match their lines.
    std::fs::set_permissions(&keep, std::os::unix::fs::PermissionsExt::from_mode(0o644)).unwrap();
    std::fs::set_permissions(&stale, std::os::unix::fs::PermissionsExt::from_mode(0o644)).unwrap();
    std::fs::write(dir.path().join("base.T"), &tran).unwrap();
    std::fs::write(dir.path().join("cmd.K"), "p base.T\n").unwrap();

    let (diff, changes) = run_diff(dir.path(), &stage);
    assert!(changes > 0, "{diff}");

    let summary = run_apply(&diff, &store);
    assert!(summary.changes);
    assert!(!summary.network_disabled);

    assert_eq!(std::fs::read(&stale).unwrap(), b"fresh contents");
    assert_eq!(std::fs::read(&new).unwrap(), b"brand new");
    assert_eq!(
        std::fs::metadata(&new).unwrap().mode() & 0o7777,
        0o640,
        "downloads carry their line's mode"
    );
    assert_eq!(std::fs::metadata(&new).unwrap().mtime(), MTIME);
    assert_eq!(std::fs::metadata(&wrongmode).unwrap().mode() & 0o7777, 0o644);
    assert!(!stage.join("junk").exists());
    assert!(!stage.join("olddir").exists());
    assert_eq!(std::fs::read(&keep).unwrap(), b"good content");

    // Idempotence: the tree is now in compliance.
    let (second, changes) = run_diff(dir.path(), &stage);
    assert_eq!(changes, 0, "second diff not empty:\n{second}");
}

/// A directory standing where a file belongs is drained, removed, and
/// replaced by the download, all from one sorted stream.
#[test]
fn directory_gives_way_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir_all(stage.join("x")).unwrap();
    std::fs::write(stage.join("x/inner"), b"doomed").unwrap();
    let store = dir.path().join("store");
    put_blob(&store, "base.T", &stage.join("x"), b"now a file");

    let tran = format!(
        "{}\n{}\n",
        dir_line(&stage),
        file_line(&stage.join("x"), 0o644, b"now a file"),
    );
    std::fs::write(dir.path().join("base.T"), &tran).unwrap();
    std::fs::write(dir.path().join("cmd.K"), "p base.T\n").unwrap();

    let (diff, _) = run_diff(dir.path(), &stage);
    run_apply(&diff, &store);

    assert!(stage.join("x").is_file());
    assert_eq!(std::fs::read(stage.join("x")).unwrap(), b"now a file");

    let (second, changes) = run_diff(dir.path(), &stage);
    assert_eq!(changes, 0, "{second}");
}

/// Out-of-order input violates the contract with the differ and is fatal.
#[test]
fn bad_sort_order_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (uid, gid) = ids();
    let input = format!(
        "base.T:\n\
         d {}/zzz 0755 {uid} {gid}\n\
         d {}/aaa 0755 {uid} {gid}\n",
        dir.path().display(),
        dir.path().display(),
    );
    let config = ApplyConfig {
        network: false,
        quiet: true,
        ..ApplyConfig::default()
    };
    let mut applier = Applier::new(config, None);
    let err = applier.run(Cursor::new(input.into_bytes())).unwrap_err();
    assert!(matches!(err, lapply::ApplyError::BadSortOrder { line: 3 }));
}

/// A failed fetch disables the network; later downloads are skipped and the
/// run reports itself as incomplete rather than dying.
#[test]
fn network_failure_disables_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir(&stage).unwrap();
    let store = dir.path().join("store");
    std::fs::create_dir(&store).unwrap(); // empty: every fetch fails

    let a = stage.join("a");
    let b = stage.join("b");
    let input = format!(
        "base.T:\n+ {}\n+ {}\n",
        file_line(&a, 0o644, b"unreachable"),
        file_line(&b, 0o644, b"also unreachable"),
    );

    let mut fetcher = DirFetcher::new(&store);
    let config = ApplyConfig {
        algorithm: Some(Algorithm::Md5),
        quiet: true,
        ..ApplyConfig::default()
    };
    let mut applier = Applier::new(config, Some(&mut fetcher));
    let summary = applier.run(Cursor::new(input.into_bytes())).unwrap();

    assert!(summary.network_disabled);
    assert!(!summary.changes);
    assert!(!a.exists());
    assert!(!b.exists());
}

/// A file standing where a directory belongs is unlinked and the directory
/// created, with no download involved.
#[test]
fn file_gives_way_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir(&stage).unwrap();
    std::fs::write(stage.join("x"), b"was a file").unwrap();
    let store = dir.path().join("store");
    std::fs::create_dir(&store).unwrap();

    let tran = format!(
        "{}\n{}\n",
        dir_line(&stage),
        {
            let (uid, gid) = ids();
            format!("d {} 0755 {uid} {gid}", stage.join("x").display())
        },
    );
    std::fs::write(dir.path().join("base.T"), &tran).unwrap();
    std::fs::write(dir.path().join("cmd.K"), "p base.T\n").unwrap();

    let (diff, _) = run_diff(dir.path(), &stage);
    run_apply(&diff, &store);
    assert!(stage.join("x").is_dir());

    let (second, changes) = run_diff(dir.path(), &stage);
    assert_eq!(changes, 0, "{second}");
}

/// Symlinks and hardlinks are created from bare lines; a re-downloaded
/// primary re-links its siblings.
#[test]
fn links_are_created_and_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir(&stage).unwrap();
    std::fs::write(stage.join("primary"), b"linked body").unwrap();
    set_mtime(&stage.join("primary"));
    std::fs::set_permissions(
        &stage.join("primary"),
        std::os::unix::fs::PermissionsExt::from_mode(0o644),
    )
    .unwrap();
    let store = dir.path().join("store");
    std::fs::create_dir(&store).unwrap();

    let (uid, gid) = ids();
    let tran = format!(
        "{}\n{}\nh {} {}\nl {} 0777 {uid} {gid} primary\n",
        dir_line(&stage),
        file_line(&stage.join("primary"), 0o644, b"linked body"),
        stage.join("sibling").display(),
        stage.join("primary").display(),
        stage.join("symlink").display(),
    );
    std::fs::write(dir.path().join("base.T"), &tran).unwrap();
    std::fs::write(dir.path().join("cmd.K"), "p base.T\n").unwrap();

    let (diff, _) = run_diff(dir.path(), &stage);
    run_apply(&diff, &store);

    let a = std::fs::metadata(stage.join("primary")).unwrap();
    let b = std::fs::metadata(stage.join("sibling")).unwrap();
    assert_eq!((a.dev(), a.ino()), (b.dev(), b.ino()));
    assert_eq!(
        std::fs::read_link(stage.join("symlink")).unwrap().to_str(),
        Some("primary")
    );

    let (second, changes) = run_diff(dir.path(), &stage);
    assert_eq!(changes, 0, "{second}");
}

/// `--no-network` applies removals and metadata but never downloads.
#[test]
fn no_network_skips_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let stage = dir.path().join("stage");
    std::fs::create_dir(&stage).unwrap();
    std::fs::write(stage.join("junk"), b"x").unwrap();

    let input = format!(
        "base.T:\n+ {}\n- f {} 0644 0 0 1 1 -\n",
        file_line(&stage.join("absent"), 0o644, b"payload"),
        stage.join("junk").display(),
    );

    let config = ApplyConfig {
        network: false,
        quiet: true,
        ..ApplyConfig::default()
    };
    let mut applier = Applier::new(config, None);
    let summary = applier.run(Cursor::new(input.into_bytes())).unwrap();

    assert!(summary.changes);
    assert!(!stage.join("absent").exists());
    assert!(!stage.join("junk").exists());
}
