//! The line-by-line apply loop.

use std::cmp::Ordering;
use std::io::BufRead;

use paths::path_casecmp;
use tracing::{info, warn};
use transcript::{EntryInfo, Marker, ParseContext, PathEntry, TranscriptKind};
use transfer::{fetch_verified, FileFetcher, PathDescriptor};
use walk::FsObject;

use crate::error::ApplyError;
use crate::update::{self, os_path, Applied};

const SPECIAL_NAME: &str = "special.T";

/// How an apply run should behave.
#[derive(Clone, Debug)]
pub struct ApplyConfig {
    /// Compare paths byte-wise (`true`) or case-folded (`false`).
    pub case_sensitive: bool,
    /// Digest for download verification; `None` skips digest checks.
    pub algorithm: Option<checksums::Algorithm>,
    /// Read buffer for checksumming.
    pub cksum_bufsize: usize,
    /// Whether network operations are allowed at all.
    pub network: bool,
    /// Clear immutable/append flags before mutating.
    pub force: bool,
    /// Create missing intermediate directories.
    pub create_prefix: bool,
    /// Suppress per-path status lines.
    pub quiet: bool,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            algorithm: None,
            cksum_bufsize: checksums::MIN_BUFFER_SIZE,
            network: true,
            force: false,
            create_prefix: false,
            quiet: false,
        }
    }
}

/// What an apply run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// At least one mutation happened.
    pub changes: bool,
    /// A network failure disabled downloads part-way.
    pub network_disabled: bool,
}

/// A deferred directory removal, optionally carrying the line that replaces
/// the directory once it is gone.
struct PendingRemove {
    path: Vec<u8>,
    deferred: Option<DeferredLine>,
}

struct DeferredLine {
    marker: Marker,
    entry: PathEntry,
    transcript: String,
    special: bool,
}

/// Applies an applicable transcript to the filesystem.
pub struct Applier<'a> {
    config: ApplyConfig,
    fetcher: Option<&'a mut dyn FileFetcher>,
    network: bool,
    changes: bool,
    transcript: String,
    special: bool,
    prev_path: Vec<u8>,
    remove_stack: Vec<PendingRemove>,
    linenum: u32,
}

impl<'a> Applier<'a> {
    /// Creates an applier; `fetcher` may be `None` only when the
    /// configuration disables network operations.
    pub fn new(config: ApplyConfig, fetcher: Option<&'a mut dyn FileFetcher>) -> Self {
        let network = config.network && fetcher.is_some();
        Self {
            config,
            fetcher,
            network,
            changes: false,
            transcript: String::new(),
            special: false,
            prev_path: Vec::new(),
            remove_stack: Vec::new(),
            linenum: 0,
        }
    }

    /// What the run has done so far.
    pub fn summary(&self) -> Summary {
        Summary {
            changes: self.changes,
            network_disabled: self.config.network && !self.network,
        }
    }

    fn announce(&self, path: &[u8], what: &str) {
        if !self.config.quiet {
            println!("{}: {what}", String::from_utf8_lossy(path));
        }
    }

    fn stat_present(&self, path: &[u8]) -> Result<Option<FsObject>, ApplyError> {
        match walk::radstat(path) {
            Ok(obj) => Ok(Some(obj)),
            Err(walk::WalkError::Io { ref source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn parse_ctx() -> ParseContext {
        // Input paths are trusted verbatim; checksum presence is enforced at
        // download time instead of parse time.
        ParseContext {
            form: None,
            cksum: false,
        }
    }

    /// Removes the top pending directory and replays its deferred line.
    fn pop_remove(&mut self) -> Result<(), ApplyError> {
        let pending = self
            .remove_stack
            .pop()
            .expect("pop on empty removal stack");
        std::fs::remove_dir(os_path(&pending.path))
            .map_err(ApplyError::path_err(&pending.path))?;
        self.announce(&pending.path, "deleted");
        self.changes = true;
        if let Some(deferred) = pending.deferred {
            self.do_line(
                deferred.marker,
                &deferred.entry,
                None,
                &deferred.transcript,
                deferred.special,
            )?;
        }
        Ok(())
    }

    /// Pops pending directories that `path` no longer lives beneath.
    fn shrink_remove_stack(&mut self, path: &[u8]) -> Result<(), ApplyError> {
        while let Some(top) = self.remove_stack.last() {
            if paths::is_child(path, &top.path, self.config.case_sensitive) {
                break;
            }
            self.pop_remove()?;
        }
        Ok(())
    }

    fn unlink(&mut self, path: &[u8]) -> Result<(), ApplyError> {
        std::fs::remove_file(os_path(path)).map_err(ApplyError::path_err(path))?;
        self.announce(path, "deleted");
        self.changes = true;
        Ok(())
    }

    /// Executes one `+` line: fetch to a sibling temporary, verify, dress,
    /// rename into place.
    fn install(
        &mut self,
        entry: &PathEntry,
        transcript: &str,
        special: bool,
    ) -> Result<(), ApplyError> {
        // Deferred lines may replay after a fetch failure killed the network.
        if !self.network {
            return Ok(());
        }
        let meta = match &entry.info {
            EntryInfo::File(meta) | EntryInfo::Archive(meta) => meta.clone(),
            _ => {
                return Err(ApplyError::BadDownloadType {
                    line: self.linenum,
                    type_char: entry.type_char(),
                })
            }
        };

        let encoded = paths::encode(&entry.name);
        let desc = if special {
            PathDescriptor::special(&encoded)
        } else {
            PathDescriptor::file(transcript, &encoded)
        };

        let mut temp = entry.name.clone();
        temp.extend_from_slice(format!(".{}", std::process::id()).as_bytes());

        let fetcher = self
            .fetcher
            .as_deref_mut()
            .expect("install attempted with downloads disabled");
        let fetched = fetch_verified(
            fetcher,
            &desc,
            os_path(&temp),
            0o600,
            meta.size,
            meta.cksum.as_deref(),
            self.config.algorithm,
            self.config.cksum_bufsize,
        );
        match fetched {
            Ok(()) => {}
            Err(err) if err.is_network() => {
                warn!("{err}; disabling further downloads");
                self.network = false;
                return Ok(());
            }
            Err(err) => return Err(ApplyError::Fetch(err)),
        }

        if matches!(entry.info, EntryInfo::Archive(_)) {
            return self.install_archive(entry, &temp, &meta);
        }

        update::finish_download(&temp, &meta)?;
        std::fs::rename(os_path(&temp), os_path(&entry.name)).map_err(|e| {
            let _ = std::fs::remove_file(os_path(&temp));
            ApplyError::path_err(&entry.name)(e)
        })?;
        self.announce(&entry.name, "updated");
        self.changes = true;
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn install_archive(
        &mut self,
        entry: &PathEntry,
        temp: &[u8],
        meta: &transcript::FileMeta,
    ) -> Result<(), ApplyError> {
        crate::fork_install::install(&entry.name, temp, meta)?;
        self.announce(&entry.name, "updated");
        self.changes = true;
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    fn install_archive(
        &mut self,
        _entry: &PathEntry,
        temp: &[u8],
        _meta: &transcript::FileMeta,
    ) -> Result<(), ApplyError> {
        let _ = std::fs::remove_file(os_path(temp));
        Err(ApplyError::Unsupported {
            line: self.linenum,
            what: "archived-fork install",
        })
    }

    /// Dispatches one parsed line after all removal bookkeeping.
    fn do_line(
        &mut self,
        marker: Marker,
        entry: &PathEntry,
        present: Option<&FsObject>,
        transcript: &str,
        special: bool,
    ) -> Result<(), ApplyError> {
        match marker {
            Marker::Create => {
                let transcript = transcript.to_owned();
                self.install(entry, &transcript, special)
            }
            Marker::Remove => unreachable!("removals are handled before dispatch"),
            Marker::None => {
                match update::update(entry, present, self.config.create_prefix)? {
                    Applied::Updated => self.announce(&entry.name, "updated"),
                    Applied::Created => self.announce(&entry.name, "created"),
                    Applied::Skipped => {}
                }
                self.changes = true;
                Ok(())
            }
        }
    }

    /// Runs the whole input stream and drains the removal stack.
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<Summary, ApplyError> {
        for line in input.lines() {
            let line = line?;
            self.linenum += 1;

            let tokens: Vec<&str> = paths::split_fields(&line);
            if tokens.is_empty() || tokens[0].starts_with('#') {
                continue;
            }

            // A lone token is a transcript header naming the loadset the
            // following `+` lines download from.
            if tokens.len() == 1 {
                let name = tokens[0];
                let Some(short) = name.strip_suffix(':') else {
                    return Err(ApplyError::BadHeader {
                        line: self.linenum,
                        name: name.to_owned(),
                    });
                };
                self.transcript = short.to_owned();
                self.special = short == SPECIAL_NAME;
                info!("transcript: {short}");
                continue;
            }

            let parsed = transcript::parse_line(&line, TranscriptKind::Positive, &Self::parse_ctx())
                .map_err(|problem| ApplyError::Parse {
                    line: self.linenum,
                    problem,
                })?;
            let Some((marker, entry)) = parsed else {
                continue;
            };

            if marker == Marker::Create {
                if self.transcript.is_empty() {
                    return Err(ApplyError::NoTranscript { line: self.linenum });
                }
                // Once the network is gone, download lines are dead weight.
                if !self.network {
                    continue;
                }
            }

            if !self.prev_path.is_empty()
                && path_casecmp(&entry.name, &self.prev_path, self.config.case_sensitive)
                    != Ordering::Greater
            {
                return Err(ApplyError::BadSortOrder { line: self.linenum });
            }
            self.prev_path = entry.name.clone();

            let mut present = self.stat_present(&entry.name)?;

            if self.config.force && present.is_some() {
                update::clear_flags(&entry.name)?;
            }

            let type_mismatch = present
                .as_ref()
                .is_some_and(|obj| obj.entry.type_char() != entry.type_char());

            if marker == Marker::Remove || type_mismatch {
                let is_dir = present.as_ref().is_some_and(walk::FsObject::is_dir);
                if is_dir {
                    // Defer: descendants named later must be handled first.
                    self.shrink_remove_stack(&entry.name)?;
                    let deferred = (type_mismatch && marker != Marker::Remove).then(|| DeferredLine {
                        marker,
                        entry: entry.clone(),
                        transcript: self.transcript.clone(),
                        special: self.special,
                    });
                    self.remove_stack.push(PendingRemove {
                        path: entry.name.clone(),
                        deferred,
                    });
                    continue;
                }

                if present.is_some() {
                    self.shrink_remove_stack(&entry.name)?;
                    self.unlink(&entry.name)?;
                    present = None;
                }
                if marker == Marker::Remove {
                    continue;
                }
            }

            self.shrink_remove_stack(&entry.name)?;

            let transcript = self.transcript.clone();
            let special = self.special;
            self.do_line(marker, &entry, present.as_ref(), &transcript, special)?;
        }

        while !self.remove_stack.is_empty() {
            self.pop_remove()?;
        }

        Ok(self.summary())
    }
}
