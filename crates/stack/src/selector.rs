//! The precedence-ordered stack and its merged selector stream.

use std::cmp::Ordering;

use filters::ExcludeList;
use paths::{is_child, path_casecmp};
use tracing::warn;
use transcript::{Transcript, TranscriptKind};

use crate::error::StackError;
use crate::session::Session;

/// An ordered collection of open transcripts plus the special and exclude
/// lists the command file declared.
///
/// Index 0 is the null transcript (lowest precedence); higher indices were
/// declared later and take precedence on path ties. The special transcript,
/// when present, is pushed last and therefore overlays everything.
#[derive(Debug)]
pub struct TranscriptStack {
    pub(crate) trans: Vec<Transcript>,
    /// Paths declared `s` in the command file.
    pub special_paths: Vec<Vec<u8>>,
    /// Patterns declared `x` in the command file.
    pub excludes: ExcludeList,
    /// How many transcripts were slurped into memory at open.
    pub buffered: u32,
    /// How many transcripts read line-at-a-time from disk.
    pub unbuffered: u32,
}

impl TranscriptStack {
    /// Number of open transcripts, the null transcript included.
    pub fn len(&self) -> usize {
        self.trans.len()
    }

    /// Always false: the null transcript is pushed before anything else.
    pub fn is_empty(&self) -> bool {
        self.trans.is_empty()
    }

    /// Whether anything beyond the null transcript was declared.
    pub fn has_content(&self) -> bool {
        self.trans
            .iter()
            .any(|t| t.kind != TranscriptKind::Null)
    }

    /// Borrow a member by index.
    pub fn tran(&self, index: usize) -> &Transcript {
        &self.trans[index]
    }

    /// Whether `path` was declared special in the command file.
    ///
    /// Membership is an exact byte comparison; the special transcript itself
    /// decides what the file's metadata should be.
    pub fn is_special(&self, path: &[u8]) -> bool {
        self.special_paths.iter().any(|p| p == path)
    }

    /// A stack holding only the null transcript.
    ///
    /// Single-line description mode works against this: everything on disk
    /// is filesystem-only.
    pub fn null_only(session: &Session) -> Self {
        Self {
            trans: vec![Transcript::null()],
            special_paths: Vec::new(),
            excludes: ExcludeList::new(session.case_sensitive),
            buffered: 0,
            unbuffered: 0,
        }
    }

    /// Advances the member cursor past its current entry.
    pub fn advance(&mut self, index: usize, session: &Session) -> Result<(), StackError> {
        self.trans[index].advance(&session.parse_context())?;
        Ok(())
    }

    /// Undoes the selection bookkeeping for a peeked-at entry.
    ///
    /// Used when a caller drives selection only to keep masked entries
    /// moving and does not act on the result.
    pub fn unselect(&mut self, index: usize) {
        let tran = &mut self.trans[index];
        tran.active_objects = tran.active_objects.saturating_sub(1);
    }

    /// Yields the stack's next visible entry.
    ///
    /// Finds the not-EOF member with the smallest current path (ties go to
    /// the higher-precedence member), advances every other member sitting on
    /// the same path so lower-precedence duplicates are masked, then applies
    /// the three visibility filters. Skipped entries are consumed and
    /// selection re-runs. Returns the member's index, or `None` when every
    /// member is at EOF.
    ///
    /// The selected entry itself is left in place; callers advance it when
    /// they are done with it.
    pub fn select(&mut self, session: &Session) -> Result<Option<usize>, StackError> {
        loop {
            let mut best: Option<usize> = None;
            for i in (0..self.trans.len()).rev() {
                let Some(entry) = self.trans[i].current() else {
                    continue;
                };
                match best {
                    None => best = Some(i),
                    Some(b) => {
                        let current = self.trans[b].current().map(|e| e.name.clone());
                        if let Some(current) = current {
                            if path_casecmp(&entry.name, &current, session.case_sensitive)
                                == Ordering::Less
                            {
                                best = Some(i);
                            }
                        }
                    }
                }
            }

            let Some(best) = best else {
                return Ok(None);
            };
            let name = self.trans[best]
                .current()
                .map(|e| e.name.clone())
                .unwrap_or_default();

            // Mask equal-path entries in lower-precedence members.
            for i in 0..self.trans.len() {
                if i == best {
                    continue;
                }
                let equal = self.trans[i].current().is_some_and(|e| {
                    path_casecmp(&e.name, &name, session.case_sensitive) == Ordering::Equal
                });
                if equal {
                    self.advance(i, session)?;
                }
            }

            let entry = self.trans[best].current().expect("best member not at EOF");

            if entry.minus {
                self.advance(best, session)?;
                continue;
            }

            if self.trans[best].kind != TranscriptKind::Special && self.excludes.matches(&name) {
                if session.exclude_warnings {
                    warn!("excluding {}", String::from_utf8_lossy(&name));
                }
                self.advance(best, session)?;
                continue;
            }

            if !is_child(&name, &session.path_prefix, session.case_sensitive) {
                self.advance(best, session)?;
                continue;
            }

            self.trans[best].active_objects += 1;
            return Ok(Some(best));
        }
    }

    /// End-of-run bookkeeping: warn about transcripts that contributed
    /// nothing (or almost nothing) to selection.
    pub fn report_inactive(&self) {
        for tran in &self.trans {
            if tran.shortname.is_empty() {
                continue;
            }
            if tran.total_objects == 0 {
                warn!("no objects in {} (from {})", tran.shortname, tran.kfile);
            } else if tran.active_objects == 0 {
                warn!(
                    "0 active objects of {} in {} (from {})",
                    tran.total_objects, tran.shortname, tran.kfile
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, text: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn session() -> Session {
        Session::new(b"/")
    }

    fn open_stack(dir: &Path, kfile: &str) -> TranscriptStack {
        TranscriptStack::open(&dir.join(kfile), &session()).unwrap()
    }

    /// Drains the stack, returning (shortname, path) pairs.
    fn drain(stack: &mut TranscriptStack, session: &Session) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(i) = stack.select(session).unwrap() {
            let entry = stack.tran(i).current().unwrap();
            out.push((stack.tran(i).shortname.clone(), entry.name.clone()));
            stack.advance(i, session).unwrap();
        }
        out
    }

    #[test]
    fn later_declarations_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "base.T",
            "f /etc/hosts 0644 0 0 100 10 AAAA\nf /etc/motd 0644 0 0 100 5 BBBB\n",
        );
        write_file(dir.path(), "site.T", "f /etc/hosts 0600 0 0 200 12 CCCC\n");
        write_file(dir.path(), "cmd.K", "p base.T\np site.T\n");

        let mut stack = open_stack(dir.path(), "cmd.K");
        let order = drain(&mut stack, &session());
        assert_eq!(
            order,
            vec![
                ("site.T".to_owned(), b"/etc/hosts".to_vec()),
                ("base.T".to_owned(), b"/etc/motd".to_vec()),
            ]
        );
    }

    #[test]
    fn minus_lines_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "base.T",
            "f /etc/hosts 0644 0 0 100 10 AAAA\n",
        );
        write_file(dir.path(), "mask.T", "- f /etc/hosts 0644 0 0 100 10 AAAA\n");
        write_file(dir.path(), "cmd.K", "p base.T\np mask.T\n");

        let mut stack = open_stack(dir.path(), "cmd.K");
        assert!(drain(&mut stack, &session()).is_empty());
    }

    #[test]
    fn excluded_paths_vanish_unless_special() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "base.T", "f /var/log/app.log 0644 0 0 1 1 AAAA\n");
        write_file(
            dir.path(),
            "special.T",
            "f /var/log/app.log 0644 0 0 2 2 BBBB\n",
        );
        write_file(
            dir.path(),
            "cmd.K",
            "p base.T\nx *.log\ns /var/log/app.log\n",
        );

        let mut stack = open_stack(dir.path(), "cmd.K");
        let order = drain(&mut stack, &session());
        // Only the special overlay survives the exclude pattern.
        assert_eq!(order, vec![("special.T".to_owned(), b"/var/log/app.log".to_vec())]);
    }

    #[test]
    fn entries_outside_prefix_vanish() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "base.T",
            "f /etc/hosts 0644 0 0 1 1 AAAA\nf /var/x 0644 0 0 1 1 BBBB\n",
        );
        write_file(dir.path(), "cmd.K", "p base.T\n");

        let mut narrowed = Session::new(b"/etc");
        narrowed.transcript_buffer_size = 0;
        let mut stack = TranscriptStack::open(&dir.path().join("cmd.K"), &narrowed).unwrap();
        let order = drain(&mut stack, &narrowed);
        assert_eq!(order, vec![("base.T".to_owned(), b"/etc/hosts".to_vec())]);
    }

    #[test]
    fn merged_stream_is_strictly_ascending() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "one.T",
            "d /a 0755 0 0\nf /a/x 0644 0 0 1 1 AAAA\nf /c 0644 0 0 1 1 AAAA\n",
        );
        write_file(
            dir.path(),
            "two.T",
            "f /a/x 0600 0 0 2 2 BBBB\nf /b 0644 0 0 1 1 BBBB\n",
        );
        write_file(dir.path(), "cmd.K", "p one.T\np two.T\n");

        let mut stack = open_stack(dir.path(), "cmd.K");
        let names: Vec<Vec<u8>> = drain(&mut stack, &session())
            .into_iter()
            .map(|(_, n)| n)
            .collect();
        assert_eq!(names, vec![
            b"/a".to_vec(),
            b"/a/x".to_vec(),
            b"/b".to_vec(),
            b"/c".to_vec(),
        ]);
        for pair in names.windows(2) {
            assert_eq!(paths::path_cmp(&pair[0], &pair[1]), Ordering::Less);
        }
    }
}
