//! Which transcript governs a path.
//!
//! Walks the stack members individually, highest precedence first, and
//! reports every transcript line naming the path, plus any exclude pattern
//! that would suppress it. The decisive entry is the first non-minus match,
//! unless the path is excluded and not special.

use std::cmp::Ordering;
use std::path::Path;

use paths::path_casecmp;
use transcript::{write_line, TranscriptKind};

use crate::error::StackError;
use crate::selector::TranscriptStack;
use crate::session::Session;

/// One transcript line naming the queried path.
#[derive(Clone, Debug)]
pub struct WhichMatch {
    /// Transcript short name.
    pub shortname: String,
    /// Stack-member kind.
    pub kind: TranscriptKind,
    /// Whether the line carries the `-` override.
    pub minus: bool,
    /// The line, re-rendered canonically.
    pub line: String,
}

/// Everything the stack knows about one path.
#[derive(Clone, Debug, Default)]
pub struct WhichOutcome {
    /// Exclude pattern that matches the path, if any.
    pub excluded_by: Option<String>,
    /// Whether the path appears in the special list.
    pub special: bool,
    /// Matches in precedence order, highest first.
    pub matches: Vec<WhichMatch>,
}

impl WhichOutcome {
    /// The entry the selector would yield for this path, if any.
    pub fn decisive(&self) -> Option<&WhichMatch> {
        self.matches.iter().find(|m| {
            !m.minus && (m.kind == TranscriptKind::Special || self.excluded_by.is_none())
        })
    }
}

/// Reports which transcripts in the command file's stack claim `path`.
pub fn which(kfile: &Path, session: &Session, path: &[u8]) -> Result<WhichOutcome, StackError> {
    let mut stack = TranscriptStack::open(kfile, session)?;
    let target = session.form.convert(path);

    let mut outcome = WhichOutcome {
        excluded_by: stack
            .excludes
            .matching_pattern(&target)
            .map(str::to_owned),
        special: stack.is_special(&target),
        ..WhichOutcome::default()
    };

    for i in (0..stack.len()).rev() {
        if stack.tran(i).kind == TranscriptKind::Null {
            continue;
        }
        loop {
            let Some(entry) = stack.tran(i).current() else {
                break;
            };
            match path_casecmp(&entry.name, &target, session.case_sensitive) {
                Ordering::Less => stack.advance(i, session)?,
                Ordering::Equal => {
                    outcome.matches.push(WhichMatch {
                        shortname: stack.tran(i).shortname.clone(),
                        kind: stack.tran(i).kind,
                        minus: entry.minus,
                        line: write_line(entry),
                    });
                    break;
                }
                Ordering::Greater => break,
            }
        }
    }

    Ok(outcome)
}
