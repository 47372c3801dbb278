//! The per-transcript lazy cursor.
//!
//! A [`Transcript`] exposes exactly one current [`PathEntry`] at a time;
//! callers advance it explicitly. Small files are slurped into memory at open
//! so deep stacks do not pin one file descriptor per transcript; iteration is
//! identical either way.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use paths::path_casecmp;

use crate::entry::PathEntry;
use crate::error::TranscriptError;
use crate::parse::{parse_line, ParseContext};

/// Default threshold below which a transcript is memory-buffered, in bytes.
/// Zero disables buffering.
pub const DEFAULT_BUFFER_SIZE: u64 = 2048;

/// The stack-member kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptKind {
    /// Empty placeholder at the bottom of every stack.
    Null,
    /// Authoritative: entries are the target state.
    Positive,
    /// Entries may exist with prescribed metadata; content unmanaged.
    Negative,
    /// Client-specific positive overlay, exempt from exclusion.
    Special,
}

#[derive(Debug)]
enum Source {
    /// The null transcript has nothing to read.
    Empty,
    /// Whole file held in memory.
    Buffered { lines: Vec<String>, next: usize },
    /// Line-at-a-time from disk.
    Stream(BufReader<File>),
}

/// One open transcript with its lazy cursor.
#[derive(Debug)]
pub struct Transcript {
    /// Stack-member kind.
    pub kind: TranscriptKind,
    /// Name as given in the command file, e.g. `base.T`.
    pub shortname: String,
    /// Resolved path of the transcript file.
    pub fullpath: PathBuf,
    /// The command file that introduced this transcript.
    pub kfile: String,
    /// Line number of the current entry.
    pub linenum: u32,
    /// Lines successfully parsed into entries.
    pub total_objects: u32,
    /// Entries this transcript actually contributed to selection.
    pub active_objects: u32,
    source: Source,
    case_sensitive: bool,
    cur: Option<PathEntry>,
    eof: bool,
}

impl Transcript {
    /// Creates the null transcript: immediately at EOF, never backed by a
    /// file.
    pub fn null() -> Self {
        Self {
            kind: TranscriptKind::Null,
            shortname: String::new(),
            fullpath: PathBuf::new(),
            kfile: String::new(),
            linenum: 0,
            total_objects: 0,
            active_objects: 0,
            source: Source::Empty,
            case_sensitive: true,
            cur: None,
            eof: true,
        }
    }

    /// Opens a transcript file and positions the cursor on its first entry.
    ///
    /// Files no larger than `buffer_size` bytes are read whole and their
    /// descriptor released before returning. Returns the transcript together
    /// with whether it ended up buffered.
    pub fn open(
        kind: TranscriptKind,
        fullpath: &Path,
        shortname: &str,
        kfile: &str,
        buffer_size: u64,
        case_sensitive: bool,
        ctx: &ParseContext,
    ) -> Result<(Self, bool), TranscriptError> {
        let io_err = |source| TranscriptError::Io {
            path: fullpath.display().to_string(),
            source,
        };
        let file = File::open(fullpath).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();

        let (source, buffered) = if buffer_size > 0 && len <= buffer_size {
            let mut text = String::new();
            let mut reader = BufReader::new(file);
            reader.read_to_string(&mut text).map_err(io_err)?;
            let lines = text.lines().map(str::to_owned).collect();
            (Source::Buffered { lines, next: 0 }, true)
        } else {
            (Source::Stream(BufReader::new(file)), false)
        };

        let mut tran = Self {
            kind,
            shortname: shortname.to_owned(),
            fullpath: fullpath.to_owned(),
            kfile: kfile.to_owned(),
            linenum: 0,
            total_objects: 0,
            active_objects: 0,
            source,
            case_sensitive,
            cur: None,
            eof: false,
        };
        tran.advance(ctx)?;
        Ok((tran, buffered))
    }

    /// Whether the cursor has run off the end.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// The current entry, or `None` at EOF.
    pub fn current(&self) -> Option<&PathEntry> {
        self.cur.as_ref()
    }

    fn next_line(&mut self) -> Result<Option<String>, TranscriptError> {
        match &mut self.source {
            Source::Empty => Ok(None),
            Source::Buffered { lines, next } => {
                if *next >= lines.len() {
                    return Ok(None);
                }
                let line = lines[*next].clone();
                *next += 1;
                Ok(Some(line))
            }
            Source::Stream(reader) => {
                let mut line = String::new();
                let got = reader.read_line(&mut line).map_err(|source| {
                    TranscriptError::Io {
                        path: self.fullpath.display().to_string(),
                        source,
                    }
                })?;
                if got == 0 {
                    Ok(None)
                } else {
                    Ok(Some(line))
                }
            }
        }
    }

    /// Moves the cursor to the next entry, skipping blanks and comments.
    ///
    /// Each new entry must order strictly after the previous one; a
    /// regression is the fatal "bad sort order" error.
    pub fn advance(&mut self, ctx: &ParseContext) -> Result<(), TranscriptError> {
        loop {
            let Some(line) = self.next_line()? else {
                self.cur = None;
                self.eof = true;
                return Ok(());
            };
            self.linenum += 1;

            // A lone `name:` token is a short-name header, not an entry.
            let tokens = paths::split_fields(&line);
            if let [first] = tokens.as_slice() {
                if let Some(name) = first.strip_suffix(':').filter(|_| !first.starts_with('#')) {
                    if self.shortname.is_empty() {
                        self.shortname = name.to_owned();
                    }
                    continue;
                }
            }

            let parsed = parse_line(&line, self.kind, ctx).map_err(|problem| {
                TranscriptError::Parse {
                    file: self.fullpath.display().to_string(),
                    line: self.linenum,
                    problem,
                }
            })?;
            let Some((_, entry)) = parsed else {
                continue;
            };

            if let Some(prev) = &self.cur {
                if path_casecmp(&entry.name, &prev.name, self.case_sensitive)
                    != std::cmp::Ordering::Greater
                {
                    return Err(TranscriptError::SortOrder {
                        file: self.fullpath.display().to_string(),
                        line: self.linenum,
                    });
                }
            }

            self.total_objects += 1;
            self.cur = Some(entry);
            return Ok(());
        }
    }
}
