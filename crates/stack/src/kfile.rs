//! Command-file (K-file) processing.
//!
//! ```text
//! # comment
//! [-] k <command-file>     include another command file (no minus form)
//! [-] p <transcript>       positive transcript
//! [-] n <transcript>       negative transcript
//! [-] s <path>             special-file path
//! [-] x <pattern>          exclude pattern
//! ```
//!
//! All names resolve relative to the directory of the top-level command
//! file. Inclusion must form a DAG; revisiting a command file is fatal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use filters::ExcludeList;
use transcript::{Transcript, TranscriptKind};

use crate::error::StackError;
use crate::selector::TranscriptStack;
use crate::session::Session;

const SPECIAL_NAME: &str = "special.T";

impl TranscriptStack {
    /// Opens the stack a command file describes.
    ///
    /// The null transcript is pushed first so the stack is never empty; the
    /// special transcript, when any `s` directives were seen, is opened from
    /// `special.T` next to the command file and pushed last.
    pub fn open(kfile: &Path, session: &Session) -> Result<Self, StackError> {
        let mut stack = Self {
            trans: vec![Transcript::null()],
            special_paths: Vec::new(),
            excludes: ExcludeList::new(session.case_sensitive),
            buffered: 0,
            unbuffered: 0,
        };

        let kdir = match kfile.parent() {
            Some(p) if p != Path::new("") => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut visited = vec![kfile.to_path_buf()];
        stack.read_kfile(kfile, &kdir, session, &mut visited)?;

        if !stack.special_paths.is_empty() {
            let fullpath = kdir.join(SPECIAL_NAME);
            stack.push(
                TranscriptKind::Special,
                &fullpath,
                SPECIAL_NAME,
                "special",
                session,
            )?;
        }

        Ok(stack)
    }

    fn push(
        &mut self,
        kind: TranscriptKind,
        fullpath: &Path,
        shortname: &str,
        kfile: &str,
        session: &Session,
    ) -> Result<(), StackError> {
        let (tran, buffered) = Transcript::open(
            kind,
            fullpath,
            shortname,
            kfile,
            session.transcript_buffer_size,
            session.case_sensitive,
            &session.parse_context(),
        )?;
        if buffered {
            self.buffered += 1;
        } else {
            self.unbuffered += 1;
        }
        self.trans.push(tran);
        Ok(())
    }

    fn remove(&mut self, kind: TranscriptKind, shortname: &str) {
        self.trans
            .retain(|t| !(t.kind == kind && t.shortname == shortname));
    }

    fn read_kfile(
        &mut self,
        kfile: &Path,
        kdir: &Path,
        session: &Session,
        visited: &mut Vec<PathBuf>,
    ) -> Result<(), StackError> {
        let file_name = kfile.display().to_string();
        let file = File::open(kfile).map_err(|source| StackError::Io {
            path: file_name.clone(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut linenum: u32 = 0;
        for line in reader.lines() {
            let line = line.map_err(|source| StackError::Io {
                path: file_name.clone(),
                source,
            })?;
            linenum += 1;

            let mut av: Vec<&str> = paths::split_fields(&line);
            if av.is_empty() || av[0].starts_with('#') {
                continue;
            }

            let minus = av[0] == "-";
            if minus {
                av.remove(0);
            }
            if av.len() != 2 {
                return Err(StackError::Kfile {
                    file: file_name.clone(),
                    line: linenum,
                    problem: format!("expected 2 arguments, got {}", av.len()),
                });
            }
            let (directive, arg) = (av[0], av[1]);
            let fullpath = kdir.join(arg);

            match directive {
                "k" => {
                    if minus {
                        return Err(StackError::Kfile {
                            file: file_name.clone(),
                            line: linenum,
                            problem: "minus 'k' not supported".to_owned(),
                        });
                    }
                    if visited.contains(&fullpath) {
                        return Err(StackError::Cycle {
                            file: file_name.clone(),
                            line: linenum,
                            included: arg.to_owned(),
                        });
                    }
                    visited.push(fullpath.clone());
                    self.read_kfile(&fullpath, kdir, session, visited)?;
                }

                "n" => {
                    if minus {
                        self.remove(TranscriptKind::Negative, arg);
                    } else {
                        self.push(TranscriptKind::Negative, &fullpath, arg, &file_name, session)?;
                    }
                }

                "p" => {
                    if minus {
                        self.remove(TranscriptKind::Positive, arg);
                    } else {
                        self.push(TranscriptKind::Positive, &fullpath, arg, &file_name, session)?;
                    }
                }

                "x" => {
                    let raw = paths::decode(arg).map_err(|e| StackError::Kfile {
                        file: file_name.clone(),
                        line: linenum,
                        problem: e.to_string(),
                    })?;
                    let pattern =
                        String::from_utf8_lossy(&session.form.convert(&raw)).into_owned();
                    if minus {
                        self.excludes.remove(&pattern);
                    } else {
                        self.excludes.insert(&pattern)?;
                    }
                }

                "s" => {
                    let path = session.form.convert(arg.as_bytes());
                    if minus {
                        self.special_paths.retain(|p| p != &path);
                    } else if !self.special_paths.contains(&path) {
                        self.special_paths.push(path);
                    }
                }

                other => {
                    return Err(StackError::Kfile {
                        file: file_name.clone(),
                        line: linenum,
                        problem: format!("'{other}' invalid"),
                    });
                }
            }
        }

        Ok(())
    }
}
