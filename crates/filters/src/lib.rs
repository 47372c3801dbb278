#![deny(unsafe_code)]

//! Exclude-pattern matching.
//!
//! Command files carry `x <pattern>` directives; the patterns form an ordered
//! list and a path is excluded when any pattern matches it whole. Patterns
//! use shell globbing (`*`, `?`, `[set]`); `*` matches across path separators,
//! so `*.log` excludes a log file at any depth.
//!
//! Matching is delegated to [`globset`], compiled once per pattern with the
//! session's case sensitivity.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;

/// A malformed glob pattern.
#[derive(Debug, Error)]
#[error("bad exclude pattern {pattern:?}: {source}")]
pub struct PatternError {
    /// The offending pattern text.
    pub pattern: String,
    source: globset::Error,
}

fn compile(pattern: &str, case_sensitive: bool) -> Result<GlobMatcher, PatternError> {
    GlobBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .backslash_escape(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|source| PatternError {
            pattern: pattern.to_owned(),
            source,
        })
}

/// Matches one glob pattern against a whole path.
pub fn wildcard_match(pattern: &str, path: &[u8], case_sensitive: bool) -> bool {
    compile(pattern, case_sensitive)
        .map(|m| m.is_match(OsStr::from_bytes(path)))
        .unwrap_or(false)
}

/// The ordered exclude list built from `x` directives.
///
/// Insertion order is preserved; duplicates are ignored, and removing a
/// pattern that was never inserted is a no-op.
#[derive(Debug, Default)]
pub struct ExcludeList {
    case_sensitive: bool,
    patterns: Vec<(String, GlobMatcher)>,
}

impl ExcludeList {
    /// Creates an empty list bound to the session's case sensitivity.
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            patterns: Vec::new(),
        }
    }

    /// Adds a pattern unless it is already present.
    pub fn insert(&mut self, pattern: &str) -> Result<(), PatternError> {
        if self.contains(pattern) {
            return Ok(());
        }
        let matcher = compile(pattern, self.case_sensitive)?;
        self.patterns.push((pattern.to_owned(), matcher));
        Ok(())
    }

    /// Removes a previously inserted pattern; unknown patterns are ignored.
    pub fn remove(&mut self, pattern: &str) {
        self.patterns.retain(|(p, _)| p != pattern);
    }

    /// Whether the exact pattern text is present.
    pub fn contains(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|(p, _)| p == pattern)
    }

    /// Number of patterns in the list.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches `path`.
    pub fn matches(&self, path: &[u8]) -> bool {
        self.matching_pattern(path).is_some()
    }

    /// The first pattern matching `path`, in insertion order.
    pub fn matching_pattern(&self, path: &[u8]) -> Option<&str> {
        let candidate = OsStr::from_bytes(path);
        self.patterns
            .iter()
            .find(|(_, m)| m.is_match(candidate))
            .map(|(p, _)| p.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_crosses_separators() {
        assert!(wildcard_match("*.log", b"/var/log/app.log", true));
        assert!(wildcard_match("/tmp/*", b"/tmp/a/b", true));
    }

    #[test]
    fn question_and_class() {
        assert!(wildcard_match("/dev/tty?", b"/dev/tty1", true));
        assert!(wildcard_match("/dev/tty[0-9]", b"/dev/tty7", true));
        assert!(!wildcard_match("/dev/tty[0-9]", b"/dev/ttyS", true));
    }

    #[test]
    fn case_sensitivity() {
        assert!(!wildcard_match("*.LOG", b"/var/app.log", true));
        assert!(wildcard_match("*.LOG", b"/var/app.log", false));
    }

    #[test]
    fn list_insert_remove() {
        let mut list = ExcludeList::new(true);
        list.insert("*.log").unwrap();
        list.insert("*.log").unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.matches(b"/var/log/app.log"));
        list.remove("*.log");
        assert!(!list.matches(b"/var/log/app.log"));
        // Removing again is harmless.
        list.remove("*.log");
        assert!(list.is_empty());
    }

    #[test]
    fn no_match_without_patterns() {
        let list = ExcludeList::new(true);
        assert!(!list.matches(b"/anything"));
    }
}
