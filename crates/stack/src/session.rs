//! The session context shared by stack construction and selection.

use paths::PathForm;
use transcript::{ParseContext, DEFAULT_BUFFER_SIZE};

/// Long-lived facts about one engine run.
///
/// Passed explicitly wherever the original tooling reached for file-scope
/// globals; the only other long-lived state is the stack itself and the
/// hardlink registry.
#[derive(Clone, Debug)]
pub struct Session {
    /// Compare paths byte-wise (`true`) or case-folded (`false`).
    pub case_sensitive: bool,
    /// Path form all entries are converted to.
    pub form: PathForm,
    /// Root beneath which the engine operates; entries outside are ignored.
    pub path_prefix: Vec<u8>,
    /// Whether content checksums participate in comparison.
    pub cksum: bool,
    /// Transcripts at or below this size are memory-buffered (0 disables).
    pub transcript_buffer_size: u64,
    /// Emit a diagnostic when an exclude pattern suppresses a path.
    pub exclude_warnings: bool,
}

impl Session {
    /// Builds a session for a start path with defaults matching the tools.
    pub fn new(path_prefix: &[u8]) -> Self {
        Self {
            case_sensitive: true,
            form: PathForm::from_prefix(path_prefix),
            path_prefix: path_prefix.to_vec(),
            cksum: false,
            transcript_buffer_size: DEFAULT_BUFFER_SIZE,
            exclude_warnings: false,
        }
    }

    /// The parser-facing slice of this session.
    pub fn parse_context(&self) -> ParseContext {
        ParseContext {
            form: Some(self.form),
            cksum: self.cksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_follows_prefix() {
        assert_eq!(Session::new(b"/").form, PathForm::Absolute);
        assert_eq!(Session::new(b"./stage").form, PathForm::Relative);
    }
}
