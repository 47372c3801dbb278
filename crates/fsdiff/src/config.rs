//! Difference-run configuration.

use checksums::{Algorithm, MIN_BUFFER_SIZE};
use stack::Session;

/// Which transcript shape a run emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditPath {
    /// Difference stream for the applier (`+`/`-`/metadata lines, headers).
    Applicable,
    /// Description of the filesystem as found.
    Creatable,
}

/// Which metadata fields participate in comparison.
///
/// A disabled field is skipped entirely. Checksum participation is governed
/// by whether the session selected an algorithm, not by this set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckFields {
    /// Compare numeric owner.
    pub uid: bool,
    /// Compare numeric group.
    pub gid: bool,
    /// Compare modification time on `f`/`a`.
    pub mtime: bool,
    /// Compare permission bits.
    pub mode: bool,
    /// Compare content length on `f`/`a`.
    pub size: bool,
}

impl Default for CheckFields {
    fn default() -> Self {
        Self {
            uid: true,
            gid: true,
            mtime: true,
            mode: true,
            size: true,
        }
    }
}

impl CheckFields {
    /// Enables or disables one field by name; unknown names are rejected.
    pub fn set(&mut self, field: &str, on: bool) -> Result<(), String> {
        match field.to_ascii_lowercase().as_str() {
            "uid" => self.uid = on,
            "gid" => self.gid = on,
            "mtime" => self.mtime = on,
            "mode" => self.mode = on,
            "size" => self.size = on,
            other => return Err(format!("unknown metadata field {other:?}")),
        }
        Ok(())
    }
}

/// Everything one difference run needs to know.
#[derive(Clone, Debug)]
pub struct DiffConfig {
    /// The session context (case sensitivity, path form, prefix, buffering).
    pub session: Session,
    /// Output shape.
    pub edit_path: EditPath,
    /// Metadata comparison switches.
    pub checks: CheckFields,
    /// Selected digest; `None` leaves checksums off.
    pub algorithm: Option<Algorithm>,
    /// Read buffer for checksumming.
    pub cksum_bufsize: usize,
    /// Describe only the start path itself; no stack, no descent.
    pub single_line: bool,
    /// Emit percent-done progress lines to stdout.
    pub progress: bool,
}

impl DiffConfig {
    /// Builds a creatable-mode configuration for a start path.
    pub fn new(path_prefix: &[u8]) -> Self {
        Self {
            session: Session::new(path_prefix),
            edit_path: EditPath::Creatable,
            checks: CheckFields::default(),
            algorithm: None,
            cksum_bufsize: MIN_BUFFER_SIZE,
            single_line: false,
            progress: false,
        }
    }

    /// Selects a digest algorithm and turns checksum comparison on.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self.session.cksum = true;
        self
    }

    /// Switches to applicable-mode output.
    pub fn applicable(mut self) -> Self {
        self.edit_path = EditPath::Applicable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_fields_toggle_by_name() {
        let mut checks = CheckFields::default();
        checks.set("mtime", false).unwrap();
        assert!(!checks.mtime);
        checks.set("MODE", false).unwrap();
        assert!(!checks.mode);
        assert!(checks.set("cksum", false).is_err());
    }

    #[test]
    fn algorithm_enables_session_checksums() {
        let config = DiffConfig::new(b"/").with_algorithm(Algorithm::Sha256);
        assert!(config.session.cksum);
    }
}
