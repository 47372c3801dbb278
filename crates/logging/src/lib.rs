#![deny(unsafe_code)]

//! Verbosity flags and diagnostic output control.
//!
//! Engine crates emit diagnostics through `tracing`; the binaries map their
//! `-q`/`-v` flags onto a subscriber level here. User-facing per-path status
//! lines are ordinary stdout output and are not routed through the
//! subscriber.

use tracing_subscriber::EnvFilter;

/// How chatty a run should be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Verbosity {
    /// Number of `-v` flags given.
    pub verbose: u8,
    /// Suppress non-error output entirely.
    pub quiet: bool,
}

impl Verbosity {
    /// Builds from the usual flag pair.
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Whether per-path status lines should be printed.
    pub fn announces_paths(self) -> bool {
        !self.quiet
    }

    /// The subscriber directive for this level.
    fn directive(self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Installs the global diagnostic subscriber.
///
/// `LOADSYNC_LOG` overrides the flag-derived level, same shape as any
/// `EnvFilter` directive string. Calling this twice is harmless; the second
/// installation attempt is ignored.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env("LOADSYNC_LOG")
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
