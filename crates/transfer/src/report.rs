//! The event-reporting capability.

use thiserror::Error;
use tracing::warn;

/// Reporting failures; never fatal to the run.
#[derive(Debug, Error)]
#[error("report: {0}")]
pub struct ReportError(pub String);

/// The fixed outcome vocabulary reported to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Difference pass found nothing to do.
    NoUpdates,
    /// Difference pass produced work.
    UpdatesAvailable,
    /// Downloads completed but were not applied.
    UpdatesRetrieved,
    /// Apply pass finished cleanly.
    ChangesApplied,
    /// Failed before touching anything.
    ErrorNoChanges,
    /// Failed after some mutations.
    ErrorChangesMade,
    /// Failed, mutation state unknown.
    Error,
}

impl Outcome {
    /// The wire string for this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoUpdates => "No updates needed",
            Self::UpdatesAvailable => "Updates available",
            Self::UpdatesRetrieved => "Updates retrieved",
            Self::ChangesApplied => "Changes applied successfully",
            Self::ErrorNoChanges => "Error, no changes made",
            Self::ErrorChangesMade => "Error, changes made",
            Self::Error => "Error",
        }
    }
}

/// Posts named events with an outcome string.
pub trait EventReporter {
    /// Posts one event; failures are reported, not propagated.
    fn post(&mut self, event: &str, outcome: Outcome) -> Result<(), ReportError>;
}

/// Discards every event; used when no reporting channel exists.
#[derive(Debug, Default)]
pub struct NullReporter;

impl EventReporter for NullReporter {
    fn post(&mut self, _event: &str, _outcome: Outcome) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Posts an event and downgrades failures to a warning.
pub fn post_or_warn(reporter: &mut dyn EventReporter, event: &str, outcome: Outcome) {
    if let Err(err) = reporter.post(event, outcome) {
        warn!("could not report event {event}: {err}");
    }
}
