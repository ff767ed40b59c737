/// Central sink for best-effort results.
///
/// Every side effect the dispatcher attempts ends up here exactly once. Failures
/// are logged with the step that produced them and then kept on the returned
/// [`Outcome`] so callers (and tests) can inspect them; nothing is re-raised.
use std::fmt;

use crate::error::NotifierError;

/// Which part of the dispatch pipeline produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DigestFlush,
    DigestCommand,
    Telemetry,
    Sound,
    Notification,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::DigestFlush => "digest",
            Step::DigestCommand => "digest-command",
            Step::Telemetry => "telemetry",
            Step::Sound => "sound",
            Step::Notification => "notification",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub step: Step,
    pub result: Result<(), NotifierError>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Records the result of one best-effort step, logging it on failure.
pub fn settle(step: Step, result: Result<(), NotifierError>) -> Outcome {
    match &result {
        Ok(()) => tracing::debug!(%step, "ok"),
        Err(e) => tracing::warn!(%step, "{e}"),
    }
    Outcome { step, result }
}
