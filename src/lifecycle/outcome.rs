//! Shutdown outcomes and their aggregation.
//!
//! # Design Decisions
//! - Every attempted close records exactly one outcome
//! - The summary error is last-failure-wins; earlier failures stay visible
//!   through `failures()`

use crate::lifecycle::daemon::DaemonError;
use crate::lifecycle::resource::{ResourceKind, ShutdownError};

/// Result of closing one resource.
#[derive(Debug)]
pub enum ShutdownOutcome {
    Ok,
    Failed(ShutdownError),
}

impl ShutdownOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Collects close outcomes in the order they were attempted.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    outcomes: Vec<(ResourceKind, ShutdownOutcome)>,
    last_failure: Option<usize>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one close attempt.
    pub fn record(&mut self, resource: ResourceKind, result: Result<(), ShutdownError>) {
        let outcome = match result {
            Ok(()) => ShutdownOutcome::Ok,
            Err(e) => {
                self.last_failure = Some(self.outcomes.len());
                ShutdownOutcome::Failed(e)
            }
        };
        self.outcomes.push((resource, outcome));
    }

    pub fn finish(self, watchdog_fired: bool) -> DaemonResult {
        DaemonResult {
            outcomes: self.outcomes,
            last_failure: self.last_failure,
            watchdog_fired,
        }
    }
}

/// Aggregate result of a shutdown.
#[derive(Debug, Default)]
pub struct DaemonResult {
    outcomes: Vec<(ResourceKind, ShutdownOutcome)>,
    last_failure: Option<usize>,
    watchdog_fired: bool,
}

impl DaemonResult {
    /// True when every attempted close succeeded and the watchdog stayed quiet.
    pub fn is_ok(&self) -> bool {
        self.last_failure.is_none() && !self.watchdog_fired
    }

    /// The summary failure: the last close that failed.
    pub fn error(&self) -> Option<&ShutdownError> {
        self.last_failure.and_then(|i| match &self.outcomes[i].1 {
            ShutdownOutcome::Failed(e) => Some(e),
            ShutdownOutcome::Ok => None,
        })
    }

    /// Every failed close, in attempt order.
    pub fn failures(&self) -> impl Iterator<Item = &ShutdownError> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            ShutdownOutcome::Failed(e) => Some(e),
            ShutdownOutcome::Ok => None,
        })
    }

    /// Outcomes in attempt order.
    pub fn outcomes(&self) -> &[(ResourceKind, ShutdownOutcome)] {
        &self.outcomes
    }

    pub fn outcome(&self, resource: ResourceKind) -> Option<&ShutdownOutcome> {
        self.outcomes
            .iter()
            .find(|(kind, _)| *kind == resource)
            .map(|(_, outcome)| outcome)
    }

    pub fn watchdog_fired(&self) -> bool {
        self.watchdog_fired
    }

    /// Collapse into the summary result used by the process exit path.
    ///
    /// A close failure wins over a budget overrun; `Ok` iff [`Self::is_ok`].
    pub fn into_result(self) -> Result<(), DaemonError> {
        if let Some(i) = self.last_failure {
            if let Some((_, ShutdownOutcome::Failed(e))) = self.outcomes.into_iter().nth(i) {
                return Err(DaemonError::Stop(e));
            }
        }
        if self.watchdog_fired {
            return Err(DaemonError::Overrun);
        }
        Ok(())
    }
}
